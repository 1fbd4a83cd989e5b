use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
    RequestExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims of a bearer token issued by the account service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Verified identity of the caller, injected into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            is_admin: claims.role == ADMIN_ROLE,
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let TypedHeader(Authorization(bearer)) = req
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| {
            AppError::AuthenticationError("Authentication credentials were not provided.".to_string())
        })?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::AuthenticationError("Given token not valid.".to_string())
    })?;

    // 3. Inject the caller
    req.extensions_mut().insert(CurrentUser::from(token_data.claims));

    Ok(next.run(req).await)
}

// ============================================================================
// Catalog Write Guard
// ============================================================================

/// Reads are open to every authenticated user, writes to admins only.
/// Must run after [`require_auth`].
pub async fn require_admin_for_writes(req: Request, next: Next) -> Result<Response, AppError> {
    let is_read = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    let is_admin = req
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|user| user.is_admin);

    if !is_read && !is_admin {
        return Err(AppError::AuthorizationError(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
