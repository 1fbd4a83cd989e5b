pub mod auth;

pub use auth::{encode_token, require_admin_for_writes, require_auth, Claims, CurrentUser};
