use std::sync::Arc;

use airport_api::middleware::{encode_token, Claims};
use airport_api::{app, AppState};
use airport_store::app_config::{
    AuthConfig, Config, DatabaseConfig, PaginationConfig, RateLimitConfig, ServerConfig,
};
use airport_store::MemoryStore;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    admin: String,
}

fn token(role: &str) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let claims = Claims {
        sub: id,
        email: format!("{id}@example.com"),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    (id, encode_token(&claims, SECRET).unwrap())
}

fn test_config() -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig { url: "memory".to_string(), max_connections: 1 },
        redis: None,
        auth: AuthConfig { jwt_secret: SECRET.to_string() },
        rate_limit: RateLimitConfig::default(),
        pagination: PaginationConfig { page_size: 10 },
    }
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), &test_config(), None).unwrap();
        let (_, admin) = token("ADMIN");
        Self { router: app(state), store, admin }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn admin_post(&self, uri: &str, body: Value) -> Value {
        let (status, value) = self.send(Method::POST, uri, Some(&self.admin), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri} failed: {value}");
        value
    }

    /// Two airports, one route, a 25x6 airplane and one flight on 2026-05-01
    async fn seed_flight(&self) -> i64 {
        let kbp = self
            .admin_post("/api/airport/airports", json!({"name": "Boryspil", "closest_big_city": "Kyiv"}))
            .await;
        let waw = self
            .admin_post("/api/airport/airports", json!({"name": "Chopin", "closest_big_city": "Warsaw"}))
            .await;
        let route = self
            .admin_post(
                "/api/airport/routes",
                json!({"source": kbp["id"], "destination": waw["id"], "distance": 690}),
            )
            .await;
        let airplane_type = self
            .admin_post("/api/airport/airplane_types", json!({"name": "Airbus A320"}))
            .await;
        let airplane = self
            .admin_post(
                "/api/airport/airplanes",
                json!({"name": "UR-PSA", "rows": 25, "seats_in_row": 6, "airplane_type": airplane_type["id"]}),
            )
            .await;
        assert_eq!(airplane["capacity"], 150);
        let crew = self
            .admin_post("/api/airport/crew", json!({"first_name": "Olena", "last_name": "Koval"}))
            .await;
        let flight = self
            .admin_post(
                "/api/airport/flights",
                json!({
                    "route": route["id"],
                    "airplane": airplane["id"],
                    "departure_time": "2026-05-01T08:00:00Z",
                    "arrival_time": "2026-05-01T10:00:00Z",
                    "crew": [crew["id"]],
                }),
            )
            .await;
        flight["id"].as_i64().unwrap()
    }
}

fn ticket(row: i32, seat: i32, flight: i64) -> Value {
    json!({"row": row, "seat": seat, "flight": flight})
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_catalog_requires_authentication() {
    let app = TestApp::new();
    let (status, _) = app.send(Method::GET, "/api/airport/airports", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/airport/airports", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let app = TestApp::new();
    let (_, user) = token("USER");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/airport/airports",
            Some(&user),
            Some(json!({"name": "Boryspil", "closest_big_city": "Kyiv"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::GET, "/api/airport/airports", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_route_rejects_same_source_and_destination() {
    let app = TestApp::new();
    let airport = app
        .admin_post("/api/airport/airports", json!({"name": "Boryspil", "closest_big_city": "Kyiv"}))
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/airport/routes",
            Some(&app.admin),
            Some(json!({"source": airport["id"], "destination": airport["id"], "distance": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_flight_listing_and_detail() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;

    let (status, body) = app
        .send(Method::GET, "/api/airport/flights?departure_time=2026-05-01", Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["route"], "Boryspil > Chopin");
    assert_eq!(body["results"][0]["tickets_available"], 150);

    let (_, body) = app
        .send(Method::GET, "/api/airport/flights?arrival_time=2026-05-02", Some(&app.admin), None)
        .await;
    assert_eq!(body["count"], 0);

    let (status, _) = app
        .send(Method::GET, "/api/airport/flights?departure_time=01.05.2026", Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::GET, &format!("/api/airport/flights/{flight}"), Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"]["source"], "Boryspil");
    assert_eq!(body["airplane"]["capacity"], 150);
    assert_eq!(body["crew"][0]["full_name"], "Olena Koval");
}

#[tokio::test]
async fn test_order_created_with_flight_summary() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&user),
            Some(json!({"tickets": [ticket(2, 3, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["tickets"][0]["row"], 2);
    assert_eq!(body["tickets"][0]["seat"], 3);
    assert_eq!(body["tickets"][0]["flight"]["id"], flight);
    assert_eq!(body["tickets"][0]["flight"]["tickets_available"], 149);
    assert_eq!(app.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_out_of_range_ticket_is_keyed_by_index_and_field() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&user),
            Some(json!({"tickets": [ticket(1, 1, flight), ticket(100, 3, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["details"]["tickets"]["1"]["row"][0].as_str().unwrap();
    assert!(message.contains("(1, 25)"), "{message}");
    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_invalid_batches_persist_nothing() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    let cases = [
        json!({"tickets": []}),
        json!({}),
        json!({"tickets": [ticket(4, 4, flight), ticket(4, 4, flight)]}),
        json!({"tickets": [ticket(4, 4, 999)]}),
    ];
    for case in cases {
        let (status, body) = app
            .send(Method::POST, "/api/airport/orders", Some(&user), Some(case.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case} -> {body}");
        assert!(body["details"].is_object(), "{body}");
    }
    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_sold_seat_is_rejected_for_everyone_else() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, alice) = token("USER");
    let (_, bob) = token("USER");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&alice),
            Some(json!({"tickets": [ticket(2, 3, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&bob),
            Some(json!({"tickets": [ticket(2, 4, flight), ticket(2, 3, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["tickets"]["1"]["non_field_errors"].is_array());
    assert_eq!(app.store.order_count().await, 1);
    assert_eq!(app.store.ticket_count().await, 1);
}

#[tokio::test]
async fn test_orders_are_scoped_to_their_owner() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, alice) = token("USER");
    let (_, bob) = token("USER");

    let (_, order) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&alice),
            Some(json!({"tickets": [ticket(7, 1, flight)]})),
        )
        .await;
    let uri = format!("/api/airport/orders/{}", order["id"]);

    let (status, _) = app.send(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app.send(Method::GET, "/api/airport/orders", Some(&bob), None).await;
    assert_eq!(listed["count"], 0);

    let (status, fetched) = app.send(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["tickets"][0]["row"], 7);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The seat is free again
    let (status, _) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&bob),
            Some(json!({"tickets": [ticket(7, 1, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_orders_listed_newest_first() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    for seat in 1..=3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/airport/orders",
                Some(&user),
                Some(json!({"tickets": [ticket(1, seat, flight)]})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app
        .send(Method::GET, "/api/airport/orders?page_size=2", Some(&user), None)
        .await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["tickets"][0]["seat"], 3);
    assert_eq!(body["results"][1]["tickets"][0]["seat"], 2);
}

#[tokio::test]
async fn test_metrics_count_order_outcomes() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    app.send(
        Method::POST,
        "/api/airport/orders",
        Some(&user),
        Some(json!({"tickets": [ticket(1, 1, flight)]})),
    )
    .await;
    app.send(
        Method::POST,
        "/api/airport/orders",
        Some(&user),
        Some(json!({"tickets": [ticket(1, 1, flight)]})),
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("airport_orders_total{outcome=\"created\"} 1"));
    assert!(text.contains("airport_orders_total{outcome=\"rejected\"} 1"));
}

#[tokio::test]
async fn test_malformed_tickets_are_keyed_by_index_and_field() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");

    let cases = [
        (json!({"row": 2, "seat": 3}), "flight", "This field is required."),
        (json!({"row": "two", "seat": 3, "flight": flight}), "row", "A valid integer is required."),
        (json!({"row": 3000000000i64, "seat": 3, "flight": flight}), "row", "A valid integer is required."),
    ];
    for (bad, field, message) in cases {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/airport/orders",
                Some(&user),
                Some(json!({"tickets": [ticket(1, 1, flight), bad]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["details"]["tickets"]["1"][field][0], message, "{body}");
    }
    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_malformed_catalog_body_is_a_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/api/airport/airports", Some(&app.admin), Some(json!({"name": 5})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["non_field_errors"][0].is_string(), "{body}");
}

#[tokio::test]
async fn test_airplane_cannot_shrink_under_sold_seats() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");
    let (status, _) = app
        .send(
            Method::POST,
            "/api/airport/orders",
            Some(&user),
            Some(json!({"tickets": [ticket(25, 6, flight)]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/airport/airplanes/1",
            Some(&app.admin),
            Some(json!({"name": "UR-PSA", "rows": 1, "seats_in_row": 1, "airplane_type": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["details"]["non_field_errors"][0].is_string(), "{body}");

    let (_, body) = app
        .send(Method::GET, "/api/airport/flights", Some(&app.admin), None)
        .await;
    assert_eq!(body["results"][0]["capacity"], 150);
    assert_eq!(body["results"][0]["tickets_available"], 149);
}

#[tokio::test]
async fn test_deleting_flight_removes_orders_left_empty() {
    let app = TestApp::new();
    let flight = app.seed_flight().await;
    let (_, user) = token("USER");
    app.send(
        Method::POST,
        "/api/airport/orders",
        Some(&user),
        Some(json!({"tickets": [ticket(3, 3, flight)]})),
    )
    .await;
    assert_eq!(app.store.order_count().await, 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/airport/flights/{flight}"), Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.send(Method::GET, "/api/airport/orders", Some(&user), None).await;
    assert_eq!(body["count"], 0);
    assert_eq!(app.store.order_count().await, 0);
}
