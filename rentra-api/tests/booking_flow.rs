use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rentra_api::middleware::auth::Claims;
use rentra_api::state::{AppState, AuthConfig, PaymentSettings};
use rentra_api::app;
use rentra_booking::{
    Booking, BookingEngine, BookingRepository, BookingRequest, BookingStatus, PaymentReconciler,
};
use rentra_core::payment::MockPaymentGateway;
use rentra_core::{StoreError, StoreResult};
use rentra_core::webhook::{sign, WebhookVerifier};
use rentra_fleet::{Car, FleetRepository};
use rentra_store::MemoryStore;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "test-jwt-secret";
const WEBHOOK_SECRET: &str = "whsec_test_secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    car: Car,
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let car = Car {
        id: Uuid::new_v4(),
        name: "Corolla GLi".to_string(),
        image: "https://cdn.example.com/corolla.jpg".to_string(),
        brand: "Toyota".to_string(),
        daily_rate_minor: 15_000,
        capacity: 5,
        available: true,
    };
    store.insert_car(&car).await.unwrap();

    let engine = Arc::new(BookingEngine::new(store.clone(), store.clone()));
    let reconciler = Arc::new(PaymentReconciler::new(
        WebhookVerifier::new(WEBHOOK_SECRET),
        engine.clone(),
    ));

    let state = AppState {
        fleet: store.clone(),
        bookings: store.clone(),
        engine,
        reconciler,
        gateway: Arc::new(MockPaymentGateway::new()),
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
            expiration: 3600,
        },
        payment: PaymentSettings {
            currency: "usd".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        },
    };

    TestApp {
        router: app(state),
        store,
        car,
    }
}

fn token(sub: Uuid, role: &str) -> String {
    let claims = Claims {
        sub,
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn booking_payload(car_id: Uuid, start: &str, end: &str) -> Value {
    json!({
        "car_id": car_id,
        "customer_name": "Ayesha Khan",
        "father_name": "Imran Khan",
        "address": "12 Canal Road, Lahore",
        "national_id": "3520212345678",
        "licence_number": "352021234567890",
        "phone_number": "03001234567",
        "start_date": start,
        "end_date": end,
        "amount_minor": 60_000,
        "payment_method": "card"
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn authed_json(method: Method, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn car_available(app: &TestApp) -> bool {
    app.store
        .get_car(app.car.id)
        .await
        .unwrap()
        .unwrap()
        .available
}

#[tokio::test]
async fn health_and_catalog_are_public() {
    let app = spawn_app().await;

    let (status, body) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(
        &app.router,
        Request::get("/api/cars").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["available"], true);
}

#[tokio::test]
async fn booking_routes_are_gated_by_token_and_role() {
    let app = spawn_app().await;
    let payload = booking_payload(app.car.id, "2099-06-01", "2099-06-05");

    // No token.
    let (status, _) = send(
        &app.router,
        Request::post("/api/bookings")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbage token.
    let (status, _) = send(
        &app.router,
        authed_json(Method::POST, "/api/bookings", "not-a-jwt", &payload),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Customer token on an admin route.
    let customer = token(Uuid::new_v4(), "user");
    let (status, _) = send(
        &app.router,
        Request::get("/api/admin/bookings")
            .header(header::AUTHORIZATION, format!("Bearer {customer}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_conflict_and_adjacent_ranges() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Pending");
    assert!(!car_available(&app).await);

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-04", "2099-06-06"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    // Adjacent half-open range does not conflict.
    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-05", "2099-06-07"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_rejects_malformed_profiles_and_past_dates() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");

    let mut bad = booking_payload(app.car.id, "2099-06-01", "2099-06-05");
    bad["national_id"] = json!("12345");
    let (status, _) = send(
        &app.router,
        authed_json(Method::POST, "/api/bookings", &customer, &bad),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2000-01-01", "2000-01-05"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(Uuid::new_v4(), "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_recomputes_availability() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (_, created) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    let booking_id = created["id"].as_str().unwrap().to_string();
    assert!(!car_available(&app).await);

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::PUT,
            &format!("/api/bookings/{booking_id}/status"),
            &admin,
            &json!({ "status": "Cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "Cancelled");
    assert!(body.get("warning").is_none());
    assert!(car_available(&app).await);
}

#[tokio::test]
async fn reconfirm_into_conflict_warns_and_keeps_flag() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (_, first) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    let first_id = first["id"].as_str().unwrap().to_string();

    send(
        &app.router,
        authed_json(
            Method::PUT,
            &format!("/api/bookings/{first_id}/status"),
            &admin,
            &json!({ "status": "Cancelled" }),
        ),
    )
    .await;

    // A new booking now occupies part of the cancelled range.
    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-04", "2099-06-06"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::PUT,
            &format!("/api/bookings/{first_id}/status"),
            &admin,
            &json!({ "status": "Confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "Confirmed");
    assert!(body["warning"].is_string());
    assert!(!car_available(&app).await);
}

#[tokio::test]
async fn invalid_transitions_are_bad_requests() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (_, created) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        authed_json(
            Method::PUT,
            &format!("/api/bookings/{booking_id}/status"),
            &admin,
            &json!({ "status": "Completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        authed_json(
            Method::PUT,
            &format!("/api/bookings/{}/status", Uuid::new_v4()),
            &admin,
            &json!({ "status": "Confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_frees_the_car_and_is_terminal() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");
    let admin = token(Uuid::new_v4(), "admin");

    let (_, created) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    let booking_id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/bookings/{booking_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert!(car_available(&app).await);

    let (status, _) = send(
        &app.router,
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/bookings/{booking_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn my_bookings_scopes_to_the_requester() {
    let app = spawn_app().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &token(alice, "user"),
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &token(bob, "user"),
            &booking_payload(app.car.id, "2099-06-10", "2099-06-12"),
        ),
    )
    .await;

    let (status, body) = send(
        &app.router,
        Request::get("/api/bookings/my-bookings")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(alice, "user")))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mine = body.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["renter_id"], json!(alice));

    // Admin sees the full ledger.
    let (_, all) = send(
        &app.router,
        Request::get("/api/admin/bookings")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", token(Uuid::new_v4(), "admin")),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_can_add_cars_with_validation() {
    let app = spawn_app().await;
    let admin = token(Uuid::new_v4(), "admin");

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/admin/cars",
            &admin,
            &json!({
                "name": "Civic Oriel",
                "image": "https://cdn.example.com/civic.jpg",
                "brand": "Honda",
                "daily_rate_minor": 18_000,
                "capacity": 5
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["available"], true);

    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/admin/cars",
            &admin,
            &json!({
                "name": "",
                "image": "https://cdn.example.com/x.jpg",
                "brand": "Honda",
                "daily_rate_minor": 18_000,
                "capacity": 5
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_session_runs_the_conflict_gauntlet() {
    let app = spawn_app().await;
    let customer = token(Uuid::new_v4(), "user");

    let (status, body) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/payment/create-checkout-session",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://"));
    // Nothing persisted and the car untouched.
    assert!(car_available(&app).await);

    // Once an overlapping booking exists the session is refused up front.
    send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/bookings",
            &customer,
            &booking_payload(app.car.id, "2099-06-01", "2099-06-05"),
        ),
    )
    .await;
    let (status, _) = send(
        &app.router,
        authed_json(
            Method::POST,
            "/api/payment/create-checkout-session",
            &customer,
            &booking_payload(app.car.id, "2099-06-04", "2099-06-06"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

fn webhook_event(car_id: Uuid, session_id: &str) -> Vec<u8> {
    let request = BookingRequest {
        car_id,
        customer_name: "Ayesha Khan".to_string(),
        father_name: "Imran Khan".to_string(),
        address: "12 Canal Road, Lahore".to_string(),
        national_id: "3520212345678".to_string(),
        licence_number: "352021234567890".to_string(),
        phone_number: "03001234567".to_string(),
        start_date: NaiveDate::from_ymd_opt(2099, 6, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2099, 6, 5).unwrap(),
        amount_minor: 60_000,
        payment_method: "card".to_string(),
    };
    serde_json::to_vec(&json!({
        "id": "evt_hook_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_intent": "pi_123",
            "metadata": request.to_metadata(Uuid::new_v4()),
        }}
    }))
    .unwrap()
}

fn webhook_request(payload: &[u8], signature: &str) -> Request<Body> {
    Request::post("/api/payment/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload.to_vec()))
        .unwrap()
}

fn signed_header(payload: &[u8]) -> String {
    let now = Utc::now().timestamp();
    format!("t={},v1={}", now, sign(WEBHOOK_SECRET, now, payload))
}

#[tokio::test]
async fn duplicate_webhook_delivery_creates_one_booking() {
    let app = spawn_app().await;
    let payload = webhook_event(app.car.id, "sess_123");

    let (status, first) = send(
        &app.router,
        webhook_request(&payload, &signed_header(&payload)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["received"], true);
    let booking_id = first["booking_id"].as_str().unwrap().to_string();
    assert!(!car_available(&app).await);

    let (status, second) = send(
        &app.router,
        webhook_request(&payload, &signed_header(&payload)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["booking_id"].as_str().unwrap(), booking_id);

    let admin = token(Uuid::new_v4(), "admin");
    let (_, all) = send(
        &app.router,
        Request::get("/api/admin/bookings")
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let bookings = all.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["status"], "Confirmed");
    assert_eq!(bookings[0]["checkout_session_id"], "sess_123");
}

#[tokio::test]
async fn webhook_rejects_bad_signatures_without_processing() {
    let app = spawn_app().await;
    let payload = webhook_event(app.car.id, "sess_forged");

    // Signed with the wrong secret.
    let now = Utc::now().timestamp();
    let forged = format!("t={},v1={}", now, sign("whsec_other", now, &payload));
    let (status, _) = send(&app.router, webhook_request(&payload, &forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing header entirely.
    let (status, _) = send(
        &app.router,
        Request::post("/api/payment/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.clone()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(car_available(&app).await);
}

#[tokio::test]
async fn other_webhook_kinds_are_acknowledged() {
    let app = spawn_app().await;
    let payload = serde_json::to_vec(&json!({
        "id": "evt_other",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_9", "payment_intent": null } }
    }))
    .unwrap();

    let (status, body) = send(
        &app.router,
        webhook_request(&payload, &signed_header(&payload)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert!(body.get("booking_id").is_none());
}

/// Booking store double for a persistence outage: writes fail, lookups
/// come back empty.
struct DownBookingStore;

#[async_trait::async_trait]
impl BookingRepository for DownBookingStore {
    async fn insert(&self, _booking: &Booking, _car_available: bool) -> StoreResult<()> {
        Err(StoreError::Unavailable(
            "connection reset by peer".to_string(),
        ))
    }

    async fn get(&self, _id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(None)
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn list_for_renter(&self, _renter_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn active_for_car(&self, _car_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(Vec::new())
    }

    async fn find_by_session(&self, _session_id: &str) -> StoreResult<Option<Booking>> {
        Ok(None)
    }

    async fn update_status(
        &self,
        _id: Uuid,
        _status: BookingStatus,
        _car_available: Option<bool>,
    ) -> StoreResult<Booking> {
        Err(StoreError::NotFound)
    }

    async fn delete(&self, _id: Uuid, _car_available: bool) -> StoreResult<()> {
        Err(StoreError::NotFound)
    }
}

#[tokio::test]
async fn webhook_persistence_outage_returns_500_for_redelivery() {
    let store = Arc::new(MemoryStore::new());
    let car = Car {
        id: Uuid::new_v4(),
        name: "Corolla GLi".to_string(),
        image: "https://cdn.example.com/corolla.jpg".to_string(),
        brand: "Toyota".to_string(),
        daily_rate_minor: 15_000,
        capacity: 5,
        available: true,
    };
    store.insert_car(&car).await.unwrap();

    let bookings = Arc::new(DownBookingStore);
    let engine = Arc::new(BookingEngine::new(store.clone(), bookings.clone()));
    let reconciler = Arc::new(PaymentReconciler::new(
        WebhookVerifier::new(WEBHOOK_SECRET),
        engine.clone(),
    ));
    let state = AppState {
        fleet: store.clone(),
        bookings,
        engine,
        reconciler,
        gateway: Arc::new(MockPaymentGateway::new()),
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
            expiration: 3600,
        },
        payment: PaymentSettings {
            currency: "usd".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        },
    };
    let router = app(state);

    let payload = webhook_event(car.id, "sess_outage");
    let (status, _) = send(&router, webhook_request(&payload, &signed_header(&payload))).await;
    // Not 400: the provider must see a retryable failure and redeliver.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
