use std::net::SocketAddr;
use std::sync::Arc;

use rentra_api::{app, state::{AppState, AuthConfig, PaymentSettings}};
use rentra_booking::{BookingEngine, PaymentReconciler};
use rentra_core::payment::MockPaymentGateway;
use rentra_core::webhook::WebhookVerifier;
use rentra_store::{DbClient, PgBookingStore, PgFleetStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rentra_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = rentra_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Rentra API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to run migrations");

    let fleet = Arc::new(PgFleetStore::new(db.pool.clone()));
    let bookings = Arc::new(PgBookingStore::new(db.pool.clone()));
    let engine = Arc::new(BookingEngine::new(fleet.clone(), bookings.clone()));
    let verifier = WebhookVerifier::with_tolerance(
        config.payment.webhook_secret.clone(),
        config.payment.signature_tolerance_secs,
    );
    let reconciler = Arc::new(PaymentReconciler::new(verifier, engine.clone()));

    let app_state = AppState {
        fleet,
        bookings,
        engine,
        reconciler,
        gateway: Arc::new(MockPaymentGateway::new()),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        payment: PaymentSettings {
            currency: config.payment.currency.clone(),
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
