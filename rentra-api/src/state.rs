use std::sync::Arc;

use rentra_booking::{BookingEngine, BookingRepository, PaymentReconciler};
use rentra_core::payment::PaymentGateway;
use rentra_fleet::FleetRepository;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<dyn FleetRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub engine: Arc<BookingEngine>,
    pub reconciler: Arc<PaymentReconciler>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub auth: AuthConfig,
    pub payment: PaymentSettings,
}
