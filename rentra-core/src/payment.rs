use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the provider needs to open a hosted checkout page.
///
/// `metadata` is echoed back verbatim inside the provider's webhook events;
/// the reconciliation handler rebuilds the booking request from it, so it
/// must carry the full intent of the booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Where the provider sends the customer after checkout.
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String, // Provider's ID (e.g., cs_123)
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session with the provider
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>>;
}

/// Stand-in gateway for tests and local runs. Mints deterministic-looking
/// session ids without talking to any provider.
pub struct MockPaymentGateway {
    fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// A gateway whose every call fails, for exercising the 5xx path.
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>> {
        if self.fail {
            return Err("simulated gateway outage".into());
        }
        let id = format!("cs_mock_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.mock.local/pay/{id}?amount={}", request.amount_minor),
            id,
        })
    }
}
