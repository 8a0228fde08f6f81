use std::sync::Arc;
use tracing::warn;

use super::{PaymentError, PaymentProvider};

/// Placeholder for the hosted card gateway.
///
/// Selecting it fails at start-up so no request ever reaches a half-wired
/// provider.
#[derive(Debug)]
pub struct StripeGateway;

impl StripeGateway {
    pub fn connect(secret_key: &str) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        if secret_key.trim().is_empty() {
            return Err(PaymentError::Misconfigured(
                "stripe_secret_key must not be empty".to_string(),
            ));
        }
        warn!("stripe provider requested but no client is wired in");
        Err(PaymentError::NotImplemented("stripe".to_string()))
    }
}
