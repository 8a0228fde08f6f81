//! Payment gateway boundary.
//!
//! [`PaymentProvider`] is the capability set the order service consumes.
//! Exactly one implementation is active, chosen once at start-up by
//! [`build_payment_provider`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::common::PAYMENT_DECISIONS;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{PaymentAccount, PaymentIntent, PaymentMethod};
use crate::repositories::StoreError;

pub mod card;
pub mod mock_gateway;
pub mod stripe;

pub use mock_gateway::{MockGatewaySettings, MockPaymentGateway};

/// Message for structurally invalid cards and forced test declines.
pub const CARD_DECLINED_MESSAGE: &str = "Your card was declined.";
/// Message for random declines of otherwise valid cards.
pub const PAYMENT_FAILED_MESSAGE: &str = "Payment failed. Please try again.";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Amount must be greater than zero (got {0})")]
    InvalidAmount(i64),

    #[error("{0}")]
    CardDeclined(String),

    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Payment intent {0} is already being confirmed")]
    ConfirmationInProgress(String),

    #[error("Payment store rejected the update: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    #[error("Payment provider misconfigured: {0}")]
    Misconfigured(String),

    #[error("{0} payment provider is not implemented")]
    NotImplemented(String),
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidAmount(_) => ServiceError::ValidationError(err.to_string()),
            PaymentError::IntentNotFound(_) | PaymentError::AccountNotFound(_) => {
                ServiceError::NotFound(err.to_string())
            }
            PaymentError::ConfirmationInProgress(_) | PaymentError::Store(_) => {
                ServiceError::Conflict(err.to_string())
            }
            PaymentError::NotImplemented(provider) => ServiceError::NotImplemented(format!(
                "{} payment provider is not implemented",
                provider
            )),
            PaymentError::UnknownProvider(_) | PaymentError::Misconfigured(_) => {
                ServiceError::InternalError(err.to_string())
            }
            PaymentError::CardDeclined(_) => ServiceError::GatewayError(err.to_string()),
        }
    }
}

/// Parameters for a new payment intent.
#[derive(Debug, Clone, Default)]
pub struct CreatePaymentIntent {
    /// Minor currency units, must be positive
    pub amount: i64,
    /// Defaults to `usd` when empty
    pub currency: String,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name for logs and health output.
    fn name(&self) -> &'static str;

    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntent,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirms an intent with the given card. Confirming an intent that has
    /// already succeeded returns it unchanged without charging again.
    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError>;

    async fn retrieve_payment_intent(&self, intent_id: &str)
        -> Result<PaymentIntent, PaymentError>;

    fn generate_receipt_url(&self, intent: &PaymentIntent) -> String;

    async fn create_account(&self, email: &str) -> Result<PaymentAccount, PaymentError>;

    async fn retrieve_account(&self, account_id: &str) -> Result<PaymentAccount, PaymentError>;

    /// Idempotent.
    async fn complete_account_onboarding(
        &self,
        account_id: &str,
    ) -> Result<PaymentAccount, PaymentError>;

    fn generate_onboarding_link(&self, account_id: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Mock,
    Stripe,
}

/// Selects the configured provider. Unimplemented providers fail here, at
/// start-up, rather than on the first payment.
pub fn build_payment_provider(
    config: &AppConfig,
) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
    let kind = ProviderKind::from_str(config.payment_provider.trim())
        .map_err(|_| PaymentError::UnknownProvider(config.payment_provider.clone()))?;

    match kind {
        ProviderKind::Mock => {
            let gateway = MockPaymentGateway::new(MockGatewaySettings::from(config))
                .with_test_cards(config.test_card_table())
                .with_decision_source(config.decision_source(PAYMENT_DECISIONS));
            info!(provider = %kind, "payment provider selected");
            Ok(Arc::new(gateway))
        }
        ProviderKind::Stripe => {
            let secret_key = config.stripe_secret_key.as_deref().ok_or_else(|| {
                PaymentError::Misconfigured("stripe_secret_key is required".to_string())
            })?;
            stripe::StripeGateway::connect(secret_key).map_err(|err| {
                error!(provider = %kind, error = %err, "payment provider unavailable");
                err
            })
        }
    }
}
