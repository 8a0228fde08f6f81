use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Lifecycle of a payment intent.
///
/// The mock gateway only drives `requires_payment_method`, `processing` and
/// `succeeded`; the remaining states mirror real gateways and are reserved.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
}

/// One attempt to collect a specific amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    /// `pi_mock_{unix_millis}_{random}`; the timestamp allows reconstruction.
    pub id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    /// Capability token the client presents to confirm the intent
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Set when the record was rebuilt from its id after a store miss. Amount
    /// and metadata are placeholders until the caller repopulates them.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reconstructed: bool,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentIntentStatus::Succeeded
    }
}

/// Card data submitted for confirmation. Never persisted.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last4 = self
            .number
            .get(self.number.len().saturating_sub(4)..)
            .unwrap_or("");
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{}", last4))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    pub card: CardDetails,
}

/// A seller's payout account at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentAccount {
    pub id: String,
    pub email: String,
    pub details_submitted: bool,
    pub payouts_enabled: bool,
    pub charges_enabled: bool,
    pub created: DateTime<Utc>,
}

impl PaymentAccount {
    pub fn is_onboarded(&self) -> bool {
        self.details_submitted && self.payouts_enabled && self.charges_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_gateway_spelling() {
        assert_eq!(
            PaymentIntentStatus::RequiresPaymentMethod.to_string(),
            "requires_payment_method"
        );
        assert_eq!(
            serde_json::to_value(PaymentIntentStatus::Succeeded).unwrap(),
            "succeeded"
        );
        assert_eq!(
            "processing".parse::<PaymentIntentStatus>().unwrap(),
            PaymentIntentStatus::Processing
        );
    }

    #[test]
    fn card_debug_masks_number_and_cvc() {
        let card = CardDetails {
            number: "4242424242424242".into(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".into(),
        };
        let rendered = format!("{:?}", card);
        assert!(rendered.contains("****4242"));
        assert!(!rendered.contains("4242424242424242"));
        assert!(rendered.contains("cvc: \"***\""));
    }
}
