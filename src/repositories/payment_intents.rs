use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

use super::record_table::{RecordTable, StoreError, Versioned};
use crate::models::{PaymentIntent, PaymentIntentStatus};

pub const INTENT_ID_PREFIX: &str = "pi_mock";

static INTENT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^pi_mock_(\d+)_(.+)$").expect("intent id pattern is a valid regex")
});

/// Keyed storage for payment intents owned by the mock gateway.
#[derive(Debug, Default)]
pub struct PaymentIntentStore {
    table: RecordTable<PaymentIntent>,
}

impl PaymentIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, intent: PaymentIntent) -> Result<Versioned<PaymentIntent>, StoreError> {
        self.table.insert(intent.id.clone(), intent)
    }

    /// Primary lookup. Never reconstructs.
    pub fn find(&self, id: &str) -> Option<Versioned<PaymentIntent>> {
        self.table.get(id)
    }

    /// Primary lookup, falling back to [`Self::reconstruct_from_id`] on a miss.
    ///
    /// A rebuilt intent is stored so later transitions are versioned like any
    /// other row. It carries `amount == 0` and empty metadata.
    pub fn retrieve(&self, id: &str) -> Option<Versioned<PaymentIntent>> {
        if let Some(found) = self.find(id) {
            return Some(found);
        }

        let rebuilt = Self::reconstruct_from_id(id)?;
        warn!(
            payment_intent_id = %id,
            "payment intent missing from store; using reconstructed record with zero amount"
        );
        Some(self.table.get_or_insert_with(id, || rebuilt))
    }

    /// Rebuilds a minimal `requires_payment_method` intent from a
    /// `pi_mock_{unix_millis}_{random}` id. Returns `None` for other ids.
    pub fn reconstruct_from_id(id: &str) -> Option<PaymentIntent> {
        let captures = INTENT_ID_PATTERN.captures(id)?;
        let random_part = captures.get(2)?.as_str();
        let created = captures
            .get(1)
            .and_then(|ts| ts.as_str().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(Utc::now);

        Some(PaymentIntent {
            id: id.to_string(),
            amount: 0,
            currency: "usd".to_string(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            client_secret: format!("{}_secret_{}", id, random_part),
            customer_email: None,
            created,
            metadata: HashMap::new(),
            reconstructed: true,
        })
    }

    /// Sets `status` if the row is still at `expected_version`.
    pub fn transition(
        &self,
        id: &str,
        expected_version: u64,
        status: PaymentIntentStatus,
    ) -> Result<Versioned<PaymentIntent>, StoreError> {
        let current = self
            .table
            .get(id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;
        let mut next = current.record;
        next.status = status;
        self.table.compare_and_swap(id, expected_version, next)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
