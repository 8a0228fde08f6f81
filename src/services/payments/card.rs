//! Structural card checks and the test-card outcome table.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::CardDetails;

/// Outcome forced by a test card, bypassing the random policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardOutcome {
    AlwaysSucceeds,
    AlwaysFails,
}

/// Validates card shape against the current calendar year.
pub fn validate_card(card: &CardDetails) -> bool {
    validate_card_at(card, Utc::now().year())
}

/// Validates card shape only: number length 13..=19, month 1..=12, expiry
/// year not before `current_year`, CVC length 3..=4. Says nothing about
/// whether a charge would be approved.
pub fn validate_card_at(card: &CardDetails, current_year: i32) -> bool {
    let number_ok = (13..=19).contains(&card.number.len());
    let month_ok = (1..=12).contains(&card.exp_month);
    let year_ok = card.exp_year >= current_year;
    let cvc_ok = (3..=4).contains(&card.cvc.len());

    number_ok && month_ok && year_ok && cvc_ok
}

/// Card numbers with a forced outcome.
///
/// | number              | outcome          |
/// |---------------------|------------------|
/// | 4242424242424242    | always succeeds  |
/// | 5555555555554444    | always succeeds  |
/// | 4000000000000002    | always declined  |
/// | 4000000000009995    | always declined  |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCardTable {
    cards: HashMap<String, CardOutcome>,
}

impl Default for TestCardTable {
    fn default() -> Self {
        Self::empty()
            .with_card("4242424242424242", CardOutcome::AlwaysSucceeds)
            .with_card("5555555555554444", CardOutcome::AlwaysSucceeds)
            .with_card("4000000000000002", CardOutcome::AlwaysFails)
            .with_card("4000000000009995", CardOutcome::AlwaysFails)
    }
}

impl TestCardTable {
    pub fn empty() -> Self {
        Self {
            cards: HashMap::new(),
        }
    }

    pub fn with_card(mut self, number: impl Into<String>, outcome: CardOutcome) -> Self {
        self.cards.insert(number.into(), outcome);
        self
    }

    pub fn outcome_for(&self, number: &str) -> Option<CardOutcome> {
        self.cards.get(number).copied()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl From<HashMap<String, CardOutcome>> for TestCardTable {
    fn from(cards: HashMap<String, CardOutcome>) -> Self {
        Self { cards }
    }
}
