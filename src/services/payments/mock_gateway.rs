use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::card::{self, CardOutcome, TestCardTable};
use super::{
    CreatePaymentIntent, PaymentError, PaymentProvider, CARD_DECLINED_MESSAGE,
    PAYMENT_FAILED_MESSAGE,
};
use crate::common::{random_suffix, timestamped_id, DecisionSource, ThreadRngSource};
use crate::config::AppConfig;
use crate::models::{CardDetails, PaymentAccount, PaymentIntent, PaymentIntentStatus, PaymentMethod};
use crate::repositories::payment_intents::INTENT_ID_PREFIX;
use crate::repositories::{PaymentAccountStore, PaymentIntentStore, StoreError};

const DEFAULT_CURRENCY: &str = "usd";
const ACCOUNT_ID_PREFIX: &str = "acct_mock";

#[derive(Debug, Clone)]
pub struct MockGatewaySettings {
    /// Share of valid, non-test cards that are declined
    pub decline_rate: f64,
    /// Simulated network latency, applied before any state is touched
    pub latency: Duration,
    pub receipt_base_url: String,
    pub onboarding_base_path: String,
}

impl Default for MockGatewaySettings {
    fn default() -> Self {
        Self {
            decline_rate: 0.1,
            latency: Duration::ZERO,
            receipt_base_url: "https://mock-receipts.singleshop.com/receipt".to_string(),
            onboarding_base_path: "/mock-onboarding".to_string(),
        }
    }
}

impl From<&AppConfig> for MockGatewaySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            decline_rate: config.mock_decline_rate,
            latency: config.mock_gateway_latency(),
            receipt_base_url: config.receipt_base_url.clone(),
            onboarding_base_path: config.onboarding_base_path.clone(),
        }
    }
}

/// Why a charge was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Decline(&'static str),
}

/// In-process stand-in for a card gateway.
///
/// Intents move `requires_payment_method -> processing -> succeeded`, or back
/// to `requires_payment_method` on a decline. Every status change is a
/// versioned compare-and-swap, so two confirmations racing on one intent
/// cannot both charge it.
#[derive(Debug)]
pub struct MockPaymentGateway {
    intents: Arc<PaymentIntentStore>,
    accounts: Arc<PaymentAccountStore>,
    test_cards: TestCardTable,
    decisions: Arc<dyn DecisionSource>,
    settings: MockGatewaySettings,
}

impl MockPaymentGateway {
    pub fn new(settings: MockGatewaySettings) -> Self {
        Self {
            intents: Arc::new(PaymentIntentStore::new()),
            accounts: Arc::new(PaymentAccountStore::new()),
            test_cards: TestCardTable::default(),
            decisions: Arc::new(ThreadRngSource),
            settings,
        }
    }

    pub fn with_test_cards(mut self, test_cards: TestCardTable) -> Self {
        self.test_cards = test_cards;
        self
    }

    pub fn with_decision_source(mut self, decisions: Arc<dyn DecisionSource>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn intent_store(&self) -> &Arc<PaymentIntentStore> {
        &self.intents
    }

    /// Test cards force their outcome; everything else goes through the
    /// random policy.
    fn decide(&self, card: &CardDetails) -> Decision {
        match self.test_cards.outcome_for(&card.number) {
            Some(CardOutcome::AlwaysSucceeds) => Decision::Approve,
            Some(CardOutcome::AlwaysFails) => Decision::Decline(CARD_DECLINED_MESSAGE),
            None if self.decisions.passes(self.settings.decline_rate) => Decision::Approve,
            None => Decision::Decline(PAYMENT_FAILED_MESSAGE),
        }
    }

    async fn simulate_latency(&self) {
        if !self.settings.latency.is_zero() {
            tokio::time::sleep(self.settings.latency).await;
        }
    }

    fn store_error(intent_id: &str, err: StoreError) -> PaymentError {
        match err {
            StoreError::VersionConflict { .. } => {
                PaymentError::ConfirmationInProgress(intent_id.to_string())
            }
            StoreError::Missing(_) => PaymentError::IntentNotFound(intent_id.to_string()),
            other => PaymentError::Store(other),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    #[instrument(skip(self, params), fields(amount = params.amount))]
    async fn create_payment_intent(
        &self,
        params: CreatePaymentIntent,
    ) -> Result<PaymentIntent, PaymentError> {
        if params.amount <= 0 {
            return Err(PaymentError::InvalidAmount(params.amount));
        }
        self.simulate_latency().await;

        let id = timestamped_id(INTENT_ID_PREFIX);
        let currency = if params.currency.trim().is_empty() {
            DEFAULT_CURRENCY.to_string()
        } else {
            params.currency.to_lowercase()
        };

        let intent = PaymentIntent {
            client_secret: format!("{}_secret_{}", id, random_suffix(16)),
            id,
            amount: params.amount,
            currency,
            status: PaymentIntentStatus::RequiresPaymentMethod,
            customer_email: params.customer_email,
            created: Utc::now(),
            metadata: params.metadata,
            reconstructed: false,
        };

        let stored = self.intents.create(intent)?;
        info!(payment_intent_id = %stored.record.id, "payment intent created");
        Ok(stored.record)
    }

    #[instrument(skip(self, payment_method), fields(payment_intent_id = %intent_id))]
    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &PaymentMethod,
    ) -> Result<PaymentIntent, PaymentError> {
        self.simulate_latency().await;

        let current = self
            .intents
            .retrieve(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;

        match current.record.status {
            PaymentIntentStatus::Succeeded => {
                info!("payment intent already succeeded; returning it without a new charge");
                return Ok(current.record);
            }
            PaymentIntentStatus::Processing => {
                return Err(PaymentError::ConfirmationInProgress(intent_id.to_string()));
            }
            _ => {}
        }

        if !card::validate_card(&payment_method.card) {
            if current.record.status != PaymentIntentStatus::RequiresPaymentMethod {
                self.intents
                    .transition(
                        intent_id,
                        current.version,
                        PaymentIntentStatus::RequiresPaymentMethod,
                    )
                    .map_err(|err| Self::store_error(intent_id, err))?;
            }
            debug!("card failed structural validation");
            return Err(PaymentError::CardDeclined(CARD_DECLINED_MESSAGE.to_string()));
        }

        let processing = self
            .intents
            .transition(intent_id, current.version, PaymentIntentStatus::Processing)
            .map_err(|err| Self::store_error(intent_id, err))?;

        match self.decide(&payment_method.card) {
            Decision::Approve => {
                let done = self
                    .intents
                    .transition(intent_id, processing.version, PaymentIntentStatus::Succeeded)
                    .map_err(|err| Self::store_error(intent_id, err))?;
                info!("payment intent succeeded");
                Ok(done.record)
            }
            Decision::Decline(reason) => {
                self.intents
                    .transition(
                        intent_id,
                        processing.version,
                        PaymentIntentStatus::RequiresPaymentMethod,
                    )
                    .map_err(|err| Self::store_error(intent_id, err))?;
                warn!(reason, "payment intent declined");
                Err(PaymentError::CardDeclined(reason.to_string()))
            }
        }
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.intents
            .retrieve(intent_id)
            .map(|row| row.record)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))
    }

    fn generate_receipt_url(&self, intent: &PaymentIntent) -> String {
        format!(
            "{}/{}",
            self.settings.receipt_base_url.trim_end_matches('/'),
            intent.id
        )
    }

    #[instrument(skip(self))]
    async fn create_account(&self, email: &str) -> Result<PaymentAccount, PaymentError> {
        self.simulate_latency().await;

        let account = PaymentAccount {
            id: timestamped_id(ACCOUNT_ID_PREFIX),
            email: email.to_string(),
            details_submitted: false,
            payouts_enabled: false,
            charges_enabled: false,
            created: Utc::now(),
        };
        let stored = self.accounts.create(account)?;
        info!(account_id = %stored.record.id, "payment account created");
        Ok(stored.record)
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<PaymentAccount, PaymentError> {
        self.accounts
            .find(account_id)
            .map(|row| row.record)
            .ok_or_else(|| PaymentError::AccountNotFound(account_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn complete_account_onboarding(
        &self,
        account_id: &str,
    ) -> Result<PaymentAccount, PaymentError> {
        let row = self
            .accounts
            .complete_onboarding(account_id)
            .map_err(|err| match err {
                StoreError::Missing(_) => PaymentError::AccountNotFound(account_id.to_string()),
                other => PaymentError::Store(other),
            })?;
        info!("payment account onboarding completed");
        Ok(row.record)
    }

    fn generate_onboarding_link(&self, account_id: &str) -> String {
        format!(
            "{}/{}",
            self.settings.onboarding_base_path.trim_end_matches('/'),
            account_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FixedSource;
    use assert_matches::assert_matches;

    fn gateway(decisions: FixedSource) -> MockPaymentGateway {
        MockPaymentGateway::new(MockGatewaySettings::default())
            .with_decision_source(Arc::new(decisions))
    }

    fn method(number: &str) -> PaymentMethod {
        PaymentMethod {
            card: CardDetails {
                number: number.into(),
                exp_month: 12,
                exp_year: 2099,
                cvc: "123".into(),
            },
        }
    }

    async fn intent(gw: &MockPaymentGateway) -> PaymentIntent {
        gw.create_payment_intent(CreatePaymentIntent {
            amount: 1000,
            currency: "USD".into(),
            customer_email: Some("buyer@example.com".into()),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_non_positive_amounts() {
        let gw = gateway(FixedSource::always_pass());
        for amount in [0, -1, i64::MIN] {
            let result = gw
                .create_payment_intent(CreatePaymentIntent {
                    amount,
                    ..Default::default()
                })
                .await;
            assert_matches!(result, Err(PaymentError::InvalidAmount(a)) if a == amount);
        }
        assert!(gw.intent_store().is_empty());
    }

    #[tokio::test]
    async fn create_produces_self_describing_ids() {
        let gw = gateway(FixedSource::always_pass());
        let created = intent(&gw).await;

        assert!(created.id.starts_with("pi_mock_"));
        assert!(created.client_secret.starts_with(&format!("{}_secret_", created.id)));
        assert_eq!(created.currency, "usd");
        assert_eq!(created.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert!(PaymentIntentStore::reconstruct_from_id(&created.id).is_some());
    }

    #[tokio::test]
    async fn success_test_card_ignores_random_source() {
        let gw = gateway(FixedSource::always_fail());
        let created = intent(&gw).await;

        let confirmed = gw
            .confirm_payment_intent(&created.id, &method("4242424242424242"))
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentIntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn decline_test_card_ignores_random_source() {
        let gw = gateway(FixedSource::always_pass());
        let created = intent(&gw).await;

        let result = gw
            .confirm_payment_intent(&created.id, &method("4000000000000002"))
            .await;
        assert_matches!(result, Err(PaymentError::CardDeclined(msg)) if msg == CARD_DECLINED_MESSAGE);

        let after = gw.retrieve_payment_intent(&created.id).await.unwrap();
        assert_eq!(after.status, PaymentIntentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn other_cards_follow_the_decision_source() {
        let approving = gateway(FixedSource::always_pass());
        let created = intent(&approving).await;
        let ok = approving
            .confirm_payment_intent(&created.id, &method("4111111111111111"))
            .await
            .unwrap();
        assert!(ok.is_succeeded());

        let declining = gateway(FixedSource::always_fail());
        let created = intent(&declining).await;
        let result = declining
            .confirm_payment_intent(&created.id, &method("4111111111111111"))
            .await;
        assert_matches!(result, Err(PaymentError::CardDeclined(msg)) if msg == PAYMENT_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn overridden_table_drops_default_cards() {
        let gw = gateway(FixedSource::always_fail())
            .with_test_cards(TestCardTable::empty().with_card("4111111111111111", CardOutcome::AlwaysSucceeds));
        let created = intent(&gw).await;

        // 4242... is no longer special, so the failing source decides.
        assert!(gw
            .confirm_payment_intent(&created.id, &method("4242424242424242"))
            .await
            .is_err());
        assert!(gw
            .confirm_payment_intent(&created.id, &method("4111111111111111"))
            .await
            .unwrap()
            .is_succeeded());
    }

    #[tokio::test]
    async fn malformed_card_is_declined_and_retriable() {
        let gw = gateway(FixedSource::always_pass());
        let created = intent(&gw).await;

        let mut bad = method("4242424242424242");
        bad.card.cvc = "1".into();
        assert_matches!(
            gw.confirm_payment_intent(&created.id, &bad).await,
            Err(PaymentError::CardDeclined(_))
        );

        let retried = gw
            .confirm_payment_intent(&created.id, &method("4242424242424242"))
            .await
            .unwrap();
        assert!(retried.is_succeeded());
    }

    #[tokio::test]
    async fn reconfirming_a_succeeded_intent_is_idempotent() {
        let gw = gateway(FixedSource::always_pass());
        let created = intent(&gw).await;

        let first = gw
            .confirm_payment_intent(&created.id, &method("4242424242424242"))
            .await
            .unwrap();
        let version_after_first = gw.intent_store().find(&created.id).unwrap().version;

        // Even a declining card cannot undo or re-run a finished charge.
        let second = gw
            .confirm_payment_intent(&created.id, &method("4000000000000002"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            gw.intent_store().find(&created.id).unwrap().version,
            version_after_first
        );
    }

    #[tokio::test]
    async fn retrieve_reconstructs_unknown_well_formed_ids() {
        let gw = gateway(FixedSource::always_pass());

        let rebuilt = gw
            .retrieve_payment_intent("pi_mock_1700000000000_k3j4h5g6f")
            .await
            .unwrap();
        assert_eq!(rebuilt.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(rebuilt.amount, 0);
        assert!(rebuilt.reconstructed);

        assert_matches!(
            gw.retrieve_payment_intent("not-an-intent").await,
            Err(PaymentError::IntentNotFound(_))
        );
    }

    #[tokio::test]
    async fn account_onboarding_is_single_step_and_idempotent() {
        let gw = gateway(FixedSource::always_pass());
        let account = gw.create_account("seller@example.com").await.unwrap();
        assert!(account.id.starts_with("acct_mock_"));
        assert!(!account.details_submitted && !account.payouts_enabled && !account.charges_enabled);
        assert_eq!(
            gw.generate_onboarding_link(&account.id),
            format!("/mock-onboarding/{}", account.id)
        );

        let done = gw.complete_account_onboarding(&account.id).await.unwrap();
        assert!(done.is_onboarded());
        let again = gw.complete_account_onboarding(&account.id).await.unwrap();
        assert_eq!(done, again);

        assert_matches!(
            gw.retrieve_account("acct_mock_missing").await,
            Err(PaymentError::AccountNotFound(_))
        );
    }

    #[test]
    fn receipt_url_is_derived_from_intent_id() {
        let gw = gateway(FixedSource::always_pass());
        let rebuilt = PaymentIntentStore::reconstruct_from_id("pi_mock_1_abc").unwrap();
        assert_eq!(
            gw.generate_receipt_url(&rebuilt),
            "https://mock-receipts.singleshop.com/receipt/pi_mock_1_abc"
        );
    }
}
