use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{PaymentAccount, SellerProfile};
use crate::repositories::ProfileRepository;
use crate::services::payments::PaymentProvider;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAccountResponse {
    pub success: bool,
    pub account_id: String,
    pub onboarding_link: String,
    pub details_submitted: bool,
    pub payouts_enabled: bool,
    pub charges_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountStatusResponse {
    pub has_account: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub details_submitted: bool,
    pub payouts_enabled: bool,
    pub charges_enabled: bool,
    /// Present until the seller has submitted their details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CompleteOnboardingForm {
    #[serde(default)]
    pub account_id: String,
}

/// Seller payment-account lifecycle.
#[derive(Clone)]
pub struct AccountService {
    profiles: Arc<dyn ProfileRepository>,
    provider: Arc<dyn PaymentProvider>,
}

impl AccountService {
    pub fn new(profiles: Arc<dyn ProfileRepository>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { profiles, provider }
    }

    async fn profile(&self, user_id: Uuid) -> Result<SellerProfile, ServiceError> {
        self.profiles
            .find_profile(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Seller profile not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn create_account(&self, user_id: Uuid) -> Result<CreateAccountResponse, ServiceError> {
        let profile = self.profile(user_id).await?;
        if profile.payment_account_id.is_some() {
            return Err(ServiceError::AlreadyExists(
                "Payment account already exists".to_string(),
            ));
        }

        let account = self.provider.create_account(&profile.email).await?;
        self.profiles
            .attach_payment_account(user_id, &account.id, account.is_onboarded())
            .await?;
        info!(account_id = %account.id, "payment account linked to seller");

        Ok(CreateAccountResponse {
            success: true,
            onboarding_link: self.provider.generate_onboarding_link(&account.id),
            account_id: account.id,
            details_submitted: account.details_submitted,
            payouts_enabled: account.payouts_enabled,
            charges_enabled: account.charges_enabled,
        })
    }

    /// Reads the gateway account and mirrors its onboarding state onto the
    /// seller profile.
    #[instrument(skip(self))]
    pub async fn account_status(&self, user_id: Uuid) -> Result<AccountStatusResponse, ServiceError> {
        let profile = self.profile(user_id).await?;
        let account_id = match profile.payment_account_id {
            Some(id) => id,
            None => {
                return Ok(AccountStatusResponse {
                    has_account: false,
                    account_id: None,
                    details_submitted: false,
                    payouts_enabled: false,
                    charges_enabled: false,
                    onboarding_link: None,
                })
            }
        };

        let account = self.provider.retrieve_account(&account_id).await?;
        if account.is_onboarded() != profile.payment_onboarded {
            self.profiles
                .set_payment_onboarded(user_id, account.is_onboarded())
                .await?;
        }

        Ok(self.status_of(&account))
    }

    fn status_of(&self, account: &PaymentAccount) -> AccountStatusResponse {
        AccountStatusResponse {
            has_account: true,
            account_id: Some(account.id.clone()),
            details_submitted: account.details_submitted,
            payouts_enabled: account.payouts_enabled,
            charges_enabled: account.charges_enabled,
            onboarding_link: (!account.details_submitted)
                .then(|| self.provider.generate_onboarding_link(&account.id)),
        }
    }

    /// Finishes onboarding for an account the caller owns.
    #[instrument(skip(self))]
    pub async fn complete_onboarding(
        &self,
        user_id: Uuid,
        account_id: &str,
    ) -> Result<AccountStatusResponse, ServiceError> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "Account ID is required".to_string(),
            ));
        }

        let profile = self.profile(user_id).await?;
        if profile.payment_account_id.as_deref() != Some(account_id) {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let account = self.provider.complete_account_onboarding(account_id).await?;
        self.profiles
            .set_payment_onboarded(user_id, account.is_onboarded())
            .await?;
        info!(%account_id, "seller onboarding completed");

        Ok(self.status_of(&account))
    }
}
