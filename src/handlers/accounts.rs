use axum::{
    extract::State,
    response::{Json, Redirect},
    Form,
};

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::accounts::{AccountStatusResponse, CompleteOnboardingForm, CreateAccountResponse},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/accounts/create",
    summary = "Create payment account",
    description = "Create the caller's payout account at the payment gateway",
    responses(
        (status = 200, description = "Account created", body = CreateAccountResponse),
        (status = 400, description = "Payment account already exists", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Accounts"
)]
pub async fn create_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<CreateAccountResponse>, ServiceError> {
    let created = state.services.accounts.create_account(user.user_id).await?;
    Ok(Json(created))
}

#[utoipa::path(
    get,
    path = "/api/accounts/status",
    summary = "Payment account status",
    responses(
        (status = 200, description = "Account status", body = AccountStatusResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Accounts"
)]
pub async fn account_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AccountStatusResponse>, ServiceError> {
    let status = state.services.accounts.account_status(user.user_id).await?;
    Ok(Json(status))
}

#[utoipa::path(
    post,
    path = "/api/accounts/complete-onboarding",
    summary = "Complete onboarding",
    description = "Finish gateway onboarding and redirect back to the dashboard",
    request_body(content = CompleteOnboardingForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the seller dashboard"),
        (status = 400, description = "Account ID is required", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account belongs to another seller", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Accounts"
)]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Form(form): Form<CompleteOnboardingForm>,
) -> Result<Redirect, ServiceError> {
    state
        .services
        .accounts
        .complete_onboarding(user.user_id, &form.account_id)
        .await?;
    Ok(Redirect::to(&state.config.dashboard_redirect))
}
