use axum::{extract::State, response::Json};

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::products::{ToggleAvailabilityRequest, ToggleAvailabilityResponse},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/products/toggle-availability",
    summary = "Toggle product availability",
    request_body = ToggleAvailabilityRequest,
    responses(
        (status = 200, description = "Availability updated", body = ToggleAvailabilityResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller does not own the product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn toggle_availability(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ToggleAvailabilityRequest>,
) -> Result<Json<ToggleAvailabilityResponse>, ServiceError> {
    let toggled = state
        .services
        .products
        .toggle_availability(user.user_id, request)
        .await?;
    Ok(Json(toggled))
}
