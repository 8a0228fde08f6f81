use axum::{extract::State, response::Json};

use crate::{
    errors::ServiceError,
    services::analytics::{TrackEventRequest, TrackEventResponse},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/analytics/track",
    summary = "Track storefront event",
    description = "Record a public storefront event such as a shop or product view",
    request_body = TrackEventRequest,
    responses(
        (status = 200, description = "Event recorded", body = TrackEventResponse),
        (status = 400, description = "Invalid event type", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shop not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Analytics"
)]
pub async fn track_event(
    State(state): State<AppState>,
    Json(request): Json<TrackEventRequest>,
) -> Result<Json<TrackEventResponse>, ServiceError> {
    Ok(Json(state.services.analytics.track(request).await?))
}
