use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::orders::{
        ConfirmOrderOutcome, ConfirmOrderRequest, ConfirmedOrder, CreateOrderRequest,
        CreateOrderResponse, IncompletePayment, ListOrdersQuery, OrderListResponse,
        PaymentFailure, UpdateOrderResponse, UpdateOrderStatusRequest,
    },
    AppState,
};

impl IntoResponse for ConfirmOrderOutcome {
    fn into_response(self) -> Response {
        match self {
            ConfirmOrderOutcome::Confirmed(body) => (StatusCode::OK, Json(body)).into_response(),
            ConfirmOrderOutcome::Declined(body) => {
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ConfirmOrderOutcome::Incomplete(body) => (StatusCode::OK, Json(body)).into_response(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/orders/create",
    summary = "Create order",
    description = "Create a pending order for a shop's product and the payment intent that will settle it",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = CreateOrderResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Missing fields, price mismatch or product unavailable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 504, description = "Payment gateway timed out", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ServiceError> {
    let created = state.services.orders.create_order(request).await?;
    Ok(Json(created))
}

#[utoipa::path(
    post,
    path = "/api/orders/confirm",
    summary = "Confirm order payment",
    description = "Confirm the payment intent behind an order with card details. Declines are returned as a structured body, not as an error.",
    request_body = ConfirmOrderRequest,
    responses(
        (status = 200, description = "Payment confirmed", body = ConfirmedOrder),
        (status = 200, description = "Payment not yet complete", body = IncompletePayment),
        (status = 400, description = "Payment declined or timed out", body = PaymentFailure),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Confirmation already in progress", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    Json(request): Json<ConfirmOrderRequest>,
) -> Result<ConfirmOrderOutcome, ServiceError> {
    state.services.orders.confirm_order(request).await
}

#[utoipa::path(
    patch,
    path = "/api/orders/{order_id}/update",
    summary = "Update order status",
    description = "Set the status and/or tracking number of an order in a shop the caller owns",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = UpdateOrderResponse),
        (status = 400, description = "Invalid status", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller does not own the shop", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<UpdateOrderResponse>, ServiceError> {
    let updated = state
        .services
        .orders
        .update_order_status(user.user_id, order_id, request)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/api/orders/list",
    summary = "List orders",
    description = "Paginated orders across the caller's shops, newest first, with a revenue summary",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved", body = OrderListResponse),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderListResponse>, ServiceError> {
    let listing = state
        .services
        .orders
        .list_orders(user.user_id, query)
        .await?;
    Ok(Json(listing))
}
