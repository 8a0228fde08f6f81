use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Singleshop API",
        version = "0.1.0",
        description = r#"
# Singleshop API

Order lifecycle backend for single product shops.

- **Orders**: buyers create an order for a shop's product and confirm it with card details
- **Accounts**: sellers open a payout account and complete onboarding
- **Products**: sellers toggle product availability
- **Analytics**: storefront events for shop and product views

## Authentication

Seller endpoints require a bearer token in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

Buyer endpoints (order create and confirm, analytics tracking) are public.

## Payment outcomes

`POST /api/orders/confirm` reports declines as a structured body with
`code` and `retriable` fields rather than as an error.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order creation, payment confirmation and fulfilment"),
        (name = "Accounts", description = "Seller payout accounts"),
        (name = "Products", description = "Product availability"),
        (name = "Analytics", description = "Storefront event tracking"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::confirm_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::list_orders,
        crate::handlers::accounts::create_account,
        crate::handlers::accounts::account_status,
        crate::handlers::accounts::complete_onboarding,
        crate::handlers::products::toggle_availability,
        crate::handlers::analytics::track_event,
        crate::handlers::health::liveness_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,

            // Domain records
            crate::models::Order,
            crate::models::OrderStatus,
            crate::models::ShippingAddress,
            crate::models::PaymentIntent,
            crate::models::PaymentIntentStatus,
            crate::models::PaymentMethod,
            crate::models::CardDetails,
            crate::models::Product,
            crate::models::AnalyticsEventType,

            // Orders
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderResponse,
            crate::services::orders::PaymentIntentSummary,
            crate::services::orders::ConfirmOrderRequest,
            crate::services::orders::ConfirmedOrder,
            crate::services::orders::PaymentIntentView,
            crate::services::orders::OrderDetails,
            crate::services::orders::PaymentFailure,
            crate::services::orders::IncompletePayment,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::services::orders::UpdateOrderResponse,
            crate::services::orders::Pagination,
            crate::services::orders::OrderSummary,
            crate::services::orders::OrderListResponse,

            // Accounts
            crate::services::accounts::CreateAccountResponse,
            crate::services::accounts::AccountStatusResponse,
            crate::services::accounts::CompleteOnboardingForm,

            // Products and analytics
            crate::services::products::ToggleAvailabilityRequest,
            crate::services::products::ToggleAvailabilityResponse,
            crate::services::analytics::TrackEventRequest,
            crate::services::analytics::TrackEventResponse,

            crate::handlers::health::HealthResponse,
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document as JSON.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
