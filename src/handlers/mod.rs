pub mod accounts;
pub mod analytics;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::repositories::RecordStores;
use crate::services::{
    accounts::AccountService, analytics::AnalyticsService, notifications::NotificationDispatcher,
    orders::OrderService, payments::PaymentProvider, products::ProductService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub accounts: Arc<AccountService>,
    pub analytics: AnalyticsService,
    pub products: Arc<ProductService>,
    pub auth: Arc<AuthService>,
    pub payment_provider: Arc<dyn PaymentProvider>,
}

impl AppServices {
    pub fn new(
        config: &AppConfig,
        stores: RecordStores,
        payment_provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let analytics = AnalyticsService::new(stores.analytics.clone(), stores.shops.clone());
        let orders = Arc::new(OrderService::new(
            &stores,
            payment_provider.clone(),
            analytics.clone(),
            notifier,
            config.gateway_timeout(),
        ));
        let accounts = Arc::new(AccountService::new(
            stores.profiles.clone(),
            payment_provider.clone(),
        ));
        let products = Arc::new(ProductService::new(stores.shops.clone()));
        let auth = Arc::new(AuthService::new(config.jwt_secret.clone(), config.jwt_ttl()));

        Self {
            orders,
            accounts,
            analytics,
            products,
            auth,
            payment_provider,
        }
    }
}

/// Route table for the `/api` surface.
pub fn api_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/create", post(orders::create_order))
        .route("/confirm", post(orders::confirm_order))
        .route("/list", get(orders::list_orders))
        .route("/:order_id/update", patch(orders::update_order_status));

    let accounts = Router::new()
        .route("/create", post(accounts::create_account))
        .route("/status", get(accounts::account_status))
        .route("/complete-onboarding", post(accounts::complete_onboarding));

    Router::new()
        .nest("/orders", orders)
        .nest("/accounts", accounts)
        .route("/analytics/track", post(analytics::track_event))
        .route(
            "/products/toggle-availability",
            post(products::toggle_availability),
        )
}
