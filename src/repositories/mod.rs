//! Record stores.
//!
//! The payment gateway owns its intent and account tables. Shops, products,
//! orders, seller profiles and analytics live behind the repository traits so
//! the services stay independent of the backing store.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{AnalyticsEvent, Order, OrderStatus, Product, SellerProfile, Shop};

pub mod memory;
pub mod payment_accounts;
pub mod payment_intents;
pub mod record_table;

pub use memory::InMemoryStore;
pub use payment_accounts::PaymentAccountStore;
pub use payment_intents::PaymentIntentStore;
pub use record_table::{RecordTable, StoreError, Versioned};

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(id) => ServiceError::NotFound(format!("Record {} not found", id)),
            StoreError::Duplicate(_) | StoreError::VersionConflict { .. } => {
                ServiceError::Conflict(err.to_string())
            }
        }
    }
}

/// Shops and their products.
#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, ServiceError>;

    async fn find_shops_by_owner(&self, owner_id: Uuid) -> Result<Vec<Shop>, ServiceError>;

    /// Looks up a product only if it belongs to `shop_id`.
    async fn find_product(
        &self,
        shop_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, ServiceError>;

    async fn find_product_by_id(&self, product_id: Uuid) -> Result<Option<Product>, ServiceError>;

    async fn set_product_availability(
        &self,
        product_id: Uuid,
        is_available: bool,
    ) -> Result<Product, ServiceError>;

    /// Atomically decrements tracked inventory by one, never below zero.
    /// Returns the new count, or `None` when inventory is untracked.
    async fn decrement_inventory(&self, product_id: Uuid) -> Result<Option<i32>, ServiceError>;
}

/// Fields a seller may change on an order.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the tracking number.
    pub tracking_number: Option<Option<String>>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: Order) -> Result<Order, ServiceError>;

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError>;

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, ServiceError>;

    /// Moves a `pending` order to `paid`. Returns `None` when the order was
    /// not pending, so only one caller observes the transition.
    async fn mark_paid_if_pending(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError>;

    /// Applies `update`, stamps `updated_at`, and returns the previous status
    /// together with the stored order.
    async fn update(
        &self,
        order_id: Uuid,
        update: OrderUpdate,
    ) -> Result<(OrderStatus, Order), ServiceError>;

    /// Newest first, optionally filtered by status. `page` is 1-based.
    async fn find_by_shops(
        &self,
        shop_ids: &[Uuid],
        status: Option<OrderStatus>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Order>, u64), ServiceError>;

    /// `(status, amount_cents)` for every order of the given shops.
    async fn status_amounts(
        &self,
        shop_ids: &[Uuid],
    ) -> Result<Vec<(OrderStatus, i64)>, ServiceError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<SellerProfile>, ServiceError>;

    /// Links a payment account to the profile. Fails with `AlreadyExists` if
    /// one is already linked.
    async fn attach_payment_account(
        &self,
        user_id: Uuid,
        account_id: &str,
        onboarded: bool,
    ) -> Result<SellerProfile, ServiceError>;

    async fn set_payment_onboarded(
        &self,
        user_id: Uuid,
        onboarded: bool,
    ) -> Result<SellerProfile, ServiceError>;
}

#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn append(&self, event: AnalyticsEvent) -> Result<(), ServiceError>;

    async fn events_for_shop(&self, shop_id: Uuid) -> Result<Vec<AnalyticsEvent>, ServiceError>;
}

/// The repositories the services are wired with.
#[derive(Clone)]
pub struct RecordStores {
    pub shops: Arc<dyn ShopRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
}

impl RecordStores {
    /// All four repositories backed by one in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            shops: store.clone(),
            orders: store.clone(),
            profiles: store.clone(),
            analytics: store,
        }
    }
}

