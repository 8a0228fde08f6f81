use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record_table::{RecordTable, StoreError};
use super::{AnalyticsRepository, OrderRepository, OrderUpdate, ProfileRepository, ShopRepository};
use crate::errors::ServiceError;
use crate::models::{AnalyticsEvent, Order, OrderStatus, Product, SellerProfile, Shop};

/// Process-local implementation of every record-store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    shops: RecordTable<Shop>,
    products: RecordTable<Product>,
    orders: RecordTable<Order>,
    orders_by_intent: DashMap<String, Uuid>,
    profiles: RecordTable<SellerProfile>,
    analytics: RwLock<Vec<AnalyticsEvent>>,
}

/// Identifiers created by [`InMemoryStore::seed_demo`].
#[derive(Debug, Clone)]
pub struct DemoSeed {
    pub seller_id: Uuid,
    pub seller_email: String,
    pub shop_id: Uuid,
    pub product_id: Uuid,
}

fn not_found(what: &str) -> impl Fn(StoreError) -> ServiceError + '_ {
    move |err| match err {
        StoreError::Missing(_) => ServiceError::NotFound(format!("{} not found", what)),
        other => other.into(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_shop(&self, shop: Shop) -> Result<(), ServiceError> {
        self.shops.insert(shop.id.to_string(), shop)?;
        Ok(())
    }

    pub fn insert_product(&self, product: Product) -> Result<(), ServiceError> {
        self.products.insert(product.id.to_string(), product)?;
        Ok(())
    }

    pub fn insert_profile(&self, profile: SellerProfile) -> Result<(), ServiceError> {
        self.profiles.insert(profile.user_id.to_string(), profile)?;
        Ok(())
    }

    /// One seller with one shop selling a $10.00 product with five units.
    pub fn seed_demo(&self) -> Result<DemoSeed, ServiceError> {
        let now = Utc::now();
        let seed = DemoSeed {
            seller_id: Uuid::new_v4(),
            seller_email: "seller@singleshop.dev".to_string(),
            shop_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
        };

        self.insert_profile(SellerProfile {
            user_id: seed.seller_id,
            email: seed.seller_email.clone(),
            payment_account_id: None,
            payment_onboarded: false,
        })?;
        self.insert_shop(Shop {
            id: seed.shop_id,
            owner_id: seed.seller_id,
            username: "demo".to_string(),
            title: "Demo Shop".to_string(),
            created_at: now,
        })?;
        self.insert_product(Product {
            id: seed.product_id,
            shop_id: seed.shop_id,
            name: "Demo Tee".to_string(),
            description: Some("A single, very good t-shirt".to_string()),
            price_cents: 1000,
            currency: "USD".to_string(),
            is_available: true,
            inventory_count: Some(5),
            image_urls: Vec::new(),
            created_at: now,
            updated_at: now,
        })?;

        Ok(seed)
    }
}

#[async_trait]
impl ShopRepository for InMemoryStore {
    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, ServiceError> {
        Ok(self.shops.get(&shop_id.to_string()).map(|row| row.record))
    }

    async fn find_shops_by_owner(&self, owner_id: Uuid) -> Result<Vec<Shop>, ServiceError> {
        Ok(self
            .shops
            .values()
            .into_iter()
            .filter(|shop| shop.owner_id == owner_id)
            .collect())
    }

    async fn find_product(
        &self,
        shop_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, ServiceError> {
        Ok(self
            .products
            .get(&product_id.to_string())
            .map(|row| row.record)
            .filter(|product| product.shop_id == shop_id))
    }

    async fn find_product_by_id(&self, product_id: Uuid) -> Result<Option<Product>, ServiceError> {
        Ok(self.products.get(&product_id.to_string()).map(|row| row.record))
    }

    async fn set_product_availability(
        &self,
        product_id: Uuid,
        is_available: bool,
    ) -> Result<Product, ServiceError> {
        let row = self
            .products
            .update(&product_id.to_string(), |product| {
                product.is_available = is_available;
                product.updated_at = Utc::now();
                true
            })
            .map_err(not_found("Product"))?;
        Ok(row.record)
    }

    async fn decrement_inventory(&self, product_id: Uuid) -> Result<Option<i32>, ServiceError> {
        let row = self
            .products
            .update(&product_id.to_string(), |product| match product.inventory_count {
                Some(count) if count > 0 => {
                    product.inventory_count = Some(count - 1);
                    product.updated_at = Utc::now();
                    true
                }
                _ => false,
            })
            .map_err(not_found("Product"))?;
        Ok(row.record.inventory_count)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: Order) -> Result<Order, ServiceError> {
        match self.orders_by_intent.entry(order.payment_intent_id.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "An order already references payment intent {}",
                order.payment_intent_id
            ))),
            Entry::Vacant(slot) => {
                let row = self.orders.insert(order.id.to_string(), order)?;
                slot.insert(row.record.id);
                Ok(row.record)
            }
        }
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.get(&order_id.to_string()).map(|row| row.record))
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, ServiceError> {
        let order_id = match self.orders_by_intent.get(payment_intent_id) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self.orders.get(&order_id.to_string()).map(|row| row.record))
    }

    async fn mark_paid_if_pending(&self, order_id: Uuid) -> Result<Option<Order>, ServiceError> {
        let mut transitioned = false;
        let row = self
            .orders
            .update(&order_id.to_string(), |order| {
                if order.status != OrderStatus::Pending {
                    return false;
                }
                order.status = OrderStatus::Paid;
                order.updated_at = Utc::now();
                transitioned = true;
                true
            })
            .map_err(not_found("Order"))?;
        Ok(transitioned.then_some(row.record))
    }

    async fn update(
        &self,
        order_id: Uuid,
        update: OrderUpdate,
    ) -> Result<(OrderStatus, Order), ServiceError> {
        let mut previous = None;
        let row = self
            .orders
            .update(&order_id.to_string(), |order| {
                previous = Some(order.status);
                if let Some(status) = update.status {
                    order.status = status;
                }
                if let Some(tracking_number) = update.tracking_number {
                    order.tracking_number = tracking_number;
                }
                order.updated_at = Utc::now();
                true
            })
            .map_err(not_found("Order"))?;
        let previous = previous.unwrap_or(row.record.status);
        Ok((previous, row.record))
    }

    async fn find_by_shops(
        &self,
        shop_ids: &[Uuid],
        status: Option<OrderStatus>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Order>, u64), ServiceError> {
        let mut matching: Vec<Order> = self
            .orders
            .values()
            .into_iter()
            .filter(|order| shop_ids.contains(&order.shop_id))
            .filter(|order| status.map_or(true, |wanted| order.status == wanted))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let orders = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .collect();

        Ok((orders, total))
    }

    async fn status_amounts(
        &self,
        shop_ids: &[Uuid],
    ) -> Result<Vec<(OrderStatus, i64)>, ServiceError> {
        Ok(self
            .orders
            .values()
            .into_iter()
            .filter(|order| shop_ids.contains(&order.shop_id))
            .map(|order| (order.status, order.amount_cents))
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<SellerProfile>, ServiceError> {
        Ok(self.profiles.get(&user_id.to_string()).map(|row| row.record))
    }

    async fn attach_payment_account(
        &self,
        user_id: Uuid,
        account_id: &str,
        onboarded: bool,
    ) -> Result<SellerProfile, ServiceError> {
        let mut already_linked = false;
        let row = self
            .profiles
            .update(&user_id.to_string(), |profile| {
                if profile.payment_account_id.is_some() {
                    already_linked = true;
                    return false;
                }
                profile.payment_account_id = Some(account_id.to_string());
                profile.payment_onboarded = onboarded;
                true
            })
            .map_err(not_found("Seller profile"))?;

        if already_linked {
            return Err(ServiceError::AlreadyExists(
                "Payment account already exists".to_string(),
            ));
        }
        Ok(row.record)
    }

    async fn set_payment_onboarded(
        &self,
        user_id: Uuid,
        onboarded: bool,
    ) -> Result<SellerProfile, ServiceError> {
        let row = self
            .profiles
            .update(&user_id.to_string(), |profile| {
                let changed = profile.payment_onboarded != onboarded;
                profile.payment_onboarded = onboarded;
                changed
            })
            .map_err(not_found("Seller profile"))?;
        Ok(row.record)
    }
}

#[async_trait]
impl AnalyticsRepository for InMemoryStore {
    async fn append(&self, event: AnalyticsEvent) -> Result<(), ServiceError> {
        self.analytics.write().await.push(event);
        Ok(())
    }

    async fn events_for_shop(&self, shop_id: Uuid) -> Result<Vec<AnalyticsEvent>, ServiceError> {
        Ok(self
            .analytics
            .read()
            .await
            .iter()
            .filter(|event| event.shop_id == shop_id)
            .cloned()
            .collect())
    }
}
