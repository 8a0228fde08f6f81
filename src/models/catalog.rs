use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A seller's storefront. Owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Shop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub username: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// The single product a shop sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Minor currency units
    pub price_cents: i64,
    pub currency: String,
    pub is_available: bool,
    /// `None` means inventory is not tracked
    pub inventory_count: Option<i32>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_out_of_stock(&self) -> bool {
        matches!(self.inventory_count, Some(count) if count <= 0)
    }
}

/// Seller profile fields this service reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SellerProfile {
    pub user_id: Uuid,
    pub email: String,
    pub payment_account_id: Option<String>,
    pub payment_onboarded: bool,
}
