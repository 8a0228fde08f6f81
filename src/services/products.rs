use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Product;
use crate::repositories::ShopRepository;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ToggleAvailabilityRequest {
    pub product_id: Uuid,
    /// Explicit value; flips the current one when omitted
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToggleAvailabilityResponse {
    pub success: bool,
    pub product: Product,
}

#[derive(Clone)]
pub struct ProductService {
    shops: Arc<dyn ShopRepository>,
}

impl ProductService {
    pub fn new(shops: Arc<dyn ShopRepository>) -> Self {
        Self { shops }
    }

    /// Opens or closes the product for checkout.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn toggle_availability(
        &self,
        caller_id: Uuid,
        request: ToggleAvailabilityRequest,
    ) -> Result<ToggleAvailabilityResponse, ServiceError> {
        let product = self
            .shops
            .find_product_by_id(request.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let owns_shop = self
            .shops
            .find_shop(product.shop_id)
            .await?
            .map_or(false, |shop| shop.owner_id == caller_id);
        if !owns_shop {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let next = request.is_available.unwrap_or(!product.is_available);
        let product = self
            .shops
            .set_product_availability(product.id, next)
            .await?;
        info!(is_available = product.is_available, "product availability changed");

        Ok(ToggleAvailabilityResponse {
            success: true,
            product,
        })
    }
}
