use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalyticsEventType {
    ShopView,
    ProductView,
    PurchaseInitiated,
    PurchaseCompleted,
    PurchaseFailed,
    OrderStatusChanged,
}

impl AnalyticsEventType {
    /// Types anonymous visitors may report through the tracking endpoint.
    pub fn is_client_trackable(self) -> bool {
        !matches!(self, AnalyticsEventType::OrderStatusChanged)
    }
}

/// Append-only analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub event_type: AnalyticsEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn new(shop_id: Uuid, event_type: AnalyticsEventType, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop_id,
            event_type,
            visitor_id: None,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn with_visitor(mut self, visitor_id: impl Into<String>) -> Self {
        self.visitor_id = Some(visitor_id.into());
        self
    }

    /// Convenience accessor for string metadata fields.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
