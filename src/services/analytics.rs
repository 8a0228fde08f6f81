//! Best-effort analytics.
//!
//! Internal emitters never fail the caller; write errors are logged and
//! counted. The public tracking endpoint is the only path that surfaces
//! errors, and only for bad input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::timestamped_id;
use crate::errors::ServiceError;
use crate::metrics::ANALYTICS_WRITE_FAILURES;
use crate::models::{AnalyticsEvent, AnalyticsEventType};
use crate::repositories::{AnalyticsRepository, ShopRepository};

/// Builds a JSON object from key/value pairs.
pub fn metadata<I, K>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(
        pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect::<Map<String, Value>>(),
    )
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TrackEventRequest {
    pub shop_id: Uuid,
    /// One of shop_view, product_view, purchase_initiated, purchase_completed, purchase_failed
    pub event_type: String,
    pub visitor_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackEventResponse {
    pub success: bool,
    pub event_id: Uuid,
    pub visitor_id: String,
}

#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepository>,
    shops: Arc<dyn ShopRepository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepository>, shops: Arc<dyn ShopRepository>) -> Self {
        Self { repo, shops }
    }

    /// Appends an event. Failures are logged and swallowed.
    pub async fn record(&self, shop_id: Uuid, event_type: AnalyticsEventType, metadata: Value) {
        let event = AnalyticsEvent::new(shop_id, event_type, metadata);
        if let Err(e) = self.repo.append(event).await {
            ANALYTICS_WRITE_FAILURES.inc();
            error!(%shop_id, event_type = %event_type, error = %e, "failed to record analytics event");
        } else {
            debug!(%shop_id, event_type = %event_type, "analytics event recorded");
        }
    }

    /// Records a client-reported event.
    #[instrument(skip(self, request), fields(shop_id = %request.shop_id))]
    pub async fn track(&self, request: TrackEventRequest) -> Result<TrackEventResponse, ServiceError> {
        let event_type: AnalyticsEventType = request
            .event_type
            .parse::<AnalyticsEventType>()
            .ok()
            .filter(|t| t.is_client_trackable())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Invalid event type: {}",
                    request.event_type
                ))
            })?;

        if self.shops.find_shop(request.shop_id).await?.is_none() {
            return Err(ServiceError::NotFound("Shop not found".to_string()));
        }

        let visitor_id = request
            .visitor_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| timestamped_id("visitor"));
        let metadata = match request.metadata {
            Some(value @ Value::Object(_)) => value,
            _ => Value::Object(Map::new()),
        };

        let event = AnalyticsEvent::new(request.shop_id, event_type, metadata)
            .with_visitor(visitor_id.clone());
        let event_id = event.id;
        self.repo.append(event).await.map_err(|e| {
            ANALYTICS_WRITE_FAILURES.inc();
            e
        })?;

        Ok(TrackEventResponse {
            success: true,
            event_id,
            visitor_id,
        })
    }

    pub async fn events_for_shop(&self, shop_id: Uuid) -> Result<Vec<AnalyticsEvent>, ServiceError> {
        self.repo.events_for_shop(shop_id).await
    }
}
