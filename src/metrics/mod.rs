//! Process-wide Prometheus counters for the checkout flow, exposed in text
//! format at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::errors::ServiceError;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ORDERS_CREATED: IntCounter = IntCounter::new(
        "singleshop_orders_created_total",
        "Total number of pending orders created"
    )
    .expect("metric can be created");
    pub static ref PAYMENTS_SUCCEEDED: IntCounter = IntCounter::new(
        "singleshop_payments_succeeded_total",
        "Total number of orders moved to paid"
    )
    .expect("metric can be created");
    pub static ref PAYMENTS_DECLINED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "singleshop_payments_declined_total",
            "Total number of declined payment confirmations"
        ),
        &["reason"]
    )
    .expect("metric can be created");
    pub static ref GATEWAY_TIMEOUTS: IntCounter = IntCounter::new(
        "singleshop_gateway_timeouts_total",
        "Total number of payment gateway calls that exceeded their deadline"
    )
    .expect("metric can be created");
    pub static ref NOTIFICATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "singleshop_notification_failures_total",
            "Total number of order emails that could not be sent"
        ),
        &["recipient"]
    )
    .expect("metric can be created");
    pub static ref ANALYTICS_WRITE_FAILURES: IntCounter = IntCounter::new(
        "singleshop_analytics_write_failures_total",
        "Total number of analytics events that could not be stored"
    )
    .expect("metric can be created");
}

/// Registers every counter with [`REGISTRY`]. Safe to call more than once.
pub fn register() {
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(ORDERS_CREATED.clone()),
        Box::new(PAYMENTS_SUCCEEDED.clone()),
        Box::new(PAYMENTS_DECLINED.clone()),
        Box::new(GATEWAY_TIMEOUTS.clone()),
        Box::new(NOTIFICATION_FAILURES.clone()),
        Box::new(ANALYTICS_WRITE_FAILURES.clone()),
    ];
    for collector in collectors {
        // AlreadyReg on repeat calls is expected
        let _ = REGISTRY.register(collector);
    }
}

/// Renders the registry in Prometheus text exposition format.
pub fn render() -> Result<String, ServiceError> {
    register();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("Metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_counters() {
        ORDERS_CREATED.inc();
        PAYMENTS_DECLINED.with_label_values(&["card_declined"]).inc();

        let text = render().unwrap();
        assert!(text.contains("singleshop_orders_created_total"));
        assert!(text.contains("singleshop_payments_declined_total"));
    }
}
