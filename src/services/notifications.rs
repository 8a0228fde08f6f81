//! Order emails to buyers and sellers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::common::{timestamped_id, DecisionSource, ThreadRngSource};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to send email")]
    DeliveryFailed,
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Buyer-facing confirmation of a paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub customer_email: String,
    pub customer_name: String,
    pub order_id: String,
    pub product_name: String,
    pub shop_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub receipt_url: String,
}

/// Seller-facing notice of a new paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerNotification {
    pub seller_email: String,
    pub shop_name: String,
    pub order_id: String,
    pub product_name: String,
    pub customer_name: String,
    pub customer_email: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub message_id: String,
}

/// Outbound email channel. Callers treat every send as best-effort.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_order_confirmation(
        &self,
        confirmation: OrderConfirmation,
    ) -> Result<DeliveryReceipt, NotificationError>;

    async fn send_seller_notification(
        &self,
        notification: SellerNotification,
    ) -> Result<DeliveryReceipt, NotificationError>;
}

/// A message the mock service pretended to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentEmail {
    pub message_id: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Formats minor units as `12.34 USD`.
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!("{} {}", Decimal::new(amount_cents, 2), currency.to_uppercase())
}

/// Logs emails instead of sending them and fails a configurable share of sends.
#[derive(Debug)]
pub struct MockEmailService {
    failure_rate: f64,
    latency: Duration,
    decisions: Arc<dyn DecisionSource>,
    log: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate,
            latency: Duration::ZERO,
            decisions: Arc::new(ThreadRngSource),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_decision_source(mut self, decisions: Arc<dyn DecisionSource>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn email_log(&self) -> Vec<SentEmail> {
        self.log.lock().await.clone()
    }

    pub async fn clear_log(&self) {
        self.log.lock().await.clear();
    }

    async fn deliver(
        &self,
        to: &str,
        subject: String,
        body: String,
    ) -> Result<DeliveryReceipt, NotificationError> {
        if !to.contains('@') {
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.decisions.passes(self.failure_rate) {
            warn!(recipient = %to, %subject, "simulated email delivery failure");
            return Err(NotificationError::DeliveryFailed);
        }

        let message_id = timestamped_id("mock");
        info!(recipient = %to, %subject, %message_id, "email sent");
        self.log.lock().await.push(SentEmail {
            message_id: message_id.clone(),
            to: to.to_string(),
            subject,
            body,
            sent_at: Utc::now(),
        });

        Ok(DeliveryReceipt {
            success: true,
            message_id,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for MockEmailService {
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
    async fn send_order_confirmation(
        &self,
        confirmation: OrderConfirmation,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let subject = format!("Order Confirmed - {}", confirmation.product_name);
        let body = format!(
            "Hi {},\n\nThanks for your order from {}.\n\nOrder: {}\nProduct: {}\nTotal: {}\nReceipt: {}\n",
            confirmation.customer_name,
            confirmation.shop_name,
            confirmation.order_id,
            confirmation.product_name,
            format_amount(confirmation.amount_cents, &confirmation.currency),
            confirmation.receipt_url,
        );
        self.deliver(&confirmation.customer_email, subject, body).await
    }

    #[instrument(skip(self, notification), fields(order_id = %notification.order_id))]
    async fn send_seller_notification(
        &self,
        notification: SellerNotification,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let subject = format!("New Order - {}", notification.product_name);
        let body = format!(
            "You have a new order on {}.\n\nOrder: {}\nProduct: {}\nAmount: {}\nCustomer: {} <{}>\n",
            notification.shop_name,
            notification.order_id,
            notification.product_name,
            format_amount(notification.amount_cents, &notification.currency),
            notification.customer_name,
            notification.customer_email,
        );
        self.deliver(&notification.seller_email, subject, body).await
    }
}
