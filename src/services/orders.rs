//! Order orchestration: checkout, payment confirmation and seller-side
//! fulfilment updates.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::metrics::{
    GATEWAY_TIMEOUTS, NOTIFICATION_FAILURES, ORDERS_CREATED, PAYMENTS_DECLINED, PAYMENTS_SUCCEEDED,
};
use crate::models::{
    AnalyticsEventType, Order, OrderStatus, PaymentIntent, PaymentIntentStatus, PaymentMethod,
    Product, ShippingAddress, Shop,
};
use crate::repositories::{
    OrderRepository, OrderUpdate, ProfileRepository, RecordStores, ShopRepository,
};
use crate::services::analytics::{metadata, AnalyticsService};
use crate::services::notifications::{NotificationDispatcher, OrderConfirmation, SellerNotification};
use crate::services::payments::{CreatePaymentIntent, PaymentError, PaymentProvider};

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_CUSTOMER_NAME: &str = "Customer";
const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;
const GATEWAY_TIMEOUT_MESSAGE: &str = "Payment gateway did not respond in time. Please try again.";
const INCOMPLETE_MESSAGE: &str = "Payment confirmation failed";

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub shop_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    /// Must equal the product's current price
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentSummary {
    pub id: String,
    /// Required client-side to confirm the payment; treat as sensitive
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub payment_intent: PaymentIntentSummary,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmOrderRequest {
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub return_url: Option<String>,
}

/// Intent fields safe to echo back after confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentView {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentIntentStatus,
}

impl From<&PaymentIntent> for PaymentIntentView {
    fn from(intent: &PaymentIntent) -> Self {
        Self {
            id: intent.id.clone(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            status: intent.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    pub product_name: String,
    pub shop_name: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfirmedOrder {
    pub success: bool,
    pub order_id: Uuid,
    pub payment_intent: PaymentIntentView,
    pub receipt_url: String,
    pub order_details: OrderDetails,
}

/// A decline or timeout. The order stays `pending` and the intent reusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentFailure {
    pub success: bool,
    pub error: String,
    /// `card_declined` or `gateway_timeout`
    pub code: String,
    pub retriable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IncompletePayment {
    pub success: bool,
    pub error: String,
    pub payment_intent: PaymentIntentView,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOrderOutcome {
    Confirmed(ConfirmedOrder),
    Declined(PaymentFailure),
    Incomplete(IncompletePayment),
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<String>,
    /// An empty string clears the tracking number
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, at most 100
    pub limit: Option<u64>,
    /// Order status, or `all`
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub total_orders: u64,
    /// Sum of paid, shipped and delivered orders in minor units
    pub total_revenue: i64,
    pub pending_orders: u64,
    pub paid_orders: u64,
    pub shipped_orders: u64,
}

impl OrderSummary {
    fn from_status_amounts(rows: &[(OrderStatus, i64)]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, (status, amount)| {
            summary.total_orders += 1;
            if status.is_settled() {
                summary.total_revenue += amount;
            }
            match status {
                OrderStatus::Pending => summary.pending_orders += 1,
                OrderStatus::Paid => summary.paid_orders += 1,
                OrderStatus::Shipped => summary.shipped_orders += 1,
                _ => {}
            }
            summary
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
    pub summary: OrderSummary,
}

#[derive(Clone)]
pub struct OrderService {
    shops: Arc<dyn ShopRepository>,
    orders: Arc<dyn OrderRepository>,
    profiles: Arc<dyn ProfileRepository>,
    provider: Arc<dyn PaymentProvider>,
    analytics: AnalyticsService,
    notifier: Arc<dyn NotificationDispatcher>,
    gateway_timeout: Duration,
}

impl OrderService {
    pub fn new(
        stores: &RecordStores,
        provider: Arc<dyn PaymentProvider>,
        analytics: AnalyticsService,
        notifier: Arc<dyn NotificationDispatcher>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            shops: stores.shops.clone(),
            orders: stores.orders.clone(),
            profiles: stores.profiles.clone(),
            provider,
            analytics,
            notifier,
            gateway_timeout,
        }
    }

    /// Bounds a gateway call by `gateway_timeout`.
    async fn call_gateway<T, F>(&self, call: F) -> Result<Result<T, PaymentError>, Elapsed>
    where
        F: Future<Output = Result<T, PaymentError>>,
    {
        tokio::time::timeout(self.gateway_timeout, call)
            .await
            .map_err(|elapsed| {
                GATEWAY_TIMEOUTS.inc();
                warn!(timeout = ?self.gateway_timeout, "payment gateway call timed out");
                elapsed
            })
    }

    async fn load_shop(&self, shop_id: Uuid) -> Result<Shop, ServiceError> {
        self.shops
            .find_shop(shop_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Shop not found".to_string()))
    }

    /// Creates a pending order and the payment intent that will settle it.
    #[instrument(skip(self, request), fields(shop_id, product_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        let (shop_id, product_id, customer_email, shipping_address, amount_cents) = match (
            request.shop_id,
            request.product_id,
            request.customer_email.filter(|email| !email.trim().is_empty()),
            request.shipping_address,
            request.amount_cents,
        ) {
            (Some(shop), Some(product), Some(email), Some(address), Some(amount)) => {
                (shop, product, email, address, amount)
            }
            _ => {
                return Err(ServiceError::ValidationError(
                    "Missing required fields".to_string(),
                ))
            }
        };
        tracing::Span::current()
            .record("shop_id", tracing::field::display(shop_id))
            .record("product_id", tracing::field::display(product_id));

        if amount_cents <= 0 {
            return Err(ServiceError::ValidationError(
                "Amount must be greater than zero".to_string(),
            ));
        }
        if !validator::validate_email(customer_email.as_str()) {
            return Err(ServiceError::ValidationError(
                "Invalid customer email".to_string(),
            ));
        }
        shipping_address.validate()?;

        let product = self
            .shops
            .find_product(shop_id, product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let shop = self.load_shop(shop_id).await?;

        if !product.is_available {
            return Err(ServiceError::Unavailable(
                "Product is not available".to_string(),
            ));
        }
        if product.is_out_of_stock() {
            return Err(ServiceError::Unavailable("Product is out of stock".to_string()));
        }
        if amount_cents != product.price_cents {
            return Err(ServiceError::PriceMismatch {
                expected: product.price_cents,
                received: amount_cents,
            });
        }

        let currency = request
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| {
                if product.currency.is_empty() {
                    DEFAULT_CURRENCY.to_string()
                } else {
                    product.currency.clone()
                }
            })
            .to_uppercase();

        let params = CreatePaymentIntent {
            amount: amount_cents,
            currency: currency.to_lowercase(),
            customer_email: Some(customer_email.clone()),
            metadata: [
                ("shop_id", shop.id.to_string()),
                ("product_id", product.id.to_string()),
                ("product_name", product.name.clone()),
                ("shop_name", shop.title.clone()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        };
        let intent = self
            .call_gateway(self.provider.create_payment_intent(params))
            .await
            .map_err(|_| ServiceError::GatewayTimeout(GATEWAY_TIMEOUT_MESSAGE.to_string()))??;

        let now = Utc::now();
        let order = self
            .orders
            .insert(Order {
                id: Uuid::new_v4(),
                shop_id,
                product_id,
                payment_intent_id: intent.id.clone(),
                customer_email,
                customer_name: request.customer_name.filter(|n| !n.trim().is_empty()),
                customer_phone: request.customer_phone.filter(|p| !p.trim().is_empty()),
                shipping_address,
                amount_cents,
                currency: currency.clone(),
                status: OrderStatus::Pending,
                tracking_number: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        ORDERS_CREATED.inc();
        info!(order_id = %order.id, payment_intent_id = %intent.id, "order created");

        self.analytics
            .record(
                shop_id,
                AnalyticsEventType::PurchaseInitiated,
                metadata([
                    ("product_id", json!(product_id)),
                    ("order_id", json!(order.id)),
                    ("amount_cents", json!(amount_cents)),
                    ("currency", json!(currency)),
                ]),
            )
            .await;

        Ok(CreateOrderResponse {
            success: true,
            order_id: order.id,
            payment_intent: PaymentIntentSummary {
                id: intent.id,
                client_secret: intent.client_secret,
                amount: intent.amount,
                currency: intent.currency,
                status: intent.status,
            },
        })
    }

    /// Confirms the payment behind an order.
    ///
    /// Declines and timeouts come back as [`ConfirmOrderOutcome::Declined`],
    /// not as errors, and leave the order `pending`.
    #[instrument(skip(self, request), fields(payment_intent_id))]
    pub async fn confirm_order(
        &self,
        request: ConfirmOrderRequest,
    ) -> Result<ConfirmOrderOutcome, ServiceError> {
        let (intent_id, payment_method) = match (
            request.payment_intent_id.filter(|id| !id.trim().is_empty()),
            request.payment_method,
        ) {
            (Some(id), Some(method)) => (id, method),
            _ => {
                return Err(ServiceError::ValidationError(
                    "Missing required fields".to_string(),
                ))
            }
        };
        tracing::Span::current().record("payment_intent_id", intent_id.as_str());

        let order = self
            .orders
            .find_by_payment_intent(&intent_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "Order has been cancelled".to_string(),
            ));
        }

        let product = self
            .shops
            .find_product_by_id(order.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let shop = self.load_shop(order.shop_id).await?;

        if order.status.is_settled() {
            info!(order_id = %order.id, "order already paid; skipping confirmation");
            let intent = self
                .provider
                .retrieve_payment_intent(&intent_id)
                .await
                .map_err(ServiceError::from)?;
            return Ok(ConfirmOrderOutcome::Confirmed(
                self.confirmed(&order, &intent, &product, &shop),
            ));
        }

        let confirmation = self
            .call_gateway(
                self.provider
                    .confirm_payment_intent(&intent_id, &payment_method),
            )
            .await;

        let intent = match confirmation {
            Err(_elapsed) => {
                PAYMENTS_DECLINED.with_label_values(&["gateway_timeout"]).inc();
                self.record_failure(&order, GATEWAY_TIMEOUT_MESSAGE).await;
                return Ok(ConfirmOrderOutcome::Declined(PaymentFailure {
                    success: false,
                    error: GATEWAY_TIMEOUT_MESSAGE.to_string(),
                    code: "gateway_timeout".to_string(),
                    retriable: true,
                }));
            }
            Ok(Err(PaymentError::CardDeclined(reason))) => {
                PAYMENTS_DECLINED.with_label_values(&["card_declined"]).inc();
                self.record_failure(&order, &reason).await;
                return Ok(ConfirmOrderOutcome::Declined(PaymentFailure {
                    success: false,
                    error: reason,
                    code: "card_declined".to_string(),
                    retriable: true,
                }));
            }
            Ok(Err(err @ PaymentError::ConfirmationInProgress(_))) => return Err(err.into()),
            Ok(Err(err)) => {
                self.record_failure(&order, &err.to_string()).await;
                return Err(err.into());
            }
            Ok(Ok(intent)) => intent,
        };

        if !intent.is_succeeded() {
            info!(status = %intent.status, "payment intent not yet complete");
            return Ok(ConfirmOrderOutcome::Incomplete(IncompletePayment {
                success: false,
                error: INCOMPLETE_MESSAGE.to_string(),
                payment_intent: PaymentIntentView::from(&intent),
            }));
        }

        let paid = match self.orders.mark_paid_if_pending(order.id).await? {
            Some(paid) => paid,
            None => {
                // Another confirmation already settled this order.
                let current = self.orders.find_by_id(order.id).await?.unwrap_or(order);
                return Ok(ConfirmOrderOutcome::Confirmed(
                    self.confirmed(&current, &intent, &product, &shop),
                ));
            }
        };
        PAYMENTS_SUCCEEDED.inc();
        info!(order_id = %paid.id, "order paid");

        if product.inventory_count.is_some() {
            match self.shops.decrement_inventory(product.id).await {
                Ok(remaining) => info!(product_id = %product.id, ?remaining, "inventory decremented"),
                Err(e) => warn!(product_id = %product.id, error = %e, "failed to decrement inventory"),
            }
        }

        self.analytics
            .record(
                paid.shop_id,
                AnalyticsEventType::PurchaseCompleted,
                metadata([
                    ("product_id", json!(paid.product_id)),
                    ("order_id", json!(paid.id)),
                    ("payment_intent_id", json!(intent.id)),
                    ("amount_cents", json!(paid.amount_cents)),
                    ("currency", json!(paid.currency)),
                ]),
            )
            .await;

        let outcome = self.confirmed(&paid, &intent, &product, &shop);
        self.notify(&paid, &product, &shop, &outcome.receipt_url).await;

        Ok(ConfirmOrderOutcome::Confirmed(outcome))
    }

    fn confirmed(
        &self,
        order: &Order,
        intent: &PaymentIntent,
        product: &Product,
        shop: &Shop,
    ) -> ConfirmedOrder {
        let mut payment_intent = PaymentIntentView::from(intent);
        if intent.reconstructed {
            // Rebuilt intents carry no amount; the order has the real one.
            warn!(
                order_id = %order.id,
                payment_intent_id = %intent.id,
                "payment intent was reconstructed from its id"
            );
            payment_intent.amount = order.amount_cents;
            payment_intent.currency = order.currency.to_lowercase();
        }

        ConfirmedOrder {
            success: true,
            order_id: order.id,
            payment_intent,
            receipt_url: self.provider.generate_receipt_url(intent),
            order_details: OrderDetails {
                product_name: product.name.clone(),
                shop_name: shop.title.clone(),
                amount_cents: order.amount_cents,
                currency: order.currency.clone(),
                customer_email: order.customer_email.clone(),
                status: order.status,
            },
        }
    }

    async fn record_failure(&self, order: &Order, reason: &str) {
        warn!(order_id = %order.id, reason, "payment confirmation failed");
        self.analytics
            .record(
                order.shop_id,
                AnalyticsEventType::PurchaseFailed,
                metadata([
                    ("product_id", json!(order.product_id)),
                    ("order_id", json!(order.id)),
                    ("payment_intent_id", json!(order.payment_intent_id)),
                    ("amount_cents", json!(order.amount_cents)),
                    ("currency", json!(order.currency)),
                    ("error", json!(reason)),
                ]),
            )
            .await;
    }

    /// Buyer and seller emails are independent; neither can fail the order.
    async fn notify(&self, order: &Order, product: &Product, shop: &Shop, receipt_url: &str) {
        let customer_name = order
            .customer_name
            .clone()
            .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string());

        let confirmation = OrderConfirmation {
            customer_email: order.customer_email.clone(),
            customer_name: customer_name.clone(),
            order_id: order.id.to_string(),
            product_name: product.name.clone(),
            shop_name: shop.title.clone(),
            amount_cents: order.amount_cents,
            currency: order.currency.clone(),
            receipt_url: receipt_url.to_string(),
        };
        if let Err(e) = self.notifier.send_order_confirmation(confirmation).await {
            NOTIFICATION_FAILURES.with_label_values(&["buyer"]).inc();
            warn!(order_id = %order.id, error = %e, "failed to send order confirmation");
        }

        let seller_email = match self.profiles.find_profile(shop.owner_id).await {
            Ok(Some(profile)) => profile.email,
            Ok(None) => {
                warn!(shop_id = %shop.id, "shop owner has no profile; skipping seller notification");
                return;
            }
            Err(e) => {
                warn!(shop_id = %shop.id, error = %e, "failed to load shop owner profile");
                return;
            }
        };
        let notification = SellerNotification {
            seller_email,
            shop_name: shop.title.clone(),
            order_id: order.id.to_string(),
            product_name: product.name.clone(),
            customer_name,
            customer_email: order.customer_email.clone(),
            amount_cents: order.amount_cents,
            currency: order.currency.clone(),
        };
        if let Err(e) = self.notifier.send_seller_notification(notification).await {
            NOTIFICATION_FAILURES.with_label_values(&["seller"]).inc();
            warn!(order_id = %order.id, error = %e, "failed to send seller notification");
        }
    }

    /// Seller-driven status and tracking update. Any status may follow any
    /// other; backward moves are logged and flagged in analytics.
    #[instrument(skip(self, request))]
    pub async fn update_order_status(
        &self,
        caller_id: Uuid,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<UpdateOrderResponse, ServiceError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let owns_shop = self
            .shops
            .find_shop(order.shop_id)
            .await?
            .map_or(false, |shop| shop.owner_id == caller_id);
        if !owns_shop {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let status = request
            .status
            .map(|raw| {
                raw.trim()
                    .parse::<OrderStatus>()
                    .map_err(|_| ServiceError::InvalidStatus(raw.clone()))
            })
            .transpose()?;
        let tracking_number = request.tracking_number.map(|tracking| {
            let tracking = tracking.trim().to_string();
            (!tracking.is_empty()).then_some(tracking)
        });

        let (previous, updated) = self
            .orders
            .update(
                order_id,
                OrderUpdate {
                    status,
                    tracking_number,
                },
            )
            .await?;

        if previous != updated.status {
            let backward = previous.is_backward_transition(updated.status);
            if backward {
                warn!(
                    %order_id,
                    old_status = %previous,
                    new_status = %updated.status,
                    "order moved backwards"
                );
            } else {
                info!(%order_id, old_status = %previous, new_status = %updated.status, "order status changed");
            }
            self.analytics
                .record(
                    updated.shop_id,
                    AnalyticsEventType::OrderStatusChanged,
                    metadata([
                        ("order_id", json!(updated.id)),
                        ("old_status", json!(previous)),
                        ("new_status", json!(updated.status)),
                        ("amount_cents", json!(updated.amount_cents)),
                        ("currency", json!(updated.currency)),
                        ("backward", json!(backward)),
                    ]),
                )
                .await;
        }

        Ok(UpdateOrderResponse {
            success: true,
            order: updated,
        })
    }

    /// Orders across every shop the caller owns, newest first.
    #[instrument(skip(self, query))]
    pub async fn list_orders(
        &self,
        caller_id: Uuid,
        query: ListOrdersQuery,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<OrderStatus>()
                    .map_err(|_| ServiceError::InvalidStatus(raw.to_string()))?,
            ),
        };

        let shop_ids: Vec<Uuid> = self
            .shops
            .find_shops_by_owner(caller_id)
            .await?
            .into_iter()
            .map(|shop| shop.id)
            .collect();

        let (orders, total) = if shop_ids.is_empty() {
            (Vec::new(), 0)
        } else {
            self.orders
                .find_by_shops(&shop_ids, status, page, limit)
                .await?
        };
        let summary = if shop_ids.is_empty() {
            OrderSummary::default()
        } else {
            OrderSummary::from_status_amounts(&self.orders.status_amounts(&shop_ids).await?)
        };

        Ok(OrderListResponse {
            orders,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit),
            },
            summary,
        })
    }
}
