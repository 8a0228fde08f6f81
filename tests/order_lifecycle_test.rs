//! End-to-end order journeys through the HTTP router:
//! creation, payment confirmation, retries, stock exhaustion and fulfilment.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use axum::http::{Method, StatusCode};
use mockall::mock;
use serde_json::json;

use common::{response_json, TestApp, TestOptions, DECLINED_CARD, PLAIN_CARD, SUCCEEDING_CARD};
use singleshop_api::{
    common::FixedSource,
    models::{
        AnalyticsEventType, OrderStatus, PaymentAccount, PaymentIntent, PaymentIntentStatus,
        PaymentMethod,
    },
    repositories::OrderRepository,
    services::{
        notifications::{
            DeliveryReceipt, NotificationDispatcher, NotificationError, OrderConfirmation,
            SellerNotification,
        },
        payments::{CreatePaymentIntent, PaymentError, PaymentProvider},
    },
};

mock! {
    pub Notifier {}

    #[async_trait]
    impl NotificationDispatcher for Notifier {
        async fn send_order_confirmation(
            &self,
            confirmation: OrderConfirmation,
        ) -> Result<DeliveryReceipt, NotificationError>;

        async fn send_seller_notification(
            &self,
            notification: SellerNotification,
        ) -> Result<DeliveryReceipt, NotificationError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentProvider for Gateway {
        fn name(&self) -> &'static str;

        async fn create_payment_intent(
            &self,
            params: CreatePaymentIntent,
        ) -> Result<PaymentIntent, PaymentError>;

        async fn confirm_payment_intent(
            &self,
            intent_id: &str,
            payment_method: &PaymentMethod,
        ) -> Result<PaymentIntent, PaymentError>;

        async fn retrieve_payment_intent(&self, intent_id: &str)
            -> Result<PaymentIntent, PaymentError>;

        fn generate_receipt_url(&self, intent: &PaymentIntent) -> String;

        async fn create_account(&self, email: &str) -> Result<PaymentAccount, PaymentError>;

        async fn retrieve_account(&self, account_id: &str) -> Result<PaymentAccount, PaymentError>;

        async fn complete_account_onboarding(
            &self,
            account_id: &str,
        ) -> Result<PaymentAccount, PaymentError>;

        fn generate_onboarding_link(&self, account_id: &str) -> String;
    }
}

const GATEWAY_INTENT_ID: &str = "pi_live_1700000000000_k2m9x4q7z";

fn gateway_intent(status: PaymentIntentStatus) -> PaymentIntent {
    PaymentIntent {
        id: GATEWAY_INTENT_ID.to_string(),
        amount: 1000,
        currency: "usd".to_string(),
        status,
        client_secret: format!("{}_secret_abc123", GATEWAY_INTENT_ID),
        customer_email: Some("buyer@example.com".to_string()),
        created: Utc::now(),
        metadata: HashMap::new(),
        reconstructed: false,
    }
}

async fn event_types(app: &TestApp) -> Vec<AnalyticsEventType> {
    app.state
        .services
        .analytics
        .events_for_shop(app.seed.shop_id)
        .await
        .expect("events")
        .into_iter()
        .map(|event| event.event_type)
        .collect()
}

#[tokio::test]
async fn test_order_lifecycle_pending_to_delivered() {
    let app = TestApp::new();
    let product_id = app.seed.product_id;

    let (order_id, intent_id) = app.create_order(product_id, 1000).await;
    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_intent_id, intent_id);

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["payment_intent"]["status"], "succeeded");
    assert_eq!(body["order_details"]["status"], "paid");
    assert_eq!(body["order_details"]["product_name"], "Demo Tee");
    assert_eq!(
        body["receipt_url"],
        format!("https://mock-receipts.singleshop.com/receipt/{}", intent_id)
    );

    assert_eq!(app.product(product_id).await.inventory_count, Some(4));

    let emails = app.emails.email_log().await;
    assert_eq!(emails.len(), 2);
    assert!(emails.iter().any(|e| e.to == "buyer@example.com"));
    assert!(emails.iter().any(|e| e.to == app.seed.seller_email));

    let uri = format!("/api/orders/{}/update", order_id);
    let response = app
        .request_authenticated(
            Method::PATCH,
            &uri,
            Some(json!({ "status": "shipped", "tracking_number": "1Z999" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["order"]["status"], "shipped");
    assert_eq!(body["order"]["tracking_number"], "1Z999");

    let response = app
        .request_authenticated(Method::PATCH, &uri, Some(json!({ "status": "delivered" })))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["order"]["status"], "delivered");
    assert_eq!(body["order"]["tracking_number"], "1Z999");

    let events = event_types(&app).await;
    assert_eq!(
        events,
        vec![
            AnalyticsEventType::PurchaseInitiated,
            AnalyticsEventType::PurchaseCompleted,
            AnalyticsEventType::OrderStatusChanged,
            AnalyticsEventType::OrderStatusChanged,
        ]
    );
}

#[tokio::test]
async fn declined_card_leaves_order_pending_and_intent_reusable() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let response = app.confirm(&intent_id, DECLINED_CARD).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "card_declined");
    assert_eq!(body["retriable"], true);
    assert_eq!(body["error"], "Your card was declined.");

    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(5));
    assert!(app.emails.email_log().await.is_empty());

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let events = event_types(&app).await;
    assert!(events.contains(&AnalyticsEventType::PurchaseFailed));
    assert!(events.contains(&AnalyticsEventType::PurchaseCompleted));
}

#[tokio::test]
async fn random_declines_follow_the_decision_source() {
    let app = TestApp::with_options(TestOptions {
        payment_decisions: Arc::new(FixedSource::always_fail()),
        ..TestOptions::default()
    });
    let (_, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let response = app.confirm(&intent_id, PLAIN_CARD).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "card_declined");
    assert_eq!(body["error"], "Payment failed. Please try again.");

    // Test cards bypass the random policy.
    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reconfirming_a_paid_order_has_no_side_effects() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let first = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = response_json(first).await;

    let second = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second = response_json(second).await;

    assert_eq!(first["order_id"], second["order_id"]);
    assert_eq!(second["payment_intent"]["status"], "succeeded");
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(4));
    assert_eq!(app.emails.email_log().await.len(), 2);

    let completed = event_types(&app)
        .await
        .into_iter()
        .filter(|t| *t == AnalyticsEventType::PurchaseCompleted)
        .count();
    assert_eq!(completed, 1);

    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn last_unit_sells_once() {
    let app = TestApp::new();
    let product_id = app.add_product(2500, Some(1));

    let (_, intent_id) = app.create_order(product_id, 2500).await;
    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.product(product_id).await.inventory_count, Some(0));

    let response = app
        .post("/api/orders/create", app.order_payload(product_id, 2500))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("out of stock"));
}

#[tokio::test]
async fn untracked_inventory_never_runs_out() {
    let app = TestApp::new();
    let product_id = app.add_product(700, None);

    for _ in 0..3 {
        let (_, intent_id) = app.create_order(product_id, 700).await;
        let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.product(product_id).await.inventory_count, None);
}

#[tokio::test]
async fn failed_emails_do_not_fail_the_order() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_send_order_confirmation()
        .times(1)
        .returning(|_| Err(NotificationError::DeliveryFailed));
    notifier
        .expect_send_seller_notification()
        .times(1)
        .returning(|n| {
            Ok(DeliveryReceipt {
                success: true,
                message_id: format!("test_{}", n.order_id),
            })
        });

    let app = TestApp::with_options(TestOptions {
        notifier: Some(Arc::new(notifier)),
        ..TestOptions::default()
    });
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn flaky_mailer_still_settles_the_order() {
    let app = TestApp::with_options(TestOptions {
        email_decisions: Arc::new(FixedSource::always_fail()),
        ..TestOptions::default()
    });
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.emails.email_log().await.is_empty());
    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn cancelled_orders_cannot_be_confirmed() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let response = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/orders/{}/update", order_id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(5));
}

#[tokio::test]
async fn slow_gateway_surfaces_as_gateway_timeout() {
    let app = TestApp::with_options(TestOptions {
        gateway_latency: Duration::from_millis(1500),
        gateway_timeout_secs: 1,
        ..TestOptions::default()
    });

    let response = app
        .post(
            "/api/orders/create",
            app.order_payload(app.seed.product_id, 1000),
        )
        .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("did not respond in time"));
}

#[tokio::test]
async fn concurrent_confirmations_settle_exactly_once() {
    let app = TestApp::new();
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    let (a, b) = tokio::join!(
        app.confirm(&intent_id, SUCCEEDING_CARD),
        app.confirm(&intent_id, SUCCEEDING_CARD)
    );
    let statuses = [a.status(), b.status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::OK || *s == StatusCode::CONFLICT));

    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(4));
    assert_eq!(app.emails.email_log().await.len(), 2);
}

#[tokio::test]
async fn unfinished_gateway_confirmation_leaves_the_order_pending() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_payment_intent()
        .times(1)
        .returning(|_| Ok(gateway_intent(PaymentIntentStatus::RequiresPaymentMethod)));
    gateway
        .expect_confirm_payment_intent()
        .times(1)
        .returning(|_, _| Ok(gateway_intent(PaymentIntentStatus::RequiresAction)));

    let app = TestApp::with_options(TestOptions {
        provider: Some(Arc::new(gateway)),
        ..TestOptions::default()
    });
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;
    assert_eq!(intent_id, GATEWAY_INTENT_ID);

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["payment_intent"]["status"], "requires_action");

    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(5));
    assert!(app.emails.email_log().await.is_empty());
    assert!(!event_types(&app)
        .await
        .contains(&AnalyticsEventType::PurchaseCompleted));
}

#[tokio::test]
async fn orders_confirm_after_the_gateway_forgets_its_intents() {
    let mut app = TestApp::new();
    let (order_id, intent_id) = app.create_order(app.seed.product_id, 1000).await;

    app.restart_gateway();
    assert!(app.gateway.intent_store().is_empty());

    let response = app.confirm(&intent_id, SUCCEEDING_CARD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["payment_intent"]["id"], intent_id.as_str());
    assert_eq!(body["payment_intent"]["status"], "succeeded");
    assert_eq!(body["payment_intent"]["amount"], 1000);
    assert_eq!(body["order_details"]["status"], "paid");

    let order = app.store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(app.product(app.seed.product_id).await.inventory_count, Some(4));
    assert_eq!(app.emails.email_log().await.len(), 2);
}
