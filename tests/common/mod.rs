//! Shared harness for router-level tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use singleshop_api::{
    app_router,
    common::{DecisionSource, FixedSource},
    config::AppConfig,
    handlers::AppServices,
    models::Product,
    repositories::{memory::DemoSeed, InMemoryStore, RecordStores},
    services::{
        notifications::{MockEmailService, NotificationDispatcher},
        payments::{MockGatewaySettings, MockPaymentGateway, PaymentProvider},
    },
    AppState,
};

pub const JWT_SECRET: &str = "k9Qz7Lw2Rt5Yx8Vb3Nm6Pc1Hd4Gf0JsW";
pub const SUCCEEDING_CARD: &str = "4242424242424242";
pub const DECLINED_CARD: &str = "4000000000000002";
pub const PLAIN_CARD: &str = "4111111111111111";

pub struct TestOptions {
    pub payment_decisions: Arc<dyn DecisionSource>,
    pub email_decisions: Arc<dyn DecisionSource>,
    pub gateway_latency: Duration,
    pub gateway_timeout_secs: u64,
    pub notifier: Option<Arc<dyn NotificationDispatcher>>,
    /// Replaces the mock gateway for order and account flows
    pub provider: Option<Arc<dyn PaymentProvider>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            payment_decisions: Arc::new(FixedSource::always_pass()),
            email_decisions: Arc::new(FixedSource::always_pass()),
            gateway_latency: Duration::ZERO,
            gateway_timeout_secs: 10,
            notifier: None,
            provider: None,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub emails: Arc<MockEmailService>,
    pub seed: DemoSeed,
    token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let mut config = AppConfig::new(
            "127.0.0.1".into(),
            8080,
            "development".into(),
            JWT_SECRET.into(),
        );
        config.gateway_timeout_secs = options.gateway_timeout_secs;
        config.mock_gateway_latency_ms = options.gateway_latency.as_millis() as u64;

        let store = Arc::new(InMemoryStore::new());
        let seed = store.seed_demo().expect("demo seed");

        let gateway = Arc::new(
            MockPaymentGateway::new(MockGatewaySettings::from(&config))
                .with_decision_source(options.payment_decisions),
        );
        let emails =
            Arc::new(MockEmailService::new(0.05).with_decision_source(options.email_decisions));
        let notifier: Arc<dyn NotificationDispatcher> = match options.notifier {
            Some(notifier) => notifier,
            None => emails.clone(),
        };

        let provider: Arc<dyn PaymentProvider> = match options.provider {
            Some(provider) => provider,
            None => gateway.clone(),
        };
        let services = AppServices::new(
            &config,
            RecordStores::in_memory(store.clone()),
            provider,
            notifier,
        );
        let token = services
            .auth
            .issue_token(seed.seller_id, &seed.seller_email)
            .expect("seller token");

        let state = AppState::new(config, services);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            store,
            gateway,
            emails,
            seed,
            token,
        }
    }

    /// Swaps in a fresh mock gateway with an empty intent store, as after a
    /// process restart. Orders, shops and the email log survive.
    pub fn restart_gateway(&mut self) {
        let config = (*self.state.config).clone();
        let gateway = Arc::new(
            MockPaymentGateway::new(MockGatewaySettings::from(&config))
                .with_decision_source(Arc::new(FixedSource::always_pass())),
        );
        let provider: Arc<dyn PaymentProvider> = gateway.clone();
        let services = AppServices::new(
            &config,
            RecordStores::in_memory(self.store.clone()),
            provider,
            self.emails.clone(),
        );

        self.state = AppState::new(config, services);
        self.router = app_router(self.state.clone());
        self.gateway = gateway;
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Adds a product to the demo shop.
    pub fn add_product(&self, price_cents: i64, inventory_count: Option<i32>) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.store
            .insert_product(Product {
                id,
                shop_id: self.seed.shop_id,
                name: "Limited Print".to_string(),
                description: None,
                price_cents,
                currency: "USD".to_string(),
                is_available: true,
                inventory_count,
                image_urls: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .expect("insert product");
        id
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", tok));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token()))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub fn order_payload(&self, product_id: Uuid, amount_cents: i64) -> Value {
        json!({
            "shop_id": self.seed.shop_id,
            "product_id": product_id,
            "customer_email": "buyer@example.com",
            "customer_name": "Ada Buyer",
            "shipping_address": {
                "line1": "1 Market St",
                "city": "San Francisco",
                "state": "CA",
                "postal_code": "94105",
                "country": "US"
            },
            "amount_cents": amount_cents
        })
    }

    /// Creates an order for `product_id` and returns its payment intent id.
    pub async fn create_order(&self, product_id: Uuid, amount_cents: i64) -> (Uuid, String) {
        let response = self
            .post(
                "/api/orders/create",
                self.order_payload(product_id, amount_cents),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        let order_id = body["order_id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("order id");
        let intent_id = body["payment_intent"]["id"]
            .as_str()
            .expect("intent id")
            .to_string();
        (order_id, intent_id)
    }

    pub async fn confirm(&self, intent_id: &str, card_number: &str) -> Response {
        self.post(
            "/api/orders/confirm",
            json!({
                "payment_intent_id": intent_id,
                "payment_method": { "card": card(card_number) }
            }),
        )
        .await
    }

    pub async fn product(&self, product_id: Uuid) -> Product {
        use singleshop_api::repositories::ShopRepository;
        self.store
            .find_product_by_id(product_id)
            .await
            .expect("product lookup")
            .expect("product exists")
    }
}

pub fn card(number: &str) -> Value {
    json!({
        "number": number,
        "exp_month": 12,
        "exp_year": 2099,
        "cvc": "123"
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
