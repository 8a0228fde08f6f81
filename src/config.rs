use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::common::{DecisionSource, SeededSource, ThreadRngSource};
use crate::services::payments::card::{CardOutcome, TestCardTable};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYMENT_PROVIDER: &str = "mock";
const DEFAULT_RECEIPT_BASE_URL: &str = "https://mock-receipts.singleshop.com/receipt";
const DEFAULT_ONBOARDING_BASE_PATH: &str = "/mock-onboarding";
const DEFAULT_DASHBOARD_REDIRECT: &str = "/dashboard?onboarding=complete";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(custom = "validate_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Secret used to sign and verify seller bearer tokens
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Seller token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Active payment provider: "mock" or "stripe"
    #[serde(default = "default_payment_provider")]
    #[validate(custom = "validate_payment_provider")]
    pub payment_provider: String,

    /// Secret key for the real gateway (required when it is selected)
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Share of well-formed, non-test cards the mock gateway declines
    #[serde(default = "default_decline_rate")]
    #[validate(custom = "validate_rate")]
    pub mock_decline_rate: f64,

    /// Simulated gateway latency in milliseconds
    #[serde(default)]
    pub mock_gateway_latency_ms: u64,

    /// Replaces the built-in test-card table when set
    #[serde(default)]
    pub mock_test_cards: Option<HashMap<String, CardOutcome>>,

    /// Upper bound on a single payment gateway call
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(range(min = 1))]
    pub gateway_timeout_secs: u64,

    /// Share of simulated email sends that fail
    #[serde(default = "default_notification_failure_rate")]
    #[validate(custom = "validate_rate")]
    pub notification_failure_rate: f64,

    /// Simulated email send latency in milliseconds
    #[serde(default)]
    pub mock_email_latency_ms: u64,

    /// Seeds the simulated decline and email-failure draws for reproducible runs
    #[serde(default)]
    pub simulation_seed: Option<u64>,

    /// Base URL for generated receipt links
    #[serde(default = "default_receipt_base_url")]
    pub receipt_base_url: String,

    /// Path prefix for generated onboarding links
    #[serde(default = "default_onboarding_base_path")]
    pub onboarding_base_path: String,

    /// Where sellers land after completing onboarding
    #[serde(default = "default_dashboard_redirect")]
    pub dashboard_redirect: String,

    /// Whole-request timeout applied at the HTTP layer
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Comma separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Seeds a demo seller, shop and product on start-up
    #[serde(default)]
    pub seed_demo_data: bool,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(host: String, port: u16, environment: String, jwt_secret: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            payment_provider: default_payment_provider(),
            stripe_secret_key: None,
            mock_decline_rate: default_decline_rate(),
            mock_gateway_latency_ms: 0,
            mock_test_cards: None,
            gateway_timeout_secs: default_gateway_timeout_secs(),
            notification_failure_rate: default_notification_failure_rate(),
            mock_email_latency_ms: 0,
            simulation_seed: None,
            receipt_base_url: default_receipt_base_url(),
            onboarding_base_path: default_onboarding_base_path(),
            dashboard_redirect: default_dashboard_redirect(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_allowed_origins: None,
            seed_demo_data: false,
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn mock_gateway_latency(&self) -> Duration {
        Duration::from_millis(self.mock_gateway_latency_ms)
    }

    pub fn mock_email_latency(&self) -> Duration {
        Duration::from_millis(self.mock_email_latency_ms)
    }

    /// Randomness for one simulated collaborator. With `simulation_seed` set,
    /// each `stream` gets its own reproducible sequence.
    pub fn decision_source(&self, stream: u64) -> Arc<dyn DecisionSource> {
        match self.simulation_seed {
            Some(seed) => Arc::new(SeededSource::new(seed.wrapping_add(stream))),
            None => Arc::new(ThreadRngSource),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn jwt_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration)
    }

    /// The configured test-card table, or the documented default one.
    pub fn test_card_table(&self) -> TestCardTable {
        match &self.mock_test_cards {
            Some(cards) => TestCardTable::from(cards.clone()),
            None => TestCardTable::default(),
        }
    }

    /// Parsed CORS origins, empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let stripe_selected = self.payment_provider.eq_ignore_ascii_case("stripe");
        let has_stripe_key = self
            .stripe_secret_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        if stripe_selected && !has_stripe_key {
            let mut err = ValidationError::new("stripe_secret_key_required");
            err.message =
                Some("Set APP__STRIPE_SECRET_KEY when APP__PAYMENT_PROVIDER=stripe".into());
            errors.add("stripe_secret_key", err);
        }

        if !self.is_development() && self.cors_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message =
                Some("Set APP__CORS_ALLOWED_ORIGINS for non-development environments".into());
            errors.add("cors_allowed_origins", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_jwt_expiration() -> u64 {
    3600
}
fn default_payment_provider() -> String {
    DEFAULT_PAYMENT_PROVIDER.to_string()
}
fn default_decline_rate() -> f64 {
    0.1
}
fn default_gateway_timeout_secs() -> u64 {
    10
}
fn default_notification_failure_rate() -> f64 {
    0.05
}
fn default_receipt_base_url() -> String {
    DEFAULT_RECEIPT_BASE_URL.to_string()
}
fn default_onboarding_base_path() -> String {
    DEFAULT_ONBOARDING_BASE_PATH.to_string()
}
fn default_dashboard_redirect() -> String {
    DEFAULT_DASHBOARD_REDIRECT.to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}

fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        let mut err = ValidationError::new("port");
        err.message = Some("port must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const DISALLOWED: [&str; 3] = ["changeme", "your-secret-key", "default-secret-key"];
    let lower = secret.trim().to_ascii_lowercase();
    if DISALLOWED.iter().any(|bad| lower.contains(bad)) {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }
    Ok(())
}

fn validate_payment_provider(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "mock" | "stripe" => Ok(()),
        _ => {
            let mut err = ValidationError::new("payment_provider");
            err.message = Some("Must be one of: mock, stripe".into());
            Err(err)
        }
    }
}

fn validate_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 || rate > 1.0 {
        let mut err = ValidationError::new("rate");
        err.message = Some("rate must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("singleshop_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration from `./config` and the environment.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{dir}/default.*`
/// 3. `{dir}/{RUN_ENV}.*`
/// 4. Environment variables (`APP__*`)
pub fn load_config_from(dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET.
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a random string of at least 32 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        payment_provider = %app_config.payment_provider,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
