use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use singleshop_api as api;
use api::common::EMAIL_DECISIONS;
use api::repositories::{InMemoryStore, RecordStores};
use api::services::notifications::MockEmailService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();
    api::metrics::register();

    // Unsupported or misconfigured providers stop start-up here
    let payment_provider = api::services::payments::build_payment_provider(&cfg)
        .context("failed to initialise payment provider")?;

    let store = Arc::new(InMemoryStore::new());
    let seed = if cfg.seed_demo_data {
        let seed = store.seed_demo().context("failed to seed demo data")?;
        info!(
            shop_id = %seed.shop_id,
            product_id = %seed.product_id,
            "Seeded demo shop"
        );
        Some(seed)
    } else {
        None
    };

    if let Some(seed) = cfg.simulation_seed {
        info!(seed, "Simulated payment and email outcomes are seeded");
    }
    let notifier = Arc::new(
        MockEmailService::new(cfg.notification_failure_rate)
            .with_decision_source(cfg.decision_source(EMAIL_DECISIONS))
            .with_latency(cfg.mock_email_latency()),
    );
    let services = api::handlers::AppServices::new(
        &cfg,
        RecordStores::in_memory(store),
        payment_provider,
        notifier,
    );

    if let Some(seed) = seed.filter(|_| cfg.is_development()) {
        match services.auth.issue_token(seed.seller_id, &seed.seller_email) {
            Ok(token) => info!(seller = %seed.seller_email, %token, "Demo seller token"),
            Err(err) => warn!(error = %err, "Could not issue demo seller token"),
        }
    }

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let app = api::app_router(api::AppState::new(cfg, services));

    info!("singleshop-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
