use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use procurement_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("loading configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Build services over one shared state manager
    let store = Arc::new(api::store::StateManager::new());
    let services = api::handlers::AppServices::new(
        store.clone(),
        Some(event_sender),
        api::services::monitor::MonitorSettings::from(&cfg),
    );

    if cfg.seed_demo_data {
        if let Err(e) = api::services::seed_demo_data(&services.materials, &services.p2p).await {
            warn!("Failed to seed demo data: {}", e);
        }
    }

    if cfg.metrics_collection_interval_secs > 0 {
        tokio::spawn(sample_system_metrics(
            services.monitor.clone(),
            Duration::from_secs(cfg.metrics_collection_interval_secs),
        ));
    }

    if !cfg.should_allow_permissive_cors() && cfg.cors_origins().is_empty() {
        error!("No CORS origins configured; cross-origin requests will be refused");
    }

    let addr = cfg.bind_address();
    let app_state = api::AppState {
        config: Arc::new(cfg),
        services,
        store,
    };

    let access_logger = api::logging::setup_logger(api::logging::LoggerConfig::default());
    let app = api::build_router(app_state, access_logger);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("procurement-api listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("procurement-api stopped");
    Ok(())
}

async fn sample_system_metrics(monitor: Arc<api::services::MonitorService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = monitor.collect_current_metrics().await {
            warn!("Failed to collect system metrics: {}", e);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
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
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
}
