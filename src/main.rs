//! WasherCheck server: machine readings, locations and ready notifications over HTTP

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use washercheck::api::{create_app, AppState};
use washercheck::config::Config;
use washercheck::database::DatabaseManager;
use washercheck::io::{build_getter, http_client};
use washercheck::logging::{init_logging, log_startup};
use washercheck::models::grouping::Locations;
use washercheck::services::{
    LogNotifier, NotificationChecker, NotificationService, Notifier, RoomRefresher, SystemTimeProvider, TimeProvider,
    WebhookNotifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    init_logging(&config.log_level, config.is_production());
    log_startup();
    config.log_config();

    let db = DatabaseManager::new(&config.database_url).await?;
    db.migrate().await?;

    let getter = build_getter(&config).context("Unable to build machine source")?;
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider::new());

    let locations = match &config.locations_file {
        Some(path) => Locations::from_file(path).with_context(|| format!("Unable to load locations from {path:?}"))?,
        None => Locations::builtin()?,
    };
    info!(rooms = locations.rooms().len(), "Location tree loaded");

    let refresher = RoomRefresher::new(db.clone(), getter, time_provider.clone(), config.default_room_id);

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            http_client(config.request_timeout_duration())?,
            url.clone(),
        )),
        None => Arc::new(LogNotifier),
    };
    info!(notifier = notifier.name(), "Notifier ready");

    let notifications = NotificationService::new(db.clone(), refresher.clone(), notifier, time_provider.clone());

    let checker = NotificationChecker::new(
        notifications.clone(),
        time_provider,
        Duration::from_secs(config.min_check_interval),
        Duration::from_secs(config.max_check_interval),
    );
    tokio::spawn(checker.run());

    let state = AppState {
        db,
        refresher,
        notifications,
        locations: Arc::new(locations),
        cache_max_age: config.cache_max_age_duration(),
    };
    let app = create_app(state, &config.cors_origins);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Unable to bind {addr}"))?;
    info!(address = %addr, "WasherCheck listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("WasherCheck stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
