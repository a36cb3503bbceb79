use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use zigbridge::api::{create_router, ApiState};
use zigbridge::bridge::Bridge;
use zigbridge::clients::ClientRegistry;
use zigbridge::config::load_from_env;
use zigbridge::delivery::Dispatcher;
use zigbridge::engine::{run_janitor, DecisionEngine};
use zigbridge::inventory::DeviceDirectory;
use zigbridge::mqtt::run_listener;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zigbridge=info".into()),
        )
        .init();

    info!("Zigbridge starting...");

    let config = load_from_env().context("Failed to load configuration")?;
    info!(
        mqtt_host = %config.mqtt.host,
        mqtt_port = config.mqtt.port,
        base_topic = %config.mqtt.base_topic,
        device_port = config.http.device_port,
        inventory_port = config.http.inventory_port,
        change_ttl_seconds = config.engine.change_ttl_seconds,
        response_ttl_seconds = config.engine.response_ttl_seconds,
        pending_max_age_seconds = config.engine.pending_max_age_seconds,
        "Configuration loaded"
    );

    let clients = Arc::new(ClientRegistry::load(&config.clients));
    let directory = Arc::new(DeviceDirectory::new());
    let engine = Arc::new(DecisionEngine::new(config.engine.clone()));
    let dispatcher = Dispatcher::new(config.http.clone(), Arc::clone(&clients))?;
    let bridge = Arc::new(Bridge::new(
        config.mqtt.base_topic.clone(),
        Arc::clone(&engine),
        Arc::clone(&directory),
        Arc::clone(&clients),
    ));

    let janitor_handle = tokio::spawn(run_janitor(
        Arc::clone(&engine),
        config.engine.janitor_interval(),
    ));

    let server_handle = if config.api.enabled {
        let router = create_router(ApiState {
            engine: Arc::clone(&engine),
            clients: Arc::clone(&clients),
            directory: Arc::clone(&directory),
        });
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
            .await
            .context("Failed to bind status API port")?;
        info!(port = config.api.port, "Status API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "Status API server error");
            }
        }))
    } else {
        None
    };

    let mqtt_handle = tokio::spawn(run_listener(config.mqtt.clone(), bridge, dispatcher));

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    mqtt_handle.abort();
    janitor_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!(stats = ?engine.stats(), "Zigbridge stopped");

    Ok(())
}
