/**
 * SYMBION INSPECTOR - Point d'entrée du coordinateur d'inspection
 *
 * RÔLE : Assemble config, collecteur HTTP, transport MQTT des cibles,
 * scheduler et API REST autour du coordinateur.
 *
 * SUPERVISION : si un cycle échoue de façon fatale (push refusé par le
 * collecteur, autre que "indisponible"), le process sort en erreur et
 * compte sur systemd / le runtime conteneur pour redémarrer.
 */

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use symbion_inspector::config::load_config;
use symbion_inspector::http::{build_router, AppState};
use symbion_inspector::mqtt::{create_mqtt_client, spawn_mqtt_listener, BrokerStatus, MqttDispatcher};
use symbion_inspector::{shutdown, spawn_coordinator, HttpReporter, InspectionCoordinator, TokioScheduler};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("symbion_inspector=info")),
        )
        .init();

    let cfg = load_config().await;

    let reporter = HttpReporter::new(&cfg.collector).context("failed to build collector client")?;
    let (mqtt_client, eventloop) = create_mqtt_client(&cfg.mqtt);
    let broker = BrokerStatus::default();

    let coordinator = InspectionCoordinator::new(
        cfg.inspection.clone(),
        Arc::new(reporter),
        Arc::new(MqttDispatcher::new(mqtt_client.clone(), broker.clone())),
        Arc::new(TokioScheduler::new()),
    );
    let (handle, mut supervisor) = spawn_coordinator(coordinator);

    for target in &cfg.targets {
        handle.register_target(target.clone())?;
    }
    info!(targets = cfg.targets.len(), collector = %cfg.collector.url, "configured targets loaded");

    let listener_task = spawn_mqtt_listener(mqtt_client, eventloop, handle.clone(), broker);
    handle.start()?;

    if cfg.http.api_key.is_none() {
        warn!("http.api_key not set, query API is open");
    }
    let app = build_router(AppState { coordinator: handle.clone(), api_key: cfg.http.api_key.clone() });
    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.bind))?;
    info!("listening on http://{}", cfg.http.bind);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let outcome = tokio::select! {
        res = &mut supervisor => {
            match res.context("coordinator task panicked")? {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!(error = %e, "coordinator stopped on fatal error");
                    Err(anyhow::Error::new(e).context("inspection coordinator failed"))
                }
            }
        }
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");

            // listener et API détiennent aussi une adresse
            listener_task.abort();
            server.abort();
            shutdown(handle, supervisor, SHUTDOWN_TIMEOUT).await;
            return Ok(());
        }
    };

    listener_task.abort();
    server.abort();
    outcome
}
