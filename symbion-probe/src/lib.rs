//! Symbion Probe - target side of the inspection protocol
//!
//! A probe owns one target identity. On every MQTT (re)connection it announces
//! itself on the registration topic and subscribes to its own request topic;
//! each incoming request is answered with a fresh report published on the
//! request's `reply_to` topic. What goes into the report is up to the
//! [`StateSource`].

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde_json::Value;
use std::time::Duration;
use symbion_inspector::mqtt::{request_topic, REGISTER_TOPIC};
use symbion_inspector::{Report, ReportRequest, TargetAnnouncement, TargetId};
use tracing::{debug, error, info, warn};

/// Probe configuration, read from the environment
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub target_id: TargetId,
    pub mqtt_host: String,
    pub mqtt_port: u16,
}

impl ProbeConfig {
    /// `SYMBION_PROBE_ID` (falls back to `default_id`), `SYMBION_MQTT_HOST`, `SYMBION_MQTT_PORT`
    pub fn from_env(default_id: &str) -> Self {
        let target_id = std::env::var("SYMBION_PROBE_ID").unwrap_or_else(|_| default_id.to_string());
        let mqtt_host = std::env::var("SYMBION_MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
        let mqtt_port = std::env::var("SYMBION_MQTT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1883);

        Self { target_id: TargetId::new(target_id), mqtt_host, mqtt_port }
    }
}

/// Produces the opaque state payload sent back to the coordinator
pub trait StateSource: Send {
    fn collect(&mut self) -> Value;
}

impl<F> StateSource for F
where
    F: FnMut() -> Value + Send,
{
    fn collect(&mut self) -> Value {
        self()
    }
}

/// Decodes a request and builds the reply: (topic, payload)
pub fn answer_request(
    target_id: &TargetId,
    request: &[u8],
    source: &mut dyn StateSource,
) -> Result<(String, Vec<u8>)> {
    let request: ReportRequest = serde_json::from_slice(request).context("invalid report request")?;
    let report = Report::new(target_id.clone(), source.collect());
    let payload = serde_json::to_vec(&report).context("failed to serialize report")?;
    debug!(request_id = %request.request_id, "answering report request");
    Ok((request.reply_to, payload))
}

pub fn announcement(target_id: &TargetId) -> Result<Vec<u8>> {
    serde_json::to_vec(&TargetAnnouncement { target_id: target_id.clone() })
        .context("failed to serialize announcement")
}

/// Runs the probe until the task is dropped. Connection errors are logged
/// and retried; subscribe/announce failures are logged and retried on the
/// next connection.
pub async fn run_probe<S: StateSource>(config: ProbeConfig, mut source: S) {
    let client_id = format!("symbion-probe-{}", config.target_id);
    let mut opts = MqttOptions::new(client_id, &config.mqtt_host, config.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(30));
    opts.set_clean_session(true);
    let (client, mut eventloop) = AsyncClient::new(opts, 10);

    let own_topic = request_topic(&config.target_id);
    info!(target_id = %config.target_id, topic = %own_topic, "probe starting");

    // Only this loop drains the client queue, so nothing in it may await the queue.
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                let client = client.clone();
                let target_id = config.target_id.clone();
                let own_topic = own_topic.clone();
                tokio::spawn(async move {
                    if let Err(e) = on_connect(&client, &target_id, &own_topic).await {
                        error!("Probe registration failed: {:#}", e);
                    }
                });
            }
            Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == own_topic => {
                match answer_request(&config.target_id, &p.payload, &mut source) {
                    Ok((reply_to, payload)) => {
                        let client = client.clone();
                        tokio::spawn(async move {
                            if let Err(e) = client.publish(reply_to, QoS::AtLeastOnce, false, payload).await {
                                error!("Failed to publish report: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("Ignoring request: {:#}", e),
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
