/**
 * TRANSPORT MQTT DES CIBLES
 *
 * Topics :
 * - symbion/inspect/request@v1/{target_id}  coordinateur → cible (ReportRequest)
 * - symbion/inspect/report@v1               cible → coordinateur (Report)
 * - symbion/inspect/register@v1             cible → coordinateur (TargetAnnouncement)
 *
 * FONCTIONNEMENT :
 * - Une seule tâche poll l'EventLoop (spawn_mqtt_listener) ; elle ne doit
 *   jamais attendre la file du client, sinon plus rien ne la vide
 * - Le dispatcher attend sa place dans la file (publish().await) pendant que
 *   le listener la vide, et refuse tout de suite quand le broker est absent
 */

use crate::config::MqttConf;
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::models::{Report, ReportRequest, TargetAnnouncement, TargetId};
use crate::runtime::CoordinatorHandle;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub const REQUEST_TOPIC_PREFIX: &str = "symbion/inspect/request@v1";
pub const REPORT_TOPIC: &str = "symbion/inspect/report@v1";
pub const REGISTER_TOPIC: &str = "symbion/inspect/register@v1";

const REQUEST_CAPACITY: usize = 64;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub fn request_topic(target: &TargetId) -> String {
    format!("{REQUEST_TOPIC_PREFIX}/{target}")
}

pub fn create_mqtt_client(conf: &MqttConf) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(&conf.client_id, &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(15));
    AsyncClient::new(opts, REQUEST_CAPACITY)
}

/// État de la connexion au broker, tenu à jour par le listener
#[derive(Debug, Clone, Default)]
pub struct BrokerStatus {
    connected: Arc<AtomicBool>,
}

impl BrokerStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

/// Dispatcher qui publie les demandes de rapport sur le topic de chaque cible
#[derive(Clone)]
pub struct MqttDispatcher {
    client: AsyncClient,
    status: BrokerStatus,
}

impl MqttDispatcher {
    pub fn new(client: AsyncClient, status: BrokerStatus) -> Self {
        Self { client, status }
    }
}

#[async_trait]
impl Dispatcher for MqttDispatcher {
    async fn request_report(&self, target: &TargetId, _reply_to: &CoordinatorHandle) -> Result<(), DispatchError> {
        let failed = |reason: String| DispatchError { target: target.clone(), reason };

        // hors connexion la demande dormirait dans la file jusqu'au retour du broker
        if !self.status.is_connected() {
            return Err(failed("broker not connected".into()));
        }

        // les réponses reviennent sur REPORT_TOPIC, routé vers le handle par le listener
        let request = ReportRequest::new(REPORT_TOPIC);
        let payload = serde_json::to_vec(&request).map_err(|e| failed(e.to_string()))?;

        let publish = self.client.publish(request_topic(target), QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(failed(e.to_string())),
            Err(_) => return Err(failed("request queue still full, publish timed out".into())),
        }

        debug!(target_id = %target, request_id = %request.request_id, "report request published");
        Ok(())
    }
}

/// Message entrant décodé depuis un publish MQTT
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Report(Report),
    Register(TargetId),
}

/// Décode un publish ; `None` si topic inconnu ou JSON invalide
pub fn route_publish(topic: &str, payload: &[u8]) -> Option<Inbound> {
    match topic {
        REPORT_TOPIC => match serde_json::from_slice::<Report>(payload) {
            Ok(report) => Some(Inbound::Report(report)),
            Err(e) => {
                warn!(error = %e, "invalid report JSON");
                None
            }
        },
        REGISTER_TOPIC => match serde_json::from_slice::<TargetAnnouncement>(payload) {
            Ok(announce) => Some(Inbound::Register(announce.target_id)),
            Err(e) => {
                warn!(error = %e, "invalid registration JSON");
                None
            }
        },
        _ => None,
    }
}

/// Écoute les rapports et annonces des cibles et les pousse dans la boîte du coordinateur
pub fn spawn_mqtt_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    coordinator: CoordinatorHandle,
    status: BrokerStatus,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    // (ré)abonnement à chaque connexion, la session n'est pas persistante
                    info!("MQTT connected, subscribing to inspection topics");
                    status.set_connected(true);
                    spawn_subscriptions(client.clone());
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    let delivered = match route_publish(&p.topic, &p.payload) {
                        Some(Inbound::Report(report)) => coordinator.report_received(report),
                        Some(Inbound::Register(target)) => coordinator.register_target(target),
                        None => Ok(()),
                    };
                    if delivered.is_err() {
                        info!("coordinator stopped, MQTT listener exiting");
                        status.set_connected(false);
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    status.set_connected(false);
                    error!(error = ?e, "MQTT connection error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    })
}

/// subscribe() attend une place dans la file du client, que seul le poll de
/// l'EventLoop libère : on s'abonne donc depuis une tâche à part
fn spawn_subscriptions(client: AsyncClient) {
    task::spawn(async move {
        for topic in [REPORT_TOPIC, REGISTER_TOPIC] {
            if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                error!(topic, error = ?e, "subscribe failed");
            }
        }
    });
}
