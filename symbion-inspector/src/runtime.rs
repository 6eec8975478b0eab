/**
 * RUNTIME - Boîte aux lettres du coordinateur
 *
 * RÔLE :
 * Une tâche tokio possède l'InspectionCoordinator et traite les commandes
 * une par une depuis un canal mpsc. C'est ce qui garantit l'écrivain unique
 * sur le registre et le store, sans Mutex.
 *
 * FONCTIONNEMENT :
 * - CoordinatorHandle = adresse clonable du coordinateur (pas de singleton global)
 * - Pendant le push d'un cycle, les commandes suivantes attendent dans le canal
 * - Erreur fatale d'un cycle → la tâche se termine avec cette erreur,
 *   le superviseur (main) décide de la suite
 */

use crate::coordinator::InspectionCoordinator;
use crate::error::InspectionError;
use crate::models::{CycleOutcome, Report, Snapshot, TargetId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum Command {
    Start(CoordinatorHandle),
    Stop,
    RegisterTarget(TargetId),
    Inspect,
    Report(Report),
    QuerySnapshot(oneshot::Sender<Snapshot>),
    ListTargets(oneshot::Sender<Vec<TargetId>>),
}

#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

/// Crée un couple adresse / boîte aux lettres
pub fn mailbox() -> (CoordinatorHandle, mpsc::UnboundedReceiver<Command>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CoordinatorHandle { tx }, rx)
}

impl CoordinatorHandle {
    fn send(&self, command: Command) -> Result<(), InspectionError> {
        self.tx.send(command).map_err(|_| InspectionError::MailboxClosed)
    }

    pub fn start(&self) -> Result<(), InspectionError> {
        self.send(Command::Start(self.clone()))
    }

    pub fn stop(&self) -> Result<(), InspectionError> {
        self.send(Command::Stop)
    }

    pub fn register_target(&self, target: impl Into<TargetId>) -> Result<(), InspectionError> {
        self.send(Command::RegisterTarget(target.into()))
    }

    /// Déclenchement d'un cycle (envoyé par le scheduler)
    pub fn inspect(&self) -> Result<(), InspectionError> {
        self.send(Command::Inspect)
    }

    pub fn report_received(&self, report: Report) -> Result<(), InspectionError> {
        self.send(Command::Report(report))
    }

    pub async fn query_snapshot(&self) -> Result<Snapshot, InspectionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::QuerySnapshot(tx))?;
        rx.await.map_err(|_| InspectionError::MailboxClosed)
    }

    pub async fn targets(&self) -> Result<Vec<TargetId>, InspectionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ListTargets(tx))?;
        rx.await.map_err(|_| InspectionError::MailboxClosed)
    }
}

/// Lance la tâche du coordinateur, retourne son adresse et son JoinHandle
pub fn spawn_coordinator(
    coordinator: InspectionCoordinator,
) -> (CoordinatorHandle, JoinHandle<Result<(), InspectionError>>) {
    let (handle, rx) = mailbox();
    let task = tokio::spawn(run_mailbox(coordinator, rx));
    (handle, task)
}

/// Arrêt propre : envoie Stop, relâche `handle` et attend la fin de la boîte.
///
/// La boîte ne se ferme qu'une fois toutes les adresses relâchées : les autres
/// détenteurs (listener, API) doivent être arrêtés avant. Retourne `false` si
/// la tâche n'a pas fini dans le délai.
pub async fn shutdown(
    handle: CoordinatorHandle,
    supervisor: JoinHandle<Result<(), InspectionError>>,
    timeout: Duration,
) -> bool {
    if let Err(e) = handle.stop() {
        debug!(error = %e, "mailbox already closed");
    }
    drop(handle);

    match tokio::time::timeout(timeout, supervisor).await {
        Ok(Ok(Ok(()))) => {
            info!("coordinator stopped cleanly");
            true
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "coordinator ended with an error during shutdown");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "coordinator task panicked during shutdown");
            false
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "coordinator did not stop in time");
            false
        }
    }
}

/// Boucle de traitement ; se termine quand plus personne ne détient d'adresse
/// ou sur échec fatal d'un cycle
pub async fn run_mailbox(
    mut coordinator: InspectionCoordinator,
    mut rx: mpsc::UnboundedReceiver<Command>,
) -> Result<(), InspectionError> {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Start(address) => {
                if let Err(e) = coordinator.start(address) {
                    warn!(error = %e, "start ignored");
                }
            }
            Command::Stop => {
                if let Err(e) = coordinator.stop() {
                    warn!(error = %e, "stop ignored");
                }
            }
            Command::RegisterTarget(target) => {
                coordinator.register_target(target);
            }
            Command::Inspect => {
                if !coordinator.is_running() {
                    // tick parti avant l'annulation
                    debug!(state = ?coordinator.state(), "trigger ignored");
                    continue;
                }
                match coordinator.run_cycle().await {
                    Ok(CycleOutcome::NoTargets) => {}
                    Ok(CycleOutcome::Completed { pushed, requested }) => {
                        debug!(pushed, requested, "inspection cycle completed");
                    }
                    Ok(CycleOutcome::Degraded { requested, reason }) => {
                        debug!(requested, reason = %reason, "inspection cycle degraded");
                    }
                    Err(e) => {
                        error!(error = %e, "inspection cycle failed");
                        if let Err(stop_err) = coordinator.stop() {
                            debug!(error = %stop_err, "schedule already cancelled");
                        }
                        return Err(e);
                    }
                }
            }
            Command::Report(report) => coordinator.report_received(report),
            Command::QuerySnapshot(reply) => {
                let _ = reply.send(coordinator.query_snapshot());
            }
            Command::ListTargets(reply) => {
                let _ = reply.send(coordinator.targets());
            }
        }
    }

    info!("all coordinator handles dropped, mailbox closed");
    Ok(())
}
