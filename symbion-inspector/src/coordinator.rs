/**
 * INSPECTION COORDINATOR - Machine d'état du cycle d'inspection
 *
 * RÔLE :
 * Possède le registre des cibles et le store des rapports. Chaque cycle
 * pousse ce qu'on a déjà vers le collecteur, puis redemande un rapport à
 * toutes les cibles sans attendre les réponses.
 *
 * FONCTIONNEMENT :
 * - Created → Running (start) → Stopped (stop)
 * - Toutes les opérations sont appelées depuis une seule tâche (voir runtime.rs),
 *   donc aucun verrou sur les structures internes
 * - Push en échec "unavailable" : on continue le cycle (données périmées
 *   plutôt que cycle bloqué). Tout autre échec remonte tel quel.
 */

use crate::config::InspectionOptions;
use crate::dispatch::Dispatcher;
use crate::error::InspectionError;
use crate::models::{CycleOutcome, Report, Snapshot, TargetId};
use crate::registry::TargetSet;
use crate::reporter::RemoteReporter;
use crate::runtime::CoordinatorHandle;
use crate::scheduler::{CancelHandle, Scheduler};
use crate::store::ReportStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Lifecycle {
    Created,
    Running {
        address: CoordinatorHandle,
        schedule: CancelHandle,
    },
    Stopped,
}

/// État courant, exposé pour les logs et tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
}

pub struct InspectionCoordinator {
    options: InspectionOptions,
    targets: TargetSet,
    reports: ReportStore,
    reporter: Arc<dyn RemoteReporter>,
    dispatcher: Arc<dyn Dispatcher>,
    scheduler: Arc<dyn Scheduler>,
    lifecycle: Lifecycle,
}

impl InspectionCoordinator {
    pub fn new(
        options: InspectionOptions,
        reporter: Arc<dyn RemoteReporter>,
        dispatcher: Arc<dyn Dispatcher>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            options,
            targets: TargetSet::new(),
            reports: ReportStore::new(),
            reporter,
            dispatcher,
            scheduler,
            lifecycle: Lifecycle::Created,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.lifecycle {
            Lifecycle::Created => LifecycleState::Created,
            Lifecycle::Running { .. } => LifecycleState::Running,
            Lifecycle::Stopped => LifecycleState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// Démarre la planification ; `address` devient la cible des déclenchements
    /// et l'adresse de réponse des demandes de rapport
    pub fn start(&mut self, address: CoordinatorHandle) -> Result<(), InspectionError> {
        if !matches!(self.lifecycle, Lifecycle::Created) {
            return Err(InspectionError::AlreadyStarted);
        }

        let schedule = self.scheduler.schedule_repeating(
            self.options.startup_delay(),
            self.options.interval(),
            address.clone(),
        );
        self.lifecycle = Lifecycle::Running { address, schedule };

        info!(
            startup_delay_ms = self.options.startup_delay_ms,
            interval_ms = self.options.interval_ms,
            "inspection started"
        );
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), InspectionError> {
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { schedule, .. } => {
                schedule.cancel();
                info!("inspection stopped");
                Ok(())
            }
            previous => {
                self.lifecycle = previous;
                Err(InspectionError::NotRunning)
            }
        }
    }

    /// Retourne `true` si la cible est nouvelle
    pub fn register_target(&mut self, target: TargetId) -> bool {
        let added = self.targets.register(target.clone());
        if added {
            info!(target_id = %target, total = self.targets.len(), "target registered");
        }
        added
    }

    /// Accepté même pour une cible non enregistrée
    pub fn report_received(&mut self, report: Report) {
        debug!(target_id = %report.target_id, "report received");
        self.reports.upsert(report);
    }

    pub fn query_snapshot(&self) -> Snapshot {
        self.reports.snapshot()
    }

    pub fn targets(&self) -> Vec<TargetId> {
        self.targets.sorted()
    }

    /// Un cycle : push du snapshot puis demande de rafraîchissement à chaque cible
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, InspectionError> {
        let Lifecycle::Running { address, .. } = &self.lifecycle else {
            return Err(InspectionError::NotRunning);
        };

        if self.targets.is_empty() {
            warn!("no targets configured");
            return Ok(CycleOutcome::NoTargets);
        }

        let reports = self.reports.reports();
        let pushed = reports.len();
        let degraded = match self.reporter.push(reports).await {
            Ok(()) => None,
            Err(e) if e.is_unavailable() => {
                debug!(error = %e, "collector connection error");
                Some(e.to_string())
            }
            Err(e) => return Err(e.into()),
        };

        let mut requested = 0;
        for target in self.targets.iter() {
            match self.dispatcher.request_report(target, address).await {
                Ok(()) => requested += 1,
                Err(e) => warn!(error = %e, "report request not delivered"),
            }
        }

        Ok(match degraded {
            None => CycleOutcome::Completed { pushed, requested },
            Some(reason) => CycleOutcome::Degraded { requested, reason },
        })
    }
}
