//! Symbion Inspector - coordinateur d'inspection périodique
//!
//! Demande régulièrement leur état aux cibles enregistrées, garde le dernier
//! rapport de chacune et pousse le snapshot accumulé vers un collecteur distant.
//!
//! - [`coordinator`] : machine d'état du cycle (push puis rafraîchissement)
//! - [`runtime`] : boîte aux lettres mono-tâche + [`CoordinatorHandle`]
//! - [`scheduler`], [`reporter`], [`dispatch`] : collaborateurs injectés
//! - [`mqtt`], [`http`] : transports cibles et API de consultation

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod models;
pub mod mqtt;
pub mod registry;
pub mod reporter;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use config::{InspectionOptions, InspectorConfig};
pub use coordinator::{InspectionCoordinator, LifecycleState};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, InspectionError, PushError};
pub use models::{CycleOutcome, Report, ReportRequest, Snapshot, TargetAnnouncement, TargetId};
pub use reporter::{HttpReporter, RemoteReporter};
pub use runtime::{shutdown, spawn_coordinator, CoordinatorHandle};
pub use scheduler::{CancelHandle, Scheduler, TokioScheduler};
