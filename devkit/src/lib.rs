/*!
# Symbion DevKit - Doublures et utilitaires de test pour l'Inspector

Bibliothèque facilitant les tests du coordinateur d'inspection avec:
- Reporter scripté (succès / indisponible / rejet) sans collecteur réel
- Dispatcher enregistreur simulant des cibles qui répondent ou non
- Scheduler manuel (ticks déclenchés par le test)
- Broker MQTT minimal pour tester le transport réel
- Harness qui câble le tout
*/

pub mod broker_stub;
pub mod dispatch_stub;
pub mod reporter_stub;
pub mod scheduler_stub;
pub mod test_utils;

pub use broker_stub::{FakeBroker, ReceivedPublish};
pub use dispatch_stub::RecordingDispatcher;
pub use reporter_stub::MockReporter;
pub use scheduler_stub::{ManualScheduler, ScheduledCall};
pub use test_utils::{capture_logs, report, settle, wait_until, LogCapture, TestHarness};
