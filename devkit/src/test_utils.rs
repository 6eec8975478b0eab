/*!
Test Harness pour le coordinateur d'inspection

Facilite l'écriture de tests avec:
- Câblage automatique des doublures (reporter, dispatcher, scheduler)
- Lancement de la boîte aux lettres et attente de conditions
- Construction de rapports de test
- Capture des logs émis pendant un test
*/

use crate::dispatch_stub::RecordingDispatcher;
use crate::reporter_stub::MockReporter;
use crate::scheduler_stub::ManualScheduler;
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use symbion_inspector::{
    spawn_coordinator, CoordinatorHandle, InspectionCoordinator, InspectionError, InspectionOptions, Report,
    TargetId,
};
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Harness de test complet pour le coordinateur
pub struct TestHarness {
    pub reporter: MockReporter,
    pub dispatcher: RecordingDispatcher,
    pub scheduler: ManualScheduler,
    pub options: InspectionOptions,
}

impl TestHarness {
    pub fn new() -> Self {
        // logs visibles avec RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            reporter: MockReporter::new(),
            dispatcher: RecordingDispatcher::new(),
            scheduler: ManualScheduler::new(),
            options: InspectionOptions::default(),
        }
    }

    /// Coordinateur câblé sur les doublures du harness
    pub fn coordinator(&self) -> InspectionCoordinator {
        InspectionCoordinator::new(
            self.options.clone(),
            Arc::new(self.reporter.clone()),
            Arc::new(self.dispatcher.clone()),
            Arc::new(self.scheduler.clone()),
        )
    }

    /// Lance la boîte aux lettres avec les cibles données, sans la démarrer
    pub fn spawn_with_targets(
        &self,
        targets: &[&str],
    ) -> Result<(CoordinatorHandle, JoinHandle<Result<(), InspectionError>>)> {
        let (handle, task) = spawn_coordinator(self.coordinator());
        for target in targets {
            handle.register_target(*target)?;
        }
        Ok((handle, task))
    }

    /// Déclenche un tick et attend que le cycle soit traité
    pub async fn fire_and_settle(&self, handle: &CoordinatorHandle) -> Result<()> {
        self.scheduler.fire()?;
        settle(handle).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Attend que toutes les commandes déjà en file (et celles qu'elles ont
/// provoquées) soient traitées : un aller-retour de requête suffit, deux pour
/// les réponses émises pendant un cycle.
pub async fn settle(handle: &CoordinatorHandle) -> Result<()> {
    handle.query_snapshot().await?;
    handle.query_snapshot().await?;
    Ok(())
}

/// Attend qu'une condition devienne vraie (polling 10ms)
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Construit un rapport de test
pub fn report(target: &str, payload: Value) -> Report {
    Report::new(TargetId::new(target), payload)
}

/// Logs capturés en texte brut, niveau debug inclus
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Installe un subscriber de capture pour le thread courant, tant que le
/// guard vit (runtime `current_thread` des `#[tokio::test]`)
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_harness_basic_cycle() {
        let harness = TestHarness::new();
        harness.dispatcher.respond_for("a", json!({"ok": true}));

        let (handle, _task) = harness.spawn_with_targets(&["a", "b"]).unwrap();
        handle.start().unwrap();
        settle(&handle).await.unwrap();
        assert!(harness.scheduler.is_scheduled());

        harness.fire_and_settle(&handle).await.unwrap();

        assert_eq!(harness.reporter.push_count(), 1);
        assert_eq!(harness.dispatcher.requested_targets(), vec![TargetId::new("a"), TargetId::new("b")]);

        let snapshot = handle.query_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&TargetId::new("a")].payload, json!({"ok": true}));
    }

    #[test]
    fn test_capture_logs() {
        let (logs, _guard) = capture_logs();
        tracing::debug!(target_id = "nas", "target silent");
        tracing::warn!("no targets configured");

        assert!(logs.contains("target silent"));
        assert!(logs.contains("no targets configured"));
        assert!(logs.contains("WARN"));
    }

    #[tokio::test]
    async fn test_wait_until() {
        let mut calls = 0;
        let ok = wait_until(500, || {
            calls += 1;
            let done = calls >= 3;
            async move { done }
        })
        .await;
        assert!(ok);
    }
}
