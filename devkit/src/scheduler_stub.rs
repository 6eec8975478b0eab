/*!
Scheduler manuel : aucun timer, le test déclenche les cycles à la main
*/

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use symbion_inspector::{CancelHandle, CoordinatorHandle, InspectionError, Scheduler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCall {
    pub delay: Duration,
    pub interval: Duration,
}

#[derive(Clone, Default)]
pub struct ManualScheduler {
    calls: Arc<Mutex<Vec<ScheduledCall>>>,
    target: Arc<Mutex<Option<CoordinatorHandle>>>,
    cancelled: Arc<AtomicBool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simule un tick : envoie un déclenchement au coordinateur planifié.
    /// Sans effet une fois annulé, comme un vrai timer.
    pub fn fire(&self) -> Result<bool, InspectionError> {
        if self.is_cancelled() {
            return Ok(false);
        }
        match self.target.lock().as_ref() {
            Some(target) => target.inspect().map(|_| true),
            None => Ok(false),
        }
    }

    pub fn calls(&self) -> Vec<ScheduledCall> {
        self.calls.lock().clone()
    }

    pub fn is_scheduled(&self) -> bool {
        self.target.lock().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, delay: Duration, interval: Duration, target: CoordinatorHandle) -> CancelHandle {
        self.calls.lock().push(ScheduledCall { delay, interval });
        *self.target.lock() = Some(target);
        self.cancelled.store(false, Ordering::SeqCst);

        let cancelled = self.cancelled.clone();
        let target = self.target.clone();
        CancelHandle::new(move || {
            cancelled.store(true, Ordering::SeqCst);
            // relâche l'adresse pour ne pas garder la boîte aux lettres ouverte
            target.lock().take();
        })
    }
}
