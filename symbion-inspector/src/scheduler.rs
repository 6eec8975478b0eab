//! Planification des déclenchements d'inspection.
//!
//! Le coordinateur ne connaît que le trait [`Scheduler`] : en production
//! [`TokioScheduler`] s'appuie sur les timers tokio, en test on injecte un
//! scheduler manuel qui déclenche les cycles à la demande.

use crate::runtime::CoordinatorHandle;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Jeton d'annulation retourné par [`Scheduler::schedule_repeating`]
pub struct CancelHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CancelHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Stoppe les déclenchements futurs
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

pub trait Scheduler: Send + Sync {
    /// Envoie un déclenchement à `target` après `delay`, puis toutes les `interval`
    fn schedule_repeating(
        &self,
        delay: Duration,
        interval: Duration,
        target: CoordinatorHandle,
    ) -> CancelHandle;
}

#[derive(Debug, Default, Clone)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(
        &self,
        delay: Duration,
        interval: Duration,
        target: CoordinatorHandle,
    ) -> CancelHandle {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!("inspection schedule cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if target.inspect().is_err() {
                            debug!("coordinator gone, stopping schedule");
                            break;
                        }
                    }
                }
            }
        });

        CancelHandle::new(move || {
            let _ = cancel_tx.send(());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{mailbox, Command};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cancel_handle_runs_once() {
        let flag = Arc::new(AtomicBool::new(false));
        let f = flag.clone();
        let handle = CancelHandle::new(move || f.store(true, Ordering::SeqCst));
        assert!(!flag.load(Ordering::SeqCst));
        handle.cancel();
        assert!(flag.load(Ordering::SeqCst));
    }

    fn drain_inspects(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Command>) -> usize {
        let mut count = 0;
        while let Ok(cmd) = rx.try_recv() {
            if matches!(cmd, Command::Inspect) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay_then_every_interval() {
        let (handle, mut rx) = mailbox();
        let cancel = TokioScheduler::new().schedule_repeating(
            Duration::from_millis(5000),
            Duration::from_millis(1000),
            handle,
        );

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(drain_inspects(&mut rx), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(drain_inspects(&mut rx), 1);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(drain_inspects(&mut rx), 3);

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drain_inspects(&mut rx);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(drain_inspects(&mut rx), 0);
    }
}
