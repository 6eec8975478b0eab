/*!
Mock Remote Reporter pour tester sans collecteur

Enregistre chaque push reçu et rejoue des résultats scriptés
(succès par défaut, ou échecs empilés avec `fail_next_with`).
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use symbion_inspector::{PushError, RemoteReporter, Report};

#[derive(Clone, Default)]
pub struct MockReporter {
    pushes: Arc<Mutex<Vec<Vec<Report>>>>,
    script: Arc<Mutex<VecDeque<PushError>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Le prochain push échouera avec `err` (file FIFO)
    pub fn fail_next_with(&self, err: PushError) -> &Self {
        self.script.lock().push_back(err);
        self
    }

    pub fn fail_next_unavailable(&self) -> &Self {
        self.fail_next_with(PushError::Unavailable("collector down".into()))
    }

    /// Tous les pushs reçus, dans l'ordre
    pub fn pushes(&self) -> Vec<Vec<Report>> {
        self.pushes.lock().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().len()
    }

    pub fn last_push(&self) -> Option<Vec<Report>> {
        self.pushes.lock().last().cloned()
    }
}

#[async_trait]
impl RemoteReporter for MockReporter {
    async fn push(&self, reports: Vec<Report>) -> Result<(), PushError> {
        tracing::debug!("[MOCK] push of {} reports", reports.len());
        self.pushes.lock().push(reports);
        match self.script.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
