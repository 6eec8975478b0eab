/*!
Dispatcher enregistreur, remplace le transport MQTT des cibles

- garde la trace de chaque demande de rapport émise
- peut simuler des cibles qui répondent immédiatement sur l'adresse du coordinateur
- peut simuler des cibles injoignables (remise en échec)
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use symbion_inspector::{CoordinatorHandle, DispatchError, Dispatcher, Report, TargetId};

#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    requests: Arc<Mutex<Vec<TargetId>>>,
    responders: Arc<Mutex<HashMap<TargetId, Value>>>,
    unreachable: Arc<Mutex<HashSet<TargetId>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// La cible répondra à chaque demande avec ce payload
    pub fn respond_for(&self, target: impl Into<TargetId>, payload: Value) {
        self.responders.lock().insert(target.into(), payload);
    }

    /// La remise vers cette cible échouera
    pub fn unreachable(&self, target: impl Into<TargetId>) {
        self.unreachable.lock().insert(target.into());
    }

    /// Demandes effectivement remises, dans l'ordre d'émission
    pub fn requests(&self) -> Vec<TargetId> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Demandes triées, l'ordre d'itération du registre étant indéfini
    pub fn requested_targets(&self) -> Vec<TargetId> {
        let mut list = self.requests();
        list.sort();
        list
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn request_report(&self, target: &TargetId, reply_to: &CoordinatorHandle) -> Result<(), DispatchError> {
        if self.unreachable.lock().contains(target) {
            return Err(DispatchError { target: target.clone(), reason: "[MOCK] unreachable".into() });
        }
        self.requests.lock().push(target.clone());

        let payload = self.responders.lock().get(target).cloned();
        if let Some(payload) = payload {
            // la réponse passe par la boîte aux lettres, traitée après le cycle en cours
            let _ = reply_to.report_received(Report::new(target.clone(), payload));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use symbion_inspector::runtime::{mailbox, Command};

    #[tokio::test]
    async fn test_records_and_replies() {
        let (handle, mut rx) = mailbox();
        let dispatcher = RecordingDispatcher::new();
        dispatcher.respond_for("a", json!({"up": true}));

        dispatcher.request_report(&TargetId::new("a"), &handle).await.unwrap();
        dispatcher.request_report(&TargetId::new("b"), &handle).await.unwrap();

        assert_eq!(dispatcher.requests(), vec![TargetId::new("a"), TargetId::new("b")]);
        match rx.try_recv() {
            Ok(Command::Report(report)) => assert_eq!(report.target_id, TargetId::new("a")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let (handle, _rx) = mailbox();
        let dispatcher = RecordingDispatcher::new();
        dispatcher.unreachable("ghost");

        assert!(dispatcher.request_report(&TargetId::new("ghost"), &handle).await.is_err());
        assert_eq!(dispatcher.request_count(), 0);
    }
}
