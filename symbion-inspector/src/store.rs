use crate::models::{Report, Snapshot, TargetId};

/// Dernier rapport reçu par cible (last-write-wins, aucune éviction)
#[derive(Debug, Default, Clone)]
pub struct ReportStore {
    reports: Snapshot,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Écrase sans condition le rapport précédent de la même cible
    pub fn upsert(&mut self, report: Report) -> Option<Report> {
        self.reports.insert(report.target_id.clone(), report)
    }

    pub fn get(&self, target: &TargetId) -> Option<&Report> {
        self.reports.get(target)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Valeurs seules, dans l'ordre de la map (indéfini)
    pub fn reports(&self) -> Vec<Report> {
        self.reports.values().cloned().collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.reports.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_store_snapshot() {
        let store = ReportStore::new();
        assert!(store.snapshot().is_empty());
        assert!(store.reports().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = ReportStore::new();
        let r1 = Report::new("a", json!({"seq": 1}));
        let r2 = Report::new("a", json!({"seq": 2}));

        assert!(store.upsert(r1.clone()).is_none());
        assert_eq!(store.upsert(r2.clone()), Some(r1));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&TargetId::new("a")), Some(&r2));
    }

    #[test]
    fn test_one_slot_per_target() {
        let mut store = ReportStore::new();
        store.upsert(Report::new("a", json!(1)));
        store.upsert(Report::new("b", json!(2)));
        store.upsert(Report::new("a", json!(3)));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&TargetId::new("a")].payload, json!(3));
        assert_eq!(snapshot[&TargetId::new("b")].payload, json!(2));
    }
}
