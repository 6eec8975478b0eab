use crate::models::TargetId;
use std::collections::HashSet;

/// Ensemble des cibles connues du coordinateur.
/// Croît uniquement : pas de désinscription.
#[derive(Debug, Default, Clone)]
pub struct TargetSet {
    targets: HashSet<TargetId>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute une cible, retourne `false` si elle était déjà présente
    pub fn register(&mut self, target: TargetId) -> bool {
        self.targets.insert(target)
    }

    pub fn contains(&self, target: &TargetId) -> bool {
        self.targets.contains(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetId> {
        self.targets.iter()
    }

    /// Liste triée, pour l'API et les logs
    pub fn sorted(&self) -> Vec<TargetId> {
        let mut list: Vec<TargetId> = self.targets.iter().cloned().collect();
        list.sort();
        list
    }
}
