use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Identité opaque d'une cible inspectée (ex: "nas-salon", "worker-3")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TargetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Rapport d'état envoyé par une cible.
/// Le coordinateur ne lit que `target_id`, le payload reste opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub target_id: TargetId,
    pub payload: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub reported_at: OffsetDateTime,
}

impl Report {
    pub fn new(target_id: impl Into<TargetId>, payload: serde_json::Value) -> Self {
        Self {
            target_id: target_id.into(),
            payload,
            reported_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Contenu du store à un instant donné
pub type Snapshot = HashMap<TargetId, Report>;

// Messages MQTT (coordinateur → cible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub request_id: Uuid,
    /// Topic sur lequel la cible doit publier son rapport
    pub reply_to: String,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
}

impl ReportRequest {
    pub fn new(reply_to: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            reply_to: reply_to.into(),
            requested_at: OffsetDateTime::now_utc(),
        }
    }
}

// Messages MQTT (cible → coordinateur)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAnnouncement {
    pub target_id: TargetId,
}

/// Résultat observable d'un cycle d'inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Aucune cible enregistrée, cycle sans effet
    NoTargets,
    /// Snapshot poussé puis demandes envoyées
    Completed { pushed: usize, requested: usize },
    /// Collecteur indisponible, demandes envoyées quand même
    Degraded { requested: usize, reason: String },
}
