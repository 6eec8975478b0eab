use crate::models::TargetId;

/// Échec du push vers le collecteur distant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// Seul cas toléré par le cycle d'inspection
    #[error("collector unavailable: {0}")]
    Unavailable(String),
    #[error("collector rejected push (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl PushError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PushError::Unavailable(_))
    }
}

/// Échec de remise d'une demande de rapport à une cible
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to deliver report request to {target}: {reason}")]
pub struct DispatchError {
    pub target: TargetId,
    pub reason: String,
}

/// Erreurs du coordinateur et de sa boîte aux lettres
#[derive(Debug, thiserror::Error)]
pub enum InspectionError {
    #[error("push failed: {0}")]
    Push(#[from] PushError),
    #[error("inspection already started")]
    AlreadyStarted,
    #[error("inspection not running")]
    NotRunning,
    #[error("coordinator mailbox closed")]
    MailboxClosed,
}
