use crate::error::DispatchError;
use crate::models::TargetId;
use crate::runtime::CoordinatorHandle;
use async_trait::async_trait;

/// Remise d'une demande de rapport à une cible, sans attendre de réponse.
///
/// `reply_to` est l'adresse du coordinateur : un transport en mémoire peut
/// répondre directement dessus, un transport réseau fait transiter la réponse
/// par son propre canal (voir `mqtt::spawn_mqtt_listener`) qui finit sur le
/// même handle.
///
/// La remise peut attendre une place dans la file du transport, jamais la
/// réponse de la cible.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn request_report(&self, target: &TargetId, reply_to: &CoordinatorHandle) -> Result<(), DispatchError>;
}
