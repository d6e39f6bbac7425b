use crate::registry::ConnectionId;
use crate::store::StoreError;

/// Erreurs du relais ; toutes sont contenues à la connexion ou au message fautif
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Trame illisible (JSON invalide, binaire non UTF-8) : ignorée, connexion conservée
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// JSON lisible mais échantillon invalide : ignoré, connexion conservée
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),
    /// Le stockage a refusé l'écriture ; le fan-out continue quand même
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
    #[error("connection {0} did not answer the liveness probe")]
    ProbeTimeout(ConnectionId),
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    /// Erreurs de trame : abandon silencieux, aucune réponse à l'émetteur
    pub fn is_dropped_frame(&self) -> bool {
        matches!(self, RelayError::MalformedMessage(_) | RelayError::InvalidTelemetry(_))
    }
}
