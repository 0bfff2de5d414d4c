//! Fehlertypen fuer den Signalisierungskanal

use thiserror::Error;

/// Fehlertyp fuer den Signalisierungskanal
#[derive(Debug, Error)]
pub enum KanalFehler {
    /// Verbindungsaufbau zum Rendezvous-Dienst fehlgeschlagen
    #[error("Verbindungsaufbau fehlgeschlagen: {0}")]
    Verbindungsaufbau(String),

    /// WebSocket-Fehler (Transport)
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Umschlag konnte nicht serialisiert werden
    #[error("Serialisierungsfehler: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Kanal wurde bereits geschlossen
    #[error("Kanal geschlossen")]
    Geschlossen,
}

impl From<KanalFehler> for huddle_core::HuddleError {
    fn from(e: KanalFehler) -> Self {
        huddle_core::HuddleError::KanalNichtVerfuegbar(e.to_string())
    }
}

/// Result-Typ fuer den Signalisierungskanal
pub type KanalResult<T> = Result<T, KanalFehler>;
