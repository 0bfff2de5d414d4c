//! Abstraktion des Signalisierungskanals
//!
//! Der Koordinator haengt nicht direkt an tokio-tungstenite sondern an
//! dieser Schnittstelle. Tests ersetzen den echten WebSocket durch eine
//! Mock-Implementierung.

use async_trait::async_trait;
use huddle_protocol::SignalingEnvelope;
use tokio::sync::mpsc;

use crate::error::KanalResult;

/// Ereignisse die der Kanal an den Koordinator liefert
#[derive(Debug, Clone, PartialEq)]
pub enum KanalEreignis {
    /// Ein Umschlag vom Rendezvous-Dienst
    Nachricht(SignalingEnvelope),
    /// Die Verbindung ist weg, gleich ob Dienst-seitig geschlossen oder
    /// Transportfehler. Der Koordinator behandelt beides identisch.
    Getrennt { grund: String },
}

/// Sende-Seite eines verbundenen Signalisierungskanals
#[async_trait]
pub trait SignalKanal: Send + Sync {
    /// Sendet einen Umschlag an den Rendezvous-Dienst
    async fn senden(&self, umschlag: SignalingEnvelope) -> KanalResult<()>;

    /// Schliesst die Verbindung ordentlich. Idempotent.
    async fn schliessen(&self) -> KanalResult<()>;
}

/// Baut Verbindungen zum Rendezvous-Dienst auf
///
/// Eingehende Umschlaege und das Trennungs-Ereignis laufen ueber den
/// uebergebenen mpsc-Sender in die Ereignisschleife des Koordinators.
#[async_trait]
pub trait SignalKanalFabrik: Send + Sync {
    type Kanal: SignalKanal + Send + Sync + 'static;

    async fn verbinden(
        &self,
        ereignisse: mpsc::Sender<KanalEreignis>,
    ) -> KanalResult<Self::Kanal>;
}
