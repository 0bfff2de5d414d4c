//! Abstraktion der Medienverhandlungsprimitive
//!
//! Der `PeerLinkManager` kennt weder webrtc noch Netzwerk, nur diese
//! Schnittstelle. Die produktive Implementierung liegt in huddle-media,
//! Tests verwenden Mocks.

use async_trait::async_trait;
use huddle_core::types::PeerId;
use huddle_protocol::{IceKandidat, SessionDescription};
use tokio::sync::mpsc;

use crate::error::MeshResult;

/// Asynchrone Ereignisse einer laufenden Medienverbindung
///
/// Die Implementierung liefert sie ueber den beim Erstellen uebergebenen
/// mpsc-Sender in die Ereignisschleife des Koordinators. Spaete Ereignisse
/// fuer bereits geschlossene Links verwirft der Manager per Tabellen-Lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEreignis {
    /// Lokal generierter ICE-Kandidat, gehoert an den Peer relayt
    KandidatGeneriert {
        peer: PeerId,
        kandidat: IceKandidat,
    },
    /// Der entfernte Audio-Track ist eingetroffen
    TrackEmpfangen { peer: PeerId },
    /// Der Transport steht
    Verbunden { peer: PeerId },
    /// Der Transport ist gescheitert oder weggebrochen
    Getrennt { peer: PeerId },
}

/// Eine einzelne Medienverbindung zu genau einem Peer
///
/// Der lokale Audio-Track wird von der Fabrik beim Erstellen angehaengt.
#[async_trait]
pub trait MediaVerbindung: Send + Sync {
    /// Erstellt ein Offer und setzt es als lokale Beschreibung
    async fn offer_erstellen(&self) -> MeshResult<SessionDescription>;

    /// Setzt das entfernte Offer, erstellt ein Answer und setzt es als
    /// lokale Beschreibung
    async fn answer_erstellen(&self, offer: SessionDescription) -> MeshResult<SessionDescription>;

    /// Setzt die entfernte Beschreibung (Answer im Anrufer-Fluss)
    async fn remote_description_setzen(&self, sdp: SessionDescription) -> MeshResult<()>;

    /// Fuegt einen entfernten ICE-Kandidaten hinzu
    async fn kandidat_hinzufuegen(&self, kandidat: IceKandidat) -> MeshResult<()>;

    /// Gibt alle Transport-Ressourcen frei. Idempotent.
    async fn schliessen(&self);
}

/// Erstellt Medienverbindungen
#[async_trait]
pub trait MediaFabrik: Send + Sync {
    type Verbindung: MediaVerbindung + Send + Sync + 'static;

    /// Erstellt eine neue Verbindung zum angegebenen Peer
    ///
    /// Ereignisse der Verbindung (Kandidaten, Tracks, Transportzustand)
    /// laufen ueber den uebergebenen Sender.
    async fn verbindung_erstellen(
        &self,
        peer: PeerId,
        ereignisse: mpsc::Sender<MediaEreignis>,
    ) -> MeshResult<Self::Verbindung>;
}
