//! huddle-signaling – WebSocket-Signalisierungskanal
//!
//! Dieses Crate implementiert die persistente Verbindung zum
//! Rendezvous-Dienst. Eingehende Umschlaege und Verbindungsereignisse
//! werden ueber einen mpsc-Kanal an den Koordinator geliefert; gesendet
//! wird ueber die `SignalKanal`-Schnittstelle.
//!
//! ## Architektur
//!
//! ```text
//! WebSocketKanalFabrik::verbinden(ereignisse)
//!     |
//!     v
//! WebSocketKanal
//!     |  Lese-Task: Draht -> SignalingEnvelope -> KanalEreignis
//!     |  senden():  SignalingEnvelope -> JSON -> Draht
//!     v
//! Koordinator (huddle-session), eine Ereignisschleife
//! ```

pub mod error;
pub mod kanal;
pub mod websocket;

// Bequeme Re-Exporte
pub use error::{KanalFehler, KanalResult};
pub use kanal::{KanalEreignis, SignalKanal, SignalKanalFabrik};
pub use websocket::{WebSocketKanal, WebSocketKanalFabrik};
