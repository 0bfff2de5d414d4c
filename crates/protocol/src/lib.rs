//! huddle-protocol – Signalisierungs-Protokoll
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Rendezvous-Dienst ueber die WebSocket-Verbindung ausgetauscht werden.

pub mod envelope;

pub use envelope::{IceKandidat, SessionDescription, SignalingEnvelope};
