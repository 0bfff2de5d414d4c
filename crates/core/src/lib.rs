//! huddle-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Huddle-Crates gemeinsam genutzt werden: Teilnehmer-Identitaet,
//! Praesenz-Status und der zentrale Fehler-Enum.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HuddleError, Result};
pub use types::{Participant, PeerId, Presence};
