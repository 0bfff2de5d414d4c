//! Fehlertypen fuer die Peer-Link-Verwaltung

use thiserror::Error;

/// Fehlertyp fuer die Peer-Link-Verwaltung
#[derive(Debug, Error)]
pub enum MeshFehler {
    /// Die Medienprimitive hat einen Verhandlungsschritt abgelehnt
    #[error("Medienfehler ({peer}): {grund}")]
    Media { peer: String, grund: String },

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl MeshFehler {
    /// Erstellt einen Medienfehler fuer einen bestimmten Peer
    pub fn media(peer: impl std::fmt::Display, grund: impl Into<String>) -> Self {
        Self::Media {
            peer: peer.to_string(),
            grund: grund.into(),
        }
    }
}

impl From<MeshFehler> for huddle_core::HuddleError {
    fn from(e: MeshFehler) -> Self {
        match e {
            MeshFehler::Media { peer, grund } => {
                huddle_core::HuddleError::Verhandlung { peer, grund }
            }
            MeshFehler::Intern(msg) => huddle_core::HuddleError::Intern(msg),
        }
    }
}

/// Result-Typ fuer die Peer-Link-Verwaltung
pub type MeshResult<T> = Result<T, MeshFehler>;
