//! Gemeinsame Datentypen fuer Huddle
//!
//! `PeerId` verwendet das Newtype-Pattern um Verwechslungen mit anderen
//! String-Werten zur Compilezeit auszuschliessen. IDs werden ausschliesslich
//! vom Rendezvous-Dienst vergeben, niemals lokal erzeugt.

use serde::{Deserialize, Serialize};

/// Eindeutige Teilnehmer-ID, vergeben vom Rendezvous-Dienst
///
/// Der Wert ist opak; ausser Gleichheit und Hashing wird nichts garantiert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Gibt den inneren String zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Praesenz-Status eines Teilnehmers im Raum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Online,
    Speaking,
    Muted,
}

/// Ein Teilnehmer im Raum, wie vom Rendezvous-Dienst gemeldet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PeerId,
    pub username: String,
    pub status: Presence,
}

impl Participant {
    pub fn neu(id: impl Into<PeerId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            status: Presence::Online,
        }
    }
}
