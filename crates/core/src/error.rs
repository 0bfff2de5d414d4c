//! Fehlertypen fuer Huddle
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Huddle
pub type Result<T> = std::result::Result<T, HuddleError>;

/// Alle moeglichen Fehler im Huddle-System
#[derive(Debug, Error)]
pub enum HuddleError {
    // --- Medien ---
    #[error("Mikrofonzugriff verweigert: {0}")]
    MikrofonVerweigert(String),

    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Signalisierungskanal ---
    #[error("Kanal nicht verfuegbar: {0}")]
    KanalNichtVerfuegbar(String),

    #[error("Kanal getrennt: {0}")]
    Getrennt(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Peer-Verhandlung ---
    #[error("Verhandlung fehlgeschlagen ({peer}): {grund}")]
    Verhandlung { peer: String, grund: String },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HuddleError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler den Beitrittsversuch endgueltig beendet
    pub fn ist_fatal_fuer_beitritt(&self) -> bool {
        matches!(
            self,
            Self::MikrofonVerweigert(_) | Self::KanalNichtVerfuegbar(_)
        )
    }
}
