//! Fehlertypen fuer die Medienschicht

use thiserror::Error;

/// Alle moeglichen Fehler der Medienschicht
#[derive(Debug, Error)]
pub enum MediaFehler {
    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Mikrofonzugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("WebRTC-Fehler: {0}")]
    Webrtc(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl From<MediaFehler> for huddle_core::HuddleError {
    fn from(e: MediaFehler) -> Self {
        match e {
            MediaFehler::KeinStandardEingabegeraet | MediaFehler::ZugriffVerweigert(_) => {
                huddle_core::HuddleError::MikrofonVerweigert(e.to_string())
            }
            andere => huddle_core::HuddleError::Audio(andere.to_string()),
        }
    }
}

pub type MediaResult<T> = Result<T, MediaFehler>;
