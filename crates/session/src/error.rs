//! Fehlertypen fuer die Sitzungsschicht

use thiserror::Error;

/// Fehlertyp fuer die Sitzungsschicht
#[derive(Debug, Error)]
pub enum SessionFehler {
    /// Die Ereignisschleife des Koordinators laeuft nicht mehr
    #[error("Koordinator nicht erreichbar")]
    KoordinatorWeg,
}

/// Result-Typ fuer die Sitzungsschicht
pub type SessionResult<T> = Result<T, SessionFehler>;
