//! huddle-media – Lokale Medienquelle und Verhandlungsprimitive
//!
//! Zwei Aufgaben:
//! - Mikrofon-Capture via cpal hinter einer erfassen/freigeben/stumm-
//!   Oberflaeche, inklusive RMS-Sprecherkennung mit Hysterese
//! - Die produktive `MediaFabrik`-Implementierung auf Basis des
//!   webrtc-Crates (Offer/Answer/ICE, Audio-Tracks)
//!
//! Stummschalten ist ein lokales Flag im Capture-Pfad; Frames werden an
//! der Quelle verworfen, es findet keine Neuverhandlung statt.

pub mod erfassung;
pub mod error;
pub mod pegel;
pub mod quelle;
pub mod webrtc_verbindung;

// Bequeme Re-Exporte
pub use erfassung::{ErfassungsKonfig, ErfassungsKonsument, ErfassungsStrom};
pub use error::{MediaFehler, MediaResult};
pub use pegel::{rms_pegel, SprachDetektor};
pub use quelle::{LokaleMediaQuelle, MediaQuelle, SprachEreignis};
pub use webrtc_verbindung::{WebrtcFabrik, WebrtcKonfig, WebrtcVerbindung};
