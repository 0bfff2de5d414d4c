//! huddle-session – Roster und Sitzungs-Koordinator
//!
//! Herzstueck des Clients: der Koordinator fuehrt die Sitzung durch ihren
//! Lebenszyklus (Leerlauf -> MikrofonAnfordern -> KanalVerbinden -> Aktiv
//! -> Verlassen -> Leerlauf) und haelt Roster und Peer-Mesh konsistent.
//!
//! ## Architektur
//!
//! ```text
//! SitzungsGriff (Absichten: beitreten/verlassen/stumm/beenden)
//!     |
//!     v                eine mpsc-Warteschlange
//! Koordinator  <---  KanalEreignis (huddle-signaling)
//!     |        <---  MediaEreignis (huddle-mesh)
//!     |        <---  SprachEreignis (huddle-media)
//!     |
//!     +-- Roster             (Teilnehmerliste, Broadcast an Abonnenten)
//!     +-- PeerLinkManager    (ein Link pro Roster-Peer)
//!     +-- MediaQuelle        (Mikrofon, Stumm-Flag)
//!     +-- SitzungsMeldungen  (Zustandswechsel, Fehler, Trennung)
//! ```
//!
//! Jedes Ereignis wird vollstaendig verarbeitet bevor das naechste beginnt;
//! Roster und Link-Tabelle sind nie halb aktualisiert sichtbar.

pub mod ereignis;
pub mod error;
pub mod koordinator;
pub mod roster;

// Bequeme Re-Exporte
pub use ereignis::{Absicht, SitzungsEreignis, SitzungsMeldung, SitzungsZustand};
pub use error::{SessionFehler, SessionResult};
pub use koordinator::{Koordinator, SitzungsGriff};
pub use roster::Roster;
