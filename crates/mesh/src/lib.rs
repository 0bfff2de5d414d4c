//! huddle-mesh – Peer-Link-Verwaltung
//!
//! Dieses Crate haelt das Voll-Mesh der direkten Medienverbindungen
//! konsistent: pro Roster-Peer genau ein `PeerLink`, Verhandlung ueber
//! Offer/Answer/ICE, fruehe Kandidaten werden gepuffert.
//!
//! ## Architektur
//!
//! ```text
//! PeerLinkManager<F: MediaFabrik>
//!     |  links: PeerId -> PeerLink        (genau einer pro Peer)
//!     |
//!     +-- link_sicherstellen        (idempotent)
//!     +-- als_anrufer_initiieren    (Neuling ruft Bestand an, nie umgekehrt)
//!     +-- offer_verarbeiten         (Answerer-Fluss)
//!     +-- answer_verarbeiten        (Anrufer-Fluss, veraltete verwerfen)
//!     +-- ice_kandidat_verarbeiten  (puffern bis Remote-Beschreibung steht)
//!     +-- link_schliessen / alle_schliessen
//!
//! MediaFabrik / MediaVerbindung  – Abstraktion der Verhandlungsprimitive,
//!                                  produktiv via webrtc (huddle-media),
//!                                  in Tests via Mock
//! ```

pub mod error;
pub mod link;
pub mod manager;
pub mod media;

// Bequeme Re-Exporte
pub use error::{MeshFehler, MeshResult};
pub use link::{PeerLink, VerhandlungsZustand};
pub use manager::PeerLinkManager;
pub use media::{MediaEreignis, MediaFabrik, MediaVerbindung};
