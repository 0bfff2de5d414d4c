//! Zustand eines einzelnen Peer-Links

use huddle_core::types::PeerId;
use huddle_protocol::IceKandidat;

/// Verhandlungszustand eines Peer-Links
///
/// Anrufer:  `Neu -> LokalesAngebot -> Verbunden`
/// Answerer: `Neu -> EntferntesAngebot -> Verbunden`
/// Jeder Zustand kann nach `Geschlossen` wechseln.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerhandlungsZustand {
    Neu,
    LokalesAngebot,
    EntferntesAngebot,
    Verbunden,
    Geschlossen,
}

/// Ein Link zu genau einem Peer
///
/// Pro Peer-ID existiert hoechstens eine Instanz, verwaltet vom
/// `PeerLinkManager`. Fruehe ICE-Kandidaten werden hier gepuffert bis die
/// entfernte Beschreibung gesetzt ist.
pub struct PeerLink<V> {
    peer: PeerId,
    zustand: VerhandlungsZustand,
    verbindung: V,
    remote_beschreibung_gesetzt: bool,
    wartende_kandidaten: Vec<IceKandidat>,
}

impl<V> PeerLink<V> {
    pub(crate) fn neu(peer: PeerId, verbindung: V) -> Self {
        Self {
            peer,
            zustand: VerhandlungsZustand::Neu,
            verbindung,
            remote_beschreibung_gesetzt: false,
            wartende_kandidaten: Vec::new(),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn zustand(&self) -> VerhandlungsZustand {
        self.zustand
    }

    pub fn remote_beschreibung_gesetzt(&self) -> bool {
        self.remote_beschreibung_gesetzt
    }

    /// Anzahl der noch nicht angewandten, gepufferten Kandidaten
    pub fn wartende_kandidaten(&self) -> usize {
        self.wartende_kandidaten.len()
    }

    pub(crate) fn verbindung(&self) -> &V {
        &self.verbindung
    }

    pub(crate) fn zustand_setzen(&mut self, zustand: VerhandlungsZustand) {
        self.zustand = zustand;
    }

    pub(crate) fn remote_beschreibung_markieren(&mut self) {
        self.remote_beschreibung_gesetzt = true;
    }

    pub(crate) fn kandidat_puffern(&mut self, kandidat: IceKandidat) {
        self.wartende_kandidaten.push(kandidat);
    }

    /// Entnimmt alle gepufferten Kandidaten in Eintreffreihenfolge
    pub(crate) fn kandidaten_entnehmen(&mut self) -> Vec<IceKandidat> {
        std::mem::take(&mut self.wartende_kandidaten)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
