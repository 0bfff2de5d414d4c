//! Ereignis- und Zustandstypen der Sitzung

use huddle_core::types::{Participant, PeerId};
use huddle_media::SprachEreignis;
use huddle_mesh::MediaEreignis;
use huddle_signaling::KanalEreignis;

/// Lebenszyklus-Zustand der Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitzungsZustand {
    /// Nicht im Raum, keine Ressourcen
    Leerlauf,
    /// Mikrofon wird beschafft
    MikrofonAnfordern,
    /// Kanal wird aufgebaut, join gesendet, users-list steht aus
    KanalVerbinden,
    /// Im Raum, Mesh wird gehalten
    Aktiv,
    /// Teardown laeuft
    Verlassen,
}

/// Benutzer-Absichten an den Koordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Absicht {
    Beitreten { username: String },
    Verlassen,
    StummSetzen(bool),
    /// Beendet die Ereignisschleife (nach einem Teardown falls noetig)
    Beenden,
}

/// Alles was die Ereignisschleife des Koordinators verarbeitet
///
/// Eine einzige Warteschlange: Absichten, Kanal-, Media- und
/// Sprachereignisse werden strikt nacheinander abgearbeitet.
#[derive(Debug)]
pub enum SitzungsEreignis {
    Absicht(Absicht),
    /// Kanalereignis samt Generation der Verbindung die es erzeugt hat.
    /// Ereignisse alter Verbindungen werden verworfen statt einer neuen
    /// Sitzung zugerechnet.
    Kanal {
        generation: u64,
        ereignis: KanalEreignis,
    },
    Media(MediaEreignis),
    Sprache(SprachEreignis),
}

/// Meldungen des Koordinators an die Aussenwelt (UI, Aufnahme, ...)
#[derive(Debug, Clone, PartialEq)]
pub enum SitzungsMeldung {
    ZustandGewechselt(SitzungsZustand),
    /// Beitritt abgeschlossen, eigene ID steht fest
    RaumBetreten {
        selbst: PeerId,
        teilnehmer: Vec<Participant>,
    },
    /// Selbst gewaehltes Verlassen ist abgeschlossen
    RaumVerlassen,
    /// Die Verbindung ist unerwartet weggebrochen; aufgeraeumt wurde trotzdem
    Getrennt { grund: String },
    /// Beitritt oder Betrieb fehlgeschlagen
    Fehler(String),
    /// Audio eines Peers ist eingetroffen
    TrackEmpfangen { peer: PeerId },
}
