//! Roster – die lokale Sicht auf die Teilnehmer des Raums
//!
//! Spiegelt exakt die Ereignisse des Rendezvous-Dienstes; lokale Heuristiken
//! gibt es nicht. Jede Mutation benachrichtigt Abonnenten mit einem frischen
//! Schnappschuss der gesamten Liste.
//!
//! Die Tabelle gehoert exklusiv dem Koordinator und wird nur aus dessen
//! Ereignisschleife mutiert; deshalb eine gewoehnliche HashMap statt
//! nebenlaeufiger Strukturen.

use std::collections::HashMap;

use huddle_core::types::{Participant, PeerId, Presence};
use tokio::sync::broadcast;

/// Groesse des Broadcast-Kanals fuer Roster-Schnappschuesse
const SCHNAPPSCHUSS_KANAL_GROESSE: usize = 64;

/// Die Teilnehmerliste des Raums (ohne den lokalen Teilnehmer)
pub struct Roster {
    teilnehmer: HashMap<PeerId, Participant>,
    selbst: Option<PeerId>,
    schnappschuss_tx: broadcast::Sender<Vec<Participant>>,
}

impl Roster {
    pub fn neu() -> Self {
        let (schnappschuss_tx, _) = broadcast::channel(SCHNAPPSCHUSS_KANAL_GROESSE);
        Self {
            teilnehmer: HashMap::new(),
            selbst: None,
            schnappschuss_tx,
        }
    }

    /// Eigene Peer-ID, sobald der Dienst sie zugewiesen hat
    pub fn selbst(&self) -> Option<&PeerId> {
        self.selbst.as_ref()
    }

    pub fn anzahl(&self) -> usize {
        self.teilnehmer.len()
    }

    pub fn enthaelt(&self, id: &PeerId) -> bool {
        self.teilnehmer.contains_key(id)
    }

    pub fn teilnehmer(&self, id: &PeerId) -> Option<&Participant> {
        self.teilnehmer.get(id)
    }

    /// Schnappschuss aller Teilnehmer, nach Benutzername sortiert
    pub fn alle(&self) -> Vec<Participant> {
        let mut liste: Vec<Participant> = self.teilnehmer.values().cloned().collect();
        liste.sort_by(|a, b| a.username.cmp(&b.username));
        liste
    }

    /// Abonniert Roster-Schnappschuesse (einer pro Mutation)
    pub fn abonnieren(&self) -> broadcast::Receiver<Vec<Participant>> {
        self.schnappschuss_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Mutationen
    // -----------------------------------------------------------------------

    /// Ersetzt die gesamte Liste (users-list beim Beitritt)
    pub fn ersetzen(&mut self, teilnehmer: Vec<Participant>, selbst: PeerId) {
        self.teilnehmer = teilnehmer
            .into_iter()
            .filter(|p| p.id != selbst)
            .map(|p| (p.id.clone(), p))
            .collect();
        self.selbst = Some(selbst);
        tracing::info!("Roster ersetzt: {} Teilnehmer", self.teilnehmer.len());
        self.benachrichtigen();
    }

    /// Fuegt einen Teilnehmer ein oder aktualisiert ihn (user-joined)
    pub fn einfuegen(&mut self, teilnehmer: Participant) {
        tracing::info!("Teilnehmer beigetreten: {}", teilnehmer.username);
        self.teilnehmer
            .insert(teilnehmer.id.clone(), teilnehmer);
        self.benachrichtigen();
    }

    /// Entfernt einen Teilnehmer (user-left)
    pub fn entfernen(&mut self, id: &PeerId) -> Option<Participant> {
        let entfernt = self.teilnehmer.remove(id);
        if let Some(ref p) = entfernt {
            tracing::info!("Teilnehmer gegangen: {}", p.username);
            self.benachrichtigen();
        }
        entfernt
    }

    /// Aktualisiert den Status eines Teilnehmers. Unbekannte ID: No-op.
    pub fn status_aktualisieren(&mut self, id: &PeerId, status: Presence) {
        match self.teilnehmer.get_mut(id) {
            Some(teilnehmer) => {
                teilnehmer.status = status;
                self.benachrichtigen();
            }
            None => tracing::debug!("Status-Update fuer unbekannten Teilnehmer {}", id),
        }
    }

    /// Leert die Liste (Teardown)
    pub fn leeren(&mut self) {
        if self.teilnehmer.is_empty() && self.selbst.is_none() {
            return;
        }
        self.teilnehmer.clear();
        self.selbst = None;
        self.benachrichtigen();
    }

    fn benachrichtigen(&self) {
        // Kein Abonnent ist kein Fehler
        let _ = self.schnappschuss_tx.send(self.alle());
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
