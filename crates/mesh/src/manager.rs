//! Verwaltung aller Peer-Links eines Raums
//!
//! Der Manager besitzt die Tabelle `PeerId -> PeerLink` exklusiv und wird
//! ausschliesslich aus der Ereignisschleife des Koordinators angesprochen.
//! Kein Locking noetig; jede Operation laeuft bis zum Ende durch bevor die
//! naechste beginnt.

use std::collections::HashMap;

use huddle_core::types::PeerId;
use huddle_protocol::{IceKandidat, SessionDescription, SignalingEnvelope};
use tokio::sync::mpsc;

use crate::error::MeshResult;
use crate::link::{PeerLink, VerhandlungsZustand};
use crate::media::{MediaEreignis, MediaFabrik, MediaVerbindung};

/// Haelt das Voll-Mesh der Medienverbindungen konsistent
pub struct PeerLinkManager<F: MediaFabrik> {
    fabrik: F,
    links: HashMap<PeerId, PeerLink<F::Verbindung>>,
    media_ereignisse: mpsc::Sender<MediaEreignis>,
}

impl<F: MediaFabrik> PeerLinkManager<F> {
    pub fn neu(fabrik: F, media_ereignisse: mpsc::Sender<MediaEreignis>) -> Self {
        Self {
            fabrik,
            links: HashMap::new(),
            media_ereignisse,
        }
    }

    /// Anzahl aktiver Links
    pub fn anzahl(&self) -> usize {
        self.links.len()
    }

    /// Prueft ob fuer den Peer ein Link existiert
    pub fn enthaelt(&self, peer: &PeerId) -> bool {
        self.links.contains_key(peer)
    }

    /// Verhandlungszustand eines Links, falls vorhanden
    pub fn zustand(&self, peer: &PeerId) -> Option<VerhandlungsZustand> {
        self.links.get(peer).map(|l| l.zustand())
    }

    // -----------------------------------------------------------------------
    // Verhandlungs-Operationen
    // -----------------------------------------------------------------------

    /// Stellt sicher dass fuer den Peer ein Link existiert. Idempotent:
    /// ein bestehender Link bleibt unveraendert.
    pub async fn link_sicherstellen(&mut self, peer: PeerId) -> MeshResult<()> {
        if self.links.contains_key(&peer) {
            return Ok(());
        }
        let verbindung = self
            .fabrik
            .verbindung_erstellen(peer.clone(), self.media_ereignisse.clone())
            .await?;
        tracing::debug!("Neuer Peer-Link: {}", peer);
        self.links
            .insert(peer.clone(), PeerLink::neu(peer, verbindung));
        Ok(())
    }

    /// Startet die Verhandlung als Anrufer (Neuling ruft Bestand an)
    ///
    /// Liefert das Offer als versandfertigen Umschlag. Laeuft fuer den Peer
    /// bereits eine Verhandlung, passiert nichts (`None`).
    pub async fn als_anrufer_initiieren(
        &mut self,
        peer: PeerId,
    ) -> MeshResult<Option<SignalingEnvelope>> {
        self.link_sicherstellen(peer.clone()).await?;
        let link = match self.links.get_mut(&peer) {
            Some(l) => l,
            None => return Ok(None),
        };
        if link.zustand() != VerhandlungsZustand::Neu {
            tracing::warn!(
                "Initiierung fuer {} uebersprungen, Verhandlung laeuft bereits",
                peer
            );
            return Ok(None);
        }

        let offer = link.verbindung().offer_erstellen().await?;
        link.zustand_setzen(VerhandlungsZustand::LokalesAngebot);
        tracing::info!("Offer an {} erstellt", peer);
        Ok(Some(SignalingEnvelope::offer_an(peer, offer)))
    }

    /// Verarbeitet ein eingehendes Offer (Answerer-Fluss)
    ///
    /// Liefert das Answer als versandfertigen Umschlag.
    pub async fn offer_verarbeiten(
        &mut self,
        from: PeerId,
        offer: SessionDescription,
    ) -> MeshResult<SignalingEnvelope> {
        self.link_sicherstellen(from.clone()).await?;
        let link = match self.links.get_mut(&from) {
            Some(l) => l,
            None => {
                return Err(crate::error::MeshFehler::Intern(format!(
                    "Link fuer {} direkt nach Erstellung verschwunden",
                    from
                )))
            }
        };

        let answer = link.verbindung().answer_erstellen(offer).await?;
        link.remote_beschreibung_markieren();
        link.zustand_setzen(VerhandlungsZustand::EntferntesAngebot);
        tracing::info!("Answer an {} erstellt", from);

        Self::kandidaten_spuelen(link).await?;
        Ok(SignalingEnvelope::answer_an(from, answer))
    }

    /// Verarbeitet ein eingehendes Answer (Anrufer-Fluss)
    ///
    /// Ein Answer ohne zugehoerigen Link ist veraltet und wird verworfen.
    pub async fn answer_verarbeiten(
        &mut self,
        from: PeerId,
        answer: SessionDescription,
    ) -> MeshResult<()> {
        let link = match self.links.get_mut(&from) {
            Some(l) => l,
            None => {
                tracing::warn!("Veraltetes Answer von {} verworfen", from);
                return Ok(());
            }
        };
        if link.remote_beschreibung_gesetzt() {
            tracing::warn!("Doppeltes Answer von {} verworfen", from);
            return Ok(());
        }

        link.verbindung().remote_description_setzen(answer).await?;
        link.remote_beschreibung_markieren();
        tracing::debug!("Answer von {} angewandt", from);

        Self::kandidaten_spuelen(link).await?;
        Ok(())
    }

    /// Verarbeitet einen eingehenden ICE-Kandidaten
    ///
    /// Ohne Link: stillschweigend verwerfen (Peer laengst weg). Vor der
    /// entfernten Beschreibung: puffern. Danach: sofort anwenden.
    pub async fn ice_kandidat_verarbeiten(
        &mut self,
        from: PeerId,
        kandidat: IceKandidat,
    ) -> MeshResult<()> {
        let link = match self.links.get_mut(&from) {
            Some(l) => l,
            None => {
                tracing::debug!("Kandidat von {} ohne Link verworfen", from);
                return Ok(());
            }
        };

        if link.remote_beschreibung_gesetzt() {
            link.verbindung().kandidat_hinzufuegen(kandidat).await?;
        } else {
            link.kandidat_puffern(kandidat);
            tracing::debug!(
                "Kandidat von {} gepuffert ({} wartend)",
                from,
                link.wartende_kandidaten()
            );
        }
        Ok(())
    }

    /// Wendet alle gepufferten Kandidaten genau einmal an, in
    /// Eintreffreihenfolge
    async fn kandidaten_spuelen(link: &mut PeerLink<F::Verbindung>) -> MeshResult<()> {
        let wartende = link.kandidaten_entnehmen();
        if wartende.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "Wende {} gepufferte Kandidaten fuer {} an",
            wartende.len(),
            link.peer()
        );
        for kandidat in wartende {
            link.verbindung().kandidat_hinzufuegen(kandidat).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport-Ereignisse
    // -----------------------------------------------------------------------

    /// Der Transport zu einem Peer steht
    pub fn media_verbunden(&mut self, peer: &PeerId) {
        match self.links.get_mut(peer) {
            Some(link) => {
                link.zustand_setzen(VerhandlungsZustand::Verbunden);
                tracing::info!("Peer-Link {} verbunden", peer);
            }
            None => tracing::debug!("Verbunden-Ereignis fuer unbekannten Link {}", peer),
        }
    }

    /// Der Transport zu einem Peer ist gescheitert; der Link wird
    /// geschlossen. Wiederaufbau geschieht Roster-getrieben, nicht hier.
    pub async fn media_getrennt(&mut self, peer: &PeerId) {
        if self.enthaelt(peer) {
            tracing::warn!("Transport zu {} weggebrochen, schliesse Link", peer);
            self.link_schliessen(peer).await;
        }
    }

    // -----------------------------------------------------------------------
    // Aufraeumen
    // -----------------------------------------------------------------------

    /// Schliesst den Link zu einem Peer und gibt alle Ressourcen frei.
    /// Idempotent: ohne Link passiert nichts.
    pub async fn link_schliessen(&mut self, peer: &PeerId) {
        if let Some(mut link) = self.links.remove(peer) {
            link.zustand_setzen(VerhandlungsZustand::Geschlossen);
            link.verbindung().schliessen().await;
            tracing::info!("Peer-Link {} geschlossen", peer);
        }
    }

    /// Schliesst alle Links (Teardown beim Verlassen des Raums)
    pub async fn alle_schliessen(&mut self) {
        let anzahl = self.links.len();
        for (_, mut link) in self.links.drain() {
            link.zustand_setzen(VerhandlungsZustand::Geschlossen);
            link.verbindung().schliessen().await;
        }
        if anzahl > 0 {
            tracing::info!("{} Peer-Links geschlossen", anzahl);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
