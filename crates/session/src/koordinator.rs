//! Sitzungs-Koordinator
//!
//! Fuehrt die Sitzung durch ihren Lebenszyklus und haelt Roster und
//! Peer-Mesh konsistent. Alle Eingaenge (Absichten, Kanal-, Media- und
//! Sprachereignisse) laufen durch eine einzige mpsc-Warteschlange und
//! werden strikt nacheinander vollstaendig abgearbeitet.
//!
//! Beitritt: Mikrofon zuerst, dann Kanal, dann `join`. Scheitert ein
//! Schritt, wird alles bereits Beschaffte wieder freigegeben und der
//! Koordinator steht erneut sauber im Leerlauf.
//!
//! Verlassen und unerwarteter Verbindungsverlust teilen sich denselben
//! Teardown-Pfad; nur die abschliessende Meldung unterscheidet sich.

use huddle_core::types::{Participant, PeerId, Presence};
use huddle_core::HuddleError;
use huddle_media::{MediaQuelle, SprachEreignis};
use huddle_mesh::{MediaEreignis, MediaFabrik, PeerLinkManager};
use huddle_protocol::SignalingEnvelope;
use huddle_signaling::{KanalEreignis, SignalKanal, SignalKanalFabrik};
use tokio::sync::{broadcast, mpsc};

use crate::ereignis::{Absicht, SitzungsEreignis, SitzungsMeldung, SitzungsZustand};
use crate::error::{SessionFehler, SessionResult};
use crate::roster::Roster;

/// Groesse der zentralen Ereignis-Warteschlange
const EREIGNIS_WARTESCHLANGE: usize = 256;

// ---------------------------------------------------------------------------
// SitzungsGriff
// ---------------------------------------------------------------------------

/// Handle fuer Benutzer-Absichten, beliebig klonbar
#[derive(Clone)]
pub struct SitzungsGriff {
    tx: mpsc::Sender<SitzungsEreignis>,
}

impl SitzungsGriff {
    pub async fn beitreten(&self, username: impl Into<String>) -> SessionResult<()> {
        self.absicht(Absicht::Beitreten {
            username: username.into(),
        })
        .await
    }

    pub async fn verlassen(&self) -> SessionResult<()> {
        self.absicht(Absicht::Verlassen).await
    }

    pub async fn stumm_setzen(&self, stumm: bool) -> SessionResult<()> {
        self.absicht(Absicht::StummSetzen(stumm)).await
    }

    /// Beendet die Ereignisschleife (raeumt vorher auf falls noetig)
    pub async fn beenden(&self) -> SessionResult<()> {
        self.absicht(Absicht::Beenden).await
    }

    async fn absicht(&self, absicht: Absicht) -> SessionResult<()> {
        self.tx
            .send(SitzungsEreignis::Absicht(absicht))
            .await
            .map_err(|_| SessionFehler::KoordinatorWeg)
    }
}

// ---------------------------------------------------------------------------
// Koordinator
// ---------------------------------------------------------------------------

/// Der Sitzungs-Koordinator
///
/// Generisch ueber Kanal-Fabrik, Media-Fabrik und Mikrofonquelle; Tests
/// setzen Mocks ein, der Client die echten Implementierungen.
pub struct Koordinator<KF, MF, Q>
where
    KF: SignalKanalFabrik,
    MF: MediaFabrik,
    Q: MediaQuelle,
{
    zustand: SitzungsZustand,
    kanal_fabrik: KF,
    kanal: Option<KF::Kanal>,
    links: PeerLinkManager<MF>,
    quelle: Q,
    roster: Roster,
    stumm: bool,

    ereignis_tx: mpsc::Sender<SitzungsEreignis>,
    ereignis_rx: mpsc::Receiver<SitzungsEreignis>,
    /// Zaehlt Kanal-Verbindungen; jedes Kanalereignis traegt die Generation
    /// seiner Verbindung und wird bei Nichtuebereinstimmung verworfen
    kanal_generation: u64,
    media_rx: Option<mpsc::Receiver<MediaEreignis>>,
    sprach_rx: Option<mpsc::Receiver<SprachEreignis>>,
    meldungen: mpsc::Sender<SitzungsMeldung>,
}

impl<KF, MF, Q> Koordinator<KF, MF, Q>
where
    KF: SignalKanalFabrik + Send + 'static,
    MF: MediaFabrik + Send + 'static,
    Q: MediaQuelle + 'static,
{
    /// Erstellt den Koordinator samt Griff
    ///
    /// `sprach_ereignisse` ist die Empfangsseite des Kanals den die
    /// Mikrofonquelle mit Sprechwechseln fuettert.
    pub fn neu(
        kanal_fabrik: KF,
        media_fabrik: MF,
        quelle: Q,
        sprach_ereignisse: mpsc::Receiver<SprachEreignis>,
        meldungen: mpsc::Sender<SitzungsMeldung>,
    ) -> (Self, SitzungsGriff) {
        let (ereignis_tx, ereignis_rx) = mpsc::channel(EREIGNIS_WARTESCHLANGE);
        let (media_tx, media_rx) = mpsc::channel(EREIGNIS_WARTESCHLANGE);

        let griff = SitzungsGriff {
            tx: ereignis_tx.clone(),
        };

        (
            Self {
                zustand: SitzungsZustand::Leerlauf,
                kanal_fabrik,
                kanal: None,
                links: PeerLinkManager::neu(media_fabrik, media_tx),
                quelle,
                roster: Roster::neu(),
                stumm: false,
                ereignis_tx,
                ereignis_rx,
                kanal_generation: 0,
                media_rx: Some(media_rx),
                sprach_rx: Some(sprach_ereignisse),
                meldungen,
            },
            griff,
        )
    }

    /// Aktueller Lebenszyklus-Zustand
    pub fn zustand(&self) -> SitzungsZustand {
        self.zustand
    }

    /// Abonniert Roster-Schnappschuesse (vor dem Start aufrufen)
    pub fn roster_abonnieren(&self) -> broadcast::Receiver<Vec<Participant>> {
        self.roster.abonnieren()
    }

    /// Die Ereignisschleife; laeuft bis zur `Beenden`-Absicht
    pub async fn ausfuehren(mut self) {
        // Nebenquellen in die zentrale Warteschlange einspeisen; der
        // Kanal bekommt seinen Einspeiser pro Verbindung beim Beitritt
        if let Some(mut rx) = self.media_rx.take() {
            let tx = self.ereignis_tx.clone();
            tokio::spawn(async move {
                while let Some(e) = rx.recv().await {
                    if tx.send(SitzungsEreignis::Media(e)).await.is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(mut rx) = self.sprach_rx.take() {
            let tx = self.ereignis_tx.clone();
            tokio::spawn(async move {
                while let Some(e) = rx.recv().await {
                    if tx.send(SitzungsEreignis::Sprache(e)).await.is_err() {
                        break;
                    }
                }
            });
        }

        tracing::info!("Koordinator gestartet");
        while let Some(ereignis) = self.ereignis_rx.recv().await {
            if self.verarbeiten(ereignis).await {
                break;
            }
        }
        tracing::info!("Koordinator beendet");
    }

    // -----------------------------------------------------------------------
    // Ereignisverarbeitung
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Ereignis vollstaendig. `true` = Schleife beenden.
    async fn verarbeiten(&mut self, ereignis: SitzungsEreignis) -> bool {
        match ereignis {
            SitzungsEreignis::Absicht(Absicht::Beitreten { username }) => {
                self.beitreten(username).await;
            }
            SitzungsEreignis::Absicht(Absicht::Verlassen) => {
                if self.ist_beigetreten() {
                    self.teardown(false, String::new()).await;
                } else {
                    tracing::debug!("Verlassen ohne aktive Sitzung ignoriert");
                }
            }
            SitzungsEreignis::Absicht(Absicht::StummSetzen(stumm)) => {
                self.stumm_setzen(stumm).await;
            }
            SitzungsEreignis::Absicht(Absicht::Beenden) => {
                if self.ist_beigetreten() {
                    self.teardown(false, String::new()).await;
                }
                return true;
            }
            SitzungsEreignis::Kanal { generation, ereignis } => {
                if generation != self.kanal_generation {
                    tracing::debug!("Kanalereignis einer alten Verbindung verworfen");
                    return false;
                }
                match ereignis {
                    KanalEreignis::Nachricht(umschlag) => {
                        if self.ist_beigetreten() {
                            self.nachricht_verarbeiten(umschlag).await;
                        } else {
                            tracing::debug!("Kanalnachricht ausserhalb einer Sitzung ignoriert");
                        }
                    }
                    KanalEreignis::Getrennt { grund } => {
                        if self.ist_beigetreten() {
                            self.teardown(true, grund).await;
                        } else {
                            tracing::debug!("Veraltetes Trennungs-Ereignis ignoriert: {}", grund);
                        }
                    }
                }
            }
            SitzungsEreignis::Media(ereignis) => self.media_verarbeiten(ereignis).await,
            SitzungsEreignis::Sprache(ereignis) => self.sprache_verarbeiten(ereignis).await,
        }
        false
    }

    fn ist_beigetreten(&self) -> bool {
        matches!(
            self.zustand,
            SitzungsZustand::KanalVerbinden | SitzungsZustand::Aktiv
        )
    }

    async fn beitreten(&mut self, username: String) {
        if self.zustand != SitzungsZustand::Leerlauf {
            tracing::warn!("Beitritt im Zustand {:?} ignoriert", self.zustand);
            return;
        }

        self.zustand_setzen(SitzungsZustand::MikrofonAnfordern).await;
        if let Err(e) = self.quelle.erfassen() {
            let fehler: HuddleError = e.into();
            tracing::warn!("Beitritt gescheitert: {}", fehler);
            self.melden(SitzungsMeldung::Fehler(fehler.to_string())).await;
            self.zustand_setzen(SitzungsZustand::Leerlauf).await;
            return;
        }

        self.zustand_setzen(SitzungsZustand::KanalVerbinden).await;
        self.kanal_generation = self.kanal_generation.wrapping_add(1);
        let generation = self.kanal_generation;
        let (kanal_tx, mut kanal_rx) = mpsc::channel(EREIGNIS_WARTESCHLANGE);
        let kanal = match self.kanal_fabrik.verbinden(kanal_tx).await {
            Ok(kanal) => kanal,
            Err(e) => {
                let fehler: HuddleError = e.into();
                tracing::warn!("Beitritt gescheitert: {}", fehler);
                self.quelle.freigeben();
                self.melden(SitzungsMeldung::Fehler(fehler.to_string())).await;
                self.zustand_setzen(SitzungsZustand::Leerlauf).await;
                return;
            }
        };

        if let Err(e) = kanal.senden(SignalingEnvelope::Join { username }).await {
            let fehler: HuddleError = e.into();
            tracing::warn!("Join nicht zustellbar: {}", fehler);
            let _ = kanal.schliessen().await;
            self.quelle.freigeben();
            self.melden(SitzungsMeldung::Fehler(fehler.to_string())).await;
            self.zustand_setzen(SitzungsZustand::Leerlauf).await;
            return;
        }

        // Ereignisse dieser Verbindung mit ihrer Generation in die zentrale
        // Warteschlange einspeisen
        let tx = self.ereignis_tx.clone();
        tokio::spawn(async move {
            while let Some(ereignis) = kanal_rx.recv().await {
                if tx
                    .send(SitzungsEreignis::Kanal { generation, ereignis })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.kanal = Some(kanal);
        // Aktiv erst mit der users-list des Dienstes
    }

    async fn stumm_setzen(&mut self, stumm: bool) {
        if self.zustand != SitzungsZustand::Aktiv {
            tracing::debug!("Stummschalten ausserhalb des Raums ignoriert");
            return;
        }
        self.stumm = stumm;
        self.quelle.stumm_setzen(stumm);
        let umschlag = if stumm {
            SignalingEnvelope::Mute
        } else {
            SignalingEnvelope::Unmute
        };
        self.umschlag_senden(umschlag).await;
    }

    async fn sprache_verarbeiten(&mut self, ereignis: SprachEreignis) {
        if self.zustand != SitzungsZustand::Aktiv {
            return;
        }
        match ereignis {
            SprachEreignis::SprechenBeginnt => {
                if !self.stumm {
                    self.umschlag_senden(SignalingEnvelope::Speaking).await;
                }
            }
            SprachEreignis::SprechenEndet => {
                self.umschlag_senden(SignalingEnvelope::StopSpeaking).await;
            }
        }
    }

    async fn media_verarbeiten(&mut self, ereignis: MediaEreignis) {
        match ereignis {
            MediaEreignis::KandidatGeneriert { peer, kandidat } => {
                // Spaete Kandidaten geschlossener Links enden hier
                if self.links.enthaelt(&peer) {
                    self.umschlag_senden(SignalingEnvelope::kandidat_an(peer, kandidat))
                        .await;
                } else {
                    tracing::debug!("Kandidat fuer geschlossenen Link {} verworfen", peer);
                }
            }
            MediaEreignis::TrackEmpfangen { peer } => {
                self.melden(SitzungsMeldung::TrackEmpfangen { peer }).await;
            }
            MediaEreignis::Verbunden { peer } => {
                self.links.media_verbunden(&peer);
            }
            MediaEreignis::Getrennt { peer } => {
                self.links.media_getrennt(&peer).await;
            }
        }
    }

    async fn nachricht_verarbeiten(&mut self, umschlag: SignalingEnvelope) {
        match umschlag {
            SignalingEnvelope::UsersList { self_id, users } => {
                self.users_list_verarbeiten(self_id, users).await;
            }
            SignalingEnvelope::UserJoined { user } => {
                // Der Neuling ruft uns an, wir initiieren nichts
                self.roster.einfuegen(user);
            }
            SignalingEnvelope::UserLeft { id, .. } => {
                self.roster.entfernen(&id);
                self.links.link_schliessen(&id).await;
            }
            SignalingEnvelope::UserMuted { id } => {
                self.roster.status_aktualisieren(&id, Presence::Muted);
            }
            SignalingEnvelope::UserUnmuted { id } => {
                self.roster.status_aktualisieren(&id, Presence::Online);
            }
            SignalingEnvelope::UserSpeaking { id } => {
                self.roster.status_aktualisieren(&id, Presence::Speaking);
            }
            SignalingEnvelope::UserStoppedSpeaking { id } => {
                self.roster.status_aktualisieren(&id, Presence::Online);
            }
            SignalingEnvelope::Offer {
                from: Some(from),
                sdp,
                ..
            } => match self.links.offer_verarbeiten(from.clone(), sdp).await {
                Ok(answer) => self.umschlag_senden(answer).await,
                Err(e) => tracing::warn!("Offer von {} fehlgeschlagen: {}", from, e),
            },
            SignalingEnvelope::Answer {
                from: Some(from),
                sdp,
                ..
            } => {
                if let Err(e) = self.links.answer_verarbeiten(from.clone(), sdp).await {
                    tracing::warn!("Answer von {} fehlgeschlagen: {}", from, e);
                }
            }
            SignalingEnvelope::IceCandidate {
                from: Some(from),
                candidate,
                ..
            } => {
                if let Err(e) = self
                    .links
                    .ice_kandidat_verarbeiten(from.clone(), candidate)
                    .await
                {
                    tracing::warn!("Kandidat von {} fehlgeschlagen: {}", from, e);
                }
            }
            SignalingEnvelope::Unbekannt => {
                tracing::debug!("Unbekannten Umschlag ignoriert");
            }
            andere => {
                tracing::debug!("Unerwarteten Umschlag ignoriert: {:?}", andere);
            }
        }
    }

    async fn users_list_verarbeiten(&mut self, self_id: PeerId, users: Vec<Participant>) {
        self.roster.ersetzen(users, self_id.clone());

        if self.zustand == SitzungsZustand::KanalVerbinden {
            self.zustand_setzen(SitzungsZustand::Aktiv).await;
            self.melden(SitzungsMeldung::RaumBetreten {
                selbst: self_id,
                teilnehmer: self.roster.alle(),
            })
            .await;
        }

        // Als Neuling rufen wir jeden Bestandspeer an; bei einer erneuten
        // Liste werden bestehende Links uebersprungen
        for teilnehmer in self.roster.alle() {
            match self.links.als_anrufer_initiieren(teilnehmer.id.clone()).await {
                Ok(Some(offer)) => self.umschlag_senden(offer).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Initiierung fuer {} fehlgeschlagen: {}", teilnehmer.id, e);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Gemeinsamer Teardown-Pfad fuer Verlassen und Verbindungsverlust
    async fn teardown(&mut self, unerwartet: bool, grund: String) {
        self.zustand_setzen(SitzungsZustand::Verlassen).await;

        self.links.alle_schliessen().await;

        if let Some(kanal) = self.kanal.take() {
            if !unerwartet {
                // Best-Effort, der Dienst raeumt auch beim Socket-Schliessen auf
                let _ = kanal.senden(SignalingEnvelope::Leave).await;
            }
            let _ = kanal.schliessen().await;
        }

        self.quelle.freigeben();
        self.roster.leeren();
        self.stumm = false;

        self.zustand_setzen(SitzungsZustand::Leerlauf).await;
        if unerwartet {
            self.melden(SitzungsMeldung::Getrennt { grund }).await;
        } else {
            self.melden(SitzungsMeldung::RaumVerlassen).await;
        }
    }

    // -----------------------------------------------------------------------
    // Hilfen
    // -----------------------------------------------------------------------

    async fn zustand_setzen(&mut self, zustand: SitzungsZustand) {
        if self.zustand == zustand {
            return;
        }
        tracing::debug!("Zustand: {:?} -> {:?}", self.zustand, zustand);
        self.zustand = zustand;
        self.melden(SitzungsMeldung::ZustandGewechselt(zustand)).await;
    }

    async fn melden(&self, meldung: SitzungsMeldung) {
        // Niemand hoert zu ist kein Fehler
        let _ = self.meldungen.send(meldung).await;
    }

    async fn umschlag_senden(&self, umschlag: SignalingEnvelope) {
        if let Some(kanal) = &self.kanal {
            if let Err(e) = kanal.senden(umschlag).await {
                // Der Verlust kommt gleich als Getrennt-Ereignis herein
                tracing::warn!("Senden fehlgeschlagen: {}", e);
            }
        } else {
            tracing::debug!("Senden ohne Kanal verworfen");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use huddle_media::{MediaFehler, MediaResult};
    use huddle_mesh::{MediaVerbindung, MeshResult};
    use huddle_protocol::{IceKandidat, SessionDescription};
    use huddle_signaling::{KanalFehler, KanalResult};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // --- Mock: Signalisierungskanal ---

    #[derive(Default)]
    struct KanalZustand {
        gesendet: Mutex<Vec<SignalingEnvelope>>,
        geschlossen: AtomicBool,
        ereignis_tx: Mutex<Option<mpsc::Sender<KanalEreignis>>>,
    }

    struct MockKanal {
        zustand: Arc<KanalZustand>,
    }

    #[async_trait]
    impl SignalKanal for MockKanal {
        async fn senden(&self, umschlag: SignalingEnvelope) -> KanalResult<()> {
            self.zustand.gesendet.lock().push(umschlag);
            Ok(())
        }

        async fn schliessen(&self) -> KanalResult<()> {
            self.zustand.geschlossen.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockKanalFabrik {
        zustand: Arc<KanalZustand>,
        fehlschlagen: bool,
    }

    #[async_trait]
    impl SignalKanalFabrik for MockKanalFabrik {
        type Kanal = MockKanal;

        async fn verbinden(
            &self,
            ereignisse: mpsc::Sender<KanalEreignis>,
        ) -> KanalResult<MockKanal> {
            if self.fehlschlagen {
                return Err(KanalFehler::Verbindungsaufbau("Mock-Fehlschlag".into()));
            }
            *self.zustand.ereignis_tx.lock() = Some(ereignisse);
            Ok(MockKanal {
                zustand: self.zustand.clone(),
            })
        }
    }

    // --- Mock: Medienprimitive ---

    #[derive(Default)]
    struct MediaZustand {
        protokoll: Mutex<Vec<String>>,
        ereignis_tx: Mutex<Option<mpsc::Sender<MediaEreignis>>>,
    }

    struct MockMediaVerbindung {
        peer: PeerId,
        zustand: Arc<MediaZustand>,
    }

    #[async_trait]
    impl MediaVerbindung for MockMediaVerbindung {
        async fn offer_erstellen(&self) -> MeshResult<SessionDescription> {
            self.zustand
                .protokoll
                .lock()
                .push(format!("offer:{}", self.peer.as_str()));
            Ok(SessionDescription {
                typ: "offer".into(),
                sdp: format!("sdp-{}", self.peer),
            })
        }

        async fn answer_erstellen(
            &self,
            _offer: SessionDescription,
        ) -> MeshResult<SessionDescription> {
            self.zustand
                .protokoll
                .lock()
                .push(format!("answer:{}", self.peer.as_str()));
            Ok(SessionDescription {
                typ: "answer".into(),
                sdp: format!("antwort-{}", self.peer),
            })
        }

        async fn remote_description_setzen(&self, _sdp: SessionDescription) -> MeshResult<()> {
            self.zustand
                .protokoll
                .lock()
                .push(format!("remote:{}", self.peer.as_str()));
            Ok(())
        }

        async fn kandidat_hinzufuegen(&self, kandidat: IceKandidat) -> MeshResult<()> {
            self.zustand
                .protokoll
                .lock()
                .push(format!("kandidat:{}:{}", self.peer.as_str(), kandidat.candidate));
            Ok(())
        }

        async fn schliessen(&self) {
            self.zustand
                .protokoll
                .lock()
                .push(format!("schliessen:{}", self.peer.as_str()));
        }
    }

    struct MockMediaFabrik {
        zustand: Arc<MediaZustand>,
    }

    #[async_trait]
    impl MediaFabrik for MockMediaFabrik {
        type Verbindung = MockMediaVerbindung;

        async fn verbindung_erstellen(
            &self,
            peer: PeerId,
            ereignisse: mpsc::Sender<MediaEreignis>,
        ) -> MeshResult<MockMediaVerbindung> {
            *self.zustand.ereignis_tx.lock() = Some(ereignisse);
            self.zustand
                .protokoll
                .lock()
                .push(format!("erstellt:{}", peer.as_str()));
            Ok(MockMediaVerbindung {
                peer,
                zustand: self.zustand.clone(),
            })
        }
    }

    // --- Mock: Mikrofonquelle ---

    #[derive(Default)]
    struct QuellenZustand {
        aktiv: AtomicBool,
        stumm: AtomicBool,
    }

    struct MockQuelle {
        zustand: Arc<QuellenZustand>,
        fehlschlagen: bool,
    }

    impl MediaQuelle for MockQuelle {
        fn erfassen(&mut self) -> MediaResult<()> {
            if self.fehlschlagen {
                return Err(MediaFehler::KeinStandardEingabegeraet);
            }
            self.zustand.aktiv.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn freigeben(&mut self) {
            self.zustand.aktiv.store(false, Ordering::SeqCst);
        }

        fn stumm_setzen(&mut self, stumm: bool) {
            self.zustand.stumm.store(stumm, Ordering::SeqCst);
        }

        fn ist_aktiv(&self) -> bool {
            self.zustand.aktiv.load(Ordering::SeqCst)
        }

        fn ist_stumm(&self) -> bool {
            self.zustand.stumm.load(Ordering::SeqCst)
        }
    }

    // --- Aufbau ---

    struct TestAufbau {
        griff: SitzungsGriff,
        meldungen: mpsc::Receiver<SitzungsMeldung>,
        kanal: Arc<KanalZustand>,
        media: Arc<MediaZustand>,
        quelle: Arc<QuellenZustand>,
        sprache: mpsc::Sender<SprachEreignis>,
        roster_rx: broadcast::Receiver<Vec<Participant>>,
    }

    fn aufbau_mit(mik_fehlschlag: bool, kanal_fehlschlag: bool) -> TestAufbau {
        let kanal = Arc::new(KanalZustand::default());
        let media = Arc::new(MediaZustand::default());
        let quelle = Arc::new(QuellenZustand::default());
        let (sprach_tx, sprach_rx) = mpsc::channel(16);
        let (meldung_tx, meldung_rx) = mpsc::channel(64);

        let (koordinator, griff) = Koordinator::neu(
            MockKanalFabrik {
                zustand: kanal.clone(),
                fehlschlagen: kanal_fehlschlag,
            },
            MockMediaFabrik {
                zustand: media.clone(),
            },
            MockQuelle {
                zustand: quelle.clone(),
                fehlschlagen: mik_fehlschlag,
            },
            sprach_rx,
            meldung_tx,
        );
        let roster_rx = koordinator.roster_abonnieren();
        tokio::spawn(koordinator.ausfuehren());

        TestAufbau {
            griff,
            meldungen: meldung_rx,
            kanal,
            media,
            quelle,
            sprache: sprach_tx,
            roster_rx,
        }
    }

    fn aufbau() -> TestAufbau {
        aufbau_mit(false, false)
    }

    async fn warte_bis(beschreibung: &str, bedingung: impl Fn() -> bool) {
        let ergebnis = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if bedingung() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(ergebnis.is_ok(), "Zeitueberschreitung: {}", beschreibung);
    }

    async fn dienst_sendet(aufbau: &TestAufbau, umschlag: SignalingEnvelope) {
        let tx = aufbau
            .kanal
            .ereignis_tx
            .lock()
            .clone()
            .expect("Kanal nicht verbunden");
        tx.send(KanalEreignis::Nachricht(umschlag)).await.unwrap();
    }

    /// Beitritt bis Aktiv, mit der gegebenen Bestandsliste
    async fn aktiv_mit(aufbau: &mut TestAufbau, bestand: Vec<Participant>) {
        aufbau.griff.beitreten("alice").await.unwrap();
        warte_bis("join gesendet", || {
            aufbau
                .kanal
                .gesendet
                .lock()
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Join { .. }))
        })
        .await;

        let anzahl = bestand.len();
        dienst_sendet(
            aufbau,
            SignalingEnvelope::UsersList {
                self_id: PeerId::from("selbst"),
                users: bestand,
            },
        )
        .await;

        // Der Roster-Schnappschuss belegt dass die users-list verarbeitet
        // wurde (auch bei leerem Bestand)
        tokio::time::timeout(Duration::from_secs(2), aufbau.roster_rx.recv())
            .await
            .expect("users-list nicht verarbeitet")
            .expect("Roster-Kanal geschlossen");

        warte_bis("Bestand angerufen", || {
            aufbau
                .media
                .protokoll
                .lock()
                .iter()
                .filter(|e| e.starts_with("erstellt:"))
                .count()
                == anzahl
        })
        .await;
    }

    fn gesendete(aufbau: &TestAufbau) -> Vec<SignalingEnvelope> {
        aufbau.kanal.gesendet.lock().clone()
    }

    // --- Szenarien ---

    #[tokio::test]
    async fn beitritt_ruft_jeden_bestandspeer_an() {
        let mut aufbau = aufbau();
        aktiv_mit(
            &mut aufbau,
            vec![Participant::neu("s1", "bob"), Participant::neu("s2", "eve")],
        )
        .await;

        warte_bis("zwei Offers gesendet", || {
            gesendete(&aufbau)
                .iter()
                .filter(|u| matches!(u, SignalingEnvelope::Offer { .. }))
                .count()
                == 2
        })
        .await;

        let ziele: Vec<_> = gesendete(&aufbau)
            .into_iter()
            .filter_map(|u| match u {
                SignalingEnvelope::Offer { to: Some(to), .. } => Some(to),
                _ => None,
            })
            .collect();
        assert!(ziele.contains(&PeerId::from("s1")));
        assert!(ziele.contains(&PeerId::from("s2")));

        // Beitritt vollstaendig gemeldet
        let mut raum_betreten = false;
        while let Ok(meldung) = aufbau.meldungen.try_recv() {
            if let SitzungsMeldung::RaumBetreten { selbst, teilnehmer } = meldung {
                assert_eq!(selbst, PeerId::from("selbst"));
                assert_eq!(teilnehmer.len(), 2);
                raum_betreten = true;
            }
        }
        assert!(raum_betreten);
    }

    #[tokio::test]
    async fn mikrofon_verweigert_bricht_beitritt_sauber_ab() {
        let mut aufbau = aufbau_mit(true, false);
        aufbau.griff.beitreten("alice").await.unwrap();

        let mut fehler = false;
        let mut wieder_leerlauf = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(2), aufbau.meldungen.recv()).await {
                Ok(Some(SitzungsMeldung::Fehler(text))) => {
                    assert!(text.contains("Mikrofon"));
                    fehler = true;
                }
                Ok(Some(SitzungsMeldung::ZustandGewechselt(SitzungsZustand::Leerlauf))) => {
                    wieder_leerlauf = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(fehler && wieder_leerlauf);

        // Kein Kanal beruehrt, nichts geleakt
        assert!(aufbau.kanal.ereignis_tx.lock().is_none());
        assert!(!aufbau.quelle.aktiv.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn kanal_fehlschlag_gibt_mikrofon_wieder_frei() {
        let mut aufbau = aufbau_mit(false, true);
        aufbau.griff.beitreten("alice").await.unwrap();

        let mut fehler = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(2), aufbau.meldungen.recv()).await {
                Ok(Some(SitzungsMeldung::Fehler(text))) => {
                    assert!(text.contains("Kanal"));
                    fehler = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(fehler);
        warte_bis("Mikrofon freigegeben", || {
            !aufbau.quelle.aktiv.load(Ordering::SeqCst)
        })
        .await;
    }

    #[tokio::test]
    async fn neuling_ruft_an_wir_antworten_nur() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![]).await;

        // Neuling tritt bei: nur Roster-Upsert, kein Offer von uns
        dienst_sendet(
            &aufbau,
            SignalingEnvelope::UserJoined {
                user: Participant::neu("s9", "neu"),
            },
        )
        .await;

        // Sein Offer trifft ein
        dienst_sendet(
            &aufbau,
            SignalingEnvelope::Offer {
                to: None,
                from: Some(PeerId::from("s9")),
                sdp: SessionDescription {
                    typ: "offer".into(),
                    sdp: "v=0".into(),
                },
            },
        )
        .await;

        warte_bis("Answer gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Answer { .. }))
        })
        .await;

        // Glare-Freiheit: wir haben nie ein Offer geschickt
        assert!(!gesendete(&aufbau)
            .iter()
            .any(|u| matches!(u, SignalingEnvelope::Offer { .. })));
    }

    #[tokio::test]
    async fn user_left_entfernt_roster_und_link() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        dienst_sendet(
            &aufbau,
            SignalingEnvelope::UserLeft {
                id: PeerId::from("s1"),
                username: "bob".into(),
            },
        )
        .await;

        warte_bis("Link geschlossen", || {
            aufbau
                .media
                .protokoll
                .lock()
                .contains(&"schliessen:s1".to_string())
        })
        .await;

        // Letzter Roster-Schnappschuss ist leer
        let mut letzter = None;
        while let Ok(schnappschuss) = aufbau.roster_rx.try_recv() {
            letzter = Some(schnappschuss);
        }
        assert_eq!(letzter.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn verlassen_raeumt_vollstaendig_auf() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        aufbau.griff.verlassen().await.unwrap();

        let mut raum_verlassen = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(2), aufbau.meldungen.recv()).await {
                Ok(Some(SitzungsMeldung::RaumVerlassen)) => {
                    raum_verlassen = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(raum_verlassen);

        // leave gesendet, Kanal zu, Link zu, Mikrofon frei
        assert!(gesendete(&aufbau)
            .iter()
            .any(|u| matches!(u, SignalingEnvelope::Leave)));
        assert!(aufbau.kanal.geschlossen.load(Ordering::SeqCst));
        assert!(aufbau
            .media
            .protokoll
            .lock()
            .iter()
            .any(|e| e == "schliessen:s1"));
        assert!(!aufbau.quelle.aktiv.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unerwartete_trennung_nimmt_denselben_teardown_pfad() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        let tx = aufbau.kanal.ereignis_tx.lock().clone().unwrap();
        tx.send(KanalEreignis::Getrennt {
            grund: "Dienst weg".into(),
        })
        .await
        .unwrap();

        let mut getrennt = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(2), aufbau.meldungen.recv()).await {
                Ok(Some(SitzungsMeldung::Getrennt { grund })) => {
                    assert_eq!(grund, "Dienst weg");
                    getrennt = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(getrennt);

        // Kein leave mehr versucht, aufgeraeumt wurde trotzdem
        assert!(!gesendete(&aufbau)
            .iter()
            .any(|u| matches!(u, SignalingEnvelope::Leave)));
        assert!(aufbau
            .media
            .protokoll
            .lock()
            .iter()
            .any(|e| e == "schliessen:s1"));
        assert!(!aufbau.quelle.aktiv.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn trennung_einer_alten_verbindung_beruehrt_die_neue_sitzung_nicht() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![]).await;

        // Sender der ersten Verbindung festhalten, dann regulaer verlassen
        let alte_tx = aufbau.kanal.ereignis_tx.lock().clone().unwrap();
        aufbau.griff.verlassen().await.unwrap();

        let mut raum_verlassen = false;
        for _ in 0..10 {
            match tokio::time::timeout(Duration::from_secs(2), aufbau.meldungen.recv()).await {
                Ok(Some(SitzungsMeldung::RaumVerlassen)) => {
                    raum_verlassen = true;
                    break;
                }
                Ok(Some(_)) => {}
                _ => break,
            }
        }
        assert!(raum_verlassen);

        // Zweite Sitzung aufbauen; Reste der ersten vorher wegwischen
        aufbau.kanal.gesendet.lock().clear();
        while aufbau.roster_rx.try_recv().is_ok() {}
        aktiv_mit(&mut aufbau, vec![]).await;

        // Die erste Verbindung meldet ihre Trennung erst jetzt
        alte_tx
            .send(KanalEreignis::Getrennt {
                grund: "alte Verbindung".into(),
            })
            .await
            .unwrap();

        // Die zweite Sitzung bleibt aktiv und bedienbar
        aufbau.griff.stumm_setzen(true).await.unwrap();
        warte_bis("mute gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Mute))
        })
        .await;
        assert!(aufbau.quelle.aktiv.load(Ordering::SeqCst));

        while let Ok(meldung) = aufbau.meldungen.try_recv() {
            assert!(
                !matches!(meldung, SitzungsMeldung::Getrennt { .. }),
                "Veraltete Trennung hat die neue Sitzung beendet"
            );
        }
    }

    #[tokio::test]
    async fn stummschalten_setzt_flag_und_meldet_dem_dienst() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![]).await;

        aufbau.griff.stumm_setzen(true).await.unwrap();
        warte_bis("mute gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Mute))
        })
        .await;
        assert!(aufbau.quelle.stumm.load(Ordering::SeqCst));

        aufbau.griff.stumm_setzen(false).await.unwrap();
        warte_bis("unmute gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Unmute))
        })
        .await;
        assert!(!aufbau.quelle.stumm.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sprechwechsel_werden_dem_dienst_gemeldet() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![]).await;

        aufbau
            .sprache
            .send(SprachEreignis::SprechenBeginnt)
            .await
            .unwrap();
        warte_bis("speaking gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Speaking))
        })
        .await;

        aufbau
            .sprache
            .send(SprachEreignis::SprechenEndet)
            .await
            .unwrap();
        warte_bis("stop-speaking gesendet", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::StopSpeaking))
        })
        .await;
    }

    #[tokio::test]
    async fn status_broadcasts_aktualisieren_das_roster() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        dienst_sendet(
            &aufbau,
            SignalingEnvelope::UserSpeaking {
                id: PeerId::from("s1"),
            },
        )
        .await;

        // Schnappschuesse einsammeln bis der Status sichtbar ist
        let mut gesehen = false;
        for _ in 0..50 {
            match tokio::time::timeout(Duration::from_millis(100), aufbau.roster_rx.recv()).await
            {
                Ok(Ok(schnappschuss)) => {
                    if schnappschuss
                        .iter()
                        .any(|p| p.id == PeerId::from("s1") && p.status == Presence::Speaking)
                    {
                        gesehen = true;
                        break;
                    }
                }
                _ => break,
            }
        }
        assert!(gesehen);
    }

    #[tokio::test]
    async fn lokale_kandidaten_werden_relayt_spaete_verworfen() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        let media_tx = aufbau.media.ereignis_tx.lock().clone().unwrap();

        // Kandidat fuer bestehenden Link -> Relay
        media_tx
            .send(MediaEreignis::KandidatGeneriert {
                peer: PeerId::from("s1"),
                kandidat: IceKandidat {
                    candidate: "candidate:1".into(),
                    sdp_mid: Some("0".into()),
                    sdp_mline_index: Some(0),
                },
            })
            .await
            .unwrap();

        warte_bis("Kandidat relayt", || {
            gesendete(&aufbau).iter().any(|u| {
                matches!(u, SignalingEnvelope::IceCandidate { to: Some(to), .. } if *to == PeerId::from("s1"))
            })
        })
        .await;

        // Kandidat fuer unbekannten Link -> verworfen
        media_tx
            .send(MediaEreignis::KandidatGeneriert {
                peer: PeerId::from("s9"),
                kandidat: IceKandidat {
                    candidate: "candidate:9".into(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                },
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!gesendete(&aufbau).iter().any(|u| {
            matches!(u, SignalingEnvelope::IceCandidate { to: Some(to), .. } if *to == PeerId::from("s9"))
        }));
    }

    #[tokio::test]
    async fn erneute_users_list_erzeugt_keine_doppelten_offers() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![Participant::neu("s1", "bob")]).await;

        warte_bis("erstes Offer", || {
            gesendete(&aufbau)
                .iter()
                .any(|u| matches!(u, SignalingEnvelope::Offer { .. }))
        })
        .await;

        // Der Dienst liefert dieselbe Liste erneut
        dienst_sendet(
            &aufbau,
            SignalingEnvelope::UsersList {
                self_id: PeerId::from("selbst"),
                users: vec![Participant::neu("s1", "bob")],
            },
        )
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Bestehender Link wird nicht neu verhandelt
        let offers = gesendete(&aufbau)
            .iter()
            .filter(|u| matches!(u, SignalingEnvelope::Offer { .. }))
            .count();
        assert_eq!(offers, 1);
        let erstellt = aufbau
            .media
            .protokoll
            .lock()
            .iter()
            .filter(|e| e.starts_with("erstellt:"))
            .count();
        assert_eq!(erstellt, 1);
    }

    #[tokio::test]
    async fn doppelter_beitritt_wird_ignoriert() {
        let mut aufbau = aufbau();
        aktiv_mit(&mut aufbau, vec![]).await;

        aufbau.griff.beitreten("alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let joins = gesendete(&aufbau)
            .iter()
            .filter(|u| matches!(u, SignalingEnvelope::Join { .. }))
            .count();
        assert_eq!(joins, 1);
    }
}
