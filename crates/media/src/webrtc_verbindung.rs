//! Produktive Medienverhandlungsprimitive auf Basis des webrtc-Crates
//!
//! Implementiert `MediaFabrik`/`MediaVerbindung` aus huddle-mesh. Jede
//! Verbindung bekommt den gemeinsamen lokalen Audio-Track angehaengt;
//! Kandidaten, eingehende Tracks und Transportzustand laufen als
//! `MediaEreignis`se in die Ereignisschleife des Koordinators.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_core::types::PeerId;
use huddle_mesh::{MediaEreignis, MediaFabrik, MediaVerbindung, MeshFehler, MeshResult};
use huddle_protocol::{IceKandidat, SessionDescription};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// ICE-Konfiguration fuer Peer-Verbindungen
#[derive(Debug, Clone)]
pub struct WebrtcKonfig {
    /// STUN/TURN-URLs, z. B. `stun:stun.l.google.com:19302`
    pub ice_urls: Vec<String>,
    pub ice_username: Option<String>,
    pub ice_credential: Option<String>,
}

impl Default for WebrtcKonfig {
    fn default() -> Self {
        Self {
            ice_urls: vec!["stun:stun.l.google.com:19302".to_string()],
            ice_username: None,
            ice_credential: None,
        }
    }
}

impl WebrtcKonfig {
    fn ice_server(&self) -> Vec<RTCIceServer> {
        if self.ice_urls.is_empty() {
            return Vec::new();
        }
        vec![RTCIceServer {
            urls: self.ice_urls.clone(),
            username: self.ice_username.clone().unwrap_or_default(),
            credential: self.ice_credential.clone().unwrap_or_default(),
            ..Default::default()
        }]
    }
}

// ---------------------------------------------------------------------------
// Fabrik
// ---------------------------------------------------------------------------

/// Erstellt webrtc-Peer-Verbindungen mit angehaengtem lokalem Audio-Track
pub struct WebrtcFabrik {
    konfig: WebrtcKonfig,
    lokaler_track: Arc<dyn TrackLocal + Send + Sync>,
}

impl WebrtcFabrik {
    pub fn neu(konfig: WebrtcKonfig, lokaler_track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self {
            konfig,
            lokaler_track,
        }
    }

    /// Bequemer Konstruktor: erstellt den Opus-Audio-Track gleich mit.
    /// Der zurueckgegebene Track wird vom Aufrufer mit Samples gefuettert.
    pub fn mit_opus_track(konfig: WebrtcKonfig) -> (Self, Arc<TrackLocalStaticSample>) {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            "huddle-mikrofon".to_owned(),
        ));
        (Self::neu(konfig, track.clone()), track)
    }
}

#[async_trait]
impl MediaFabrik for WebrtcFabrik {
    type Verbindung = WebrtcVerbindung;

    async fn verbindung_erstellen(
        &self,
        peer: PeerId,
        ereignisse: mpsc::Sender<MediaEreignis>,
    ) -> MeshResult<Self::Verbindung> {
        let mut medien = MediaEngine::default();
        medien
            .register_default_codecs()
            .map_err(|e| MeshFehler::media(&peer, e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut medien)
            .map_err(|e| MeshFehler::media(&peer, e.to_string()))?;
        let api = APIBuilder::new()
            .with_media_engine(medien)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers: self.konfig.ice_server(),
                ..Default::default()
            })
            .await
            .map_err(|e| MeshFehler::media(&peer, e.to_string()))?,
        );

        pc.add_track(self.lokaler_track.clone())
            .await
            .map_err(|e| MeshFehler::media(&peer, e.to_string()))?;

        // Lokal generierte Kandidaten -> Relay an den Peer
        {
            let tx = ereignisse.clone();
            let peer = peer.clone();
            pc.on_ice_candidate(Box::new(move |kandidat| {
                let tx = tx.clone();
                let peer = peer.clone();
                Box::pin(async move {
                    let Some(kandidat) = kandidat else { return };
                    match kandidat.to_json() {
                        Ok(init) => {
                            let _ = tx
                                .send(MediaEreignis::KandidatGeneriert {
                                    peer,
                                    kandidat: IceKandidat {
                                        candidate: init.candidate,
                                        sdp_mid: init.sdp_mid,
                                        sdp_mline_index: init.sdp_mline_index,
                                    },
                                })
                                .await;
                        }
                        Err(e) => tracing::warn!("Kandidat nicht serialisierbar: {}", e),
                    }
                })
            }));
        }

        // Eingehender Audio-Track
        {
            let tx = ereignisse.clone();
            let peer = peer.clone();
            pc.on_track(Box::new(move |track, _receiver, _transceiver| {
                let tx = tx.clone();
                let peer = peer.clone();
                Box::pin(async move {
                    tracing::info!(
                        "Track von {} empfangen ({})",
                        peer,
                        track.codec().capability.mime_type
                    );
                    let _ = tx.send(MediaEreignis::TrackEmpfangen { peer }).await;
                })
            }));
        }

        // Transportzustand
        {
            let tx = ereignisse.clone();
            let peer = peer.clone();
            pc.on_peer_connection_state_change(Box::new(move |zustand: RTCPeerConnectionState| {
                let tx = tx.clone();
                let peer = peer.clone();
                Box::pin(async move {
                    match zustand {
                        RTCPeerConnectionState::Connected => {
                            let _ = tx.send(MediaEreignis::Verbunden { peer }).await;
                        }
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(MediaEreignis::Getrennt { peer }).await;
                        }
                        _ => {}
                    }
                })
            }));
        }

        Ok(WebrtcVerbindung { peer, pc })
    }
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Eine webrtc-Peer-Verbindung zu genau einem Peer
pub struct WebrtcVerbindung {
    peer: PeerId,
    pc: Arc<RTCPeerConnection>,
}

impl WebrtcVerbindung {
    fn nach_rtc(&self, sdp: &SessionDescription) -> MeshResult<RTCSessionDescription> {
        let ergebnis = match sdp.typ.as_str() {
            "offer" => RTCSessionDescription::offer(sdp.sdp.clone()),
            "answer" => RTCSessionDescription::answer(sdp.sdp.clone()),
            andere => {
                return Err(MeshFehler::media(
                    &self.peer,
                    format!("Unbekannter SDP-Typ: {}", andere),
                ))
            }
        };
        ergebnis.map_err(|e| MeshFehler::media(&self.peer, e.to_string()))
    }
}

#[async_trait]
impl MediaVerbindung for WebrtcVerbindung {
    async fn offer_erstellen(&self) -> MeshResult<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))?;
        Ok(SessionDescription {
            typ: "offer".into(),
            sdp: offer.sdp,
        })
    }

    async fn answer_erstellen(&self, offer: SessionDescription) -> MeshResult<SessionDescription> {
        let remote = self.nach_rtc(&offer)?;
        self.pc
            .set_remote_description(remote)
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))?;
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))?;
        Ok(SessionDescription {
            typ: "answer".into(),
            sdp: answer.sdp,
        })
    }

    async fn remote_description_setzen(&self, sdp: SessionDescription) -> MeshResult<()> {
        let remote = self.nach_rtc(&sdp)?;
        self.pc
            .set_remote_description(remote)
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))
    }

    async fn kandidat_hinzufuegen(&self, kandidat: IceKandidat) -> MeshResult<()> {
        let init = RTCIceCandidateInit {
            candidate: kandidat.candidate,
            sdp_mid: kandidat.sdp_mid,
            sdp_mline_index: kandidat.sdp_mline_index,
            ..Default::default()
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| MeshFehler::media(&self.peer, e.to_string()))
    }

    async fn schliessen(&self) {
        if let Err(e) = self.pc.close().await {
            tracing::warn!("Schliessen der Verbindung zu {} meldet: {}", self.peer, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
