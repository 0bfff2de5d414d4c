//! Signalisierungs-Umschlaege (WebSocket/JSON)
//!
//! Definiert alle Nachrichten die ueber die WebSocket-Verbindung zum
//! Rendezvous-Dienst laufen.
//!
//! ## Design
//! - Intern getaggtes Enum: das Feld `"type"` traegt den Nachrichtentyp
//! - Kebab-case Tags auf dem Draht (`users-list`, `ice-candidate`, ...)
//! - Feldnamen folgen dem Dienst-Format (`selfId`, `sdpMid`, `sdpMLineIndex`)
//! - Unbekannte Typen landen in einer Catch-all-Variante und werden vom
//!   Empfaenger ignoriert (Vorwaertskompatibilitaet)

use huddle_core::types::{Participant, PeerId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payload-Strukturen
// ---------------------------------------------------------------------------

/// SDP-Beschreibung einer Medienverhandlung (Offer oder Answer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// `"offer"` oder `"answer"`
    #[serde(rename = "type")]
    pub typ: String,
    /// Der SDP-Text selbst
    pub sdp: String,
}

/// Ein einzelner ICE-Kandidat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceKandidat {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: SignalingEnvelope
// ---------------------------------------------------------------------------

/// Alle Nachrichten von und zum Rendezvous-Dienst
///
/// Client -> Dienst: `Join`, `Leave`, `Mute`, `Unmute`, `Speaking`,
/// `StopSpeaking` sowie `Offer`/`Answer`/`IceCandidate` mit gesetztem `to`.
/// Dienst -> Client: `UsersList`, `UserJoined`, `UserLeft`, die
/// Status-Broadcasts sowie weitergeleitete `Offer`/`Answer`/`IceCandidate`
/// mit gesetztem `from` (der Dienst ueberschreibt `from` gegen Spoofing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingEnvelope {
    // --- Client -> Dienst ---
    Join {
        username: String,
    },
    Leave,
    Mute,
    Unmute,
    Speaking,
    StopSpeaking,

    // --- Dienst -> Client: Roster ---
    UsersList {
        #[serde(rename = "selfId")]
        self_id: PeerId,
        users: Vec<Participant>,
    },
    UserJoined {
        user: Participant,
    },
    UserLeft {
        id: PeerId,
        username: String,
    },
    UserMuted {
        id: PeerId,
    },
    UserUnmuted {
        id: PeerId,
    },
    UserSpeaking {
        id: PeerId,
    },
    UserStoppedSpeaking {
        id: PeerId,
    },

    // --- Beide Richtungen: Verhandlungs-Relay ---
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        sdp: SessionDescription,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        sdp: SessionDescription,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<PeerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<PeerId>,
        candidate: IceKandidat,
    },

    /// Unbekannter Nachrichtentyp, wird ignoriert
    #[serde(other)]
    Unbekannt,
}

impl SignalingEnvelope {
    /// Erstellt ein Offer an einen bestimmten Peer
    pub fn offer_an(to: PeerId, sdp: SessionDescription) -> Self {
        Self::Offer {
            to: Some(to),
            from: None,
            sdp,
        }
    }

    /// Erstellt ein Answer an einen bestimmten Peer
    pub fn answer_an(to: PeerId, sdp: SessionDescription) -> Self {
        Self::Answer {
            to: Some(to),
            from: None,
            sdp,
        }
    }

    /// Erstellt einen ICE-Kandidaten an einen bestimmten Peer
    pub fn kandidat_an(to: PeerId, candidate: IceKandidat) -> Self {
        Self::IceCandidate {
            to: Some(to),
            from: None,
            candidate,
        }
    }

    /// Serialisiert den Umschlag als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert einen Umschlag aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::types::Presence;

    #[test]
    fn join_traegt_kebab_tag() {
        let msg = SignalingEnvelope::Join {
            username: "alice".into(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("\"username\":\"alice\""));
    }

    #[test]
    fn stop_speaking_tag() {
        let json = SignalingEnvelope::StopSpeaking.to_json().unwrap();
        assert_eq!(json, "{\"type\":\"stop-speaking\"}");
    }

    #[test]
    fn users_list_deserialisierung() {
        let json = r#"{
            "type": "users-list",
            "selfId": "s42",
            "users": [
                {"id": "s1", "username": "bob", "status": "online"},
                {"id": "s2", "username": "eve", "status": "muted"}
            ]
        }"#;
        let msg = SignalingEnvelope::from_json(json).unwrap();
        if let SignalingEnvelope::UsersList { self_id, users } = msg {
            assert_eq!(self_id, PeerId::from("s42"));
            assert_eq!(users.len(), 2);
            assert_eq!(users[1].status, Presence::Muted);
        } else {
            panic!("Erwartet UsersList");
        }
    }

    #[test]
    fn user_left_traegt_id_und_namen() {
        let json = r#"{"type":"user-left","id":"s7","username":"bob"}"#;
        let msg = SignalingEnvelope::from_json(json).unwrap();
        assert_eq!(
            msg,
            SignalingEnvelope::UserLeft {
                id: PeerId::from("s7"),
                username: "bob".into(),
            }
        );
    }

    #[test]
    fn offer_roundtrip_mit_to() {
        let msg = SignalingEnvelope::offer_an(
            PeerId::from("s9"),
            SessionDescription {
                typ: "offer".into(),
                sdp: "v=0...".into(),
            },
        );
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"offer\""));
        // `from` fehlt auf dem Draht wenn nicht gesetzt
        assert!(!json.contains("\"from\""));
        let decoded = SignalingEnvelope::from_json(&json).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn sdp_inneres_type_feld() {
        let sdp = SessionDescription {
            typ: "answer".into(),
            sdp: "v=0".into(),
        };
        let json = serde_json::to_string(&sdp).unwrap();
        assert_eq!(json, "{\"type\":\"answer\",\"sdp\":\"v=0\"}");
    }

    #[test]
    fn ice_kandidat_camel_case_felder() {
        let json = r#"{
            "type": "ice-candidate",
            "from": "s3",
            "candidate": {
                "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
                "sdpMid": "0",
                "sdpMLineIndex": 0
            }
        }"#;
        let msg = SignalingEnvelope::from_json(json).unwrap();
        if let SignalingEnvelope::IceCandidate {
            from, candidate, ..
        } = msg
        {
            assert_eq!(from, Some(PeerId::from("s3")));
            assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
            assert_eq!(candidate.sdp_mline_index, Some(0));
        } else {
            panic!("Erwartet IceCandidate");
        }
    }

    #[test]
    fn kandidat_ohne_mid_felder() {
        let json = r#"{"type":"ice-candidate","candidate":{"candidate":"candidate:..."}}"#;
        let msg = SignalingEnvelope::from_json(json).unwrap();
        if let SignalingEnvelope::IceCandidate { candidate, .. } = msg {
            assert_eq!(candidate.sdp_mid, None);
            assert_eq!(candidate.sdp_mline_index, None);
        } else {
            panic!("Erwartet IceCandidate");
        }
    }

    #[test]
    fn unbekannter_typ_wird_catch_all() {
        let json = r#"{"type":"server-announcement","text":"Wartung um 3 Uhr"}"#;
        let msg = SignalingEnvelope::from_json(json).unwrap();
        assert_eq!(msg, SignalingEnvelope::Unbekannt);
    }

    #[test]
    fn status_broadcasts_roundtrip() {
        for (env, tag) in [
            (
                SignalingEnvelope::UserMuted {
                    id: PeerId::from("a"),
                },
                "user-muted",
            ),
            (
                SignalingEnvelope::UserSpeaking {
                    id: PeerId::from("a"),
                },
                "user-speaking",
            ),
            (
                SignalingEnvelope::UserStoppedSpeaking {
                    id: PeerId::from("a"),
                },
                "user-stopped-speaking",
            ),
        ] {
            let json = env.to_json().unwrap();
            assert!(json.contains(tag), "Tag {tag} fehlt in {json}");
            assert_eq!(SignalingEnvelope::from_json(&json).unwrap(), env);
        }
    }
}
