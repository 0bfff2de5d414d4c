//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Client ohne Konfigurationsdatei
//! lauffaehig ist.

use huddle_media::{ErfassungsKonfig, WebrtcKonfig};
use serde::{Deserialize, Serialize};

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Verbindung zum Rendezvous-Dienst
    pub rendezvous: RendezvousEinstellungen,
    /// ICE-Server fuer die Peer-Verhandlung
    pub ice: IceEinstellungen,
    /// Mikrofon und Sprecherkennung
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Verbindung zum Rendezvous-Dienst
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousEinstellungen {
    /// WebSocket-URL des Dienstes
    pub url: String,
    /// Anzeigename im Raum
    pub username: String,
}

impl Default for RendezvousEinstellungen {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/voice".into(),
            username: "gast".into(),
        }
    }
}

/// ICE-Server fuer die Peer-Verhandlung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceEinstellungen {
    /// STUN/TURN-URLs
    pub urls: Vec<String>,
    /// TURN-Benutzername (optional)
    pub username: Option<String>,
    /// TURN-Zugangsdaten (optional)
    pub credential: Option<String>,
}

impl Default for IceEinstellungen {
    fn default() -> Self {
        Self {
            urls: vec!["stun:stun.l.google.com:19302".into()],
            username: None,
            credential: None,
        }
    }
}

/// Mikrofon und Sprecherkennung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono)
    pub channels: u16,
    /// Ring-Buffer-Kapazitaet in Sekunden
    pub puffer_sekunden: u32,
    /// RMS-Schwelle der Sprecherkennung
    pub sprach_schwelle: f32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            puffer_sekunden: 2,
            sprach_schwelle: 0.005,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Capture-Konfiguration fuer die Mikrofonquelle
    pub fn erfassungs_konfig(&self) -> ErfassungsKonfig {
        ErfassungsKonfig {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            // In usize rechnen, das Produkt kann u32 uebersteigen
            buffer_size: self.audio.sample_rate as usize * self.audio.puffer_sekunden as usize,
        }
    }

    /// ICE-Konfiguration fuer die WebRTC-Fabrik
    pub fn webrtc_konfig(&self) -> WebrtcKonfig {
        WebrtcKonfig {
            ice_urls: self.ice.urls.clone(),
            ice_username: self.ice.username.clone(),
            ice_credential: self.ice.credential.clone(),
        }
    }
}
