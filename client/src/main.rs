//! Huddle Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, verdrahtet
//! Mikrofon, WebRTC-Fabrik und Signalisierungskanal mit dem Koordinator
//! und tritt dem Raum bei. Ctrl-C verlaesst den Raum sauber.

mod config;

use anyhow::Result;
use huddle_media::{LokaleMediaQuelle, WebrtcFabrik};
use huddle_session::{Koordinator, SitzungsMeldung};
use huddle_signaling::WebSocketKanalFabrik;
use tokio::sync::mpsc;

use config::ClientConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Argument, Umgebungsvariable oder Standard
    let config_pfad = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HUDDLE_CONFIG").ok())
        .unwrap_or_else(|| "huddle.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ClientConfig::laden(&config_pfad)?;

    // Logging initialisieren
    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        url = %config.rendezvous.url,
        "Huddle Client wird initialisiert"
    );

    // Mikrofonquelle mit Sprecherkennung
    let (sprach_tx, sprach_rx) = mpsc::channel(64);
    let quelle = LokaleMediaQuelle::neu(
        config.erfassungs_konfig(),
        config.audio.sprach_schwelle,
        sprach_tx,
    );

    // WebRTC-Fabrik mit lokalem Opus-Track
    let (media_fabrik, _lokaler_track) = WebrtcFabrik::mit_opus_track(config.webrtc_konfig());

    // Signalisierungskanal zum Rendezvous-Dienst
    let kanal_fabrik = WebSocketKanalFabrik::neu(&config.rendezvous.url);

    let (meldung_tx, mut meldung_rx) = mpsc::channel(64);
    let (koordinator, griff) =
        Koordinator::neu(kanal_fabrik, media_fabrik, quelle, sprach_rx, meldung_tx);

    // Roster-Schnappschuesse nur protokollieren
    let mut roster_rx = koordinator.roster_abonnieren();
    tokio::spawn(async move {
        while let Ok(teilnehmer) = roster_rx.recv().await {
            let namen: Vec<&str> = teilnehmer.iter().map(|p| p.username.as_str()).collect();
            tracing::info!(anzahl = teilnehmer.len(), ?namen, "Roster aktualisiert");
        }
    });

    tokio::spawn(koordinator.ausfuehren());
    griff.beitreten(config.rendezvous.username.clone()).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C, verlasse den Raum");
                griff.verlassen().await?;
                griff.beenden().await?;
                // Restliche Meldungen (RaumVerlassen, Zustandswechsel) ausgeben
                while let Some(meldung) = meldung_rx.recv().await {
                    meldung_ausgeben(&meldung);
                }
                break;
            }
            meldung = meldung_rx.recv() => match meldung {
                Some(meldung) => meldung_ausgeben(&meldung),
                None => break,
            },
        }
    }

    Ok(())
}

fn meldung_ausgeben(meldung: &SitzungsMeldung) {
    match meldung {
        SitzungsMeldung::ZustandGewechselt(zustand) => {
            tracing::debug!(?zustand, "Sitzungszustand gewechselt");
        }
        SitzungsMeldung::RaumBetreten { selbst, teilnehmer } => {
            tracing::info!(
                selbst = %selbst,
                teilnehmer = teilnehmer.len(),
                "Raum betreten"
            );
        }
        SitzungsMeldung::RaumVerlassen => {
            tracing::info!("Raum verlassen");
        }
        SitzungsMeldung::Getrennt { grund } => {
            tracing::warn!(grund = %grund, "Verbindung zum Dienst verloren");
        }
        SitzungsMeldung::Fehler(text) => {
            tracing::error!(fehler = %text, "Sitzungsfehler");
        }
        SitzungsMeldung::TrackEmpfangen { peer } => {
            tracing::info!(peer = %peer, "Audio-Track empfangen");
        }
    }
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
fn logging_initialisieren(level: &str, format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}
