//! WebSocket-Implementierung des Signalisierungskanals
//!
//! Nutzt tokio-tungstenite. Die Verbindung wird beim Aufbau in Sende- und
//! Empfangshaelfte geteilt; ein eigener Lese-Task uebersetzt eingehende
//! Frames in `KanalEreignis`se fuer die Ereignisschleife des Koordinators.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use huddle_protocol::SignalingEnvelope;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{KanalFehler, KanalResult};
use crate::kanal::{KanalEreignis, SignalKanal, SignalKanalFabrik};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

// ---------------------------------------------------------------------------
// WebSocketKanal
// ---------------------------------------------------------------------------

/// Verbundener WebSocket-Kanal zum Rendezvous-Dienst
pub struct WebSocketKanal {
    schreiber: Mutex<WsSink>,
    geschlossen: AtomicBool,
    lese_task: tokio::task::JoinHandle<()>,
}

impl WebSocketKanal {
    fn neu(schreiber: WsSink, lese_task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            schreiber: Mutex::new(schreiber),
            geschlossen: AtomicBool::new(false),
            lese_task,
        }
    }
}

#[async_trait]
impl SignalKanal for WebSocketKanal {
    async fn senden(&self, umschlag: SignalingEnvelope) -> KanalResult<()> {
        if self.geschlossen.load(Ordering::SeqCst) {
            return Err(KanalFehler::Geschlossen);
        }
        let json = umschlag.to_json()?;
        let mut schreiber = self.schreiber.lock().await;
        schreiber.send(Message::text(json)).await?;
        Ok(())
    }

    async fn schliessen(&self) -> KanalResult<()> {
        if self.geschlossen.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut schreiber = self.schreiber.lock().await;
        // Close-Frame ist Best-Effort, der Dienst raeumt auch ohne auf
        let _ = schreiber.send(Message::Close(None)).await;
        let _ = schreiber.close().await;
        tracing::debug!("Signalisierungskanal geschlossen");
        Ok(())
    }
}

impl Drop for WebSocketKanal {
    fn drop(&mut self) {
        self.lese_task.abort();
    }
}

// ---------------------------------------------------------------------------
// Lese-Task
// ---------------------------------------------------------------------------

async fn lese_schleife(
    mut strom: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    ereignisse: mpsc::Sender<KanalEreignis>,
) {
    let grund = loop {
        match strom.next().await {
            Some(Ok(Message::Text(text))) => match SignalingEnvelope::from_json(text.as_str()) {
                Ok(umschlag) => {
                    if ereignisse
                        .send(KanalEreignis::Nachricht(umschlag))
                        .await
                        .is_err()
                    {
                        // Koordinator weg, niemand hoert mehr zu
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Unlesbarer Umschlag verworfen: {}", e);
                }
            },
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(f) => format!("Dienst hat geschlossen: {}", f.reason),
                    None => "Dienst hat geschlossen".to_string(),
                };
            }
            // Ping/Pong beantwortet tungstenite selbst, Binaerframes kennt
            // das Protokoll nicht
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("Transportfehler: {}", e),
            None => break "Verbindung beendet".to_string(),
        }
    };

    tracing::info!("Signalisierungskanal getrennt: {}", grund);
    let _ = ereignisse.send(KanalEreignis::Getrennt { grund }).await;
}

// ---------------------------------------------------------------------------
// Fabrik
// ---------------------------------------------------------------------------

/// Baut WebSocket-Verbindungen zu einer festen Dienst-URL auf
pub struct WebSocketKanalFabrik {
    url: String,
}

impl WebSocketKanalFabrik {
    pub fn neu(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SignalKanalFabrik for WebSocketKanalFabrik {
    type Kanal = WebSocketKanal;

    async fn verbinden(
        &self,
        ereignisse: mpsc::Sender<KanalEreignis>,
    ) -> KanalResult<Self::Kanal> {
        tracing::info!("Verbinde mit Rendezvous-Dienst: {}", self.url);
        let (ws, _antwort) = connect_async(&self.url)
            .await
            .map_err(|e| KanalFehler::Verbindungsaufbau(e.to_string()))?;
        tracing::info!("WebSocket-Verbindung hergestellt");

        let (schreiber, leser) = ws.split();
        let lese_task = tokio::spawn(lese_schleife(leser, ereignisse));

        Ok(WebSocketKanal::neu(schreiber, lese_task))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabrik_merkt_sich_url() {
        let fabrik = WebSocketKanalFabrik::neu("ws://localhost:8080/voice");
        assert_eq!(fabrik.url(), "ws://localhost:8080/voice");
    }

    #[tokio::test]
    #[ignore = "Benoetigt laufenden Rendezvous-Dienst auf localhost:8080"]
    async fn verbinden_und_beitreten() {
        let fabrik = WebSocketKanalFabrik::neu("ws://localhost:8080/voice");
        let (tx, mut rx) = mpsc::channel(16);
        let kanal = fabrik.verbinden(tx).await.unwrap();

        kanal
            .senden(SignalingEnvelope::Join {
                username: "integrationstest".into(),
            })
            .await
            .unwrap();

        // Dienst antwortet mit users-list
        let ereignis = rx.recv().await.unwrap();
        assert!(matches!(
            ereignis,
            KanalEreignis::Nachricht(SignalingEnvelope::UsersList { .. })
        ));

        kanal.schliessen().await.unwrap();
    }
}
