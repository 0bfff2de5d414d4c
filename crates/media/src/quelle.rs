//! Lokale Medienquelle
//!
//! Kapselt das Mikrofon hinter erfassen/freigeben/stumm_setzen. Die
//! cpal-Streams leben in einem eigenen std::thread (cpal::Stream ist
//! !Send und kann nicht in Tokio-Tasks leben); die Sprecherkennung
//! laeuft im selben Thread und meldet Wechsel ueber einen mpsc-Kanal
//! an die Ereignisschleife des Koordinators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::HostTrait;
use ringbuf::traits::Consumer;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::erfassung::{erfassung_oeffnen, ErfassungsKonfig};
use crate::error::{MediaFehler, MediaResult};
use crate::pegel::SprachDetektor;

/// Wechsel des lokalen Sprechzustands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprachEreignis {
    SprechenBeginnt,
    SprechenEndet,
}

/// Schnittstelle der lokalen Medienquelle
///
/// Der Koordinator haengt an dieser Schnittstelle; Tests ersetzen das
/// echte Mikrofon durch eine Mock-Implementierung.
pub trait MediaQuelle: Send {
    /// Beschafft das Mikrofon. Fehlschlag bedeutet: kein Beitritt.
    fn erfassen(&mut self) -> MediaResult<()>;

    /// Gibt das Mikrofon frei. Idempotent.
    fn freigeben(&mut self);

    /// Setzt das Stumm-Flag. Frames werden an der Quelle verworfen,
    /// es findet keine Neuverhandlung statt.
    fn stumm_setzen(&mut self, stumm: bool);

    fn ist_aktiv(&self) -> bool;

    fn ist_stumm(&self) -> bool;
}

/// Produktive Medienquelle auf Basis von cpal
pub struct LokaleMediaQuelle {
    konfig: ErfassungsKonfig,
    detektor_schwelle: f32,
    stumm: Arc<AtomicBool>,
    laeuft: Arc<AtomicBool>,
    sprach_ereignisse: mpsc::Sender<SprachEreignis>,
    // std::thread weil cpal::Stream !Send ist
    audio_thread: Option<std::thread::JoinHandle<()>>,
}

impl LokaleMediaQuelle {
    pub fn neu(
        konfig: ErfassungsKonfig,
        detektor_schwelle: f32,
        sprach_ereignisse: mpsc::Sender<SprachEreignis>,
    ) -> Self {
        Self {
            konfig,
            detektor_schwelle,
            stumm: Arc::new(AtomicBool::new(false)),
            laeuft: Arc::new(AtomicBool::new(false)),
            sprach_ereignisse,
            audio_thread: None,
        }
    }
}

impl MediaQuelle for LokaleMediaQuelle {
    fn erfassen(&mut self) -> MediaResult<()> {
        if self.audio_thread.is_some() {
            return Ok(());
        }

        self.laeuft.store(true, Ordering::Relaxed);
        self.stumm.store(false, Ordering::Relaxed);

        let konfig = self.konfig.clone();
        let stumm = Arc::clone(&self.stumm);
        let laeuft = Arc::clone(&self.laeuft);
        let ereignisse = self.sprach_ereignisse.clone();
        let mut detektor = SprachDetektor::neu(self.detektor_schwelle, 25);

        // Startergebnis kommt ueber einen Einmal-Kanal aus dem Thread zurueck
        let (start_tx, start_rx) = std::sync::mpsc::channel::<MediaResult<()>>();

        let thread = std::thread::Builder::new()
            .name("huddle-audio".into())
            .spawn(move || {
                let host = cpal::default_host();
                let geraet = match host.default_input_device() {
                    Some(g) => g,
                    None => {
                        let _ = start_tx.send(Err(MediaFehler::KeinStandardEingabegeraet));
                        return;
                    }
                };

                let (_strom, mut konsument) = match erfassung_oeffnen(&geraet, konfig, stumm.clone())
                {
                    Ok(paar) => paar,
                    Err(e) => {
                        let _ = start_tx.send(Err(e));
                        return;
                    }
                };
                let _ = start_tx.send(Ok(()));

                // 20-ms-Frames bei 48 kHz Mono
                let mut puffer = vec![0.0f32; 960];
                while laeuft.load(Ordering::Relaxed) {
                    if stumm.load(Ordering::Relaxed) {
                        // Stumm: keine Frames mehr, laufendes Sprechen beenden
                        if detektor.zuruecksetzen() {
                            let _ = ereignisse.blocking_send(SprachEreignis::SprechenEndet);
                        }
                        std::thread::sleep(Duration::from_millis(20));
                        continue;
                    }

                    let gelesen = konsument.pop_slice(&mut puffer);
                    if gelesen == 0 {
                        std::thread::sleep(Duration::from_millis(10));
                        continue;
                    }

                    if let Some(beginnt) = detektor.verarbeiten(&puffer[..gelesen]) {
                        let ereignis = if beginnt {
                            SprachEreignis::SprechenBeginnt
                        } else {
                            SprachEreignis::SprechenEndet
                        };
                        if ereignisse.blocking_send(ereignis).is_err() {
                            // Koordinator weg
                            break;
                        }
                    }
                }

                debug!("Audio-Thread beendet, cpal-Stream wird gedroppt");
            })
            .map_err(|e| MediaFehler::StreamFehler(e.to_string()))?;

        // Auf das Startergebnis warten
        match start_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {
                self.audio_thread = Some(thread);
                info!("Mikrofon erfasst");
                Ok(())
            }
            Ok(Err(e)) => {
                self.laeuft.store(false, Ordering::Relaxed);
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                self.laeuft.store(false, Ordering::Relaxed);
                let _ = thread.join();
                Err(MediaFehler::StreamFehler(
                    "Zeitueberschreitung beim Oeffnen des Mikrofons".into(),
                ))
            }
        }
    }

    fn freigeben(&mut self) {
        self.laeuft.store(false, Ordering::Relaxed);
        if let Some(thread) = self.audio_thread.take() {
            if thread.join().is_err() {
                warn!("Audio-Thread unsauber beendet");
            }
            info!("Mikrofon freigegeben");
        }
    }

    fn stumm_setzen(&mut self, stumm: bool) {
        self.stumm.store(stumm, Ordering::Relaxed);
        info!("Mikrofon stumm: {}", stumm);
    }

    fn ist_aktiv(&self) -> bool {
        self.audio_thread.is_some()
    }

    fn ist_stumm(&self) -> bool {
        self.stumm.load(Ordering::Relaxed)
    }
}

impl Drop for LokaleMediaQuelle {
    fn drop(&mut self) {
        self.freigeben();
    }
}
