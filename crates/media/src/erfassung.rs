//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen cpal InputStream und schreibt Samples in einen
//! lock-free Ring-Buffer. Das Stumm-Flag wird im cpal-Callback gelesen:
//! stumm geschaltete Frames werden an der Quelle verworfen und erreichen
//! den Ring-Buffer nie.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, warn};

use crate::error::{MediaFehler, MediaResult};

/// Konfiguration fuer den Mikrofon-Capture
#[derive(Debug, Clone)]
pub struct ErfassungsKonfig {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub channels: u16,
    /// Ring-Buffer Kapazitaet in Samples
    pub buffer_size: usize,
}

impl Default for ErfassungsKonfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            buffer_size: 48000 * 2, // 2 Sekunden Puffer
        }
    }
}

/// Produziert Samples aus dem Mikrofon-Callback
pub type ErfassungsProduzent = HeapProd<f32>;
/// Konsumiert Samples fuer die Verarbeitung
pub type ErfassungsKonsument = HeapCons<f32>;

/// Laufender Capture-Stream
///
/// Haelt den cpal-Stream am Leben. Wird der ErfassungsStrom gedroppt,
/// stoppt die Aufnahme automatisch.
pub struct ErfassungsStrom {
    _stream: Stream,
    konfig: ErfassungsKonfig,
}

impl ErfassungsStrom {
    /// Gibt die Konfiguration des Streams zurueck
    pub fn konfig(&self) -> &ErfassungsKonfig {
        &self.konfig
    }
}

/// Oeffnet einen Capture-Stream auf dem gegebenen Geraet.
///
/// Gibt den Stream und den Ring-Buffer Consumer zurueck. Der Producer
/// laeuft im cpal-Callback-Thread; solange `stumm` gesetzt ist, wird
/// nichts produziert.
pub fn erfassung_oeffnen(
    device: &Device,
    konfig: ErfassungsKonfig,
    stumm: Arc<AtomicBool>,
) -> MediaResult<(ErfassungsStrom, ErfassungsKonsument)> {
    let stream_config = StreamConfig {
        channels: konfig.channels,
        sample_rate: cpal::SampleRate(konfig.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(konfig.buffer_size);
    let (mut produzent, konsument) = rb.split();

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    // Unterstuetzte Sample-Formate pruefen
    let unterstuetzt = device
        .supported_input_configs()
        .map_err(|e| MediaFehler::ZugriffVerweigert(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= konfig.sample_rate
                && c.max_sample_rate().0 >= konfig.sample_rate
                && c.channels() >= konfig.channels
        });

    let sample_format = unterstuetzt
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let stream = match sample_format {
        SampleFormat::F32 => {
            let stumm = stumm.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if stumm.load(Ordering::Relaxed) {
                            return;
                        }
                        let geschrieben = produzent.push_slice(data);
                        if geschrieben < data.len() {
                            warn!(
                                "Capture Ring-Buffer voll, {} Samples verworfen",
                                data.len() - geschrieben
                            );
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| MediaFehler::StreamFehler(e.to_string()))?
        }
        SampleFormat::I16 => {
            let stumm = stumm.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if stumm.load(Ordering::Relaxed) {
                            return;
                        }
                        let floats: Vec<f32> =
                            data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                        let geschrieben = produzent.push_slice(&floats);
                        if geschrieben < floats.len() {
                            warn!("Capture Ring-Buffer voll");
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| MediaFehler::StreamFehler(e.to_string()))?
        }
        SampleFormat::U8 => {
            let stumm = stumm.clone();
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[u8], _| {
                        if stumm.load(Ordering::Relaxed) {
                            return;
                        }
                        let floats: Vec<f32> =
                            data.iter().map(|&s| (s as f32 - 128.0) / 128.0).collect();
                        let geschrieben = produzent.push_slice(&floats);
                        if geschrieben < floats.len() {
                            warn!("Capture Ring-Buffer voll");
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| MediaFehler::StreamFehler(e.to_string()))?
        }
        _ => {
            return Err(MediaFehler::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| MediaFehler::StreamFehler(e.to_string()))?;

    debug!(
        "Capture-Stream geoeffnet: {}Hz {}ch",
        konfig.sample_rate, konfig.channels
    );

    Ok((
        ErfassungsStrom {
            _stream: stream,
            konfig,
        },
        konsument,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::traits::HostTrait;

    #[test]
    fn erfassungs_konfig_default() {
        let konfig = ErfassungsKonfig::default();
        assert_eq!(konfig.sample_rate, 48000);
        assert_eq!(konfig.channels, 1);
        assert!(konfig.buffer_size > 0);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn erfassung_oeffnen_auf_standardgeraet() {
        let host = cpal::default_host();
        if let Some(device) = host.default_input_device() {
            let konfig = ErfassungsKonfig::default();
            let stumm = Arc::new(AtomicBool::new(false));
            let result = erfassung_oeffnen(&device, konfig, stumm);
            assert!(result.is_ok(), "Capture-Stream sollte oeffenbar sein");
        }
    }
}
