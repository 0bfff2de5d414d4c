//! Pegelmessung und Sprecherkennung
//!
//! Einfacher RMS-Detektor mit Hysterese: Sprechbeginn sofort bei
//! Ueberschreiten der Schwelle, Sprechende erst nach einer Haltezeit
//! stiller Frames, damit kurze Atempausen nicht flattern.

/// Berechnet den RMS-Pegel eines Audio-Frames
pub fn rms_pegel(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let quadratsumme: f32 = samples.iter().map(|s| s * s).sum();
    (quadratsumme / samples.len() as f32).sqrt()
}

/// Sprecherkennung ueber RMS-Schwelle mit Hysterese
pub struct SprachDetektor {
    /// RMS-Schwelle ab der ein Frame als Sprache gilt
    schwelle: f32,
    /// Anzahl stiller Frames bevor Sprechende gemeldet wird
    halte_frames: u32,
    spricht: bool,
    stille_frames: u32,
}

impl SprachDetektor {
    pub fn neu(schwelle: f32, halte_frames: u32) -> Self {
        Self {
            schwelle,
            halte_frames,
            spricht: false,
            stille_frames: 0,
        }
    }

    /// Standardwerte: -46 dBFS Schwelle, rund eine halbe Sekunde Haltezeit
    /// bei 20-ms-Frames
    pub fn standard() -> Self {
        Self::neu(0.005, 25)
    }

    pub fn spricht(&self) -> bool {
        self.spricht
    }

    /// Verarbeitet einen Frame. `Some(true)` = Sprechen beginnt,
    /// `Some(false)` = Sprechen endet, `None` = keine Aenderung.
    pub fn verarbeiten(&mut self, frame: &[f32]) -> Option<bool> {
        let laut = rms_pegel(frame) > self.schwelle;
        if laut {
            self.stille_frames = 0;
            if !self.spricht {
                self.spricht = true;
                return Some(true);
            }
        } else if self.spricht {
            self.stille_frames += 1;
            if self.stille_frames >= self.halte_frames {
                self.spricht = false;
                self.stille_frames = 0;
                return Some(false);
            }
        }
        None
    }

    /// Setzt den Detektor zurueck (z. B. beim Stummschalten).
    /// Gibt zurueck ob gerade gesprochen wurde.
    pub fn zuruecksetzen(&mut self) -> bool {
        let sprach = self.spricht;
        self.spricht = false;
        self.stille_frames = 0;
        sprach
    }
}
