/// Fenêtre glissante d'échantillons mono normalisés [-1, 1].
///
/// Pré-allouée à l'ouverture de la capture, jamais redimensionnée ensuite :
/// le contenu est réécrit en place à chaque frame.
///
/// # Example
/// ```
/// use vt_core::frame::SampleBuffer;
/// let mut buf = SampleBuffer::new(8);
/// buf.push_slice(&[0.5, -0.5]);
/// assert_eq!(buf.len(), 8);
/// assert_eq!(buf.as_slice()[6..], [0.5, -0.5]);
/// ```
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Crée une fenêtre de `len` échantillons silencieux.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Number of samples in the window. Constant for the lifetime of the buffer.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` for a zero-length window.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples, oldest first.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Appends `incoming` at the newest end, discarding the oldest samples.
    ///
    /// Zero allocation. If `incoming` is longer than the window only its tail
    /// is kept.
    pub fn push_slice(&mut self, incoming: &[f32]) {
        let len = self.samples.len();
        if incoming.len() >= len {
            self.samples
                .copy_from_slice(&incoming[incoming.len() - len..]);
            return;
        }
        let n = incoming.len();
        self.samples.copy_within(n.., 0);
        self.samples[len - n..].copy_from_slice(incoming);
    }

    /// Remet la fenêtre à zéro sans réallouer.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

/// Magnitudes spectrales quantifiées sur 0–255, une par bin linéaire
/// couvrant `[0, nyquist)`.
///
/// # Example
/// ```
/// use vt_core::frame::SpectrumBins;
/// let bins = SpectrumBins::new(1024);
/// assert_eq!(bins.len(), 1024);
/// assert!(bins.as_slice().iter().all(|&b| b == 0));
/// ```
#[derive(Clone, Debug)]
pub struct SpectrumBins {
    bins: Vec<u8>,
}

impl SpectrumBins {
    /// Crée `len` bins à zéro.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { bins: vec![0; len] }
    }

    /// Number of frequency bins.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// `true` when there are no bins.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bins
    }

    /// Mutable access for the spectrum analyser, which rewrites every bin each frame.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bins
    }

    pub fn clear(&mut self) {
        self.bins.fill(0);
    }
}

/// Répartition de l'énergie spectrale, en pourcentages [0, 100].
///
/// Les deux valeurs sont indépendantes : elles ne somment pas à 100.
///
/// # Example
/// ```
/// use vt_core::frame::SpectralFeatures;
/// let f = SpectralFeatures::default();
/// assert_eq!(f.high_freq_energy, 0.0);
/// assert_eq!(f.low_freq_boost, 0.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectralFeatures {
    /// Share of energy at or above the high band edge (2 kHz by default).
    pub high_freq_energy: f32,
    /// Share of energy at or below the low band edge (500 Hz by default).
    pub low_freq_boost: f32,
}

/// Résultat de l'analyse pour un tick, remis tel quel au consommateur.
///
/// Créé à chaque tick, jamais modifié après émission. Taille fixe, Copy.
///
/// # Example
/// ```
/// use vt_core::frame::AnalysisFrame;
/// let f = AnalysisFrame::idle(true);
/// assert!(!f.is_analyzing);
/// assert!(f.has_permission);
/// assert_eq!(f.pitch, 0.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnalysisFrame {
    /// Fondamentale estimée en Hz. 0.0 = pas de pitch fiable.
    pub pitch: f32,
    /// Énergie haute fréquence [0, 100].
    pub high_freq_energy: f32,
    /// Énergie basse fréquence [0, 100].
    pub low_freq_boost: f32,
    /// `true` tant que le contrôleur est actif.
    pub is_analyzing: bool,
    /// `true` si l'accès au micro a été obtenu.
    pub has_permission: bool,
}

impl AnalysisFrame {
    /// Frame produite par un tick actif.
    #[must_use]
    pub fn active(pitch: f32, spectral: SpectralFeatures) -> Self {
        Self {
            pitch,
            high_freq_energy: spectral.high_freq_energy,
            low_freq_boost: spectral.low_freq_boost,
            is_analyzing: true,
            has_permission: true,
        }
    }

    /// Frame à zéro émise en sortie d'analyse (arrêt ou échec d'ouverture).
    #[must_use]
    pub fn idle(has_permission: bool) -> Self {
        Self {
            has_permission,
            ..Self::default()
        }
    }

    /// Spectral part of the frame.
    #[must_use]
    pub fn spectral(&self) -> SpectralFeatures {
        SpectralFeatures {
            high_freq_energy: self.high_freq_energy,
            low_freq_boost: self.low_freq_boost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_shorter_than_window_shifts_in_place() {
        let mut buf = SampleBuffer::new(4);
        buf.push_slice(&[1.0, 2.0]);
        buf.push_slice(&[3.0]);
        assert_eq!(buf.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn push_longer_than_window_keeps_tail() {
        let mut buf = SampleBuffer::new(3);
        buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.as_slice(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn active_frame_carries_features() {
        let frame = AnalysisFrame::active(
            220.0,
            SpectralFeatures {
                high_freq_energy: 12.5,
                low_freq_boost: 40.0,
            },
        );
        assert!(frame.is_analyzing);
        assert!(frame.has_permission);
        assert!((frame.spectral().low_freq_boost - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn idle_frame_is_zeroed() {
        let frame = AnalysisFrame::idle(false);
        assert_eq!(frame, AnalysisFrame::default());
    }
}
