use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use vt_core::config::CaptureConfig;
use vt_core::frame::{SampleBuffer, SpectrumBins};
use vt_core::traits::Snapshot;

/// Analyseur spectral : FFT réelle fenêtrée, lissage temporel, quantification en octets.
///
/// Pré-alloue le plan FFT et tous les buffers : zéro allocation en hot path.
/// Le lissage est fixé à la construction et ne se règle pas par appel.
///
/// # Example
/// ```
/// use vt_audio::spectrum::SpectrumAnalyser;
/// use vt_core::config::CaptureConfig;
///
/// let mut analyser = SpectrumAnalyser::new(&CaptureConfig::default());
/// let mut bins = vec![0u8; analyser.bin_count()];
/// analyser.process(&vec![0.0; 2048], &mut bins);
/// assert_eq!(bins.len(), 1024);
/// assert!(bins.iter().all(|&b| b == 0));
/// ```
pub struct SpectrumAnalyser {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: Arc<dyn RealToComplex<f32>>,
    /// Blackman window coefficients.
    window: Vec<f32>,
    /// Magnitudes lissées de la frame précédente.
    smoothed: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl SpectrumAnalyser {
    /// Create an analyser from the capture settings.
    ///
    /// # Panics
    /// Panics if `config.fft_size` is smaller than 2.
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        let size = config.fft_size;
        assert!(size >= 2, "FFT size must be >= 2");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        // Blackman, alpha = 0.16
        let n = size as f32;
        let window: Vec<f32> = (0..size)
            .map(|i| {
                let x = 2.0 * std::f32::consts::PI * i as f32 / n;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
            smoothed: vec![0.0; size / 2],
            smoothing: config.smoothing_time_constant.clamp(0.0, 0.99),
            min_db: config.min_decibels,
            max_db: config.max_decibels,
        }
    }

    /// Number of output bins (`fft_size / 2`).
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Analyse les `fft_size` échantillons les plus récents de `samples` et
    /// écrit le spectre quantifié dans `out` (`bin_count()` octets).
    ///
    /// Shorter input is zero-padded at the front. Extra bins in `out` are left untouched.
    pub fn process(&mut self, samples: &[f32], out: &mut [u8]) {
        let take = samples.len().min(self.fft_size);
        let pad = self.fft_size - take;
        let recent = &samples[samples.len() - take..];

        self.input_buf[..pad].fill(0.0);
        for (i, (slot, &s)) in self.input_buf[pad..].iter_mut().zip(recent).enumerate() {
            *slot = s * self.window[pad + i];
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            log::warn!("FFT en échec, spectre remis à zéro");
            out.iter_mut().take(self.bin_count()).for_each(|b| *b = 0);
            return;
        }

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        let range = self.max_db - self.min_db;

        for ((prev, c), byte) in self
            .smoothed
            .iter_mut()
            .zip(&self.spectrum_buf)
            .zip(out.iter_mut())
        {
            let magnitude = (c.re * c.re + c.im * c.im).sqrt() * norm;
            *prev = tau * *prev + (1.0 - tau) * magnitude;
            *byte = to_byte(*prev, self.min_db, range);
        }
    }

    /// Efface l'historique de lissage (nouvelle session).
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

/// Magnitude linéaire → octet via la plage [min_db, min_db + range].
#[inline(always)]
fn to_byte(magnitude: f32, min_db: f32, range: f32) -> u8 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 / range * (db - min_db)).floor();
    scaled.clamp(0.0, 255.0) as u8
}

/// Fenêtre d'analyse d'un handle : échantillons + spectre du même instant.
///
/// Partagé par tous les backends de capture. Tout est alloué à la construction.
pub struct AnalysisWindow {
    samples: SampleBuffer,
    spectrum: SpectrumBins,
    analyser: SpectrumAnalyser,
}

impl AnalysisWindow {
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        let analyser = SpectrumAnalyser::new(config);
        Self {
            samples: SampleBuffer::new(analyser.fft_size()),
            spectrum: SpectrumBins::new(analyser.bin_count()),
            analyser,
        }
    }

    /// Append freshly captured samples.
    #[inline]
    pub fn push(&mut self, incoming: &[f32]) {
        if !incoming.is_empty() {
            self.samples.push_slice(incoming);
        }
    }

    /// Recompute the spectrum from the current window and lend both out.
    pub fn refresh(&mut self, sample_rate: u32) -> Snapshot<'_> {
        self.analyser
            .process(self.samples.as_slice(), self.spectrum.as_mut_slice());
        Snapshot {
            samples: &self.samples,
            spectrum: &self.spectrum,
            sample_rate,
        }
    }

    /// Silence the window and forget the smoothing history.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.spectrum.clear();
        self.analyser.reset();
    }
}
