use vt_core::config::CaptureConfig;
use vt_core::error::CaptureError;
use vt_core::traits::{CaptureHandle, CaptureSource, Snapshot};

use crate::spectrum::AnalysisWindow;

/// Source synthétique : sinusoïde (plus harmoniques optionnelles).
///
/// Chaque snapshot avance d'un `hop` d'échantillons, indépendamment de
/// l'horloge : la sortie est entièrement déterministe. Sert au mode `--tone`
/// et aux tests du contrôleur.
///
/// # Example
/// ```
/// use vt_audio::features::estimate_pitch;
/// use vt_audio::synth::ToneSource;
/// use vt_core::config::CaptureConfig;
/// use vt_core::traits::{CaptureHandle, CaptureSource};
///
/// let mut source = ToneSource::new(220.0, 44100, CaptureConfig::default());
/// let mut handle = source.open().unwrap();
/// let snap = handle.snapshot().unwrap();
/// let pitch = estimate_pitch(snap.samples.as_slice(), snap.sample_rate);
/// assert!((pitch - 220.0).abs() <= 3.0);
/// ```
#[derive(Clone, Debug)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    /// Relative amplitudes of harmonics 2, 3, …
    harmonics: Vec<f32>,
    sample_rate: u32,
    hop: usize,
    config: CaptureConfig,
    open_error: Option<CaptureError>,
    snapshot_limit: Option<usize>,
    /// Snapshot attempt (0-based) that fails once with the given error.
    snapshot_failure: Option<(usize, CaptureError)>,
}

impl ToneSource {
    #[must_use]
    pub fn new(frequency: f32, sample_rate: u32, config: CaptureConfig) -> Self {
        Self {
            frequency,
            amplitude: 0.5,
            harmonics: Vec::new(),
            sample_rate,
            hop: config.fft_size,
            config,
            open_error: None,
            snapshot_limit: None,
            snapshot_failure: None,
        }
    }

    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Add harmonics, `relative[0]` being the 2nd harmonic's amplitude relative to the fundamental.
    #[must_use]
    pub fn with_harmonics(mut self, relative: &[f32]) -> Self {
        self.harmonics = relative.to_vec();
        self
    }

    /// Samples generated per snapshot. Defaults to one full window.
    #[must_use]
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop.max(1);
        self
    }

    /// Make every `open` fail with `error`, as a refused or missing device would.
    #[must_use]
    pub fn failing_with(mut self, error: CaptureError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// After `n` snapshots the handle behaves as if the device went away.
    #[must_use]
    pub fn with_snapshot_limit(mut self, n: usize) -> Self {
        self.snapshot_limit = Some(n);
        self
    }

    /// Make snapshot attempt `attempt` (0-based) fail once with `error`, as a
    /// transient backend hiccup would. Later attempts succeed.
    #[must_use]
    pub fn failing_snapshot(mut self, attempt: usize, error: CaptureError) -> Self {
        self.snapshot_failure = Some((attempt, error));
        self
    }
}

impl CaptureSource for ToneSource {
    type Handle = ToneHandle;

    fn open(&mut self) -> Result<ToneHandle, CaptureError> {
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::DeviceUnavailable);
        }
        log::debug!(
            "Source synthétique {} Hz @ {}Hz",
            self.frequency,
            self.sample_rate
        );
        Ok(ToneHandle {
            tone: self.clone(),
            scratch: vec![0.0; self.hop],
            cursor: 0,
            window: AnalysisWindow::new(&self.config),
            snapshots: 0,
            attempts: 0,
            closed: false,
        })
    }
}

/// Handle de la source synthétique.
pub struct ToneHandle {
    tone: ToneSource,
    scratch: Vec<f32>,
    cursor: u64,
    window: AnalysisWindow,
    snapshots: usize,
    attempts: usize,
    closed: bool,
}

impl ToneHandle {
    /// Number of successful snapshots so far.
    #[must_use]
    pub fn snapshots(&self) -> usize {
        self.snapshots
    }

    fn generate(&mut self) {
        let sr = self.tone.sample_rate as f64;
        let w = 2.0 * std::f64::consts::PI * f64::from(self.tone.frequency) / sr;
        for slot in &mut self.scratch {
            // Phase from the absolute sample index keeps long runs exact.
            let phase = w * self.cursor as f64;
            let mut value = phase.sin();
            for (k, rel) in self.tone.harmonics.iter().enumerate() {
                value += f64::from(*rel) * (phase * (k as f64 + 2.0)).sin();
            }
            *slot = (value * f64::from(self.tone.amplitude)) as f32;
            self.cursor += 1;
        }
    }
}

impl CaptureHandle for ToneHandle {
    fn sample_rate(&self) -> u32 {
        self.tone.sample_rate
    }

    fn snapshot(&mut self) -> Result<Snapshot<'_>, CaptureError> {
        if self.closed {
            return Err(CaptureError::HandleClosed);
        }
        if self
            .tone
            .snapshot_limit
            .is_some_and(|limit| self.snapshots >= limit)
        {
            log::debug!("Source synthétique épuisée après {} snapshots", self.snapshots);
            self.closed = true;
            return Err(CaptureError::HandleClosed);
        }
        let attempt = self.attempts;
        self.attempts += 1;
        if let Some((at, err)) = &self.tone.snapshot_failure
            && *at == attempt
        {
            return Err(err.clone());
        }
        self.generate();
        self.window.push(&self.scratch);
        self.snapshots += 1;
        Ok(self.window.refresh(self.tone.sample_rate))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.window.reset();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{estimate_pitch, extract_spectral_features};

    #[test]
    fn failing_source_reports_its_error() {
        let mut source = ToneSource::new(220.0, 44100, CaptureConfig::default())
            .failing_with(CaptureError::PermissionDenied);
        assert_eq!(source.open().err(), Some(CaptureError::PermissionDenied));
    }

    #[test]
    fn snapshot_limit_closes_the_handle() {
        let mut source =
            ToneSource::new(220.0, 44100, CaptureConfig::default()).with_snapshot_limit(2);
        let mut handle = source.open().unwrap();
        assert!(handle.snapshot().is_ok());
        assert!(handle.snapshot().is_ok());
        assert_eq!(handle.snapshot().err(), Some(CaptureError::HandleClosed));
        assert!(handle.is_closed());
        assert_eq!(handle.snapshots(), 2);
    }

    #[test]
    fn injected_snapshot_failure_happens_once() {
        let mut source = ToneSource::new(220.0, 44100, CaptureConfig::default())
            .failing_snapshot(1, CaptureError::Stream("xrun".to_string()));
        let mut handle = source.open().unwrap();
        assert!(handle.snapshot().is_ok());
        assert_eq!(
            handle.snapshot().err(),
            Some(CaptureError::Stream("xrun".to_string()))
        );
        assert!(handle.snapshot().is_ok());
        assert!(!handle.is_closed());
        assert_eq!(handle.snapshots(), 2);
    }

    #[test]
    fn amplitude_scales_the_signal() {
        let mut source =
            ToneSource::new(220.0, 44100, CaptureConfig::default()).with_amplitude(0.1);
        let mut handle = source.open().unwrap();
        let snap = handle.snapshot().unwrap();
        let peak = snap
            .samples
            .as_slice()
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.1 + 1e-6 && peak > 0.09, "peak = {peak}");
    }

    #[test]
    fn harmonics_keep_the_fundamental() {
        let mut source = ToneSource::new(150.0, 44100, CaptureConfig::default())
            .with_harmonics(&[0.5, 0.25]);
        let mut handle = source.open().unwrap();
        let snap = handle.snapshot().unwrap();
        let pitch = estimate_pitch(snap.samples.as_slice(), snap.sample_rate);
        assert!((pitch - 150.0).abs() <= 2.0, "pitch = {pitch}");
    }

    #[test]
    fn low_tone_weighs_on_low_band() {
        let mut source = ToneSource::new(200.0, 44100, CaptureConfig::default());
        let mut handle = source.open().unwrap();
        for _ in 0..10 {
            handle.snapshot().unwrap();
        }
        let snap = handle.snapshot().unwrap();
        let f = extract_spectral_features(snap.spectrum.as_slice(), snap.sample_rate);
        assert!(f.low_freq_boost > f.high_freq_energy, "{f:?}");
    }
}
