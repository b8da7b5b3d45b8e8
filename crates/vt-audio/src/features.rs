use vt_core::config::AnalysisConfig;
use vt_core::frame::SpectralFeatures;

/// Fenêtre de recherche du pitch et seuil de confiance.
///
/// # Example
/// ```
/// use vt_audio::features::PitchSearch;
/// let search = PitchSearch::default();
/// assert_eq!(search.lag_range(44100), Some((55, 882)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PitchSearch {
    /// Lowest detectable pitch (Hz). Sets the largest lag.
    pub min_hz: f32,
    /// Highest detectable pitch (Hz). Sets the smallest lag.
    pub max_hz: f32,
    /// Raw correlation the best lag must exceed. Never zero, so silence and
    /// faint noise report no pitch.
    pub threshold: f32,
}

impl Default for PitchSearch {
    fn default() -> Self {
        Self {
            min_hz: 50.0,
            max_hz: 800.0,
            threshold: 0.01,
        }
    }
}

impl From<&AnalysisConfig> for PitchSearch {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            min_hz: cfg.min_pitch_hz,
            max_hz: cfg.max_pitch_hz,
            threshold: cfg.pitch_threshold,
        }
    }
}

impl PitchSearch {
    /// Inclusive lag range `(floor(sr / max_hz), floor(sr / min_hz))`, or
    /// `None` if the window is degenerate.
    #[must_use]
    pub fn lag_range(&self, sample_rate: u32) -> Option<(usize, usize)> {
        let valid = self.min_hz > 0.0 && self.max_hz > self.min_hz;
        if sample_rate == 0 || !valid {
            return None;
        }
        let sr = sample_rate as f32;
        let min_lag = ((sr / self.max_hz).floor() as usize).max(1);
        let max_lag = (sr / self.min_hz).floor() as usize;
        (min_lag <= max_lag).then_some((min_lag, max_lag))
    }
}

/// Estimate la fondamentale par autocorrélation, fenêtre 50–800 Hz, seuil 0.01.
///
/// Returns `0.0` when no reliable pitch is found.
///
/// # Example
/// ```
/// use vt_audio::features::estimate_pitch;
/// assert_eq!(estimate_pitch(&[0.0; 2048], 44100), 0.0);
/// ```
#[must_use]
pub fn estimate_pitch(buffer: &[f32], sample_rate: u32) -> f32 {
    estimate_pitch_with(buffer, sample_rate, &PitchSearch::default())
}

/// Estimation du pitch par autocorrélation dans le domaine des lags.
///
/// Pour chaque lag de la fenêtre, somme brute `Σ x[i]·x[i+lag]` sur les
/// indices valides. Le lag de corrélation maximale gagne (à égalité, le plus
/// petit) et n'est retenu que s'il dépasse `search.threshold`.
/// Lags that do not fit in the buffer are skipped.
///
/// O(len × lags): the dominant cost of a tick, fine at 2048 samples.
#[must_use]
pub fn estimate_pitch_with(buffer: &[f32], sample_rate: u32, search: &PitchSearch) -> f32 {
    let Some((min_lag, max_lag)) = search.lag_range(sample_rate) else {
        return 0.0;
    };
    if buffer.len() <= min_lag {
        return 0.0;
    }
    let max_lag = max_lag.min(buffer.len() - 1);

    let mut best: Option<(usize, f32)> = None;
    for lag in min_lag..=max_lag {
        let corr = autocorrelation(buffer, lag);
        if best.is_none_or(|(_, best_corr)| corr > best_corr) {
            best = Some((lag, corr));
        }
    }

    match best {
        Some((lag, corr)) if corr > search.threshold => sample_rate as f32 / lag as f32,
        _ => 0.0,
    }
}

#[inline(always)]
fn autocorrelation(buffer: &[f32], lag: usize) -> f32 {
    buffer
        .iter()
        .zip(&buffer[lag..])
        .map(|(a, b)| a * b)
        .sum()
}

/// Limites des bandes basse et haute.
///
/// Les bandes ne sont pas disjointes par construction : avec peu de bins, les
/// plages d'indices peuvent se chevaucher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandSplit {
    /// Low band covers bins `0..=floor(low_band_hz / bin_size)`.
    pub low_band_hz: f32,
    /// High band covers bins `floor(high_band_hz / bin_size)..N`.
    pub high_band_hz: f32,
}

impl Default for BandSplit {
    fn default() -> Self {
        Self {
            low_band_hz: 500.0,
            high_band_hz: 2000.0,
        }
    }
}

impl From<&AnalysisConfig> for BandSplit {
    fn from(cfg: &AnalysisConfig) -> Self {
        Self {
            low_band_hz: cfg.low_band_hz,
            high_band_hz: cfg.high_band_hz,
        }
    }
}

/// Répartition de l'énergie spectrale avec les bandes par défaut (≤500 Hz, ≥2 kHz).
///
/// # Example
/// ```
/// use vt_audio::features::extract_spectral_features;
/// let f = extract_spectral_features(&[0u8; 1024], 44100);
/// assert_eq!((f.high_freq_energy, f.low_freq_boost), (0.0, 0.0));
/// ```
#[must_use]
pub fn extract_spectral_features(bins: &[u8], sample_rate: u32) -> SpectralFeatures {
    extract_spectral_features_with(bins, sample_rate, &BandSplit::default())
}

/// Pourcentages d'énergie des bandes basse et haute par rapport au total.
///
/// `N` bins couvrent `[0, nyquist]` linéairement. Chaque pourcentage est
/// borné à [0, 100] ; un total nul donne `{0, 0}`.
#[must_use]
pub fn extract_spectral_features_with(
    bins: &[u8],
    sample_rate: u32,
    split: &BandSplit,
) -> SpectralFeatures {
    if bins.is_empty() || sample_rate == 0 {
        return SpectralFeatures::default();
    }

    let nyquist = sample_rate as f32 / 2.0;
    let bin_size = nyquist / bins.len() as f32;
    // Negative or NaN edges saturate to 0 on the cast.
    let low_end = (split.low_band_hz / bin_size).floor() as usize;
    let high_start = (split.high_band_hz / bin_size).floor() as usize;

    let mut total = 0u64;
    let mut low = 0u64;
    let mut high = 0u64;
    for (i, &value) in bins.iter().enumerate() {
        let v = u64::from(value);
        total += v;
        if i <= low_end {
            low += v;
        }
        if i >= high_start {
            high += v;
        }
    }

    if total == 0 {
        return SpectralFeatures::default();
    }

    SpectralFeatures {
        high_freq_energy: percent(high, total),
        low_freq_boost: percent(low, total),
    }
}

#[inline]
fn percent(part: u64, total: u64) -> f32 {
    ((part as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn sine(freq: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin()
            })
            .collect()
    }

    #[test]
    fn silence_has_no_pitch() {
        assert!(estimate_pitch(&[0.0; 2048], SR).abs() < f32::EPSILON);
    }

    #[test]
    fn tone_220_at_44100() {
        let pitch = estimate_pitch(&sine(220.0, 2048, 0.5), SR);
        assert!((pitch - 220.0).abs() <= 3.0, "pitch = {pitch}");
    }

    #[test]
    fn tones_within_one_lag_step() {
        for freq in [110.0f32, 220.0, 330.0, 440.0, 660.0] {
            let pitch = estimate_pitch(&sine(freq, 2048, 0.8), SR);
            // One lag step around the true period, in Hz.
            let step = freq * freq / SR as f32;
            assert!(
                (pitch - freq).abs() <= step + 1.0,
                "freq {freq}: got {pitch}, step {step}"
            );
        }
    }

    #[test]
    fn faint_noise_below_threshold_is_rejected() {
        let quiet = sine(220.0, 2048, 0.001);
        assert!(estimate_pitch(&quiet, SR).abs() < f32::EPSILON);
    }

    #[test]
    fn raised_threshold_suppresses_pitch() {
        let search = PitchSearch {
            threshold: 1.0e6,
            ..PitchSearch::default()
        };
        assert!(estimate_pitch_with(&sine(220.0, 2048, 0.5), SR, &search).abs() < f32::EPSILON);
    }

    #[test]
    fn ties_resolve_to_lowest_lag() {
        // Constant signal: correlation strictly decreases with lag, so the
        // first lag of the window wins.
        let pitch = estimate_pitch(&[0.5; 2048], SR);
        assert!((pitch - SR as f32 / 55.0).abs() < 0.01);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let buf = sine(185.0, 2048, 0.3);
        let a = estimate_pitch(&buf, SR);
        let b = estimate_pitch(&buf, SR);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn degenerate_inputs_report_zero() {
        assert!(estimate_pitch(&[], SR).abs() < f32::EPSILON);
        assert!(estimate_pitch(&[0.5; 30], SR).abs() < f32::EPSILON);
        assert!(estimate_pitch(&sine(220.0, 2048, 0.5), 0).abs() < f32::EPSILON);
    }

    #[test]
    fn short_buffer_clamps_lag_range() {
        // 600 samples: lags above 599 are skipped, 220 Hz (period ~200) still found.
        let pitch = estimate_pitch(&sine(220.0, 600, 0.8), SR);
        assert!((pitch - 220.0).abs() <= 3.0, "pitch = {pitch}");
    }

    #[test]
    fn zero_bins_give_zero_features() {
        let f = extract_spectral_features(&[0u8; 1024], SR);
        assert_eq!(f, SpectralFeatures::default());
        assert_eq!(extract_spectral_features(&[], SR), SpectralFeatures::default());
    }

    #[test]
    fn energy_between_2500_and_4000_hz_reads_high() {
        let bin_size = (SR as f32 / 2.0) / 1024.0;
        let lo = (2500.0 / bin_size) as usize;
        let hi = (4000.0 / bin_size) as usize;
        let mut bins = [3u8; 1024];
        for b in &mut bins[lo..=hi] {
            *b = 220;
        }
        let f = extract_spectral_features(&bins, SR);
        assert!(f.high_freq_energy > 60.0, "{f:?}");
        assert!(f.low_freq_boost < 10.0, "{f:?}");
    }

    #[test]
    fn low_band_edge_is_inclusive() {
        let bin_size = (SR as f32 / 2.0) / 1024.0;
        let edge = (500.0 / bin_size).floor() as usize;
        let mut bins = [0u8; 1024];
        bins[edge] = 100;
        let f = extract_spectral_features(&bins, SR);
        assert!((f.low_freq_boost - 100.0).abs() < 1e-4);
        assert!(f.high_freq_energy.abs() < f32::EPSILON);
    }

    #[test]
    fn overlapping_bands_are_counted_in_both() {
        // 4 bins over 22.05 kHz: bin size 5512 Hz, both edges fall in bin 0.
        let bins = [10u8, 10, 10, 10];
        let f = extract_spectral_features(&bins, SR);
        assert!((f.low_freq_boost - 25.0).abs() < 1e-4);
        assert!((f.high_freq_energy - 100.0).abs() < 1e-4);
    }

    #[test]
    fn features_stay_in_range() {
        let mut seed = 0x2545_f491u32;
        for _ in 0..64 {
            let bins: Vec<u8> = (0..257)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    (seed & 0xff) as u8
                })
                .collect();
            let f = extract_spectral_features(&bins, SR);
            assert!((0.0..=100.0).contains(&f.high_freq_energy));
            assert!((0.0..=100.0).contains(&f.low_freq_boost));
        }
    }

    #[test]
    fn analysis_config_feeds_search_and_split() {
        let cfg = AnalysisConfig {
            min_pitch_hz: 100.0,
            max_pitch_hz: 400.0,
            high_band_hz: 3000.0,
            ..AnalysisConfig::default()
        };
        assert_eq!(PitchSearch::from(&cfg).lag_range(44100), Some((110, 441)));
        assert!((BandSplit::from(&cfg).high_band_hz - 3000.0).abs() < f32::EPSILON);
    }
}
