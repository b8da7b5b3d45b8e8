use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration complète de l'analyse.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
/// `capture` et `analysis` sont figés au démarrage d'une session ;
/// `feedback` peut être rechargé à chaud.
///
/// # Example
/// ```
/// use vt_core::config::AnalyzerConfig;
/// let config = AnalyzerConfig::default();
/// assert_eq!(config.capture.fft_size, 2048);
/// assert_eq!(config.analysis.target_fps, 60);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct AnalyzerConfig {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub feedback: FeedbackConfig,
}

/// Traitements d'entrée demandés au périphérique.
///
/// Les trois étapes « utiles » du système déforment le pitch et le spectre :
/// la configuration par défaut les désactive toutes.
///
/// # Example
/// ```
/// use vt_core::config::InputConstraints;
/// assert!(InputConstraints::raw().is_raw());
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InputConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl InputConstraints {
    /// Raw capture: every processing stage disabled.
    #[must_use]
    pub const fn raw() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    /// `true` when no processing stage is requested.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        !(self.echo_cancellation || self.noise_suppression || self.auto_gain_control)
    }
}

/// Capture-stage settings: window size and byte-spectrum mapping.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CaptureConfig {
    /// Taille de la fenêtre d'analyse (puissance de 2). Le spectre a `fft_size / 2` bins.
    pub fft_size: usize,
    /// Lissage temporel du spectre [0.0, 0.99]. Fixé à l'ouverture.
    pub smoothing_time_constant: f32,
    /// dB mappé sur l'octet 0.
    pub min_decibels: f32,
    /// dB mappé sur l'octet 255.
    pub max_decibels: f32,
    /// Traitements d'entrée demandés au périphérique.
    pub constraints: InputConstraints,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -90.0,
            max_decibels: -10.0,
            constraints: InputConstraints::raw(),
        }
    }
}

/// Feature-extraction and tick cadence settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AnalysisConfig {
    /// Cadence des ticks (≈ rafraîchissement écran).
    pub target_fps: u32,
    /// Borne basse de la recherche de pitch (Hz).
    pub min_pitch_hz: f32,
    /// Borne haute de la recherche de pitch (Hz).
    pub max_pitch_hz: f32,
    /// Seuil de corrélation brute en dessous duquel le pitch vaut 0. Jamais nul.
    pub pitch_threshold: f32,
    /// Upper edge of the low band (Hz, inclusive bin).
    pub low_band_hz: f32,
    /// Lower edge of the high band (Hz).
    pub high_band_hz: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            min_pitch_hz: 50.0,
            max_pitch_hz: 800.0,
            pitch_threshold: 0.01,
            low_band_hz: 500.0,
            high_band_hz: 2000.0,
        }
    }
}

impl AnalysisConfig {
    /// Durée d'un tick.
    ///
    /// # Example
    /// ```
    /// use vt_core::config::AnalysisConfig;
    /// let cfg = AnalysisConfig { target_fps: 50, ..AnalysisConfig::default() };
    /// assert_eq!(cfg.frame_period().as_millis(), 20);
    /// ```
    #[must_use]
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

/// Seuils d'interprétation des features (articulateurs, jauge de pitch).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct FeedbackConfig {
    /// Larynx considéré haut au-dessus de ce pitch (Hz).
    pub larynx_raised_hz: f32,
    /// Langue avancée au-dessus de ce pourcentage d'énergie haute.
    pub tongue_forward_pct: f32,
    /// Voile du palais abaissé (nasalité) au-dessus de ce pourcentage d'énergie basse.
    pub palate_lowered_pct: f32,
    pub pitch_meter_min_hz: f32,
    pub pitch_meter_max_hz: f32,
    /// Below this the pitch range is `Low`.
    pub pitch_low_below_hz: f32,
    /// Below this (and above the low edge) the pitch range is `Mid`.
    pub pitch_mid_below_hz: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            larynx_raised_hz: 200.0,
            tongue_forward_pct: 50.0,
            palate_lowered_pct: 30.0,
            pitch_meter_min_hz: 80.0,
            pitch_meter_max_hz: 400.0,
            pitch_low_below_hz: 150.0,
            pitch_mid_below_hz: 250.0,
        }
    }
}

impl AnalyzerConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        let defaults = Self::default();

        let c = &mut self.capture;
        c.fft_size = c.fft_size.clamp(256, 32768).next_power_of_two();
        c.smoothing_time_constant = finite_or(
            c.smoothing_time_constant,
            defaults.capture.smoothing_time_constant,
            "smoothing_time_constant",
        )
        .clamp(0.0, 0.99);
        if !c.min_decibels.is_finite()
            || !c.max_decibels.is_finite()
            || c.min_decibels >= c.max_decibels
        {
            log::warn!(
                "Plage dB invalide ({} .. {}), utilisation des défauts.",
                c.min_decibels,
                c.max_decibels
            );
            c.min_decibels = defaults.capture.min_decibels;
            c.max_decibels = defaults.capture.max_decibels;
        }

        let a = &mut self.analysis;
        a.target_fps = a.target_fps.clamp(1, 240);
        a.min_pitch_hz = a.min_pitch_hz.clamp(1.0, 20_000.0);
        a.max_pitch_hz = a.max_pitch_hz.clamp(1.0, 20_000.0);
        // `clamp` laisse passer NaN, et NaN >= x est faux.
        if !a.min_pitch_hz.is_finite()
            || !a.max_pitch_hz.is_finite()
            || a.min_pitch_hz >= a.max_pitch_hz
        {
            log::warn!(
                "Fenêtre de pitch invalide ({} .. {} Hz), utilisation des défauts.",
                a.min_pitch_hz,
                a.max_pitch_hz
            );
            a.min_pitch_hz = defaults.analysis.min_pitch_hz;
            a.max_pitch_hz = defaults.analysis.max_pitch_hz;
        }
        if !a.pitch_threshold.is_finite() || a.pitch_threshold <= 0.0 {
            a.pitch_threshold = defaults.analysis.pitch_threshold;
        }
        a.low_band_hz = finite_or(a.low_band_hz, defaults.analysis.low_band_hz, "low_band_hz")
            .clamp(0.0, 96_000.0);
        a.high_band_hz = finite_or(a.high_band_hz, defaults.analysis.high_band_hz, "high_band_hz")
            .clamp(0.0, 96_000.0);

        let f = &mut self.feedback;
        let fd = &defaults.feedback;
        f.larynx_raised_hz =
            finite_or(f.larynx_raised_hz, fd.larynx_raised_hz, "larynx_raised_hz").max(0.0);
        f.tongue_forward_pct =
            finite_or(f.tongue_forward_pct, fd.tongue_forward_pct, "tongue_forward_pct")
                .clamp(0.0, 100.0);
        f.palate_lowered_pct =
            finite_or(f.palate_lowered_pct, fd.palate_lowered_pct, "palate_lowered_pct")
                .clamp(0.0, 100.0);
        if !f.pitch_meter_min_hz.is_finite()
            || !f.pitch_meter_max_hz.is_finite()
            || f.pitch_meter_min_hz >= f.pitch_meter_max_hz
        {
            f.pitch_meter_min_hz = defaults.feedback.pitch_meter_min_hz;
            f.pitch_meter_max_hz = defaults.feedback.pitch_meter_max_hz;
        }
        if !f.pitch_low_below_hz.is_finite()
            || !f.pitch_mid_below_hz.is_finite()
            || f.pitch_low_below_hz > f.pitch_mid_below_hz
        {
            f.pitch_low_below_hz = defaults.feedback.pitch_low_below_hz;
            f.pitch_mid_below_hz = defaults.feedback.pitch_mid_below_hz;
        }
    }

    /// Parse un document TOML et fusionne avec les valeurs par défaut.
    ///
    /// # Errors
    /// Returns an error if the document is not valid TOML for this schema.
    ///
    /// # Example
    /// ```
    /// use vt_core::config::AnalyzerConfig;
    /// let config = AnalyzerConfig::from_toml_str("[analysis]\ntarget_fps = 30\n").unwrap();
    /// assert_eq!(config.analysis.target_fps, 30);
    /// assert_eq!(config.capture.fft_size, 2048);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
        let mut config = Self::default();

        if let Some(c) = file.capture {
            let cfg = &mut config.capture;
            if let Some(v) = c.fft_size {
                cfg.fft_size = v;
            }
            if let Some(v) = c.smoothing_time_constant {
                cfg.smoothing_time_constant = v;
            }
            if let Some(v) = c.min_decibels {
                cfg.min_decibels = v;
            }
            if let Some(v) = c.max_decibels {
                cfg.max_decibels = v;
            }
            if let Some(v) = c.echo_cancellation {
                cfg.constraints.echo_cancellation = v;
            }
            if let Some(v) = c.noise_suppression {
                cfg.constraints.noise_suppression = v;
            }
            if let Some(v) = c.auto_gain_control {
                cfg.constraints.auto_gain_control = v;
            }
        }

        if let Some(a) = file.analysis {
            let cfg = &mut config.analysis;
            if let Some(v) = a.target_fps {
                cfg.target_fps = v;
            }
            if let Some(v) = a.min_pitch_hz {
                cfg.min_pitch_hz = v;
            }
            if let Some(v) = a.max_pitch_hz {
                cfg.max_pitch_hz = v;
            }
            if let Some(v) = a.pitch_threshold {
                cfg.pitch_threshold = v;
            }
            if let Some(v) = a.low_band_hz {
                cfg.low_band_hz = v;
            }
            if let Some(v) = a.high_band_hz {
                cfg.high_band_hz = v;
            }
        }

        if let Some(f) = file.feedback {
            let cfg = &mut config.feedback;
            if let Some(v) = f.larynx_raised_hz {
                cfg.larynx_raised_hz = v;
            }
            if let Some(v) = f.tongue_forward_pct {
                cfg.tongue_forward_pct = v;
            }
            if let Some(v) = f.palate_lowered_pct {
                cfg.palate_lowered_pct = v;
            }
            if let Some(v) = f.pitch_meter_min_hz {
                cfg.pitch_meter_min_hz = v;
            }
            if let Some(v) = f.pitch_meter_max_hz {
                cfg.pitch_meter_max_hz = v;
            }
            if let Some(v) = f.pitch_low_below_hz {
                cfg.pitch_low_below_hz = v;
            }
            if let Some(v) = f.pitch_mid_below_hz {
                cfg.pitch_mid_below_hz = v;
            }
        }

        config.clamp_all();
        Ok(config)
    }
}

/// `value` if finite, else `default` with a warning.
fn finite_or(value: f32, default: f32, key: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        log::warn!("{key} invalide ({value}), utilisation du défaut {default}.");
        default
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    capture: Option<CaptureSection>,
    analysis: Option<AnalysisSection>,
    feedback: Option<FeedbackSection>,
}

/// Capture section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct CaptureSection {
    fft_size: Option<usize>,
    smoothing_time_constant: Option<f32>,
    min_decibels: Option<f32>,
    max_decibels: Option<f32>,
    echo_cancellation: Option<bool>,
    noise_suppression: Option<bool>,
    auto_gain_control: Option<bool>,
}

#[derive(Deserialize)]
struct AnalysisSection {
    target_fps: Option<u32>,
    min_pitch_hz: Option<f32>,
    max_pitch_hz: Option<f32>,
    pitch_threshold: Option<f32>,
    low_band_hz: Option<f32>,
    high_band_hz: Option<f32>,
}

#[derive(Deserialize)]
struct FeedbackSection {
    larynx_raised_hz: Option<f32>,
    tongue_forward_pct: Option<f32>,
    palate_lowered_pct: Option<f32>,
    pitch_meter_min_hz: Option<f32>,
    pitch_meter_max_hz: Option<f32>,
    pitch_low_below_hz: Option<f32>,
    pitch_mid_below_hz: Option<f32>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use vt_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<AnalyzerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    AnalyzerConfig::from_toml_str(&content)
        .with_context(|| format!("Configuration invalide dans {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert!(config.capture.constraints.is_raw());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = AnalyzerConfig::from_toml_str(
            "[analysis]\nmax_pitch_hz = 1000.0\n\n[feedback]\nlarynx_raised_hz = 180.0\n",
        )
        .unwrap();
        assert!((config.analysis.max_pitch_hz - 1000.0).abs() < f32::EPSILON);
        assert!((config.analysis.min_pitch_hz - 50.0).abs() < f32::EPSILON);
        assert!((config.feedback.larynx_raised_hz - 180.0).abs() < f32::EPSILON);
        assert!((config.feedback.tongue_forward_pct - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = AnalyzerConfig::from_toml_str(
            "[capture]\nfft_size = 3000\nsmoothing_time_constant = 1.5\n\n\
             [analysis]\ntarget_fps = 0\npitch_threshold = 0.0\n",
        )
        .unwrap();
        assert_eq!(config.capture.fft_size, 4096);
        assert!((config.capture.smoothing_time_constant - 0.99).abs() < f32::EPSILON);
        assert_eq!(config.analysis.target_fps, 1);
        assert!(config.analysis.pitch_threshold > 0.0);
    }

    #[test]
    fn inverted_pitch_window_falls_back() {
        let config = AnalyzerConfig::from_toml_str(
            "[analysis]\nmin_pitch_hz = 900.0\nmax_pitch_hz = 100.0\n",
        )
        .unwrap();
        assert!((config.analysis.min_pitch_hz - 50.0).abs() < f32::EPSILON);
        assert!((config.analysis.max_pitch_hz - 800.0).abs() < f32::EPSILON);
    }

    #[test]
    fn nan_values_fall_back_to_defaults() {
        let config = AnalyzerConfig::from_toml_str(
            "[capture]\nsmoothing_time_constant = nan\n\n\
             [analysis]\nmin_pitch_hz = nan\nhigh_band_hz = nan\npitch_threshold = inf\n\n\
             [feedback]\ntongue_forward_pct = nan\npitch_meter_max_hz = inf\n",
        )
        .unwrap();
        let defaults = AnalyzerConfig::default();
        assert_eq!(config, defaults);
    }

    #[test]
    fn constraints_are_read_from_capture_section() {
        let config =
            AnalyzerConfig::from_toml_str("[capture]\nauto_gain_control = true\n").unwrap();
        assert!(config.capture.constraints.auto_gain_control);
        assert!(!config.capture.constraints.is_raw());
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(AnalyzerConfig::from_toml_str("[render]\nmode = 1\n").is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\ntarget_fps = 30").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.analysis.target_fps, 30);
    }

    #[test]
    fn shipped_default_file_matches_defaults() {
        let config =
            AnalyzerConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn load_config_missing_file_errors() {
        assert!(load_config(Path::new("/nonexistent/vtract.toml")).is_err());
    }
}
