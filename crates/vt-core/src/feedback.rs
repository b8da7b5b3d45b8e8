use crate::config::FeedbackConfig;
use crate::frame::AnalysisFrame;

/// Position inférée d'un articulateur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Articulator {
    /// Larynx : suit le pitch.
    Larynx,
    /// Langue : suit l'énergie haute fréquence.
    Tongue,
    /// Voile du palais : suit l'énergie basse fréquence (nasalité).
    SoftPalate,
}

impl Articulator {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Larynx => "Larynx",
            Self::Tongue => "Tongue",
            Self::SoftPalate => "Soft Palate",
        }
    }

    /// Label shown when the articulator is active.
    #[must_use]
    pub fn active_label(self) -> &'static str {
        match self {
            Self::Larynx => "Raised Position",
            Self::Tongue => "Forward Position",
            Self::SoftPalate => "Lowered (Nasal)",
        }
    }

    /// Short explanation of what drives the articulator, given its state.
    #[must_use]
    pub fn cue(self, active: bool) -> &'static str {
        match (self, active) {
            (Self::Larynx, true) => "High pitch detected",
            (Self::Larynx, false) => "Normal range",
            (Self::Tongue, true) => "High frequency energy",
            (Self::Tongue, false) => "Normal spectrum",
            (Self::SoftPalate, true) => "Increased nasality",
            (Self::SoftPalate, false) => "Low nasality",
        }
    }
}

/// Label of every inactive articulator.
pub const NORMAL_POSITION: &str = "Normal Position";

/// État inféré des trois articulateurs pour une frame.
///
/// # Example
/// ```
/// use vt_core::config::FeedbackConfig;
/// use vt_core::feedback::ArticulatorState;
/// use vt_core::frame::AnalysisFrame;
///
/// let frame = AnalysisFrame { pitch: 260.0, is_analyzing: true, has_permission: true, ..AnalysisFrame::default() };
/// let state = ArticulatorState::infer(&frame, &FeedbackConfig::default());
/// assert!(state.larynx_raised);
/// assert!(!state.tongue_forward);
/// assert_eq!(state.label(vt_core::feedback::Articulator::Larynx), "Raised Position");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArticulatorState {
    pub larynx_raised: bool,
    pub tongue_forward: bool,
    pub palate_lowered: bool,
}

impl ArticulatorState {
    /// Infère l'état à partir des seuils. Tout est au repos hors analyse.
    #[must_use]
    pub fn infer(frame: &AnalysisFrame, cfg: &FeedbackConfig) -> Self {
        if !frame.is_analyzing {
            return Self::default();
        }
        Self {
            larynx_raised: frame.pitch > cfg.larynx_raised_hz,
            tongue_forward: frame.high_freq_energy > cfg.tongue_forward_pct,
            palate_lowered: frame.low_freq_boost > cfg.palate_lowered_pct,
        }
    }

    #[must_use]
    pub fn is_active(&self, articulator: Articulator) -> bool {
        match articulator {
            Articulator::Larynx => self.larynx_raised,
            Articulator::Tongue => self.tongue_forward,
            Articulator::SoftPalate => self.palate_lowered,
        }
    }

    /// Status label for one articulator.
    #[must_use]
    pub fn label(&self, articulator: Articulator) -> &'static str {
        if self.is_active(articulator) {
            articulator.active_label()
        } else {
            NORMAL_POSITION
        }
    }
}

/// Registre vocal grossier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PitchRange {
    Low,
    Mid,
    High,
}

impl PitchRange {
    /// Classify a pitch. A `0.0` pitch (nothing detected) reads as `Low`.
    ///
    /// # Example
    /// ```
    /// use vt_core::config::FeedbackConfig;
    /// use vt_core::feedback::PitchRange;
    /// let cfg = FeedbackConfig::default();
    /// assert_eq!(PitchRange::classify(120.0, &cfg), PitchRange::Low);
    /// assert_eq!(PitchRange::classify(220.0, &cfg), PitchRange::Mid);
    /// assert_eq!(PitchRange::classify(250.0, &cfg), PitchRange::High);
    /// ```
    #[must_use]
    pub fn classify(pitch: f32, cfg: &FeedbackConfig) -> Self {
        if pitch < cfg.pitch_low_below_hz {
            Self::Low
        } else if pitch < cfg.pitch_mid_below_hz {
            Self::Mid
        } else {
            Self::High
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Mid => "Mid",
            Self::High => "High",
        }
    }
}

/// Position du pitch dans la jauge, en pourcentage [0, 100].
///
/// # Example
/// ```
/// use vt_core::config::FeedbackConfig;
/// use vt_core::feedback::pitch_meter_percent;
/// let cfg = FeedbackConfig::default();
/// assert_eq!(pitch_meter_percent(240.0, &cfg), 50.0);
/// assert_eq!(pitch_meter_percent(0.0, &cfg), 0.0);
/// ```
#[must_use]
pub fn pitch_meter_percent(pitch: f32, cfg: &FeedbackConfig) -> f32 {
    let span = cfg.pitch_meter_max_hz - cfg.pitch_meter_min_hz;
    if span <= 0.0 {
        return 0.0;
    }
    ((pitch - cfg.pitch_meter_min_hz) / span * 100.0).clamp(0.0, 100.0)
}

/// État d'accès au microphone vu par l'utilisateur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MicStatus {
    /// Analyse en cours.
    Active,
    /// Accès obtenu, analyse arrêtée.
    Granted,
    /// Accès jamais obtenu (ou refusé).
    Pending,
}

impl MicStatus {
    /// # Example
    /// ```
    /// use vt_core::feedback::MicStatus;
    /// use vt_core::frame::AnalysisFrame;
    /// assert_eq!(MicStatus::of(&AnalysisFrame::idle(true)), MicStatus::Granted);
    /// assert_eq!(MicStatus::of(&AnalysisFrame::idle(false)), MicStatus::Pending);
    /// ```
    #[must_use]
    pub fn of(frame: &AnalysisFrame) -> Self {
        if frame.is_analyzing {
            Self::Active
        } else if frame.has_permission {
            Self::Granted
        } else {
            Self::Pending
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Granted => "Granted",
            Self::Pending => "Pending",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SpectralFeatures;

    fn analyzing(pitch: f32, high: f32, low: f32) -> AnalysisFrame {
        AnalysisFrame::active(
            pitch,
            SpectralFeatures {
                high_freq_energy: high,
                low_freq_boost: low,
            },
        )
    }

    #[test]
    fn thresholds_are_strict() {
        let cfg = FeedbackConfig::default();
        let state = ArticulatorState::infer(&analyzing(200.0, 50.0, 30.0), &cfg);
        assert_eq!(state, ArticulatorState::default());

        let state = ArticulatorState::infer(&analyzing(200.1, 50.1, 30.1), &cfg);
        assert!(state.larynx_raised && state.tongue_forward && state.palate_lowered);
        assert_eq!(state.label(Articulator::SoftPalate), "Lowered (Nasal)");
        assert_eq!(state.label(Articulator::Tongue), "Forward Position");
    }

    #[test]
    fn idle_frame_reads_as_normal() {
        let cfg = FeedbackConfig::default();
        let mut frame = analyzing(400.0, 90.0, 90.0);
        frame.is_analyzing = false;
        let state = ArticulatorState::infer(&frame, &cfg);
        for a in [Articulator::Larynx, Articulator::Tongue, Articulator::SoftPalate] {
            assert_eq!(state.label(a), NORMAL_POSITION);
            assert!(!state.is_active(a));
        }
    }

    #[test]
    fn custom_thresholds_apply() {
        let cfg = FeedbackConfig {
            larynx_raised_hz: 150.0,
            ..FeedbackConfig::default()
        };
        let state = ArticulatorState::infer(&analyzing(180.0, 0.0, 0.0), &cfg);
        assert!(state.larynx_raised);
    }

    #[test]
    fn pitch_meter_clamps() {
        let cfg = FeedbackConfig::default();
        assert!((pitch_meter_percent(1000.0, &cfg) - 100.0).abs() < f32::EPSILON);
        assert!(pitch_meter_percent(40.0, &cfg).abs() < f32::EPSILON);
    }

    #[test]
    fn mic_status_prefers_active() {
        assert_eq!(MicStatus::of(&analyzing(0.0, 0.0, 0.0)), MicStatus::Active);
        assert_eq!(MicStatus::Pending.as_str(), "Pending");
    }
}
