use std::fmt::Write as _;

use vt_core::config::FeedbackConfig;
use vt_core::feedback::{Articulator, ArticulatorState, MicStatus, PitchRange, pitch_meter_percent};
use vt_core::frame::AnalysisFrame;

/// Commandes lues sur stdin (ou générées par Ctrl-C).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Status,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Case and surrounding whitespace are ignored.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Some(Self::Start),
            "stop" | "x" => Some(Self::Stop),
            "status" | "?" => Some(Self::Status),
            "quit" | "q" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

const METER_WIDTH: usize = 20;

/// Jauge texte `[#####.....]` pour un pourcentage.
fn meter(percent: f32) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * METER_WIDTH as f32).round() as usize;
    let mut bar = String::with_capacity(METER_WIDTH + 2);
    bar.push('[');
    bar.extend(std::iter::repeat_n('#', filled));
    bar.extend(std::iter::repeat_n('.', METER_WIDTH - filled));
    bar.push(']');
    bar
}

/// Une ligne par frame : micro, pitch, spectre, articulateurs.
#[must_use]
pub fn status_line(frame: &AnalysisFrame, cfg: &FeedbackConfig) -> String {
    let mic = MicStatus::of(frame);
    let mut line = format!("mic {:<7}", mic.as_str());
    if !frame.is_analyzing {
        line.push_str(" | analyse arrêtée");
        return line;
    }

    let pitch = if frame.pitch > 0.0 {
        format!(
            "{:6.1} Hz {:<4}",
            frame.pitch,
            PitchRange::classify(frame.pitch, cfg).as_str()
        )
    } else {
        format!("{:>6} Hz {:<4}", "--", "")
    };
    let state = ArticulatorState::infer(frame, cfg);
    let _ = write!(
        line,
        " | pitch {pitch} {} | aigus {:5.1}% graves {:5.1}%",
        meter(pitch_meter_percent(frame.pitch, cfg)),
        frame.high_freq_energy,
        frame.low_freq_boost,
    );
    for articulator in [Articulator::Larynx, Articulator::Tongue, Articulator::SoftPalate] {
        let _ = write!(
            line,
            " | {}: {}",
            articulator.name(),
            state.label(articulator)
        );
    }
    line
}

/// Rapport détaillé pour la commande `status`.
#[must_use]
pub fn status_report(frame: &AnalysisFrame, cfg: &FeedbackConfig) -> String {
    let state = ArticulatorState::infer(frame, cfg);
    let mut report = format!("Microphone : {}\n", MicStatus::of(frame).as_str());
    let _ = writeln!(
        report,
        "Pitch : {:.1} Hz ({})",
        frame.pitch,
        PitchRange::classify(frame.pitch, cfg).as_str()
    );
    let _ = writeln!(
        report,
        "Énergie aiguë : {:.1}%  Renfort grave : {:.1}%",
        frame.high_freq_energy, frame.low_freq_boost
    );
    for articulator in [Articulator::Larynx, Articulator::Tongue, Articulator::SoftPalate] {
        let active = state.is_active(articulator);
        let _ = writeln!(
            report,
            "{:<12} {:<18} {}",
            articulator.name(),
            state.label(articulator),
            articulator.cue(active)
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use vt_core::frame::SpectralFeatures;

    fn active(pitch: f32, high: f32, low: f32) -> AnalysisFrame {
        AnalysisFrame::active(
            pitch,
            SpectralFeatures {
                high_freq_energy: high,
                low_freq_boost: low,
            },
        )
    }

    #[test]
    fn commands_parse_loosely() {
        assert_eq!(ConsoleCommand::parse(" START \n"), Some(ConsoleCommand::Start));
        assert_eq!(ConsoleCommand::parse("stop"), Some(ConsoleCommand::Stop));
        assert_eq!(ConsoleCommand::parse("?"), Some(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("q"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("louder"), None);
        assert_eq!(ConsoleCommand::parse(""), None);
    }

    #[test]
    fn meter_is_fixed_width() {
        assert_eq!(meter(0.0), format!("[{}]", ".".repeat(METER_WIDTH)));
        assert_eq!(meter(100.0), format!("[{}]", "#".repeat(METER_WIDTH)));
        assert_eq!(meter(250.0).len(), METER_WIDTH + 2);
        assert_eq!(meter(50.0).matches('#').count(), METER_WIDTH / 2);
    }

    #[test]
    fn idle_line_is_short() {
        let cfg = FeedbackConfig::default();
        let line = status_line(&AnalysisFrame::idle(true), &cfg);
        assert!(line.contains("Granted"));
        assert!(line.contains("arrêtée"));
        assert!(!line.contains("Larynx"));
    }

    #[test]
    fn active_line_names_articulators() {
        let cfg = FeedbackConfig::default();
        let line = status_line(&active(260.0, 70.0, 10.0), &cfg);
        assert!(line.contains("Active"));
        assert!(line.contains("High"));
        assert!(line.contains("Larynx: Raised Position"));
        assert!(line.contains("Tongue: Forward Position"));
        assert!(line.contains("Soft Palate: Normal Position"));
    }

    #[test]
    fn unvoiced_frame_shows_no_pitch() {
        let cfg = FeedbackConfig::default();
        let line = status_line(&active(0.0, 0.0, 40.0), &cfg);
        assert!(line.contains("--"));
        assert!(line.contains("Soft Palate: Lowered (Nasal)"));
    }

    #[test]
    fn report_lists_cues() {
        let cfg = FeedbackConfig::default();
        let report = status_report(&active(120.0, 10.0, 50.0), &cfg);
        assert!(report.contains("Microphone : Active"));
        assert!(report.contains("(Low)"));
        assert!(report.contains("Increased nasality"));
        assert!(report.contains("Normal range"));
        assert_eq!(report.lines().count(), 6);
    }
}
