use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use vt_core::config::CaptureConfig;
use vt_core::error::CaptureError;
use vt_core::traits::{CaptureHandle, CaptureSource, Snapshot};

use crate::decode;
use crate::spectrum::AnalysisWindow;

const SILENCE: [f32; 256] = [0.0; 256];

enum Clip {
    Path(PathBuf),
    Decoded { samples: Arc<[f32]>, sample_rate: u32 },
}

/// Rejoue un enregistrement comme s'il arrivait du micro, cadencé par l'horloge murale.
///
/// The file is decoded on the first `open` and kept for later sessions.
///
/// # Example
/// ```
/// use vt_audio::replay::FileSource;
/// use vt_core::config::CaptureConfig;
/// use vt_core::traits::{CaptureHandle, CaptureSource};
///
/// let mut source = FileSource::from_samples(vec![0.0; 44100], 44100, CaptureConfig::default());
/// let mut handle = source.open().unwrap();
/// assert_eq!(handle.sample_rate(), 44100);
/// handle.close();
/// assert!(handle.snapshot().is_err());
/// ```
pub struct FileSource {
    clip: Clip,
    config: CaptureConfig,
    looping: bool,
}

impl FileSource {
    /// Replay an audio file (WAV, MP3, FLAC, OGG, AAC).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            clip: Clip::Path(path.into()),
            config,
            looping: false,
        }
    }

    /// Replay already-decoded mono samples.
    #[must_use]
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, config: CaptureConfig) -> Self {
        Self {
            clip: Clip::Decoded {
                samples: samples.into(),
                sample_rate,
            },
            config,
            looping: false,
        }
    }

    /// Restart from the beginning when the clip ends, instead of going silent.
    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn decoded(&mut self) -> Result<(Arc<[f32]>, u32), CaptureError> {
        if let Clip::Path(path) = &self.clip {
            let (samples, sample_rate) = decode::decode_file(path)
                .map_err(|e| CaptureError::Decode(format!("{e:#}")))?;
            self.clip = Clip::Decoded {
                samples: samples.into(),
                sample_rate,
            };
        }
        match &self.clip {
            Clip::Decoded {
                samples,
                sample_rate,
            } => Ok((Arc::clone(samples), *sample_rate)),
            Clip::Path(_) => Err(CaptureError::Decode("clip non décodé".to_string())),
        }
    }
}

impl CaptureSource for FileSource {
    type Handle = FileHandle;

    fn open(&mut self) -> Result<FileHandle, CaptureError> {
        let (samples, sample_rate) = self.decoded()?;
        if samples.is_empty() || sample_rate == 0 {
            return Err(CaptureError::Decode("clip vide".to_string()));
        }
        log::info!(
            "Relecture de {} échantillons @ {sample_rate}Hz{}",
            samples.len(),
            if self.looping { " (en boucle)" } else { "" }
        );
        Ok(FileHandle {
            samples,
            sample_rate,
            started: Instant::now(),
            position: 0,
            window: AnalysisWindow::new(&self.config),
            window_len: self.config.fft_size,
            looping: self.looping,
            closed: false,
        })
    }
}

/// Handle de relecture : position dérivée du temps écoulé depuis `open`.
pub struct FileHandle {
    samples: Arc<[f32]>,
    sample_rate: u32,
    started: Instant,
    /// Samples already fed to the window, in stream time (keeps growing when looping).
    position: u64,
    window: AnalysisWindow,
    window_len: usize,
    looping: bool,
    closed: bool,
}

impl FileHandle {
    /// Instant the replay clock started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started
    }

    /// `true` once a non-looping clip has been played to the end.
    #[must_use]
    pub fn finished(&self) -> bool {
        !self.looping && self.position >= self.samples.len() as u64
    }

    /// Snapshot as seen at `now` on the replay clock.
    ///
    /// # Errors
    /// `HandleClosed` after `close`.
    pub fn snapshot_at(&mut self, now: Instant) -> Result<Snapshot<'_>, CaptureError> {
        if self.closed {
            return Err(CaptureError::HandleClosed);
        }
        self.advance_to(now);
        Ok(self.window.refresh(self.sample_rate))
    }

    fn advance_to(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let target = (elapsed * f64::from(self.sample_rate)) as u64;
        if target <= self.position {
            return;
        }
        // Only the last window's worth can still be visible.
        let keep = self.window_len as u64;
        if target - self.position > keep {
            self.position = target - keep;
        }

        let len = self.samples.len() as u64;
        while self.position < target {
            let remaining = target - self.position;
            if self.looping || self.position < len {
                let idx = (self.position % len) as usize;
                let end = (idx as u64 + remaining).min(len) as usize;
                self.window.push(&self.samples[idx..end]);
                self.position += (end - idx) as u64;
            } else {
                let n = remaining.min(SILENCE.len() as u64) as usize;
                self.window.push(&SILENCE[..n]);
                self.position += n as u64;
            }
        }
    }
}

impl CaptureHandle for FileHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn snapshot(&mut self) -> Result<Snapshot<'_>, CaptureError> {
        self.snapshot_at(Instant::now())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.window.reset();
            log::info!("Relecture fermée");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::features::estimate_pitch;

    fn tone(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn replay_reaches_the_analysis_window() {
        let mut source =
            FileSource::from_samples(tone(220.0, 44100, 1.0), 44100, CaptureConfig::default());
        let mut handle = source.open().unwrap();
        let at = handle.started_at() + Duration::from_millis(200);
        let snap = handle.snapshot_at(at).unwrap();
        let pitch = estimate_pitch(snap.samples.as_slice(), snap.sample_rate);
        assert!((pitch - 220.0).abs() <= 3.0, "pitch = {pitch}");
    }

    #[test]
    fn non_looping_clip_goes_silent() {
        let mut source =
            FileSource::from_samples(tone(220.0, 44100, 0.1), 44100, CaptureConfig::default());
        let mut handle = source.open().unwrap();
        let at = handle.started_at() + Duration::from_secs(1);
        let snap = handle.snapshot_at(at).unwrap();
        assert!(snap.samples.as_slice().iter().all(|&s| s == 0.0));
        assert!(handle.finished());
    }

    #[test]
    fn looping_clip_keeps_playing() {
        let mut source =
            FileSource::from_samples(tone(220.0, 44100, 0.1), 44100, CaptureConfig::default())
                .looping(true);
        let mut handle = source.open().unwrap();
        let at = handle.started_at() + Duration::from_secs(3);
        let snap = handle.snapshot_at(at).unwrap();
        assert!(snap.samples.as_slice().iter().any(|&s| s != 0.0));
        assert!(!handle.finished());
    }

    #[test]
    fn closed_handle_refuses_snapshots() {
        let mut source = FileSource::from_samples(vec![0.1; 4096], 8000, CaptureConfig::default());
        let mut handle = source.open().unwrap();
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert_eq!(handle.snapshot().err(), Some(CaptureError::HandleClosed));
    }

    #[test]
    fn empty_clip_fails_to_open() {
        let mut source = FileSource::from_samples(Vec::new(), 44100, CaptureConfig::default());
        assert!(matches!(source.open(), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let mut source = FileSource::new("/nonexistent/take.flac", CaptureConfig::default());
        assert!(matches!(source.open(), Err(CaptureError::Decode(_))));
    }
}
