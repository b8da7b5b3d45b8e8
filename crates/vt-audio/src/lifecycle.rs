use std::time::{Duration, Instant};

use vt_core::config::AnalysisConfig;
use vt_core::error::CaptureError;
use vt_core::frame::AnalysisFrame;
use vt_core::traits::{CaptureHandle, CaptureSource};

use crate::features::{self, BandSplit, PitchSearch};

/// Consommateur des frames d'analyse.
///
/// Appelé une fois par tick actif, et une fois à chaque sortie d'analyse
/// (arrêt, échec d'ouverture).
pub trait FrameSink {
    fn on_analysis_frame(&mut self, frame: AnalysisFrame);
}

/// Every frame, in order. A dropped receiver is not an error for the analysis.
impl FrameSink for flume::Sender<AnalysisFrame> {
    fn on_analysis_frame(&mut self, frame: AnalysisFrame) {
        if self.send(frame).is_err() {
            log::trace!("Frame ignorée : récepteur fermé");
        }
    }
}

/// Latest-value view for a render loop.
impl FrameSink for triple_buffer::Input<AnalysisFrame> {
    fn on_analysis_frame(&mut self, frame: AnalysisFrame) {
        self.write(frame);
    }
}

impl FrameSink for Vec<AnalysisFrame> {
    fn on_analysis_frame(&mut self, frame: AnalysisFrame) {
        self.push(frame);
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn on_analysis_frame(&mut self, frame: AnalysisFrame) {
        (**self).on_analysis_frame(frame);
    }
}

/// État du contrôleur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Aucun périphérique, aucun tick planifié.
    Idle,
    /// `open()` en cours.
    Requesting,
    /// Périphérique ouvert, un tick planifié.
    Active,
}

/// Contrôleur de cycle de vie : Idle → Requesting → Active → Idle.
///
/// Seul propriétaire du handle de capture, du tick planifié et des drapeaux
/// `is_analyzing` / `has_permission`. Toutes les méthodes prennent `&mut self` :
/// un arrêt ne peut pas se produire pendant un tick, et après `request_stop()`
/// aucun tick n'est planifié.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use vt_audio::lifecycle::AnalysisController;
/// use vt_audio::synth::ToneSource;
/// use vt_core::config::{AnalysisConfig, CaptureConfig};
///
/// let source = ToneSource::new(220.0, 44100, CaptureConfig::default());
/// let mut controller = AnalysisController::new(source, Vec::new(), &AnalysisConfig::default());
/// controller.request_start();
/// controller.poll(Instant::now() + Duration::from_millis(1));
/// controller.request_stop();
///
/// let frames = controller.sink();
/// assert_eq!(frames.len(), 2);
/// assert!(frames[0].is_analyzing);
/// assert!(!frames[1].is_analyzing);
/// ```
pub struct AnalysisController<S: CaptureSource, K: FrameSink> {
    source: S,
    sink: K,
    handle: Option<S::Handle>,
    state: LifecycleState,
    has_permission: bool,
    /// Échéance du prochain tick. Seul l'état `Active` la renseigne.
    next_tick: Option<Instant>,
    frame_period: Duration,
    pitch: PitchSearch,
    bands: BandSplit,
    ticks: u64,
}

impl<S: CaptureSource, K: FrameSink> AnalysisController<S, K> {
    #[must_use]
    pub fn new(source: S, sink: K, analysis: &AnalysisConfig) -> Self {
        Self {
            source,
            sink,
            handle: None,
            state: LifecycleState::Idle,
            has_permission: false,
            next_tick: None,
            frame_period: analysis.frame_period(),
            pitch: PitchSearch::from(analysis),
            bands: BandSplit::from(analysis),
            ticks: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_analyzing(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Last known permission outcome.
    #[must_use]
    pub fn has_permission(&self) -> bool {
        self.has_permission
    }

    /// Deadline of the pending tick, if any.
    #[must_use]
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Number of frames emitted by ticks since creation.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Démarre l'analyse. Sans effet si déjà actif.
    ///
    /// On failure, emits a single zeroed frame with `has_permission = false`
    /// and returns to `Idle`; there is no automatic retry.
    pub fn request_start(&mut self) {
        if self.state != LifecycleState::Idle {
            log::debug!("Démarrage ignoré : déjà {:?}", self.state);
            return;
        }

        self.state = LifecycleState::Requesting;
        log::info!("Ouverture de la capture audio");

        match self.source.open() {
            Ok(handle) => {
                log::info!("Analyse active @ {}Hz", handle.sample_rate());
                self.handle = Some(handle);
                self.has_permission = true;
                self.state = LifecycleState::Active;
                self.next_tick = Some(Instant::now());
            }
            Err(err) => {
                log::warn!("Échec d'ouverture de la capture : {err}");
                self.handle = None;
                self.next_tick = None;
                self.has_permission = false;
                self.state = LifecycleState::Idle;
                self.sink.on_analysis_frame(AnalysisFrame::idle(false));
            }
        }
    }

    /// Arrête l'analyse. Idempotent : seul le premier appel depuis `Active`
    /// émet la frame finale (à zéro, `has_permission` conservé).
    pub fn request_stop(&mut self) {
        if self.state != LifecycleState::Active {
            log::debug!("Arrêt ignoré : {:?}", self.state);
            return;
        }
        self.release();
        log::info!("Analyse arrêtée après {} ticks", self.ticks);
        self.sink
            .on_analysis_frame(AnalysisFrame::idle(self.has_permission));
    }

    /// Exécute le tick planifié s'il est échu et retourne l'échéance suivante.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        if let Some(due) = self.next_tick
            && now >= due
        {
            self.next_tick = None;
            self.tick(due, now);
        }
        self.next_tick
    }

    /// Snapshot → features → emit → schedule.
    fn tick(&mut self, due: Instant, now: Instant) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let (pitch, bands) = (&self.pitch, &self.bands);
        let extracted = handle.snapshot().map(|snap| {
            AnalysisFrame::active(
                features::estimate_pitch_with(snap.samples.as_slice(), snap.sample_rate, pitch),
                features::extract_spectral_features_with(
                    snap.spectrum.as_slice(),
                    snap.sample_rate,
                    bands,
                ),
            )
        });

        let frame = match extracted {
            Ok(frame) => frame,
            Err(CaptureError::HandleClosed) => {
                // Handle closed under us: this tick emits nothing, the stop
                // transition reports the end of the session once.
                log::debug!("Snapshot sur handle fermé, tick abandonné");
                self.request_stop();
                return;
            }
            Err(err) => {
                log::warn!("Snapshot en échec, tick sauté : {err}");
                self.schedule_after(due, now);
                return;
            }
        };

        log::trace!(
            "tick {} : {:.1} Hz, high {:.1}%, low {:.1}%",
            self.ticks,
            frame.pitch,
            frame.high_freq_energy,
            frame.low_freq_boost
        );
        self.ticks += 1;
        self.sink.on_analysis_frame(frame);
        self.schedule_after(due, now);
    }

    /// Plan the next tick one period after `due`; skip missed periods instead of bursting.
    fn schedule_after(&mut self, due: Instant, now: Instant) {
        if self.state != LifecycleState::Active {
            return;
        }
        let mut next = due + self.frame_period;
        if next <= now {
            next = now + self.frame_period;
        }
        self.next_tick = Some(next);
    }

    /// Cancel the pending tick, close and drop the handle, go `Idle`.
    fn release(&mut self) {
        self.next_tick = None;
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.state = LifecycleState::Idle;
    }
}

impl<S: CaptureSource, K: FrameSink> Drop for AnalysisController<S, K> {
    fn drop(&mut self) {
        self.request_stop();
    }
}
