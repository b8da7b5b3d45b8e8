use std::thread;
use std::time::Instant;

use anyhow::Context;
use triple_buffer::TripleBuffer;
use vt_core::config::AnalysisConfig;
use vt_core::frame::AnalysisFrame;
use vt_core::traits::CaptureSource;

use crate::lifecycle::{AnalysisController, FrameSink};

/// Commandes envoyées au thread d'analyse.
#[derive(Debug)]
pub enum AnalysisCommand {
    Start,
    /// `ack` is signalled once the final frame has been emitted.
    Stop {
        ack: Option<flume::Sender<()>>,
    },
    Shutdown,
}

/// Télécommande clonable du thread d'analyse.
#[derive(Clone, Debug)]
pub struct AnalysisControl {
    tx: flume::Sender<AnalysisCommand>,
}

impl AnalysisControl {
    /// Demande le démarrage. Sans effet si l'analyse tourne déjà.
    ///
    /// # Errors
    /// Returns an error if the analysis thread has exited.
    pub fn request_start(&self) -> anyhow::Result<()> {
        self.tx
            .send(AnalysisCommand::Start)
            .context("Thread d'analyse terminé")
    }

    /// Arrête l'analyse et attend que le thread l'ait fait.
    ///
    /// Once this returns, the sink has received the final idle frame and no
    /// further frame will be emitted until the next start.
    ///
    /// # Errors
    /// Returns an error if the analysis thread has exited.
    pub fn request_stop(&self) -> anyhow::Result<()> {
        let (ack_tx, ack_rx) = flume::bounded(1);
        self.tx
            .send(AnalysisCommand::Stop { ack: Some(ack_tx) })
            .context("Thread d'analyse terminé")?;
        ack_rx.recv().context("Thread d'analyse terminé avant l'arrêt")
    }

    /// Fire-and-forget stop.
    ///
    /// # Errors
    /// Returns an error if the analysis thread has exited.
    pub fn post_stop(&self) -> anyhow::Result<()> {
        self.tx
            .send(AnalysisCommand::Stop { ack: None })
            .context("Thread d'analyse terminé")
    }
}

/// Thread d'analyse en cours. L'arrête et le rejoint au drop.
pub struct AnalysisHandle {
    control: AnalysisControl,
    thread: Option<thread::JoinHandle<()>>,
}

impl AnalysisHandle {
    #[must_use]
    pub fn control(&self) -> AnalysisControl {
        self.control.clone()
    }

    /// Stop the analysis (final frame included) and join the thread.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            // Déjà terminé si l'envoi échoue.
            let _ = self.control.tx.send(AnalysisCommand::Shutdown);
            if thread.join().is_err() {
                log::error!("Le thread d'analyse a paniqué");
            }
        }
    }
}

impl Drop for AnalysisHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Spawn the analysis thread. It starts `Idle`; send `Start` to open the source.
///
/// The capture handle is opened and closed on this thread, so sources whose
/// streams are not `Send` work.
///
/// # Errors
/// Returns an error if the OS refuses to spawn the thread.
pub fn spawn_analysis_thread<S, K>(
    source: S,
    sink: K,
    analysis: &AnalysisConfig,
) -> anyhow::Result<AnalysisHandle>
where
    S: CaptureSource,
    K: FrameSink + Send + 'static,
{
    let (tx, rx) = flume::unbounded();
    let analysis = analysis.clone();

    let thread = thread::Builder::new()
        .name("vt-analysis".to_string())
        .spawn(move || {
            let mut controller = AnalysisController::new(source, sink, &analysis);
            run_analysis_loop(&mut controller, &rx);
            // Le drop du contrôleur émet la frame finale si besoin.
        })
        .context("Impossible de lancer le thread d'analyse")?;

    Ok(AnalysisHandle {
        control: AnalysisControl { tx },
        thread: Some(thread),
    })
}

/// Spawn the analysis thread with a latest-value output, for render loops.
///
/// # Errors
/// Returns an error if the OS refuses to spawn the thread.
pub fn spawn_latest_frame_thread<S: CaptureSource>(
    source: S,
    analysis: &AnalysisConfig,
) -> anyhow::Result<(AnalysisHandle, triple_buffer::Output<AnalysisFrame>)> {
    let (input, output) = TripleBuffer::new(&AnalysisFrame::default()).split();
    let handle = spawn_analysis_thread(source, input, analysis)?;
    Ok((handle, output))
}

/// Attend la prochaine commande ou l'échéance du tick, selon ce qui vient en premier.
fn run_analysis_loop<S: CaptureSource, K: FrameSink>(
    controller: &mut AnalysisController<S, K>,
    rx: &flume::Receiver<AnalysisCommand>,
) {
    loop {
        let received = match controller.next_tick() {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(cmd) => Some(cmd),
                Err(flume::RecvTimeoutError::Timeout) => None,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(cmd) => Some(cmd),
                Err(flume::RecvError::Disconnected) => break,
            },
        };

        match received {
            Some(AnalysisCommand::Start) => controller.request_start(),
            Some(AnalysisCommand::Stop { ack }) => {
                controller.request_stop();
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            Some(AnalysisCommand::Shutdown) => break,
            None => {}
        }

        controller.poll(Instant::now());
    }

    controller.request_stop();
    log::debug!("Thread d'analyse terminé");
}
