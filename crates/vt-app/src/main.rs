use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use vt_audio::capture::MicrophoneSource;
use vt_audio::replay::FileSource;
use vt_audio::state::{self, AnalysisHandle};
use vt_audio::synth::ToneSource;
use vt_core::config::AnalyzerConfig;
use vt_core::frame::AnalysisFrame;

use crate::console::ConsoleCommand;

pub mod cli;
pub mod console;
pub mod hotreload;

/// Cadence d'affichage de la console, indépendante du FPS d'analyse.
const REFRESH: Duration = Duration::from_millis(100);

/// Fréquence d'échantillonnage de la source synthétique.
const TONE_SAMPLE_RATE: u32 = 44_100;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Valider la source
    cli.validate_source()?;

    // 4. Charger la config, puis les overrides CLI
    let mut config = resolve_config(&cli)?;
    if let Some(fps) = cli.fps {
        config.analysis.target_fps = fps;
        config.clamp_all();
    }
    let config = Arc::new(ArcSwap::from_pointee(config));

    // 5. Hot-reload (seulement si le fichier existe)
    let _watcher = if cli.config.exists() {
        Some(hotreload::spawn_config_watcher(&cli.config, &config)?)
    } else {
        None
    };

    // 6. Thread d'analyse
    let (analysis, mut frames) = start_analysis(&cli, &config.load())?;
    let control = analysis.control();

    // 7. Entrées : stdin + Ctrl-C
    let (cmd_tx, cmd_rx) = flume::unbounded();
    spawn_stdin_reader(cmd_tx.clone())?;
    ctrlc::set_handler(move || {
        let _ = cmd_tx.send(ConsoleCommand::Quit);
    })
    .context("Impossible d'installer le handler Ctrl-C")?;

    if !cli.paused {
        control.request_start()?;
    }
    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));

    // 8. Boucle console
    loop {
        match cmd_rx.recv_timeout(REFRESH) {
            Ok(ConsoleCommand::Start) => control.request_start()?,
            Ok(ConsoleCommand::Stop) => {
                control.request_stop()?;
                print_line(frames.read(), &config);
            }
            Ok(ConsoleCommand::Status) => {
                print!("{}", console::status_report(frames.read(), &config.load().feedback));
            }
            Ok(ConsoleCommand::Quit) | Err(flume::RecvTimeoutError::Disconnected) => break,
            Err(flume::RecvTimeoutError::Timeout) => {}
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Durée écoulée");
            break;
        }

        if frames.update() && frames.peek_output_buffer().is_analyzing {
            print_line(frames.peek_output_buffer(), &config);
        }
    }

    // 9. Arrêt propre : frame finale, puis join
    control.request_stop()?;
    print_line(frames.read(), &config);
    analysis.shutdown();
    Ok(())
}

fn print_line(frame: &AnalysisFrame, config: &ArcSwap<AnalyzerConfig>) {
    println!("{}", console::status_line(frame, &config.load().feedback));
}

/// Choose the capture source from the CLI and spawn the analysis thread on it.
fn start_analysis(
    cli: &cli::Cli,
    config: &AnalyzerConfig,
) -> Result<(AnalysisHandle, triple_buffer::Output<AnalysisFrame>)> {
    let capture = config.capture.clone();
    if let Some(hz) = cli.tone {
        log::info!("Source : sinusoïde {hz} Hz");
        let source = ToneSource::new(hz, TONE_SAMPLE_RATE, capture).with_hop(hop(config));
        state::spawn_latest_frame_thread(source, &config.analysis)
    } else if let Some(path) = &cli.file {
        log::info!("Source : fichier {}", path.display());
        let source = FileSource::new(path, capture).looping(cli.looping);
        state::spawn_latest_frame_thread(source, &config.analysis)
    } else {
        log::info!("Source : microphone");
        let mut source = MicrophoneSource::new(capture);
        if let Some(name) = &cli.device {
            source = source.with_device(name.as_str());
        }
        state::spawn_latest_frame_thread(source, &config.analysis)
    }
}

/// Samples per analysis tick, so the synthetic tone advances in real time.
fn hop(config: &AnalyzerConfig) -> usize {
    (TONE_SAMPLE_RATE / config.analysis.target_fps.max(1)) as usize
}

fn spawn_stdin_reader(tx: flume::Sender<ConsoleCommand>) -> Result<()> {
    thread::Builder::new()
        .name("vt-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            return;
                        }
                    }
                    None => log::warn!("Commande inconnue : {} (start, stop, status, quit)", line.trim()),
                }
            }
            // stdin fermé : on ne quitte pas, Ctrl-C ou --duration s'en chargent.
            log::debug!("stdin fermé");
        })
        .context("Impossible de lancer le lecteur stdin")?;
    Ok(())
}

/// Resolve config: --config if present, defaults otherwise.
fn resolve_config(cli: &cli::Cli) -> Result<AnalyzerConfig> {
    if cli.config.exists() {
        vt_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(AnalyzerConfig::default())
    }
}
