use std::path::PathBuf;

use clap::Parser;
use vt_core::error::CoreError;

/// vtract — Retour temps réel sur l'articulation vocale.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Source synthétique : sinusoïde à cette fréquence (Hz), au lieu du micro.
    #[arg(long, conflicts_with = "file")]
    pub tone: Option<f32>,

    /// Rejouer un enregistrement (WAV, MP3, FLAC, OGG, AAC) au lieu du micro.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Rejouer le fichier en boucle.
    #[arg(long = "loop", default_value_t = false, requires = "file")]
    pub looping: bool,

    /// Nom exact du périphérique d'entrée. Défaut : périphérique système.
    #[arg(long)]
    pub device: Option<String>,

    /// FPS d'analyse cible.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Ne pas démarrer l'analyse avant la commande `start`.
    #[arg(long, default_value_t = false)]
    pub paused: bool,

    /// Quitter après ce nombre de secondes.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Validate source arguments clap cannot check on its own.
    ///
    /// # Errors
    /// Returns an error for a non-positive tone or a missing replay file.
    pub fn validate_source(&self) -> Result<(), CoreError> {
        if let Some(hz) = self.tone
            && !(hz.is_finite() && hz > 0.0)
        {
            return Err(CoreError::Config(format!(
                "--tone doit être une fréquence positive, reçu {hz}"
            )));
        }
        if let Some(path) = &self.file
            && !path.exists()
        {
            return Err(CoreError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        if let Some(secs) = self.duration
            && !(secs.is_finite() && secs >= 0.0)
        {
            return Err(CoreError::Config(format!(
                "--duration doit être positive, reçu {secs}"
            )));
        }
        Ok(())
    }
}
