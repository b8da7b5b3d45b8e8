use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use vt_core::config::AnalyzerConfig;

/// Surveille le fichier config et publie chaque version valide dans l'ArcSwap.
///
/// Le retour sonore (`[feedback]`) s'applique immédiatement ; les sections
/// `[capture]` et `[analysis]` ne prennent effet qu'au prochain lancement.
///
/// Retourne le Watcher (doit rester vivant tant que l'app tourne).
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
pub fn spawn_config_watcher(
    config_path: &Path,
    config: &Arc<ArcSwap<AnalyzerConfig>>,
) -> Result<impl Watcher + use<>> {
    let config = Arc::clone(config);
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
        {
            reload(&path, &config);
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Recharge une fois. Une config invalide laisse l'ancienne en place.
fn reload(path: &Path, config: &ArcSwap<AnalyzerConfig>) {
    match vt_core::config::load_config(path) {
        Ok(new_config) => {
            let old = config.load();
            if old.capture != new_config.capture || old.analysis != new_config.analysis {
                log::info!("Paramètres de capture/analyse modifiés : effectifs au prochain lancement");
            }
            config.store(Arc::new(new_config));
            log::info!("Config rechargée depuis {}", path.display());
        }
        Err(e) => {
            log::warn!("Erreur de rechargement config : {e:#}");
        }
    }
}
