use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },
}

/// Errors raised by a capture source or its handle.
///
/// "No pitch detected" is not an error: it is the valid `0.0` pitch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The caller was refused access to the input device.
    #[error("Accès au microphone refusé")]
    PermissionDenied,

    /// No input device exists, or it disappeared.
    #[error("Aucun périphérique audio d'entrée disponible")]
    DeviceUnavailable,

    /// The handle was closed; no stale data is returned.
    #[error("Handle de capture fermé")]
    HandleClosed,

    /// The backend cannot honour the requested input processing constraints.
    #[error("Contraintes d'entrée non supportées : {0}")]
    UnsupportedConstraints(String),

    /// Audio stream error reported by the backend.
    #[error("Erreur de stream audio : {0}")]
    Stream(String),

    /// Audio decode error (file replay).
    #[error("Erreur de décodage : {0}")]
    Decode(String),
}
