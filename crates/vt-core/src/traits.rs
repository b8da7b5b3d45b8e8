use crate::error::CaptureError;
use crate::frame::{SampleBuffer, SpectrumBins};

/// Paire cohérente (fenêtre temporelle, spectre) empruntée au handle.
///
/// Les deux vues couvrent le même instant : le spectre est calculé sur la
/// fenêtre retournée.
pub struct Snapshot<'a> {
    /// Most recent samples, oldest first.
    pub samples: &'a SampleBuffer,
    /// Smoothed byte spectrum of `samples`.
    pub spectrum: &'a SpectrumBins,
    /// Sample rate of the stream in Hz.
    pub sample_rate: u32,
}

/// Ouvre un périphérique d'entrée et produit un handle de capture.
///
/// Implémenté par : `MicrophoneSource`, `FileSource`, `ToneSource`.
///
/// The source itself only holds configuration, so it can be moved to the
/// analysis thread; the handle is created there and never leaves it.
///
/// # Example
/// ```
/// use vt_core::error::CaptureError;
/// use vt_core::traits::{CaptureHandle, CaptureSource, Snapshot};
///
/// struct Unplugged;
/// struct NeverOpened;
///
/// impl CaptureHandle for NeverOpened {
///     fn sample_rate(&self) -> u32 { 44_100 }
///     fn snapshot(&mut self) -> Result<Snapshot<'_>, CaptureError> {
///         Err(CaptureError::HandleClosed)
///     }
///     fn close(&mut self) {}
///     fn is_closed(&self) -> bool { true }
/// }
///
/// impl CaptureSource for Unplugged {
///     type Handle = NeverOpened;
///     fn open(&mut self) -> Result<NeverOpened, CaptureError> {
///         Err(CaptureError::DeviceUnavailable)
///     }
/// }
///
/// assert!(matches!(Unplugged.open(), Err(CaptureError::DeviceUnavailable)));
/// ```
pub trait CaptureSource: Send + 'static {
    /// Handle type produced by a successful `open`.
    type Handle: CaptureHandle;

    /// Acquiert le périphérique, echo-cancellation / noise-suppression /
    /// auto-gain désactivés.
    ///
    /// # Errors
    /// `PermissionDenied` if access is refused, `DeviceUnavailable` if there is
    /// no input device, `UnsupportedConstraints` if the requested processing
    /// cannot be honoured.
    fn open(&mut self) -> Result<Self::Handle, CaptureError>;
}

/// Handle exclusif sur un flux d'entrée ouvert.
pub trait CaptureHandle {
    /// Sample rate of the stream in Hz.
    fn sample_rate(&self) -> u32;

    /// Retourne la paire la plus récente. Ne bloque JAMAIS, n'alloue pas.
    ///
    /// # Errors
    /// `HandleClosed` once `close` has been called, never stale data.
    fn snapshot(&mut self) -> Result<Snapshot<'_>, CaptureError>;

    /// Libère le périphérique. Idempotent.
    fn close(&mut self);

    /// `true` once `close` has been called.
    fn is_closed(&self) -> bool;
}
