/// Configuration, types, and shared structures for vtract.
///
/// This crate contains the frame types, capture traits, configuration
/// and articulator inference shared across the vtract workspace.

pub mod config;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod traits;

pub use config::AnalyzerConfig;
pub use error::{CaptureError, CoreError};
pub use frame::{AnalysisFrame, SampleBuffer, SpectralFeatures, SpectrumBins};
pub use traits::{CaptureHandle, CaptureSource, Snapshot};
