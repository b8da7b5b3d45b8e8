//! Capture audio et analyse temps réel pour vtract.
//!
//! Les sources (`capture`, `replay`, `synth`) ouvrent des handles qui exposent
//! la dernière fenêtre d'échantillons et son spectre ; `features` en tire le
//! pitch et la répartition spectrale ; `lifecycle` et `state` cadencent le tout.

pub mod capture;
pub mod decode;
pub mod features;
pub mod lifecycle;
pub mod replay;
pub mod spectrum;
pub mod state;
pub mod synth;
