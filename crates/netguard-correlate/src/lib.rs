//! Correlation layer: turns raw collector tables into derived state
//! (devices, vulnerabilities, scores, alerts). Spec components C6-C9.

pub mod alerts;
pub mod arp;
pub mod categorize;
pub mod dns;
pub mod oui;
pub mod registry;
pub mod scorer;
pub mod vulnerability;

pub use alerts::{AlertEngine, DraftAlert};
pub use registry::{CycleReport, DeviceRegistry};
pub use scorer::{ScoreResult, Scorer};
pub use vulnerability::VulnerabilityScanner;
