//! Cichlid Diel - batch analysis engine for diel activity patterns
//!
//! Takes time-binned behavioral tracking data (speed, movement, rest, vertical
//! position) of cichlid fish through a deterministic pipeline: phase tagging →
//! daily aggregation → day/night classification → crepuscular peak detection →
//! species majority vote → combined CSV export.
//!
//! ## Modules
//!
//! - **timing**: diel phase calendar derived from configured transition times
//! - **aggregation**: typical-day profiles and per-fish per-day summaries
//! - **diel**: individual and species activity-pattern classification
//! - **crepuscular**: dawn/dusk peak detection and aggregation
//! - **correlation**: pattern-consistency correlation matrices
//! - **export**: combined per-species diel pattern table

pub mod aggregation;
pub mod correlation;
pub mod crepuscular;
pub mod diel;
pub mod error;
pub mod export;
pub mod ingest;
pub mod pipeline;
pub mod species;
pub mod timing;
pub mod types;

pub use error::AnalysisError;
pub use pipeline::{analyze_csv, AnalysisOptions, DielProcessor, DielRunSummary};
pub use timing::TimingConfig;
pub use types::{DayPhase, DielPattern, Feature, TrackRecord};

/// Crate version reported by the CLI
pub const DIEL_VERSION: &str = env!("CARGO_PKG_VERSION");
