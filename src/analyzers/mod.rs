//! The three non-pattern analyzers that run alongside the pattern engine
//! inside the scan orchestrator's fan-out: program reputation, account/
//! authority risk, and ML anomaly scoring.

mod account;
mod anomaly;
mod program;

pub use account::AccountAnalyzer;
pub use anomaly::{extract_features, AnomalyAnalyzer};
pub use program::ProgramAnalyzer;
