//! ML anomaly detection stack for the guardian-scan-core transaction scan
//! pipeline: a 25-dimensional feature extractor, an online standardizer,
//! and a pretrained isolation-forest-style scorer with a deterministic
//! rule-tree fallback for when no model is loaded.

pub mod features;
pub mod forest;
pub mod model;

pub use features::{FeatureStandardizer, TransactionFeatures, FEATURE_COUNT};
pub use forest::IsolationForest;
pub use model::{AnomalyModel, AnomalyPrediction, Classification};
