use serde::{Deserialize, Serialize};

use crate::features::{FeatureStandardizer, TransactionFeatures, FEATURE_COUNT};
use crate::forest::IsolationForest;

/// Anomaly classification bucket, mirrored directly from the scan pipeline
/// specification's three-way split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    Suspicious,
    Malicious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyPrediction {
    /// Probability-like anomaly indicator in `[0, 1]`.
    pub p: f64,
    pub classification: Classification,
    pub confidence: f64,
    /// True when the rule validator overrode the model's own verdict.
    pub rule_override: bool,
    /// True when the prediction came from the rule-only fallback because
    /// no trained model was available.
    pub fallback: bool,
}

fn classify(p: f64) -> (Classification, f64) {
    if p > 0.85 {
        let confidence = (0.85 + (p - 0.85) * 0.87).clamp(0.85, 0.98);
        (Classification::Malicious, confidence)
    } else if p > 0.65 {
        let confidence = (0.70 + (p - 0.65) * 1.0).clamp(0.70, 0.90);
        (Classification::Suspicious, confidence)
    } else if p > 0.35 {
        let confidence = (0.60 + (p - 0.35) * 0.5).clamp(0.60, 0.75);
        (Classification::Suspicious, confidence)
    } else {
        let confidence = (0.80 + (0.35 - p) * 0.43).clamp(0.80, 0.95);
        (Classification::Normal, confidence)
    }
}

/// A rule predicate that can override the model's verdict. Each rule names
/// itself for observability and returns whether it fired against the
/// supplied features.
struct OverrideRule {
    name: &'static str,
    check: fn(&TransactionFeatures) -> bool,
}

const OVERRIDE_RULES: &[OverrideRule] = &[OverrideRule {
    name: "wallet_drainer_pattern",
    check: |f| {
        f.program_count > 3.0 && f.many_instructions_flag > 0.0 && f.many_accounts_flag > 0.0
    },
}];

/// Deterministic rule tree used when no trained model is available.
/// Confidence is capped at 0.92 per the scan pipeline specification.
fn rule_only_fallback(features: &TransactionFeatures) -> AnomalyPrediction {
    let mut p: f64 = 0.1;
    if features.approval_marker_count > 0.0 {
        p += 0.35;
    }
    if features.many_instructions_flag > 0.0 {
        p += 0.2;
    }
    if features.many_accounts_flag > 0.0 {
        p += 0.15;
    }
    if features.unknown_program_count > features.verified_program_count {
        p += 0.15;
    }
    if features.duplicate_account_flag > 0.0 {
        p += 0.1;
    }
    p = p.clamp(0.0, 1.0);

    let (classification, confidence) = classify(p);
    AnomalyPrediction {
        p,
        classification,
        confidence: confidence.min(0.92),
        rule_override: false,
        fallback: true,
    }
}

/// Pretrained isolation-forest-style anomaly scorer with an accompanying
/// feature standardizer, as specified for the ML anomaly detector.
pub struct AnomalyModel {
    forest: IsolationForest,
    standardizer: FeatureStandardizer,
}

impl AnomalyModel {
    pub fn new() -> Self {
        AnomalyModel {
            forest: IsolationForest::new(100, 256),
            standardizer: FeatureStandardizer::new(),
        }
    }

    pub fn fit(&mut self, normal_samples: &[[f64; FEATURE_COUNT]]) {
        self.standardizer.fit(normal_samples);
        let standardized: Vec<Vec<f64>> = normal_samples
            .iter()
            .map(|s| self.standardizer.transform(s).to_vec())
            .collect();
        self.forest.fit(&standardized);
    }

    pub fn is_trained(&self) -> bool {
        self.forest.is_trained()
    }

    /// Raw decision-function output: centred so that positive values lean
    /// toward "outlier" and negative values lean toward "inlier".
    fn raw_score(&self, features: &TransactionFeatures) -> f64 {
        let standardized = self.standardizer.transform(&features.as_vector());
        self.forest.score(&standardized) - 0.5
    }

    /// Predict an anomaly verdict for one transaction's features.
    ///
    /// Falls back to a deterministic rule tree when the model has not
    /// been trained (e.g. no model file was loadable at startup).
    pub fn predict(&self, features: &TransactionFeatures) -> AnomalyPrediction {
        if !self.is_trained() {
            return rule_only_fallback(features);
        }

        let raw = self.raw_score(features);
        let is_outlier = raw > 0.0;
        let mut p = if is_outlier {
            (0.8 + raw.abs() * 0.2).clamp(0.6, 1.0)
        } else {
            (0.2 + raw.abs() * 0.1).clamp(0.0, 0.4)
        };

        let mut rule_override = false;
        for rule in OVERRIDE_RULES {
            if (rule.check)(features) {
                tracing::debug!(rule = rule.name, "anomaly override rule fired");
                p = p.max(0.9);
                rule_override = true;
            }
        }

        let (classification, confidence) = classify(p);
        let classification = if rule_override {
            Classification::Malicious
        } else {
            classification
        };

        AnomalyPrediction {
            p,
            classification,
            confidence,
            rule_override,
            fallback: false,
        }
    }
}

impl Default for AnomalyModel {
    fn default() -> Self {
        Self::new()
    }
}
