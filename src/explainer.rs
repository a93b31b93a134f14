//! Natural-language explanation generation for a scan result, with a
//! deterministic template fallback for when no explainer is configured or
//! it fails to respond in time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{PatternMatch, RiskLevel};

/// The `{explanation, recommendation}` pair an `Explainer` returns (spec
/// §6): a short human-readable summary plus an actionable next step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
    pub recommendation: String,
}

#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, risk_level: RiskLevel, risk_score: f64, matches: &[PatternMatch]) -> Explanation;
}

/// Explainer that never calls out anywhere, used when no external
/// explanation provider is configured.
pub struct TemplateExplainer;

#[async_trait]
impl Explainer for TemplateExplainer {
    async fn explain(&self, risk_level: RiskLevel, risk_score: f64, matches: &[PatternMatch]) -> Explanation {
        fallback_explanation(risk_level, risk_score, matches)
    }
}

/// Deterministic explanation built purely from the scan result. Used both
/// as `TemplateExplainer`'s implementation and as the fallback when a
/// real `Explainer` implementation times out or errors.
pub fn fallback_explanation(risk_level: RiskLevel, risk_score: f64, matches: &[PatternMatch]) -> Explanation {
    let (level_text, recommendation) = match risk_level {
        RiskLevel::Safe => (
            "This transaction shows no signs of risk.",
            "No action required; safe to proceed.",
        ),
        RiskLevel::Caution => (
            "This transaction shows risk indicators and should be reviewed.",
            "Review the flagged details carefully before approving.",
        ),
        RiskLevel::Danger => (
            "This transaction is very likely malicious.",
            "Do not sign or submit this transaction.",
        ),
    };

    let explanation = if matches.is_empty() {
        format!("{level_text} (risk score {risk_score:.0}/100).")
    } else {
        let mut names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        names.dedup();
        format!(
            "{level_text} (risk score {risk_score:.0}/100). Matched patterns: {}.",
            names.join(", ")
        )
    };

    Explanation {
        explanation,
        recommendation: recommendation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_explainer_uses_deterministic_fallback() {
        let explainer = TemplateExplainer;
        let result = explainer.explain(RiskLevel::Safe, 0.0, &[]).await;
        assert!(result.explanation.contains("no signs of risk"));
        assert!(result.recommendation.contains("safe to proceed"));
    }

    #[test]
    fn fallback_mentions_matched_pattern_names() {
        let matches = vec![PatternMatch {
            pattern_id: "p1".to_string(),
            name: "wallet drainer".to_string(),
            severity: crate::types::Severity::Critical,
            confidence: 0.9,
            description: "d".to_string(),
        }];
        let result = fallback_explanation(RiskLevel::Danger, 95.0, &matches);
        assert!(result.explanation.contains("wallet drainer"));
        assert!(result.recommendation.contains("Do not sign"));
    }

    #[test]
    fn caution_band_recommends_review() {
        let result = fallback_explanation(RiskLevel::Caution, 45.0, &[]);
        assert!(result.recommendation.contains("Review"));
    }
}
