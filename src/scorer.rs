//! Risk scorer: fuses the four analyzers' partial outputs into a single
//! risk level, numeric score, and confidence.

use crate::types::{AnalyzerOutcomes, ProgramReputation, RiskLevel};

const SCORE_CAP: f64 = 100.0;

/// Per-band caps, applied before the bands are summed.
const PATTERN_SCORE_CAP: f64 = 35.0;
const ML_SCORE_CAP: f64 = 30.0;
const PROGRAM_SCORE_CAP: f64 = 20.0;
const ACCOUNT_SCORE_CAP: f64 = 15.0;

/// Account-band point weights.
const UNLIMITED_APPROVAL_POINTS: f64 = 8.0;
const AUTHORITY_CHANGE_POINTS: f64 = 6.0;
const USER_AT_RISK_POINTS: f64 = 4.0;
const RED_FLAG_POINTS: f64 = 2.0;

/// ML-band classification base, keyed by `AnomalyAnalysis::classification`.
const ML_BASE_MALICIOUS: f64 = 30.0;
const ML_BASE_SUSPICIOUS: f64 = 20.0;
const ML_BASE_NORMAL: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct RiskVerdict {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub degraded: bool,
}

/// Minimum `risk_score` enforced once more than half the four analyzer
/// branches failed: an incomplete scan must never be reported as
/// confidently low-risk.
const DEGRADATION_FLOOR: f64 = 40.0;
const DEGRADED_COMPONENT_THRESHOLD: usize = 2;

const TOTAL_COMPONENTS: usize = 4;

/// Produces a risk verdict from whatever subset of analyzers completed.
/// Never panics: any unexpected internal failure is caught and converted
/// to the conservative fallback verdict, since a scorer crash must not
/// take down an otherwise-successful scan.
pub fn score(outcomes: &AnalyzerOutcomes) -> RiskVerdict {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| score_inner(outcomes)))
        .unwrap_or_else(|_| fallback_verdict(outcomes))
}

fn score_inner(outcomes: &AnalyzerOutcomes) -> RiskVerdict {
    let failed_components = outcomes.timed_out.len().min(TOTAL_COMPONENTS);
    let completed_components = TOTAL_COMPONENTS - failed_components;
    let degraded = failed_components > 0;
    let ml_confidence = outcomes.anomaly_analysis.as_ref().map(|a| a.confidence).unwrap_or(0.0);

    // A blocklisted program is dispositive regardless of anything else.
    if let Some(program) = &outcomes.program_analysis {
        if program.reputation == ProgramReputation::Blocklisted {
            return RiskVerdict {
                risk_level: RiskLevel::Danger,
                risk_score: SCORE_CAP,
                confidence: ml_confidence.max(0.9),
                degraded,
            };
        }
    }

    let pattern_count = outcomes.pattern_matches.as_ref().map(|m| m.len()).unwrap_or(0);
    let pattern_band = pattern_score(outcomes).min(PATTERN_SCORE_CAP);
    let ml_band = ml_score(outcomes).min(ML_SCORE_CAP);
    let program_band = program_score(outcomes).min(PROGRAM_SCORE_CAP);
    let account_band = account_score(outcomes).min(ACCOUNT_SCORE_CAP);

    let verified_ratio = outcomes.program_analysis.as_ref().map(|p| p.verified_ratio()).unwrap_or(0.0);
    let red_flag_count = outcomes.account_analysis.as_ref().map(|a| a.red_flags.len()).unwrap_or(0);

    let total_confidence = 0.3 * bool01(pattern_count > 0)
        + 0.4 * ml_confidence
        + 0.2 * bool01(verified_ratio > 0.5)
        + 0.1 * bool01(red_flag_count == 0);

    let mult = if total_confidence < 0.7 {
        0.8
    } else if total_confidence > 0.9 {
        1.1
    } else {
        1.0
    };

    let mut score = ((pattern_band + ml_band + program_band + account_band).clamp(0.0, SCORE_CAP)) * mult;
    score = score.clamp(0.0, SCORE_CAP);

    // Degradation floor: more than half the branches failed, so the
    // verdict must not read as confidently low-risk even if whatever did
    // complete looked clean.
    if failed_components >= DEGRADED_COMPONENT_THRESHOLD {
        score = score.max(DEGRADATION_FLOOR);
    }

    let risk_level = band(score);

    // Final confidence folds in how much of the picture the scorer
    // actually saw: a scan with every branch missing can't be as sure of
    // itself as one with full coverage, regardless of what little came in.
    let confidence = (completed_components as f64 / TOTAL_COMPONENTS as f64) * ml_confidence;

    RiskVerdict {
        risk_level,
        risk_score: score,
        confidence: confidence.clamp(0.3, 0.99),
        degraded,
    }
}

/// Pattern score band `P`: `Σ sev_weight(m) × m.confidence` over matches.
fn pattern_score(outcomes: &AnalyzerOutcomes) -> f64 {
    outcomes
        .pattern_matches
        .as_ref()
        .map(|matches| matches.iter().map(|m| m.severity.weight() * m.confidence).sum())
        .unwrap_or(0.0)
}

/// ML score band `M`: `base × anomaly × ml_confidence`, `base` keyed by
/// classification.
fn ml_score(outcomes: &AnalyzerOutcomes) -> f64 {
    let Some(anomaly) = &outcomes.anomaly_analysis else {
        return 0.0;
    };
    let base = match anomaly.classification.as_str() {
        "malicious" => ML_BASE_MALICIOUS,
        "suspicious" => ML_BASE_SUSPICIOUS,
        _ => ML_BASE_NORMAL,
    };
    base * anomaly.score * anomaly.confidence
}

/// Program score band `Pr`: `15 × unknown_ratio + max(0, 5 − 5 ×
/// verified_ratio)`. A blocklisted verdict never reaches here — it is
/// handled by the short-circuit above. A transaction that touches no
/// programs at all has nothing to rate as unverified, so it scores 0
/// rather than the formula's degenerate `verified_ratio = 0` case.
fn program_score(outcomes: &AnalyzerOutcomes) -> f64 {
    let Some(program) = &outcomes.program_analysis else {
        return 0.0;
    };
    if program.total_programs == 0 {
        return 0.0;
    }
    15.0 * program.unknown_ratio() + (5.0 - 5.0 * program.verified_ratio()).max(0.0)
}

/// Account score band `A`: `8·unlimited + 6·authority + 4·user_at_risk +
/// 2·|red_flags|`.
fn account_score(outcomes: &AnalyzerOutcomes) -> f64 {
    let Some(account) = &outcomes.account_analysis else {
        return 0.0;
    };
    bool01(account.unlimited_approval_detected) * UNLIMITED_APPROVAL_POINTS
        + bool01(account.authority_change_detected) * AUTHORITY_CHANGE_POINTS
        + bool01(account.user_at_risk) * USER_AT_RISK_POINTS
        + account.red_flags.len() as f64 * RED_FLAG_POINTS
}

fn bool01(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Verdict bands: `Danger` at `>= 70`, `Caution` at `>= 30`, `Safe`
/// otherwise.
fn band(score: f64) -> RiskLevel {
    if score >= 70.0 {
        RiskLevel::Danger
    } else if score >= 30.0 {
        RiskLevel::Caution
    } else {
        RiskLevel::Safe
    }
}

/// Deterministic fallback used when the weighted formula itself panics:
/// `30 + 20·|pattern_matches| + 30·anomaly + 10·unknown_programs +
/// 5·|red_flags|`, clamped to `[0, 100]`. Verdict banding is unchanged.
fn fallback_verdict(outcomes: &AnalyzerOutcomes) -> RiskVerdict {
    tracing::error!("risk scorer panicked, falling back to the deterministic formula");

    let pattern_count = outcomes.pattern_matches.as_ref().map(|m| m.len()).unwrap_or(0);
    let anomaly = outcomes.anomaly_analysis.as_ref().map(|a| a.score).unwrap_or(0.0);
    let unknown_programs = outcomes.program_analysis.as_ref().map(|p| p.unknown_programs).unwrap_or(0);
    let red_flags = outcomes.account_analysis.as_ref().map(|a| a.red_flags.len()).unwrap_or(0);

    let score = (30.0
        + 20.0 * pattern_count as f64
        + 30.0 * anomaly
        + 10.0 * unknown_programs as f64
        + 5.0 * red_flags as f64)
        .clamp(0.0, SCORE_CAP);

    RiskVerdict {
        risk_level: band(score),
        risk_score: score,
        confidence: 0.3,
        degraded: true,
    }
}
