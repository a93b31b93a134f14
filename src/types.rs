//! Core data model shared across the scan pipeline: the parsed transaction
//! view, exploit pattern catalogue entries, pattern match results, and the
//! final scan result returned to callers.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity banding used by both the pattern catalogue and the risk scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight contributed to the risk scorer's weighted fusion.
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 35.0,
            Severity::High => 25.0,
            Severity::Medium => 15.0,
            Severity::Low => 8.0,
        }
    }
}

/// Verdict banding: `Danger` at a risk score of 70 or above, `Caution`
/// from 30 up to 70, `Safe` below that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Caution,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

/// Caller-declared scan depth, carried in a `ScanRequest` and mapped to an
/// admission `Priority` unless the caller is privileged enough to be
/// upgraded (see `ScanType::default_priority`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Quick,
    Deep,
    Comprehensive,
}

impl ScanType {
    pub fn default_priority(&self) -> Priority {
        match self {
            ScanType::Quick => Priority::Normal,
            ScanType::Deep => Priority::Normal,
            ScanType::Comprehensive => Priority::Low,
        }
    }
}

impl Default for ScanType {
    fn default() -> Self {
        ScanType::Quick
    }
}

/// One decoded instruction inside a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedInstruction {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub data: Vec<u8>,
}

/// A transaction after parsing, in the shape every downstream analyzer
/// consumes. Constructed once per scan by the parser and shared behind an
/// `Arc` through the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub fingerprint: String,
    pub wallet_address: String,
    pub programs: Vec<String>,
    pub instructions: Vec<ParsedInstruction>,
    pub accounts: Vec<String>,
    pub signatures_required: u32,
    pub raw_size_bytes: usize,
}

/// Kinds of exploit pattern the catalogue can hold, each matched by a
/// different sub-matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    InstructionRegex,
    ProgramBlocklist,
    AccountHeuristic,
    BehavioralRule,
}

/// A single behavioral-rule constraint against one named transaction
/// metric. Declared either as a scalar (equality) or as an explicit
/// `{min: v}` / `{max: v}` / `{equals: v}` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Min { min: f64 },
    Max { max: f64 },
    Equals { equals: f64 },
    Scalar(f64),
}

impl Constraint {
    pub fn evaluate(&self, value: f64) -> bool {
        match self {
            Constraint::Min { min } => value >= *min,
            Constraint::Max { max } => value <= *max,
            Constraint::Equals { equals } => (value - equals).abs() < f64::EPSILON,
            Constraint::Scalar(equals) => (value - equals).abs() < f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitPattern {
    pub id: String,
    pub name: String,
    pub kind: PatternKind,
    pub severity: Severity,
    pub base_confidence: f64,
    /// Regex source, used only by `PatternKind::InstructionRegex` entries.
    pub pattern: Option<String>,
    /// Program ids, used only by `PatternKind::ProgramBlocklist` entries.
    pub program_ids: Vec<String>,
    /// Metric-name -> constraint map, used by `PatternKind::BehavioralRule`
    /// and `PatternKind::AccountHeuristic` entries. A pattern matches iff
    /// every declared rule matches; an unknown metric name is never a
    /// match (see `crate::patterns::matchers::TransactionMetrics`).
    #[serde(default)]
    pub behavioral_rules: Option<HashMap<String, Constraint>>,
    pub description: String,
    /// Effectiveness counters, updated out-of-band through a best-effort
    /// channel (see `crate::patterns::mod::PatternEngine`) and never
    /// touched directly by the matcher. Drive `effective_confidence`.
    #[serde(default)]
    pub match_count: u64,
    #[serde(default)]
    pub false_positive_count: u64,
}

impl ExploitPattern {
    /// `base_confidence` discounted by how often this pattern has turned
    /// out to be a false positive: `base_confidence × (1 − 0.3 × fp_rate)`,
    /// clamped to `[0.1, 0.99]`.
    pub fn effective_confidence(&self) -> f64 {
        let fp_rate = self.false_positive_count as f64 / (self.match_count.max(1) as f64);
        (self.base_confidence * (1.0 - 0.3 * fp_rate)).clamp(0.1, 0.99)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub name: String,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramReputation {
    Verified,
    Blocklisted,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramAnalysis {
    pub reputation: ProgramReputation,
    pub flagged_programs: Vec<String>,
    pub details: Vec<String>,
    pub total_programs: usize,
    pub verified_programs: usize,
    pub unknown_programs: usize,
}

impl ProgramAnalysis {
    pub fn verified_ratio(&self) -> f64 {
        if self.total_programs == 0 {
            0.0
        } else {
            self.verified_programs as f64 / self.total_programs as f64
        }
    }

    pub fn unknown_ratio(&self) -> f64 {
        if self.total_programs == 0 {
            0.0
        } else {
            self.unknown_programs as f64 / self.total_programs as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountAnalysis {
    pub unlimited_approval_detected: bool,
    pub authority_change_detected: bool,
    pub user_at_risk: bool,
    /// Short, stable tags for every red flag raised, one per finding (so a
    /// transaction with two unlimited approvals contributes two entries).
    /// `details` carries the matching human-readable narrative.
    pub red_flags: Vec<String>,
    pub total_accounts: usize,
    pub new_accounts: usize,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyAnalysis {
    pub score: f64,
    pub classification: String,
    pub confidence: f64,
    pub fallback: bool,
}

/// Which of the pipeline's four analyzers completed in time; used for
/// partial-result bookkeeping when one or more analyzers time out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerOutcomes {
    pub pattern_matches: Option<Vec<PatternMatch>>,
    pub program_analysis: Option<ProgramAnalysis>,
    pub account_analysis: Option<AccountAnalysis>,
    pub anomaly_analysis: Option<AnomalyAnalysis>,
    pub timed_out: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub transaction_blob: String,
    pub wallet_address: String,
    #[serde(default)]
    pub scan_type: ScanType,
    /// Overrides the priority `scan_type` would otherwise map to; set by
    /// the external caller surface for privileged callers only.
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub fingerprint: String,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub pattern_matches: Vec<PatternMatch>,
    pub program_analysis: Option<ProgramAnalysis>,
    pub account_analysis: Option<AccountAnalysis>,
    pub anomaly_analysis: Option<AnomalyAnalysis>,
    pub explanation: String,
    pub recommendation: String,
    pub degraded: bool,
    pub timed_out_analyzers: Vec<String>,
    pub elapsed_ms: u64,
}

impl ScanResult {
    pub fn new_scan_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub scan_id: String,
    pub fingerprint: String,
    pub wallet_address: String,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub scan_time_ms: u64,
    pub program_count: usize,
    pub instruction_count: usize,
    pub pattern_matches_count: usize,
    pub scan_type: ScanType,
    pub timestamp_epoch_ms: u64,
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_weights_match_scorer_fusion_table() {
        assert_eq!(Severity::Critical.weight(), 35.0);
        assert_eq!(Severity::High.weight(), 25.0);
        assert_eq!(Severity::Medium.weight(), 15.0);
        assert_eq!(Severity::Low.weight(), 8.0);
    }

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
