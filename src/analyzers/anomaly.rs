//! ML anomaly analyzer: extracts the 25-dimensional feature vector from a
//! parsed transaction and scores it with `guardian_ml::AnomalyModel`.

use guardian_ml::{AnomalyModel, Classification, TransactionFeatures};

use crate::types::{AnomalyAnalysis, ParsedTransaction};

pub struct AnomalyAnalyzer {
    model: AnomalyModel,
}

impl AnomalyAnalyzer {
    pub fn new(model: AnomalyModel) -> Self {
        AnomalyAnalyzer { model }
    }

    pub fn analyze(&self, tx: &ParsedTransaction) -> AnomalyAnalysis {
        let features = extract_features(tx);
        let prediction = self.model.predict(&features);
        AnomalyAnalysis {
            score: prediction.p,
            classification: classification_label(prediction.classification).to_string(),
            confidence: prediction.confidence,
            fallback: prediction.fallback,
        }
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Normal => "normal",
        Classification::Suspicious => "suspicious",
        Classification::Malicious => "malicious",
    }
}

/// Builds the fixed 25-feature vector from a parsed transaction. Field
/// semantics mirror `guardian_ml::TransactionFeatures`'s doc comment.
pub fn extract_features(tx: &ParsedTransaction) -> TransactionFeatures {
    let instruction_count = tx.instructions.len();
    let data_lens: Vec<f64> = tx.instructions.iter().map(|i| i.data.len() as f64).collect();
    let mean_len = mean(&data_lens);
    let max_len = data_lens.iter().cloned().fold(0.0, f64::max);
    let stddev_len = stddev(&data_lens, mean_len);

    let mut unique_accounts: Vec<&String> = tx.accounts.iter().collect();
    unique_accounts.sort();
    unique_accounts.dedup();

    let approval_markers = tx
        .instructions
        .iter()
        .filter(|i| i.data.first() == Some(&0xA0))
        .count();

    let complex_instructions = tx.instructions.iter().filter(|i| i.data.len() > 64).count();
    let multi_account_instructions = tx.instructions.iter().filter(|i| i.accounts.len() > 2).count();

    let total_data_size: f64 = data_lens.iter().sum();
    let account_count = tx.accounts.len();
    let program_count = tx.programs.len();

    TransactionFeatures {
        program_count: program_count as f64,
        verified_program_count: 0.0,
        unknown_program_count: program_count as f64,
        has_system_program: if tx.programs.iter().any(|p| p == "11111111111111111111111111111111") {
            1.0
        } else {
            0.0
        },
        has_token_program: 0.0,
        instruction_count: instruction_count as f64,
        mean_instruction_data_len: mean_len,
        max_instruction_data_len: max_len,
        stddev_instruction_data_len: stddev_len,
        complex_instruction_count: complex_instructions as f64,
        approval_marker_count: approval_markers as f64,
        multi_account_instruction_count: multi_account_instructions as f64,
        many_instructions_flag: if instruction_count > 10 { 1.0 } else { 0.0 },
        account_count: account_count as f64,
        unique_account_count: unique_accounts.len() as f64,
        new_account_heuristic_count: 0.0,
        invalid_length_account_count: tx
            .accounts
            .iter()
            .filter(|a| a.len() < 4 || a.len() > 64)
            .count() as f64,
        many_accounts_flag: if account_count > 15 { 1.0 } else { 0.0 },
        account_instruction_ratio: if instruction_count > 0 {
            account_count as f64 / instruction_count as f64
        } else {
            0.0
        },
        duplicate_account_flag: if unique_accounts.len() < account_count {
            1.0
        } else {
            0.0
        },
        total_data_size,
        avg_instruction_size: mean_len,
        programs_times_instructions: (program_count * instruction_count) as f64,
        high_complexity_flag: if complex_instructions > 0 { 1.0 } else { 0.0 },
        signatures_required: tx.signatures_required as f64,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64], mean_value: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}
