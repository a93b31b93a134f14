// 25-dimensional transaction feature vector and a running standardizer.
//
// Welford's online algorithm for mean/variance, carried over from an
// earlier 10-feature ledger-transaction extractor and retargeted to the
// 25 features this scan pipeline extracts.

use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 25;

/// Fixed-arity, named view over the 25 features extracted from a parsed
/// transaction. Field order here is the canonical order fed to the model;
/// ordering is otherwise arbitrary so long as it stays fixed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransactionFeatures {
    // Program counts
    pub program_count: f64,
    pub verified_program_count: f64,
    pub unknown_program_count: f64,
    pub has_system_program: f64,
    pub has_token_program: f64,

    // Instruction statistics
    pub instruction_count: f64,
    pub mean_instruction_data_len: f64,
    pub max_instruction_data_len: f64,
    pub stddev_instruction_data_len: f64,
    pub complex_instruction_count: f64,
    pub approval_marker_count: f64,
    pub multi_account_instruction_count: f64,
    pub many_instructions_flag: f64,

    // Account statistics
    pub account_count: f64,
    pub unique_account_count: f64,
    pub new_account_heuristic_count: f64,
    pub invalid_length_account_count: f64,
    pub many_accounts_flag: f64,
    pub account_instruction_ratio: f64,
    pub duplicate_account_flag: f64,

    // Complexity metrics
    pub total_data_size: f64,
    pub avg_instruction_size: f64,
    pub programs_times_instructions: f64,
    pub high_complexity_flag: f64,
    pub signatures_required: f64,
}

impl TransactionFeatures {
    pub fn as_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.program_count,
            self.verified_program_count,
            self.unknown_program_count,
            self.has_system_program,
            self.has_token_program,
            self.instruction_count,
            self.mean_instruction_data_len,
            self.max_instruction_data_len,
            self.stddev_instruction_data_len,
            self.complex_instruction_count,
            self.approval_marker_count,
            self.multi_account_instruction_count,
            self.many_instructions_flag,
            self.account_count,
            self.unique_account_count,
            self.new_account_heuristic_count,
            self.invalid_length_account_count,
            self.many_accounts_flag,
            self.account_instruction_ratio,
            self.duplicate_account_flag,
            self.total_data_size,
            self.avg_instruction_size,
            self.programs_times_instructions,
            self.high_complexity_flag,
            self.signatures_required,
        ]
    }
}

/// Online feature standardizer (zero mean, unit variance) using Welford's
/// algorithm so it can be updated one transaction at a time without
/// retaining the full training set.
#[derive(Clone)]
pub struct FeatureStandardizer {
    mean: [f64; FEATURE_COUNT],
    m2: [f64; FEATURE_COUNT],
    count: u64,
}

impl FeatureStandardizer {
    pub fn new() -> Self {
        FeatureStandardizer {
            mean: [0.0; FEATURE_COUNT],
            m2: [0.0; FEATURE_COUNT],
            count: 0,
        }
    }

    /// Fit from a batch of historical/normal feature vectors (e.g. at
    /// startup from a seed corpus).
    pub fn fit(&mut self, samples: &[[f64; FEATURE_COUNT]]) {
        for sample in samples {
            self.update(sample);
        }
    }

    pub fn update(&mut self, sample: &[f64; FEATURE_COUNT]) {
        self.count += 1;
        let n = self.count as f64;
        for i in 0..FEATURE_COUNT {
            let delta = sample[i] - self.mean[i];
            self.mean[i] += delta / n;
            let delta2 = sample[i] - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    fn std(&self, i: usize) -> f64 {
        if self.count < 2 {
            return 1.0;
        }
        (self.m2[i] / (self.count as f64 - 1.0)).sqrt().max(1e-6)
    }

    pub fn transform(&self, sample: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (sample[i] - self.mean[i]) / self.std(i);
        }
        out
    }

    pub fn is_seeded(&self) -> bool {
        self.count >= 2
    }
}

impl Default for FeatureStandardizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_standardizer_is_near_identity() {
        let standardizer = FeatureStandardizer::new();
        let v = [2.0; FEATURE_COUNT];
        let t = standardizer.transform(&v);
        assert_eq!(t, v);
    }

    #[test]
    fn standardizer_centers_and_scales() {
        let mut standardizer = FeatureStandardizer::new();
        let mut samples = Vec::new();
        for i in 0..50 {
            samples.push([i as f64; FEATURE_COUNT]);
        }
        standardizer.fit(&samples);
        assert!(standardizer.is_seeded());

        let t = standardizer.transform(&[24.5; FEATURE_COUNT]);
        // 24.5 is the sample mean, so the standardized value should be ~0.
        assert!(t[0].abs() < 0.2, "expected near-zero, got {}", t[0]);
    }
}
