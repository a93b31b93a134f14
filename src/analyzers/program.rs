//! Program reputation analyzer: classifies every program a transaction
//! touches as verified, blocklisted, or unknown.

use std::collections::HashSet;

use crate::types::{ParsedTransaction, ProgramAnalysis, ProgramReputation};

pub struct ProgramAnalyzer {
    verified: HashSet<String>,
    blocklisted: HashSet<String>,
}

impl ProgramAnalyzer {
    pub fn new(verified: Vec<String>, blocklisted: Vec<String>) -> Self {
        ProgramAnalyzer {
            verified: verified.into_iter().collect(),
            blocklisted: blocklisted.into_iter().collect(),
        }
    }

    pub fn analyze(&self, tx: &ParsedTransaction) -> ProgramAnalysis {
        let mut flagged = Vec::new();
        let mut details = Vec::new();
        let mut verified_count = 0usize;
        let mut unknown_count = 0usize;

        for program in &tx.programs {
            if self.blocklisted.contains(program) {
                flagged.push(program.clone());
                details.push(format!("program {program} is blocklisted"));
            } else if self.verified.contains(program) {
                verified_count += 1;
            } else {
                unknown_count += 1;
                details.push(format!("program {program} is not in the verified registry"));
            }
        }

        let reputation = if !flagged.is_empty() {
            ProgramReputation::Blocklisted
        } else if tx.programs.iter().all(|p| self.verified.contains(p)) {
            ProgramReputation::Verified
        } else {
            ProgramReputation::Unknown
        };

        ProgramAnalysis {
            reputation,
            flagged_programs: flagged,
            details,
            total_programs: tx.programs.len(),
            verified_programs: verified_count,
            unknown_programs: unknown_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParsedInstruction;

    fn tx(programs: Vec<&str>) -> ParsedTransaction {
        ParsedTransaction {
            fingerprint: String::new(),
            wallet_address: "w".to_string(),
            programs: programs.iter().map(|s| s.to_string()).collect(),
            instructions: programs
                .iter()
                .map(|p| ParsedInstruction {
                    program_id: p.to_string(),
                    accounts: vec![],
                    data: vec![],
                })
                .collect(),
            accounts: vec![],
            signatures_required: 1,
            raw_size_bytes: 0,
        }
    }

    #[test]
    fn flags_blocklisted_program() {
        let analyzer = ProgramAnalyzer::new(vec![], vec!["bad".to_string()]);
        let result = analyzer.analyze(&tx(vec!["bad"]));
        assert_eq!(result.reputation, ProgramReputation::Blocklisted);
        assert_eq!(result.flagged_programs, vec!["bad".to_string()]);
    }

    #[test]
    fn all_verified_programs_yield_verified_reputation() {
        let analyzer = ProgramAnalyzer::new(vec!["good".to_string()], vec![]);
        let result = analyzer.analyze(&tx(vec!["good"]));
        assert_eq!(result.reputation, ProgramReputation::Verified);
    }

    #[test]
    fn unrecognized_program_yields_unknown_reputation() {
        let analyzer = ProgramAnalyzer::new(vec![], vec![]);
        let result = analyzer.analyze(&tx(vec!["mystery"]));
        assert_eq!(result.reputation, ProgramReputation::Unknown);
        assert_eq!(result.unknown_programs, 1);
        assert_eq!(result.verified_ratio(), 0.0);
        assert_eq!(result.unknown_ratio(), 1.0);
    }

    #[test]
    fn ratios_reflect_the_verified_unknown_split() {
        let analyzer = ProgramAnalyzer::new(vec!["good".to_string()], vec![]);
        let result = analyzer.analyze(&tx(vec!["good", "mystery"]));
        assert_eq!(result.total_programs, 2);
        assert_eq!(result.verified_programs, 1);
        assert_eq!(result.unknown_programs, 1);
        assert_eq!(result.verified_ratio(), 0.5);
        assert_eq!(result.unknown_ratio(), 0.5);
    }
}
