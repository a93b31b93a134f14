use regex::Regex;

use crate::types::{ExploitPattern, PatternKind};

/// An `InstructionRegex` pattern paired with its precompiled matcher. Kept
/// next to the pattern it came from so sub-matchers never recompile a
/// regex on the hot path.
#[derive(Debug, Clone)]
pub struct CompiledRegexPattern {
    pub pattern: ExploitPattern,
    pub regex: Regex,
}

/// Exploit patterns bucketed by kind so each sub-matcher only scans the
/// entries relevant to it, instead of filtering a flat list on every scan.
/// `InstructionRegex` entries are compiled once here, at catalogue-build
/// time, rather than per-scan: a pattern whose regex source fails to
/// compile is logged and dropped individually, so one bad catalogue entry
/// never disqualifies the rest of a reload.
#[derive(Debug, Default, Clone)]
pub struct PatternCatalogue {
    pub version: u64,
    pub instruction_regex: Vec<CompiledRegexPattern>,
    pub program_blocklist: Vec<ExploitPattern>,
    pub account_heuristic: Vec<ExploitPattern>,
    pub behavioral_rule: Vec<ExploitPattern>,
}

impl PatternCatalogue {
    pub fn from_patterns(version: u64, patterns: Vec<ExploitPattern>) -> Self {
        let mut catalogue = PatternCatalogue {
            version,
            ..Default::default()
        };
        for pattern in patterns {
            match pattern.kind {
                PatternKind::InstructionRegex => match &pattern.pattern {
                    Some(source) => match Regex::new(source) {
                        Ok(regex) => catalogue.instruction_regex.push(CompiledRegexPattern { pattern, regex }),
                        Err(err) => {
                            tracing::warn!(pattern_id = %pattern.id, error = %err, "skipping pattern with invalid regex");
                        }
                    },
                    None => {
                        tracing::warn!(pattern_id = %pattern.id, "instruction_regex pattern has no regex source, skipping");
                    }
                },
                PatternKind::ProgramBlocklist => catalogue.program_blocklist.push(pattern),
                PatternKind::AccountHeuristic => catalogue.account_heuristic.push(pattern),
                PatternKind::BehavioralRule => catalogue.behavioral_rule.push(pattern),
            }
        }
        catalogue
    }

    pub fn len(&self) -> usize {
        self.instruction_regex.len()
            + self.program_blocklist.len()
            + self.account_heuristic.len()
            + self.behavioral_rule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::collections::HashMap;

    fn pattern(kind: PatternKind) -> ExploitPattern {
        ExploitPattern {
            id: "p1".to_string(),
            name: "test".to_string(),
            kind,
            severity: Severity::Medium,
            base_confidence: 0.5,
            pattern: None,
            program_ids: vec![],
            behavioral_rules: None,
            description: "test pattern".to_string(),
            match_count: 0,
            false_positive_count: 0,
        }
    }

    #[test]
    fn buckets_patterns_by_kind() {
        let catalogue = PatternCatalogue::from_patterns(
            1,
            vec![
                pattern(PatternKind::ProgramBlocklist),
                pattern(PatternKind::ProgramBlocklist),
                pattern(PatternKind::AccountHeuristic),
            ],
        );
        assert_eq!(catalogue.program_blocklist.len(), 2);
        assert_eq!(catalogue.account_heuristic.len(), 1);
        assert_eq!(catalogue.len(), 3);
    }

    #[test]
    fn valid_regex_pattern_is_compiled() {
        let mut p = pattern(PatternKind::InstructionRegex);
        p.pattern = Some("dead".to_string());
        let catalogue = PatternCatalogue::from_patterns(1, vec![p]);
        assert_eq!(catalogue.instruction_regex.len(), 1);
        assert!(catalogue.instruction_regex[0].regex.is_match("deadbeef"));
    }

    #[test]
    fn invalid_regex_pattern_is_dropped_not_fatal() {
        let mut p = pattern(PatternKind::InstructionRegex);
        p.pattern = Some("(unclosed".to_string());
        let catalogue = PatternCatalogue::from_patterns(1, vec![p]);
        assert!(catalogue.instruction_regex.is_empty());
        assert_eq!(catalogue.len(), 0);
    }

    #[test]
    fn behavioral_rule_pattern_carries_constraint_map() {
        let mut p = pattern(PatternKind::BehavioralRule);
        let mut rules = HashMap::new();
        rules.insert("instruction_count".to_string(), crate::types::Constraint::Min { min: 5.0 });
        p.behavioral_rules = Some(rules);
        let catalogue = PatternCatalogue::from_patterns(1, vec![p]);
        assert_eq!(catalogue.behavioral_rule.len(), 1);
        assert!(catalogue.behavioral_rule[0].behavioral_rules.is_some());
    }
}
