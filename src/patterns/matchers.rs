use std::collections::HashMap;

use crate::types::{ExploitPattern, ParsedTransaction, PatternMatch};

use super::catalogue::PatternCatalogue;

/// Instruction data tags marking token-transfer and authority-change
/// instructions. `APPROVAL_TAG`/`AUTHORITY_CHANGE_TAG` are mirrored from
/// `crate::analyzers::account` so heuristics here agree with the account
/// analyzer on what those instructions mean; `TRANSFER_TAG` is this
/// module's own marker for a plain token transfer.
const TRANSFER_TAG: u8 = 0xA1;
const AUTHORITY_CHANGE_TAG: u8 = 0xAC;

fn to_match(pattern: &ExploitPattern) -> PatternMatch {
    PatternMatch {
        pattern_id: pattern.id.clone(),
        name: pattern.name.clone(),
        severity: pattern.severity,
        confidence: pattern.effective_confidence(),
        description: pattern.description.clone(),
    }
}

/// Coarse, numeric shape of a transaction, computed once per scan and
/// matched by name against each pattern's `behavioral_rules` map. Unknown
/// metric names never match anything — an author typo in a catalogue
/// entry fails closed rather than silently matching every transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionMetrics {
    pub program_count: f64,
    pub instruction_count: f64,
    pub account_count: f64,
    pub unique_programs: f64,
    pub avg_instruction_size: f64,
    pub has_token_transfers: f64,
    pub has_authority_changes: f64,
    pub complexity_score: f64,
}

impl TransactionMetrics {
    pub fn extract(tx: &ParsedTransaction) -> Self {
        let instruction_count = tx.instructions.len();
        let account_count = tx.accounts.len();
        let data_lens: Vec<f64> = tx.instructions.iter().map(|i| i.data.len() as f64).collect();
        let avg_instruction_size = if data_lens.is_empty() {
            0.0
        } else {
            data_lens.iter().sum::<f64>() / data_lens.len() as f64
        };

        let has_token_transfers = tx.instructions.iter().any(|i| i.data.first() == Some(&TRANSFER_TAG));
        let has_authority_changes = tx
            .instructions
            .iter()
            .any(|i| i.data.first() == Some(&AUTHORITY_CHANGE_TAG));

        TransactionMetrics {
            program_count: tx.programs.len() as f64,
            instruction_count: instruction_count as f64,
            account_count: account_count as f64,
            unique_programs: tx.programs.len() as f64,
            avg_instruction_size,
            has_token_transfers: bool_metric(has_token_transfers),
            has_authority_changes: bool_metric(has_authority_changes),
            complexity_score: (tx.programs.len() * instruction_count) as f64 / account_count.max(1) as f64,
        }
    }

    /// Looks up a metric by the name a catalogue entry's `behavioral_rules`
    /// map declares. Returns `None` for any name this transaction shape
    /// doesn't expose, which `matches_rules` treats as a non-match.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "program_count" => Some(self.program_count),
            "instruction_count" => Some(self.instruction_count),
            "account_count" => Some(self.account_count),
            "unique_programs" => Some(self.unique_programs),
            "avg_instruction_size" => Some(self.avg_instruction_size),
            "has_token_transfers" => Some(self.has_token_transfers),
            "has_authority_changes" => Some(self.has_authority_changes),
            "complexity_score" => Some(self.complexity_score),
            _ => None,
        }
    }
}

fn bool_metric(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// A pattern matches iff every constraint in its `behavioral_rules` map
/// evaluates true against these metrics. A pattern with no rules declared
/// never matches — it isn't a behavioral entry in any useful sense.
fn matches_rules(rules: &Option<HashMap<String, crate::types::Constraint>>, metrics: &TransactionMetrics) -> bool {
    let Some(rules) = rules else { return false };
    if rules.is_empty() {
        return false;
    }
    rules.iter().all(|(metric_name, constraint)| {
        metrics
            .get(metric_name)
            .map(|value| constraint.evaluate(value))
            .unwrap_or(false)
    })
}

/// Matches each instruction's data, hex-encoded, against precompiled
/// regexes. Invalid regex sources never reach here — `PatternCatalogue`
/// drops them individually at load time.
pub fn match_instruction_regex(tx: &ParsedTransaction, catalogue: &PatternCatalogue) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    for entry in &catalogue.instruction_regex {
        for instruction in &tx.instructions {
            let hex_data = hex::encode(&instruction.data);
            if entry.regex.is_match(&hex_data) {
                matches.push(to_match(&entry.pattern));
                break;
            }
        }
    }
    matches
}

/// Flags any transaction that touches a blocklisted program id.
pub fn match_program_blocklist(tx: &ParsedTransaction, catalogue: &PatternCatalogue) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    for pattern in &catalogue.program_blocklist {
        if pattern
            .program_ids
            .iter()
            .any(|blocked| tx.programs.contains(blocked))
        {
            matches.push(to_match(pattern));
        }
    }
    matches
}

/// Account-shape heuristics: each catalogue entry declares a map of
/// metric name to constraint (e.g. `{"account_count": {"min": 20}}`),
/// matched against the transaction's computed `TransactionMetrics`.
pub fn match_account_heuristic(tx: &ParsedTransaction, catalogue: &PatternCatalogue) -> Vec<PatternMatch> {
    let metrics = TransactionMetrics::extract(tx);
    let mut matches = Vec::new();
    for pattern in &catalogue.account_heuristic {
        if matches_rules(&pattern.behavioral_rules, &metrics) {
            matches.push(to_match(pattern));
        }
    }
    matches
}

/// Behavioral rules evaluate over the same `TransactionMetrics` as
/// account heuristics, just bucketed separately so a catalogue author can
/// reason about "shape of this one account" versus "shape of this whole
/// transaction" independently.
pub fn match_behavioral_rule(tx: &ParsedTransaction, catalogue: &PatternCatalogue) -> Vec<PatternMatch> {
    let metrics = TransactionMetrics::extract(tx);
    let mut matches = Vec::new();
    for pattern in &catalogue.behavioral_rule {
        if matches_rules(&pattern.behavioral_rules, &metrics) {
            matches.push(to_match(pattern));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Constraint, ParsedInstruction, PatternKind, Severity};

    fn tx_with_programs(programs: Vec<&str>) -> ParsedTransaction {
        ParsedTransaction {
            fingerprint: String::new(),
            wallet_address: "w".to_string(),
            programs: programs.iter().map(|s| s.to_string()).collect(),
            instructions: programs
                .iter()
                .map(|p| ParsedInstruction {
                    program_id: p.to_string(),
                    accounts: vec!["a".to_string()],
                    data: vec![0xde, 0xad],
                })
                .collect(),
            accounts: vec!["a".to_string()],
            signatures_required: 1,
            raw_size_bytes: 16,
        }
    }

    #[test]
    fn blocklist_matches_known_drainer_program() {
        let pattern = ExploitPattern {
            id: "bl1".to_string(),
            name: "known drainer".to_string(),
            kind: PatternKind::ProgramBlocklist,
            severity: Severity::Critical,
            base_confidence: 0.95,
            pattern: None,
            program_ids: vec!["drainer_program".to_string()],
            behavioral_rules: None,
            description: "known drainer contract".to_string(),
            match_count: 0,
            false_positive_count: 0,
        };
        let catalogue = PatternCatalogue::from_patterns(1, vec![pattern]);
        let tx = tx_with_programs(vec!["drainer_program"]);
        let matches = match_program_blocklist(&tx, &catalogue);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn instruction_regex_matches_hex_encoded_data() {
        let pattern = ExploitPattern {
            id: "ir1".to_string(),
            name: "deadbeef marker".to_string(),
            kind: PatternKind::InstructionRegex,
            severity: Severity::Medium,
            base_confidence: 0.6,
            pattern: Some("dead".to_string()),
            program_ids: vec![],
            behavioral_rules: None,
            description: "deadbeef marker".to_string(),
            match_count: 0,
            false_positive_count: 0,
        };
        let catalogue = PatternCatalogue::from_patterns(1, vec![pattern]);
        let tx = tx_with_programs(vec!["prog1"]);
        let matches = match_instruction_regex(&tx, &catalogue);
        assert_eq!(matches.len(), 1);
    }

    fn behavioral_pattern(rules: HashMap<String, Constraint>) -> ExploitPattern {
        ExploitPattern {
            id: "br1".to_string(),
            name: "many instructions across many programs".to_string(),
            kind: PatternKind::BehavioralRule,
            severity: Severity::High,
            base_confidence: 0.7,
            pattern: None,
            program_ids: vec![],
            behavioral_rules: Some(rules),
            description: "wide fan-out transaction".to_string(),
            match_count: 0,
            false_positive_count: 0,
        }
    }

    #[test]
    fn behavioral_rule_matches_when_all_constraints_hold() {
        let mut rules = HashMap::new();
        rules.insert("instruction_count".to_string(), Constraint::Min { min: 2.0 });
        rules.insert("program_count".to_string(), Constraint::Min { min: 2.0 });
        let catalogue = PatternCatalogue::from_patterns(1, vec![behavioral_pattern(rules)]);

        let tx = tx_with_programs(vec!["p1", "p2"]);
        let matches = match_behavioral_rule(&tx, &catalogue);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn behavioral_rule_does_not_match_when_one_constraint_fails() {
        let mut rules = HashMap::new();
        rules.insert("instruction_count".to_string(), Constraint::Min { min: 10.0 });
        rules.insert("program_count".to_string(), Constraint::Min { min: 2.0 });
        let catalogue = PatternCatalogue::from_patterns(1, vec![behavioral_pattern(rules)]);

        let tx = tx_with_programs(vec!["p1", "p2"]);
        let matches = match_behavioral_rule(&tx, &catalogue);
        assert!(matches.is_empty());
    }

    #[test]
    fn unknown_metric_name_never_matches() {
        let mut rules = HashMap::new();
        rules.insert("nonexistent_metric".to_string(), Constraint::Min { min: 0.0 });
        let catalogue = PatternCatalogue::from_patterns(1, vec![behavioral_pattern(rules)]);

        let tx = tx_with_programs(vec!["p1"]);
        let matches = match_behavioral_rule(&tx, &catalogue);
        assert!(matches.is_empty());
    }

    #[test]
    fn account_heuristic_matches_on_account_count() {
        let mut rules = HashMap::new();
        rules.insert("account_count".to_string(), Constraint::Min { min: 1.0 });
        let mut pattern = behavioral_pattern(rules);
        pattern.kind = PatternKind::AccountHeuristic;
        let catalogue = PatternCatalogue::from_patterns(1, vec![pattern]);

        let tx = tx_with_programs(vec!["p1"]);
        let matches = match_account_heuristic(&tx, &catalogue);
        assert_eq!(matches.len(), 1);
    }
}
