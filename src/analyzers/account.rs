//! Account/authority analyzer: looks for unlimited-approval grants and
//! authority-change instructions, the two most common wallet-draining
//! precursors.

use crate::types::{AccountAnalysis, ParsedTransaction};

/// Instruction data tag marking a token-approval instruction.
const APPROVAL_TAG: u8 = 0xA0;
/// Instruction data tag marking an authority-change instruction (e.g.
/// `SetAuthority`).
const AUTHORITY_CHANGE_TAG: u8 = 0xAC;

pub struct AccountAnalyzer;

impl AccountAnalyzer {
    pub fn new() -> Self {
        AccountAnalyzer
    }

    pub fn analyze(&self, tx: &ParsedTransaction) -> AccountAnalysis {
        let mut details = Vec::new();
        let mut red_flags = Vec::new();
        let mut unlimited_approval = false;
        let mut authority_change = false;

        for instruction in &tx.instructions {
            match instruction.data.first() {
                Some(&APPROVAL_TAG) => {
                    if is_unlimited_amount(&instruction.data[1..]) {
                        unlimited_approval = true;
                        red_flags.push(format!("unlimited_approval:{}", instruction.program_id));
                        details.push(format!(
                            "instruction to program {} grants an unlimited token approval",
                            instruction.program_id
                        ));
                    }
                }
                Some(&AUTHORITY_CHANGE_TAG) => {
                    authority_change = true;
                    red_flags.push(format!("authority_change:{}", instruction.program_id));
                    details.push(format!(
                        "instruction to program {} changes account authority",
                        instruction.program_id
                    ));
                }
                _ => {}
            }
        }

        let wallet_in_scope = tx.accounts.iter().any(|a| a == &tx.wallet_address);

        // No persistent account history is available to this analyzer, so
        // "new" is approximated as every account in scope other than the
        // caller's own wallet.
        let new_accounts = tx.accounts.iter().filter(|a| *a != &tx.wallet_address).count();

        AccountAnalysis {
            unlimited_approval_detected: unlimited_approval,
            authority_change_detected: authority_change,
            user_at_risk: wallet_in_scope && (unlimited_approval || authority_change),
            red_flags,
            total_accounts: tx.accounts.len(),
            new_accounts,
            details,
        }
    }
}

impl Default for AccountAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// An approval amount is treated as "unlimited" when its encoded u64 is
/// `u64::MAX`, the conventional sentinel for an unbounded allowance.
fn is_unlimited_amount(amount_bytes: &[u8]) -> bool {
    if amount_bytes.len() < 8 {
        return false;
    }
    amount_bytes[..8].iter().all(|&b| b == 0xFF)
}
