//! Deterministic transaction fingerprinting, used as the cache key and
//! pattern-match dedupe key throughout the pipeline.

use crate::types::ParsedTransaction;

/// Hex-encoded blake3 digest over the transaction's programs, instructions,
/// and accounts — the same content-hash approach this workspace's block
/// hashing uses, just over transaction fields instead of a block body.
pub fn fingerprint(tx: &ParsedTransaction) -> String {
    let mut buf = Vec::new();
    buf.extend_from_slice(tx.wallet_address.as_bytes());
    for program in &tx.programs {
        buf.extend_from_slice(program.as_bytes());
    }
    for instruction in &tx.instructions {
        buf.extend_from_slice(instruction.program_id.as_bytes());
        for account in &instruction.accounts {
            buf.extend_from_slice(account.as_bytes());
        }
        buf.extend_from_slice(&instruction.data);
    }
    for account in &tx.accounts {
        buf.extend_from_slice(account.as_bytes());
    }
    blake3::hash(&buf).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParsedInstruction;

    fn sample_tx() -> ParsedTransaction {
        ParsedTransaction {
            fingerprint: String::new(),
            wallet_address: "wallet1".to_string(),
            programs: vec!["11111111111111111111111111111111".to_string()],
            instructions: vec![ParsedInstruction {
                program_id: "11111111111111111111111111111111".to_string(),
                accounts: vec!["acct1".to_string()],
                data: vec![1, 2, 3],
            }],
            accounts: vec!["acct1".to_string()],
            signatures_required: 1,
            raw_size_bytes: 64,
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let tx = sample_tx();
        assert_eq!(fingerprint(&tx), fingerprint(&tx));
    }

    #[test]
    fn different_transactions_fingerprint_differently() {
        let tx_a = sample_tx();
        let mut tx_b = sample_tx();
        tx_b.wallet_address = "wallet2".to_string();
        assert_ne!(fingerprint(&tx_a), fingerprint(&tx_b));
    }
}
