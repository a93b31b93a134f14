use serde::{Deserialize, Serialize};

use crate::types::{ParsedInstruction, ParsedTransaction};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireInstruction {
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// The JSON shape a transaction blob decodes to. Deliberately minimal —
/// only the fields the downstream analyzers actually read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTransaction {
    pub instructions: Vec<WireInstruction>,
    #[serde(default = "default_signatures_required")]
    pub signatures_required: u32,
}

fn default_signatures_required() -> u32 {
    1
}

impl WireTransaction {
    pub fn into_parsed(self, wallet_address: &str, raw_size_bytes: usize) -> ParsedTransaction {
        let mut programs: Vec<String> = self
            .instructions
            .iter()
            .map(|i| i.program_id.clone())
            .collect();
        programs.sort();
        programs.dedup();

        let mut accounts: Vec<String> = self
            .instructions
            .iter()
            .flat_map(|i| i.accounts.clone())
            .collect();
        accounts.sort();
        accounts.dedup();

        let instructions = self
            .instructions
            .into_iter()
            .map(|i| ParsedInstruction {
                program_id: i.program_id,
                accounts: i.accounts,
                data: i.data,
            })
            .collect();

        ParsedTransaction {
            fingerprint: String::new(),
            wallet_address: wallet_address.to_string(),
            programs,
            instructions,
            accounts,
            signatures_required: self.signatures_required,
            raw_size_bytes,
        }
    }
}
