//! Command-line demo: reads a transaction JSON file, base64-encodes it,
//! and runs it through the scan pipeline with in-memory collaborators.

use std::env;
use std::fs;
use std::process::ExitCode;

use base64::Engine;
use guardian_scan_core::config::ScanConfig;
use guardian_scan_core::types::ScanRequest;
use guardian_scan_core::demo_service;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: guardian-cli <wallet_address> <transaction.json>");
        return ExitCode::FAILURE;
    }

    let wallet_address = &args[1];
    let path = &args[2];

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let blob = base64::engine::general_purpose::STANDARD.encode(&raw);
    let service = demo_service(ScanConfig::default(), vec![]);

    let result = service
        .submit(ScanRequest {
            transaction_blob: blob,
            wallet_address: wallet_address.clone(),
            scan_type: guardian_scan_core::types::ScanType::Quick,
            priority: None,
        })
        .await;

    match result {
        Ok(scan) => {
            println!("{}", serde_json::to_string_pretty(&scan).unwrap());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("scan failed: {err}");
            ExitCode::FAILURE
        }
    }
}
