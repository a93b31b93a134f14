//! End-to-end scan pipeline scenarios, exercised through the public
//! `GuardianScanService` API exactly as a gateway caller would.

use base64::Engine;
use guardian_scan_core::config::ScanConfig;
use guardian_scan_core::demo_service;
use guardian_scan_core::types::{ExploitPattern, PatternKind, Priority, RiskLevel, ScanRequest, ScanType, Severity};

fn encode(json: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(json)
}

fn system_transfer_blob() -> String {
    encode(
        r#"{
            "instructions": [
                {"program_id": "11111111111111111111111111111111", "accounts": ["wallet1", "wallet2"], "data": [0, 1, 2, 3]}
            ],
            "signatures_required": 1
        }"#,
    )
}

fn drainer_blob() -> String {
    encode(
        r#"{
            "instructions": [
                {"program_id": "drainer_program", "accounts": ["wallet1"], "data": []}
            ],
            "signatures_required": 1
        }"#,
    )
}

fn unlimited_approval_blob() -> String {
    let mut data = vec![0xA0u8];
    data.extend(std::iter::repeat(0xFFu8).take(8));
    let data_json = serde_json::to_string(&data).unwrap();
    encode(&format!(
        r#"{{
            "instructions": [
                {{"program_id": "token_program", "accounts": ["wallet1", "spender"], "data": {data_json}}}
            ],
            "signatures_required": 1
        }}"#
    ))
}

fn drainer_pattern() -> ExploitPattern {
    ExploitPattern {
        id: "bl1".to_string(),
        name: "known drainer contract".to_string(),
        kind: PatternKind::ProgramBlocklist,
        severity: Severity::Critical,
        base_confidence: 0.95,
        pattern: None,
        program_ids: vec!["drainer_program".to_string()],
        behavioral_rules: None,
        description: "known drainer contract".to_string(),
        match_count: 0,
        false_positive_count: 0,
    }
}

#[tokio::test]
async fn safe_system_transfer_is_scored_safe() {
    let service = demo_service(ScanConfig::default(), vec![]);
    let result = service
        .submit(ScanRequest {
            transaction_blob: system_transfer_blob(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await
        .unwrap();

    assert_eq!(result.risk_level, RiskLevel::Safe);
    assert!(!result.degraded);
    assert!(result.pattern_matches.is_empty());
}

#[tokio::test]
async fn blocklisted_drainer_program_is_flagged_critical() {
    let service = demo_service(ScanConfig::default(), vec![drainer_pattern()]);
    let result = service
        .submit(ScanRequest {
            transaction_blob: drainer_blob(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: Some(Priority::Critical),
        })
        .await
        .unwrap();

    assert_eq!(result.risk_level, RiskLevel::Danger);
    assert_eq!(result.risk_score, 100.0);
    assert_eq!(result.pattern_matches.len(), 1);
    assert!(result.explanation.contains("malicious"));
}

#[tokio::test]
async fn unlimited_token_approval_raises_account_risk() {
    let service = demo_service(ScanConfig::default(), vec![]);
    let result = service
        .submit(ScanRequest {
            transaction_blob: unlimited_approval_blob(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await
        .unwrap();

    let account_analysis = result.account_analysis.expect("account analyzer should have completed");
    assert!(account_analysis.unlimited_approval_detected);
    assert!(account_analysis.user_at_risk);
    assert!(!account_analysis.red_flags.is_empty());
    assert!(result.risk_score > 0.0);
}

#[tokio::test]
async fn repeated_scan_of_same_transaction_is_consistent() {
    let service = demo_service(ScanConfig::default(), vec![drainer_pattern()]);
    let request = || ScanRequest {
        transaction_blob: drainer_blob(),
        wallet_address: "wallet1".to_string(),
        scan_type: ScanType::Quick,
        priority: None,
    };

    let first = service.submit(request()).await.unwrap();
    let second = service.submit(request()).await.unwrap();

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.risk_level, second.risk_level);
}

#[tokio::test]
async fn cached_scan_result_is_markedly_faster_than_the_first() {
    let service = demo_service(ScanConfig::default(), vec![drainer_pattern()]);
    let request = || ScanRequest {
        transaction_blob: drainer_blob(),
        wallet_address: "wallet1".to_string(),
        scan_type: ScanType::Quick,
        priority: None,
    };

    let t0 = std::time::Instant::now();
    service.submit(request()).await.unwrap();
    let first_elapsed = t0.elapsed();

    let t1 = std::time::Instant::now();
    service.submit(request()).await.unwrap();
    let second_elapsed = t1.elapsed();

    assert!(
        second_elapsed <= first_elapsed / 2,
        "expected cache hit ({:?}) to take at most half as long as the first scan ({:?})",
        second_elapsed,
        first_elapsed
    );
}

#[tokio::test]
async fn empty_transaction_scores_as_safe_instead_of_erroring() {
    let service = demo_service(ScanConfig::default(), vec![]);
    let blob = encode(r#"{"instructions": [], "signatures_required": 1}"#);
    let result = service
        .submit(ScanRequest {
            transaction_blob: blob,
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await
        .unwrap();

    assert_eq!(result.risk_level, RiskLevel::Safe);
    assert!(!result.degraded);
    assert!(result.pattern_matches.is_empty());
}

#[tokio::test]
async fn malformed_blob_is_rejected_with_parse_error() {
    let service = demo_service(ScanConfig::default(), vec![]);
    let result = service
        .submit(ScanRequest {
            transaction_blob: "not valid json at all".to_string(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn pattern_reload_takes_effect_on_next_scan() {
    let service = demo_service(ScanConfig::default(), vec![]);

    let before = service
        .submit(ScanRequest {
            transaction_blob: drainer_blob(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await
        .unwrap();
    assert_eq!(before.risk_level, RiskLevel::Safe);

    service.reload_patterns(vec![drainer_pattern()]);

    let after = service
        .submit(ScanRequest {
            transaction_blob: drainer_blob(),
            wallet_address: "wallet1".to_string(),
            scan_type: ScanType::Quick,
            priority: None,
        })
        .await
        .unwrap();
    assert_eq!(after.risk_level, RiskLevel::Danger);
}
