//! Scan event emission: a fire-and-forget notification published after
//! every completed scan, for downstream consumers (alerting, analytics)
//! that don't sit in the scan's own latency budget.

use async_trait::async_trait;

use crate::types::ScanEvent;

#[async_trait]
pub trait ScanEventSink: Send + Sync {
    async fn emit(&self, event: ScanEvent);
}

/// Sink that drops every event; the default when no sink is configured.
pub struct NullEventSink;

#[async_trait]
impl ScanEventSink for NullEventSink {
    async fn emit(&self, _event: ScanEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskLevel, ScanType};

    #[tokio::test]
    async fn null_sink_accepts_events_without_error() {
        let sink = NullEventSink;
        sink.emit(ScanEvent {
            scan_id: "s1".to_string(),
            fingerprint: "fp1".to_string(),
            wallet_address: "w".to_string(),
            risk_level: RiskLevel::Safe,
            risk_score: 0.0,
            confidence: 0.9,
            scan_time_ms: 5,
            program_count: 1,
            instruction_count: 1,
            pattern_matches_count: 0,
            scan_type: ScanType::Quick,
            timestamp_epoch_ms: 0,
        })
        .await;
    }
}
