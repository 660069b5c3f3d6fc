use crate::attestation::types::{AttestationRecord, Finding, FindingCode};
use crate::attestation::util::constant_time_eq;
use std::time::Duration;

/// Checks replay protection: the document nonce against the caller's
/// requested nonce (when one was requested) and the document timestamp
/// against the allowed drift window around the caller's reference time.
pub fn check_freshness(
    record: &AttestationRecord,
    requested_nonce: Option<&[u8]>,
    now_ms: u64,
    max_skew: Duration,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(want) = requested_nonce {
        match record.nonce.as_deref() {
            Some(got) if constant_time_eq(got, want) => findings.push(Finding::pass(
                FindingCode::NonceMatch,
                "document nonce matches requested nonce",
            )),
            Some(_) => findings.push(Finding::fail(
                FindingCode::NonceMismatch,
                "document nonce does not match requested nonce",
            )),
            None => findings.push(Finding::fail(
                FindingCode::NonceMismatch,
                "nonce was requested but the document carries none",
            )),
        }
    }

    let skew_ms = max_skew.as_millis() as u64;
    let drift = now_ms.abs_diff(record.timestamp_ms);
    if drift <= skew_ms {
        findings.push(Finding::pass(
            FindingCode::TimestampFresh,
            format!(
                "timestamp within {}s of reference time",
                max_skew.as_secs()
            ),
        ));
    } else {
        findings.push(Finding::fail(
            FindingCode::StaleOrFutureTimestamp,
            format!(
                "timestamp {} outside the {}s window around reference time {}",
                record.timestamp_ms,
                max_skew.as_secs(),
                now_ms
            ),
        ));
    }

    findings
}
