use crate::attestation::config::PcrPolicy;
use crate::attestation::types::{Finding, FindingCode};
use std::collections::BTreeMap;

/// Compares measured PCR values against the caller's expected baseline.
///
/// Every index the baseline names must be present and byte-equal. What
/// happens to measured indices outside the baseline depends on `policy`.
/// An empty baseline produces no failures: comparison is opt-in.
pub fn compare_pcrs(
    actual: &BTreeMap<u8, Vec<u8>>,
    expected: &BTreeMap<u8, Vec<u8>>,
    policy: PcrPolicy,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if expected.is_empty() {
        findings.push(Finding::pass(
            FindingCode::PcrMatch,
            "no PCR baseline supplied; measurement comparison skipped",
        ));
        return findings;
    }

    for (index, want) in expected {
        match actual.get(index) {
            None => findings.push(Finding::fail(
                FindingCode::MissingMeasurement,
                format!("PCR{index} required by baseline but absent from document"),
            )),
            Some(got) if got == want => findings.push(Finding::pass(
                FindingCode::PcrMatch,
                format!("PCR{index} matches baseline"),
            )),
            Some(got) => findings.push(Finding::fail(
                FindingCode::PcrMismatch,
                format!(
                    "PCR{index} mismatch: expected {}, got {}",
                    hex::encode(want),
                    hex::encode(got)
                ),
            )),
        }
    }

    let unexpected: Vec<u8> = actual
        .keys()
        .filter(|index| !expected.contains_key(index))
        .copied()
        .collect();
    match policy {
        PcrPolicy::Subset => {
            if !unexpected.is_empty() {
                findings.push(Finding::pass(
                    FindingCode::PcrMatch,
                    format!(
                        "{} measured PCR(s) outside baseline ignored by policy",
                        unexpected.len()
                    ),
                ));
            }
        }
        PcrPolicy::Exact => {
            for index in unexpected {
                findings.push(Finding::fail(
                    FindingCode::UnexpectedMeasurement,
                    format!("PCR{index} measured but absent from baseline"),
                ));
            }
        }
    }

    findings
}
