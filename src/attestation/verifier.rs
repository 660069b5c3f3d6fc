use super::certs::{validate_chain, TrustAnchor};
use super::config::VerifierConfig;
use super::envelope::decode_envelope;
use super::freshness::check_freshness;
use super::payload::decode_payload;
use super::pcr::compare_pcrs;
use super::sig::{leaf_public_key, verify_signature};
use super::types::{
    AttestationSummary, Finding, FindingCode, Severity, Verdict, VerificationResult,
};

/// Attestation verifier bound to a pinned trust anchor.
///
/// Owns no mutable state; a single instance can serve concurrent
/// verification calls.
pub struct Verifier {
    anchor: TrustAnchor,
    cfg: VerifierConfig,
}

impl Verifier {
    /// Constructs a verifier, failing fast on caller-input errors before any
    /// document is processed.
    pub fn new(anchor: TrustAnchor, cfg: VerifierConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(cfg.max_chain_depth >= 1, "max_chain_depth must be at least 1");
        for (index, value) in &cfg.expected_pcrs {
            anyhow::ensure!(*index <= 31, "expected PCR index {index} outside 0..=31");
            anyhow::ensure!(
                matches!(value.len(), 32 | 48 | 64),
                "expected PCR{index} value has implausible length {}",
                value.len()
            );
        }
        Ok(Self { anchor, cfg })
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Verifies a raw attestation document against the pinned anchor and the
    /// configured policy.
    ///
    /// `now_ms` is the caller's reference time; identical inputs and
    /// reference time produce identical results. Decode failures yield an
    /// `Invalid` verdict with `is_real_attestation = false`; once the
    /// payload decodes, chain validation, signature verification,
    /// measurement comparison and freshness all run and their findings are
    /// aggregated. The verdict is `Valid` iff no check failed; warnings
    /// never gate.
    pub fn verify(
        &self,
        document: &[u8],
        requested_nonce: Option<&[u8]>,
        now_ms: u64,
    ) -> VerificationResult {
        let mut findings = Vec::new();

        let envelope = match decode_envelope(document) {
            Ok(envelope) => {
                findings.push(Finding::pass(
                    FindingCode::EnvelopeDecode,
                    "COSE_Sign1 envelope decoded",
                ));
                envelope
            }
            Err(err) => {
                return VerificationResult::rejected(vec![Finding::fail(
                    FindingCode::EnvelopeDecode,
                    err.to_string(),
                )]);
            }
        };

        let record = match decode_payload(envelope.payload()) {
            Ok(record) => {
                findings.push(Finding::pass(
                    FindingCode::PayloadDecode,
                    format!("attestation payload decoded (module {})", record.module_id),
                ));
                record
            }
            Err(err) => {
                findings.push(Finding::fail(FindingCode::PayloadDecode, err.to_string()));
                return VerificationResult {
                    verdict: Verdict::Invalid,
                    is_real_attestation: false,
                    findings,
                    summary: AttestationSummary::default(),
                };
            }
        };

        let mut summary = AttestationSummary::from_record(&record);

        match validate_chain(
            &record.certificate,
            &record.cabundle,
            &self.anchor,
            now_ms,
            self.cfg.max_chain_depth,
        ) {
            Ok(chain) => {
                findings.push(Finding::pass(
                    FindingCode::CertificateChain,
                    format!(
                        "chain of {} certificate(s) terminates at pinned root ({})",
                        chain.depth, chain.root_subject
                    ),
                ));
                summary.leaf_fingerprint_sha256 = Some(chain.leaf_fingerprint);
                summary.root_fingerprint_sha256 = Some(chain.root_fingerprint);
                summary.root_subject = Some(chain.root_subject);
            }
            Err(err) => {
                findings.push(Finding::fail(FindingCode::CertificateChain, err.to_string()));
            }
        }

        match leaf_public_key(&record.certificate)
            .and_then(|key| verify_signature(&envelope, &key))
        {
            Ok(true) => findings.push(Finding::pass(
                FindingCode::CoseSignature,
                "envelope signature verified against leaf certificate key",
            )),
            Ok(false) => findings.push(Finding::fail(
                FindingCode::CoseSignature,
                "envelope signature does not verify against leaf certificate key",
            )),
            Err(err) => findings.push(Finding::fail(FindingCode::CoseSignature, err.to_string())),
        }

        findings.extend(compare_pcrs(
            &record.pcrs,
            &self.cfg.expected_pcrs,
            self.cfg.pcr_policy,
        ));
        findings.extend(check_freshness(
            &record,
            requested_nonce,
            now_ms,
            self.cfg.max_skew,
        ));

        let verdict = if findings.iter().any(|f| f.severity == Severity::Fail) {
            Verdict::Invalid
        } else {
            Verdict::Valid
        };

        VerificationResult {
            verdict,
            is_real_attestation: true,
            findings,
            summary,
        }
    }
}
