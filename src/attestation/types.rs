use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Digest algorithm declared by the attestation document for its PCR bank.
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Output size in bytes; every PCR value must have exactly this length.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SHA256" => Some(DigestAlgorithm::Sha256),
            "SHA384" => Some(DigestAlgorithm::Sha384),
            "SHA512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded attestation payload fields.
pub struct AttestationRecord {
    pub module_id: String,
    /// Milliseconds since the Unix epoch, as emitted by the enclave.
    pub timestamp_ms: u64,
    pub digest: DigestAlgorithm,
    /// PCR values keyed by register index (0..=31), unique by construction.
    pub pcrs: BTreeMap<u8, Vec<u8>>,
    /// Attestation signing certificate (leaf, DER).
    pub certificate: Vec<u8>,
    /// Intermediates in leaf-to-root order; may be empty when the leaf is
    /// issued directly by the trust anchor.
    pub cabundle: Vec<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
    pub user_data: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Pass => "PASS",
            Severity::Warning => "WARN",
            Severity::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Identifies the check a [`Finding`] reports on, so callers can match on
/// cause without parsing message text.
pub enum FindingCode {
    EnvelopeDecode,
    PayloadDecode,
    CertificateChain,
    CoseSignature,
    PcrMatch,
    PcrMismatch,
    MissingMeasurement,
    UnexpectedMeasurement,
    NonceMatch,
    NonceMismatch,
    TimestampFresh,
    StaleOrFutureTimestamp,
}

impl FindingCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingCode::EnvelopeDecode => "envelope-decode",
            FindingCode::PayloadDecode => "payload-decode",
            FindingCode::CertificateChain => "certificate-chain",
            FindingCode::CoseSignature => "cose-signature",
            FindingCode::PcrMatch => "pcr-match",
            FindingCode::PcrMismatch => "pcr-mismatch",
            FindingCode::MissingMeasurement => "missing-measurement",
            FindingCode::UnexpectedMeasurement => "unexpected-measurement",
            FindingCode::NonceMatch => "nonce-match",
            FindingCode::NonceMismatch => "nonce-mismatch",
            FindingCode::TimestampFresh => "timestamp-fresh",
            FindingCode::StaleOrFutureTimestamp => "timestamp-stale",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One check outcome in the verification report.
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
}

impl Finding {
    pub fn pass(code: FindingCode, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Pass,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: FindingCode, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn fail(code: FindingCode, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Fail,
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// Extracted document data returned alongside the verdict for reporting.
pub struct AttestationSummary {
    pub module_id: Option<String>,
    pub timestamp_ms: Option<u64>,
    pub digest: Option<DigestAlgorithm>,
    /// PCR values hex-encoded, keyed by register index.
    pub pcrs_hex: BTreeMap<u8, String>,
    pub leaf_fingerprint_sha256: Option<String>,
    pub root_fingerprint_sha256: Option<String>,
    pub root_subject: Option<String>,
    pub nonce_present: bool,
    pub user_data: Option<Vec<u8>>,
}

impl AttestationSummary {
    pub(crate) fn from_record(record: &AttestationRecord) -> Self {
        AttestationSummary {
            module_id: Some(record.module_id.clone()),
            timestamp_ms: Some(record.timestamp_ms),
            digest: Some(record.digest),
            pcrs_hex: record
                .pcrs
                .iter()
                .map(|(idx, value)| (*idx, hex::encode(value)))
                .collect(),
            leaf_fingerprint_sha256: None,
            root_fingerprint_sha256: None,
            root_subject: None,
            nonce_present: record.nonce.is_some(),
            user_data: record.user_data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Verdict plus the itemized findings of every check performed.
pub struct VerificationResult {
    pub verdict: Verdict,
    /// True only when the input decoded as a genuine attestation document;
    /// development stand-ins and undecodable inputs report false.
    pub is_real_attestation: bool,
    pub findings: Vec<Finding>,
    pub summary: AttestationSummary,
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    /// Result for input rejected before the payload decoded.
    pub(crate) fn rejected(findings: Vec<Finding>) -> Self {
        VerificationResult {
            verdict: Verdict::Invalid,
            is_real_attestation: false,
            findings,
            summary: AttestationSummary::default(),
        }
    }
}
