use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Failures while decoding the envelope or the attestation payload.
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("payload is not an attestation document")]
    NotAttestationFormat,
    #[error("required field missing: {0}")]
    MissingField(&'static str),
    #[error("invalid PCR map: {0}")]
    InvalidPcr(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Violations found while validating the certificate chain of issuance.
pub enum ChainError {
    #[error("certificate unparseable: {0}")]
    Malformed(String),
    #[error("{role} certificate signature was not produced by its issuer")]
    SignatureMismatch { role: &'static str },
    #[error("{role} certificate expired (not_after={not_after}, at={at})")]
    Expired {
        role: &'static str,
        not_after: i64,
        at: i64,
    },
    #[error("{role} certificate not yet valid (not_before={not_before}, at={at})")]
    NotYetValid {
        role: &'static str,
        not_before: i64,
        at: i64,
    },
    #[error("issuer of {role} certificate is not a certificate authority: {reason}")]
    NotACertificateAuthority { role: &'static str, reason: String },
    #[error("leaf certificate is marked as a certificate authority")]
    LeafIsCertificateAuthority,
    #[error("{role} certificate names an issuer that does not follow it in the chain")]
    IssuerMismatch { role: &'static str },
    #[error("certificate chain does not terminate at the pinned trust anchor")]
    ChainDoesNotTerminateAtAnchor,
    #[error("certificate chain depth {depth} exceeds maximum {max}")]
    TooDeep { depth: usize, max: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Failures while verifying the envelope signature.
pub enum SignatureError {
    #[error("protected headers declare no signing algorithm")]
    MissingAlgorithm,
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("declared algorithm {declared} does not match leaf key curve {key}")]
    AlgorithmMismatch {
        declared: &'static str,
        key: &'static str,
    },
    #[error("leaf public key is not a supported elliptic-curve key")]
    UnsupportedKeyType,
    #[error("leaf certificate unparseable: {0}")]
    LeafUnparseable(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}
