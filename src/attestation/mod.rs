pub mod config;
pub mod errors;
pub mod types;
pub mod verifier;

mod certs;
mod envelope;
mod freshness;
mod payload;
mod pcr;
mod sig;
mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use certs::{validate_chain, ChainSummary, TrustAnchor};
pub use config::{PcrPolicy, VerifierConfig};
pub use envelope::{decode_envelope, RawEnvelope};
pub use errors::{ChainError, DecodeError, SignatureError};
pub use freshness::check_freshness;
pub use payload::decode_payload;
pub use pcr::compare_pcrs;
pub use sig::{leaf_public_key, verify_signature, LeafKey};
pub use types::{
    AttestationRecord, AttestationSummary, DigestAlgorithm, Finding, FindingCode, Severity,
    Verdict, VerificationResult,
};
pub use util::now_millis;
pub use verifier::Verifier;
