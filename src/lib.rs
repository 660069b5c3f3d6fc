//! Verification engine for AWS Nitro-style enclave attestation documents.
//!
//! The [`attestation`] module decodes a COSE_Sign1 attestation envelope,
//! validates the embedded certificate chain against a pinned trust anchor,
//! verifies the envelope signature, and checks PCR measurements and
//! freshness policy. Verification is a pure function of its inputs; the
//! only long-lived state is the immutable trust anchor.

pub mod attestation;
