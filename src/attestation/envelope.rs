use crate::attestation::errors::DecodeError;
use coset::{CborSerializable, CoseSign1, TaggedCborSerializable};

#[derive(Debug, Clone)]
/// Decoded COSE_Sign1 container: protected headers, unprotected headers,
/// payload, signature. The header contents are not interpreted here; the
/// structure is retained so the signature verifier can reconstruct the
/// exact signed byte sequence.
pub struct RawEnvelope {
    sign1: CoseSign1,
}

/// Parses raw document bytes as a COSE_Sign1 structure, accepting both the
/// tagged and untagged encodings.
///
/// The top-level value must be an array of exactly four elements (protected
/// byte string, unprotected map, payload byte string, signature byte
/// string); anything else fails with [`DecodeError::MalformedEnvelope`].
pub fn decode_envelope(bytes: &[u8]) -> Result<RawEnvelope, DecodeError> {
    let sign1 = CoseSign1::from_tagged_slice(bytes)
        .or_else(|_| CoseSign1::from_slice(bytes))
        .map_err(|e| DecodeError::MalformedEnvelope(format!("parse COSE_Sign1: {e:?}")))?;

    match sign1.payload.as_deref() {
        None => {
            return Err(DecodeError::MalformedEnvelope(
                "payload is nil (detached payloads are not attestation documents)".into(),
            ))
        }
        Some([]) => {
            return Err(DecodeError::MalformedEnvelope("payload is empty".into()));
        }
        Some(_) => {}
    }
    if sign1.signature.is_empty() {
        return Err(DecodeError::MalformedEnvelope("signature is empty".into()));
    }

    Ok(RawEnvelope { sign1 })
}

impl RawEnvelope {
    /// Serialized protected header bytes exactly as they appeared on the wire.
    pub fn protected(&self) -> &[u8] {
        self.sign1
            .protected
            .original_data
            .as_deref()
            .unwrap_or_default()
    }

    /// Payload byte string; non-empty by construction.
    pub fn payload(&self) -> &[u8] {
        self.sign1.payload.as_deref().unwrap_or_default()
    }

    pub fn signature(&self) -> &[u8] {
        &self.sign1.signature
    }

    pub fn unprotected(&self) -> &coset::Header {
        &self.sign1.unprotected
    }

    pub(crate) fn declared_algorithm(&self) -> Option<&coset::Algorithm> {
        self.sign1.protected.header.alg.as_ref()
    }

    /// Runs `verify` over the canonical `Signature1` structure (context
    /// string, protected headers, payload) this envelope was signed over.
    pub(crate) fn verify_with<F>(&self, verify: F) -> bool
    where
        F: Fn(&[u8]) -> bool,
    {
        self.sign1
            .verify_signature(&[], |_sig, data| if verify(data) { Ok(()) } else { Err(()) })
            .is_ok()
    }
}
