use crate::attestation::envelope::RawEnvelope;
use crate::attestation::errors::SignatureError;
use ring::signature::{self, UnparsedPublicKey};
use x509_parser::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EcCurve {
    P256,
    P384,
}

impl EcCurve {
    fn name(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
        }
    }
}

#[derive(Debug, Clone)]
/// Leaf certificate public key in the form the envelope verifier needs:
/// the uncompressed SEC1 point plus its curve.
pub struct LeafKey {
    sec1: Vec<u8>,
    curve: EcCurve,
}

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_SECP256R1: &str = "1.2.840.10045.3.1.7";
const OID_SECP384R1: &str = "1.3.132.0.34";

/// Extracts the signing public key from the attestation leaf certificate.
pub fn leaf_public_key(leaf_der: &[u8]) -> Result<LeafKey, SignatureError> {
    let (_, cert) = parse_x509_certificate(leaf_der)
        .map_err(|e| SignatureError::LeafUnparseable(e.to_string()))?;
    let spki = &cert.tbs_certificate.subject_pki;
    if spki.algorithm.algorithm.to_string() != OID_EC_PUBLIC_KEY {
        return Err(SignatureError::UnsupportedKeyType);
    }
    let params = spki
        .algorithm
        .parameters
        .as_ref()
        .ok_or(SignatureError::UnsupportedKeyType)?;
    let curve_oid = params
        .as_oid()
        .map_err(|_| SignatureError::UnsupportedKeyType)?;
    let curve = match curve_oid.to_string().as_str() {
        OID_SECP256R1 => EcCurve::P256,
        OID_SECP384R1 => EcCurve::P384,
        _ => return Err(SignatureError::UnsupportedKeyType),
    };
    Ok(LeafKey {
        sec1: spki.subject_public_key.data.to_vec(),
        curve,
    })
}

/// Verifies the envelope signature over the canonical signing structure.
///
/// The algorithm declared in the protected headers must agree with the leaf
/// key's curve; a cryptographic mismatch returns `Ok(false)` while malformed
/// inputs surface as [`SignatureError`].
pub fn verify_signature(
    envelope: &RawEnvelope,
    leaf_key: &LeafKey,
) -> Result<bool, SignatureError> {
    let declared = envelope
        .declared_algorithm()
        .ok_or(SignatureError::MissingAlgorithm)?;

    let (ring_alg, declared_curve, declared_name, sig_len) = match declared {
        coset::Algorithm::Assigned(coset::iana::Algorithm::ES256) => {
            (&signature::ECDSA_P256_SHA256_FIXED, EcCurve::P256, "ES256", 64)
        }
        coset::Algorithm::Assigned(coset::iana::Algorithm::ES384) => {
            (&signature::ECDSA_P384_SHA384_FIXED, EcCurve::P384, "ES384", 96)
        }
        other => {
            return Err(SignatureError::UnsupportedAlgorithm(format!("{other:?}")));
        }
    };

    if declared_curve != leaf_key.curve {
        return Err(SignatureError::AlgorithmMismatch {
            declared: declared_name,
            key: leaf_key.curve.name(),
        });
    }

    let raw = normalize_ecdsa_signature(envelope.signature(), sig_len)
        .map_err(SignatureError::MalformedSignature)?;

    let key = UnparsedPublicKey::new(ring_alg, &leaf_key.sec1);
    Ok(envelope.verify_with(|data| key.verify(data, &raw).is_ok()))
}

/// Accepts either raw fixed-width signatures or DER-encoded ones and
/// normalises to raw.
fn normalize_ecdsa_signature(sig: &[u8], expected_len: usize) -> Result<Vec<u8>, String> {
    if sig.len() == expected_len {
        return Ok(sig.to_vec());
    }
    if sig.len() < 8 || sig.first() != Some(&0x30) {
        return Err(format!(
            "unexpected ECDSA signature format (len={})",
            sig.len()
        ));
    }
    let total_len = sig[1] as usize;
    if total_len + 2 != sig.len() {
        return Err(format!(
            "DER signature length mismatch (declared={}, actual={})",
            total_len,
            sig.len()
        ));
    }
    let mut idx = 2;
    let r = der_read_int(sig, &mut idx, expected_len / 2)?;
    let s = der_read_int(sig, &mut idx, expected_len / 2)?;
    if idx != sig.len() {
        return Err("unexpected trailing data in DER signature".into());
    }
    let mut out = Vec::with_capacity(expected_len);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

fn der_read_int(sig: &[u8], idx: &mut usize, part_len: usize) -> Result<Vec<u8>, String> {
    if *idx >= sig.len() || sig[*idx] != 0x02 {
        return Err("expected INTEGER tag in DER signature".into());
    }
    *idx += 1;
    if *idx >= sig.len() {
        return Err("incomplete DER length".into());
    }
    let mut len = sig[*idx] as usize;
    *idx += 1;
    if len & 0x80 != 0 {
        let bytes = len & 0x7F;
        if bytes == 0 || bytes > 2 || *idx + bytes > sig.len() {
            return Err("unsupported DER length encoding".into());
        }
        len = 0;
        for _ in 0..bytes {
            len = (len << 8) | sig[*idx] as usize;
            *idx += 1;
        }
    }
    if *idx + len > sig.len() {
        return Err("DER INTEGER overruns signature buffer".into());
    }
    let mut value = &sig[*idx..*idx + len];
    *idx += len;
    while !value.is_empty() && value[0] == 0 {
        value = &value[1..];
    }
    if value.len() > part_len {
        return Err(format!(
            "DER INTEGER too large (len={}, expected <= {})",
            value.len(),
            part_len
        ));
    }
    let mut out = vec![0u8; part_len];
    let start = part_len - value.len();
    out[start..].copy_from_slice(value);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::envelope::decode_envelope;
    use crate::attestation::test_support::{
        build_payload, default_chain, sign_envelope, sign_envelope_with_algorithm, TEST_NOW_MS,
    };
    use coset::{CoseSign1, TaggedCborSerializable};

    #[test]
    fn verifies_valid_signature() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let doc = sign_envelope(payload, &chain.leaf_signing_key);
        let envelope = decode_envelope(&doc).expect("decode");
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");
        assert_eq!(verify_signature(&envelope, &key), Ok(true));
    }

    #[test]
    fn every_single_bit_corruption_fails() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let doc = sign_envelope(payload, &chain.leaf_signing_key);
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");

        let mut sign1 = CoseSign1::from_tagged_slice(&doc).expect("parse");
        let original = sign1.signature.clone();
        for byte in 0..original.len() {
            for bit in 0..8 {
                let mut corrupted = original.clone();
                corrupted[byte] ^= 1 << bit;
                sign1.signature = corrupted;
                let reencoded = sign1.clone().to_tagged_vec().expect("reencode");
                let envelope = decode_envelope(&reencoded).expect("decode");
                assert_eq!(
                    verify_signature(&envelope, &key),
                    Ok(false),
                    "bit {bit} of byte {byte} still verified"
                );
            }
        }
    }

    #[test]
    fn accepts_der_encoded_signature() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let doc = sign_envelope(payload, &chain.leaf_signing_key);
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");

        let mut sign1 = CoseSign1::from_tagged_slice(&doc).expect("parse");
        sign1.signature = der_encode_raw(&sign1.signature);
        let reencoded = sign1.to_tagged_vec().expect("reencode");
        let envelope = decode_envelope(&reencoded).expect("decode");
        assert_eq!(verify_signature(&envelope, &key), Ok(true));
    }

    #[test]
    fn wrong_length_signature_is_malformed() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let doc = sign_envelope(payload, &chain.leaf_signing_key);
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");

        let mut sign1 = CoseSign1::from_tagged_slice(&doc).expect("parse");
        sign1.signature = vec![0u8; 64];
        let reencoded = sign1.to_tagged_vec().expect("reencode");
        let envelope = decode_envelope(&reencoded).expect("decode");
        assert!(matches!(
            verify_signature(&envelope, &key),
            Err(SignatureError::MalformedSignature(_))
        ));
    }

    #[test]
    fn declared_algorithm_must_match_leaf_curve() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let doc = sign_envelope_with_algorithm(
            payload,
            &chain.leaf_signing_key,
            coset::iana::Algorithm::ES256,
        );
        let envelope = decode_envelope(&doc).expect("decode");
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");
        assert!(matches!(
            verify_signature(&envelope, &key),
            Err(SignatureError::AlgorithmMismatch {
                declared: "ES256",
                key: "P-384"
            })
        ));
    }

    #[test]
    fn missing_algorithm_is_rejected() {
        let chain = default_chain();
        let payload = build_payload(&chain, TEST_NOW_MS, None);
        let sign1 = coset::CoseSign1Builder::new()
            .payload(payload)
            .signature(vec![0u8; 96])
            .build();
        let doc = sign1.to_tagged_vec().expect("serialize");
        let envelope = decode_envelope(&doc).expect("decode");
        let key = leaf_public_key(&chain.leaf_der).expect("leaf key");
        assert_eq!(
            verify_signature(&envelope, &key),
            Err(SignatureError::MissingAlgorithm)
        );
    }

    #[test]
    fn non_certificate_leaf_is_unparseable() {
        assert!(matches!(
            leaf_public_key(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(SignatureError::LeafUnparseable(_))
        ));
    }

    /// Raw r||s to minimal DER ECDSA-Sig-Value.
    fn der_encode_raw(raw: &[u8]) -> Vec<u8> {
        fn der_int(part: &[u8]) -> Vec<u8> {
            let mut v: Vec<u8> = part.to_vec();
            while v.len() > 1 && v[0] == 0 {
                v.remove(0);
            }
            if v[0] & 0x80 != 0 {
                v.insert(0, 0);
            }
            let mut out = vec![0x02, v.len() as u8];
            out.extend_from_slice(&v);
            out
        }
        let (r, s) = raw.split_at(raw.len() / 2);
        let r = der_int(r);
        let s = der_int(s);
        let mut out = vec![0x30, (r.len() + s.len()) as u8];
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        out
    }
}
