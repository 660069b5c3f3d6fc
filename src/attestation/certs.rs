use crate::attestation::errors::ChainError;
use crate::attestation::util::sha256_fingerprint;
use anyhow::{anyhow, Context};
use ring::signature::{self, UnparsedPublicKey};
use rustls_pemfile as pemfile;
use std::io::Cursor;
use std::path::Path;
use x509_parser::prelude::*;

/// Pinned root of trust. Parsed once at construction; immutable afterwards
/// and safely shared by concurrent verifications.
pub struct TrustAnchor {
    der: Vec<u8>,
    subject_raw: Vec<u8>,
    subject_display: String,
    public_key: Vec<u8>,
    fingerprint: String,
}

impl TrustAnchor {
    /// Builds a trust anchor from a DER-encoded root certificate.
    pub fn from_der(der: Vec<u8>) -> anyhow::Result<Self> {
        let (_, cert) =
            parse_x509_certificate(&der).map_err(|e| anyhow!("parse root certificate: {e}"))?;
        let subject_raw = cert.tbs_certificate.subject.as_raw().to_vec();
        let subject_display = format!("{}", cert.subject());
        let public_key = cert
            .tbs_certificate
            .subject_pki
            .subject_public_key
            .data
            .to_vec();
        let fingerprint = sha256_fingerprint(&der);
        Ok(TrustAnchor {
            der,
            subject_raw,
            subject_display,
            public_key,
            fingerprint,
        })
    }

    /// Loads the first certificate from a PEM file.
    pub fn from_pem_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
        let mut cursor = Cursor::new(&bytes);
        let der = pemfile::certs(&mut cursor)
            .next()
            .ok_or_else(|| anyhow!("no certificate in {:?}", path))?
            .map_err(|e| anyhow!("parse PEM in {:?}: {e:?}", path))?;
        Self::from_der(der.as_ref().to_vec())
    }

    /// SHA-256 fingerprint, uppercase colon-separated hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn subject(&self) -> &str {
        &self.subject_display
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Chain facts recorded after successful validation.
pub struct ChainSummary {
    pub leaf_fingerprint: String,
    pub root_fingerprint: String,
    pub root_subject: String,
    /// Certificates in the validated path (leaf + intermediates).
    pub depth: usize,
}

/// Validates the chain of issuance leaf -> cabundle[0] -> .. -> anchor.
///
/// `cabundle` is ordered leaf-side first; a trailing entry byte-equal to the
/// anchor is dropped rather than re-validated. The topmost remaining
/// certificate must be issued by the anchor. For every adjacent pair the
/// issuer name, issuer signature, validity window at `at_time_ms`, and
/// issuer CA constraints are enforced, failing fast on the first violation.
/// Chains deeper than `max_depth` are rejected before any parsing.
pub fn validate_chain(
    leaf_der: &[u8],
    cabundle: &[Vec<u8>],
    anchor: &TrustAnchor,
    at_time_ms: u64,
    max_depth: usize,
) -> Result<ChainSummary, ChainError> {
    let mut chain: Vec<&[u8]> = Vec::with_capacity(1 + cabundle.len());
    chain.push(leaf_der);
    chain.extend(cabundle.iter().map(Vec::as_slice));
    if chain.len() > 1 && chain.last().copied() == Some(anchor.der.as_slice()) {
        chain.pop();
    }
    if chain.len() > max_depth {
        return Err(ChainError::TooDeep {
            depth: chain.len(),
            max: max_depth,
        });
    }

    let at = (at_time_ms / 1000) as i64;

    let mut parsed = Vec::with_capacity(chain.len());
    for der in chain.iter().copied() {
        let (_, cert) = parse_x509_certificate(der)
            .map_err(|e| ChainError::Malformed(format!("parse chain certificate: {e}")))?;
        parsed.push(cert);
    }

    let top = parsed
        .last()
        .ok_or_else(|| ChainError::Malformed("empty chain".into()))?;
    if top.tbs_certificate.issuer.as_raw() != anchor.subject_raw.as_slice() {
        return Err(ChainError::ChainDoesNotTerminateAtAnchor);
    }

    // Walk anchor-side down to the leaf, carrying the issuer key forward.
    let mut issuer_subject = anchor.subject_raw.clone();
    let mut issuer_key = anchor.public_key.clone();
    for (idx, cert) in parsed.iter().enumerate().rev() {
        let role = if idx == 0 { "leaf" } else { "intermediate" };
        ensure_validity(cert, at, role)?;
        ensure_basic_constraints(cert, idx != 0, role)?;

        if cert.tbs_certificate.issuer.as_raw() != issuer_subject.as_slice() {
            return Err(ChainError::IssuerMismatch { role });
        }

        let alg = map_signature_oid(&cert.signature_algorithm.algorithm)
            .map_err(ChainError::Malformed)?;
        UnparsedPublicKey::new(alg, &issuer_key)
            .verify(
                cert.tbs_certificate.as_ref(),
                cert.signature_value.data.as_ref(),
            )
            .map_err(|_| ChainError::SignatureMismatch { role })?;

        issuer_subject = cert.tbs_certificate.subject.as_raw().to_vec();
        issuer_key = cert
            .tbs_certificate
            .subject_pki
            .subject_public_key
            .data
            .to_vec();
    }

    Ok(ChainSummary {
        leaf_fingerprint: sha256_fingerprint(leaf_der),
        root_fingerprint: anchor.fingerprint.clone(),
        root_subject: anchor.subject_display.clone(),
        depth: chain.len(),
    })
}

fn ensure_validity(cert: &X509Certificate<'_>, at: i64, role: &'static str) -> Result<(), ChainError> {
    let not_before = cert.validity().not_before.timestamp();
    let not_after = cert.validity().not_after.timestamp();
    if at < not_before {
        return Err(ChainError::NotYetValid {
            role,
            not_before,
            at,
        });
    }
    if at > not_after {
        return Err(ChainError::Expired { role, not_after, at });
    }
    Ok(())
}

fn ensure_basic_constraints(
    cert: &X509Certificate<'_>,
    expect_ca: bool,
    role: &'static str,
) -> Result<(), ChainError> {
    let bc = cert
        .basic_constraints()
        .map_err(|e| ChainError::Malformed(format!("basicConstraints parse error: {e}")))?;
    if expect_ca {
        let bc = bc.ok_or_else(|| ChainError::NotACertificateAuthority {
            role,
            reason: "missing basicConstraints".into(),
        })?;
        if !bc.value.ca {
            return Err(ChainError::NotACertificateAuthority {
                role,
                reason: "basicConstraints CA=false".into(),
            });
        }
    } else if let Some(bc) = bc {
        if bc.value.ca {
            return Err(ChainError::LeafIsCertificateAuthority);
        }
    }

    let ku = cert
        .key_usage()
        .map_err(|e| ChainError::Malformed(format!("keyUsage parse error: {e}")))?;
    if expect_ca {
        let ku = ku.ok_or_else(|| ChainError::NotACertificateAuthority {
            role,
            reason: "missing keyUsage".into(),
        })?;
        if !ku.value.key_cert_sign() {
            return Err(ChainError::NotACertificateAuthority {
                role,
                reason: "keyUsage lacks keyCertSign".into(),
            });
        }
    } else if let Some(ku) = ku {
        if ku.value.key_cert_sign() {
            return Err(ChainError::LeafIsCertificateAuthority);
        }
    }

    Ok(())
}

fn map_signature_oid(
    oid: &x509_parser::der_parser::oid::Oid<'_>,
) -> Result<&'static dyn signature::VerificationAlgorithm, String> {
    let oid_str = oid.to_string();
    let alg: &'static dyn signature::VerificationAlgorithm = match oid_str.as_str() {
        "1.2.840.10045.4.3.2" => &signature::ECDSA_P256_SHA256_ASN1,
        "1.2.840.10045.4.3.3" => &signature::ECDSA_P384_SHA384_ASN1,
        "1.2.840.113549.1.1.11" => &signature::RSA_PKCS1_2048_8192_SHA256,
        "1.2.840.113549.1.1.12" => &signature::RSA_PKCS1_2048_8192_SHA384,
        "1.2.840.113549.1.1.13" => &signature::RSA_PKCS1_2048_8192_SHA512,
        other => {
            return Err(format!(
                "unsupported certificate signature algorithm OID {other}"
            ))
        }
    };
    Ok(alg)
}
