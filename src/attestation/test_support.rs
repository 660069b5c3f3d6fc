//! Test-only builders for cryptographically valid attestation fixtures:
//! ephemeral P-384 certificate chains and COSE_Sign1 envelopes signed with
//! the chain's leaf key.

use ciborium::value::Value;
use coset::{iana, CoseSign1Builder, HeaderBuilder, TaggedCborSerializable};
use p384::ecdsa::{signature::Signer, Signature, SigningKey};
use p384::pkcs8::DecodePrivateKey;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa,
    KeyUsagePurpose, PKCS_ECDSA_P384_SHA384,
};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Fixed reference time so fixtures and assertions agree without touching
/// the wall clock.
pub(crate) const TEST_NOW_MS: u64 = 1_700_000_000_000;

pub(crate) const TEST_MODULE_ID: &str = "i-0badc0ffee0ddf00d-enc0123456789abcdef";

pub(crate) struct TestChain {
    pub root_der: Vec<u8>,
    pub intermediate_der: Vec<u8>,
    pub leaf_der: Vec<u8>,
    pub leaf_signing_key: SigningKey,
}

fn base_params(cn: &str, not_before_s: i64, not_after_s: i64) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.alg = &PKCS_ECDSA_P384_SHA384;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params.not_before = OffsetDateTime::from_unix_timestamp(not_before_s).expect("not_before");
    params.not_after = OffsetDateTime::from_unix_timestamp(not_after_s).expect("not_after");
    params
}

fn ca_params(cn: &str, not_before_s: i64, not_after_s: i64) -> CertificateParams {
    let mut params = base_params(cn, not_before_s, not_after_s);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params
}

fn leaf_params(cn: &str, not_before_s: i64, not_after_s: i64) -> CertificateParams {
    let mut params = base_params(cn, not_before_s, not_after_s);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params
}

fn build_chain(
    intermediate_not_before_s: i64,
    intermediate_not_after_s: i64,
    intermediate_is_ca: bool,
) -> TestChain {
    let now_s = (TEST_NOW_MS / 1000) as i64;
    let (nb, na) = (now_s - 86_400, now_s + 31_536_000);

    let root = Certificate::from_params(ca_params("nitro-attest test root", nb, na))
        .expect("generate root");
    let root_der = root.serialize_der().expect("root der");

    let intermediate_params = if intermediate_is_ca {
        ca_params(
            "nitro-attest test intermediate",
            intermediate_not_before_s,
            intermediate_not_after_s,
        )
    } else {
        leaf_params(
            "nitro-attest test intermediate",
            intermediate_not_before_s,
            intermediate_not_after_s,
        )
    };
    let intermediate =
        Certificate::from_params(intermediate_params).expect("generate intermediate");
    let intermediate_der = intermediate
        .serialize_der_with_signer(&root)
        .expect("intermediate der");

    let leaf = Certificate::from_params(leaf_params("nitro-attest test leaf", nb, na))
        .expect("generate leaf");
    let leaf_der = leaf
        .serialize_der_with_signer(&intermediate)
        .expect("leaf der");
    let leaf_signing_key =
        SigningKey::from_pkcs8_der(&leaf.serialize_private_key_der()).expect("leaf key");

    TestChain {
        root_der,
        intermediate_der,
        leaf_der,
        leaf_signing_key,
    }
}

/// Root -> intermediate -> leaf, all valid around [`TEST_NOW_MS`].
pub(crate) fn default_chain() -> TestChain {
    let now_s = (TEST_NOW_MS / 1000) as i64;
    build_chain(now_s - 86_400, now_s + 31_536_000, true)
}

pub(crate) fn chain_with_intermediate_validity(
    not_before_s: i64,
    not_after_s: i64,
) -> TestChain {
    build_chain(not_before_s, not_after_s, true)
}

pub(crate) fn chain_with_non_ca_intermediate() -> TestChain {
    let now_s = (TEST_NOW_MS / 1000) as i64;
    build_chain(now_s - 86_400, now_s + 31_536_000, false)
}

/// PCR bank with `count` registers filled with their own index byte.
pub(crate) fn sample_pcrs(count: u8) -> BTreeMap<u8, Vec<u8>> {
    (0..count).map(|i| (i, vec![i; 48])).collect()
}

fn text(s: &str) -> Value {
    Value::Text(s.into())
}

/// Payload map entries in document order, exposed so tests can inject
/// malformations before encoding.
pub(crate) fn payload_entries(
    chain: &TestChain,
    timestamp_ms: u64,
    nonce: Option<&[u8]>,
    pcrs: &BTreeMap<u8, Vec<u8>>,
) -> Vec<(Value, Value)> {
    let mut entries = vec![
        (text("module_id"), text(TEST_MODULE_ID)),
        (text("digest"), text("SHA384")),
        (text("timestamp"), Value::Integer(timestamp_ms.into())),
        (
            text("pcrs"),
            Value::Map(
                pcrs.iter()
                    .map(|(index, value)| {
                        (Value::Integer((*index).into()), Value::Bytes(value.clone()))
                    })
                    .collect(),
            ),
        ),
        (text("certificate"), Value::Bytes(chain.leaf_der.clone())),
        (
            text("cabundle"),
            Value::Array(vec![Value::Bytes(chain.intermediate_der.clone())]),
        ),
    ];
    if let Some(nonce) = nonce {
        entries.push((text("nonce"), Value::Bytes(nonce.to_vec())));
    }
    entries
}

pub(crate) fn encode_map(entries: Vec<(Value, Value)>) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&Value::Map(entries), &mut bytes).expect("encode payload");
    bytes
}

pub(crate) fn build_payload(chain: &TestChain, timestamp_ms: u64, nonce: Option<&[u8]>) -> Vec<u8> {
    encode_map(payload_entries(chain, timestamp_ms, nonce, &sample_pcrs(4)))
}

pub(crate) fn sign_envelope(payload: Vec<u8>, key: &SigningKey) -> Vec<u8> {
    sign_envelope_with_algorithm(payload, key, iana::Algorithm::ES384)
}

pub(crate) fn sign_envelope_with_algorithm(
    payload: Vec<u8>,
    key: &SigningKey,
    alg: iana::Algorithm,
) -> Vec<u8> {
    let protected = HeaderBuilder::new().algorithm(alg).build();
    CoseSign1Builder::new()
        .protected(protected)
        .payload(payload)
        .create_signature(&[], |data| {
            let sig: Signature = key.sign(data);
            sig.to_bytes().to_vec()
        })
        .build()
        .to_tagged_vec()
        .expect("serialize COSE_Sign1")
}

/// Complete valid document: signed envelope over a default payload.
pub(crate) fn build_document(chain: &TestChain, nonce: Option<&[u8]>) -> Vec<u8> {
    let payload = build_payload(chain, TEST_NOW_MS, nonce);
    sign_envelope(payload, &chain.leaf_signing_key)
}
