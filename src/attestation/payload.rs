use crate::attestation::errors::DecodeError;
use crate::attestation::types::{AttestationRecord, DigestAlgorithm};
use ciborium::value::Value;
use std::collections::BTreeMap;

/// Highest PCR index a Nitro-style platform can report.
const MAX_PCR_INDEX: u8 = 31;

/// Parses the envelope payload into an [`AttestationRecord`].
///
/// The payload must be a CBOR map with text keys; anything else is
/// [`DecodeError::NotAttestationFormat`], which callers use to distinguish
/// genuine attestation documents from development stand-ins. There is
/// deliberately no fallback to a looser format here.
pub fn decode_payload(bytes: &[u8]) -> Result<AttestationRecord, DecodeError> {
    let value: Value =
        ciborium::de::from_reader(bytes).map_err(|_| DecodeError::NotAttestationFormat)?;
    let entries = match value {
        Value::Map(entries) => entries,
        _ => return Err(DecodeError::NotAttestationFormat),
    };

    let mut module_id = None;
    let mut digest = None;
    let mut timestamp = None;
    let mut raw_pcrs = None;
    let mut certificate = None;
    let mut cabundle = Vec::new();
    let mut public_key = None;
    let mut user_data = None;
    let mut nonce = None;

    for (key, value) in &entries {
        let Some(name) = key.as_text() else {
            return Err(DecodeError::MalformedPayload(format!(
                "non-text key in payload map: {key:?}"
            )));
        };
        match name {
            "module_id" => module_id = Some(text_field(value, "module_id")?),
            "digest" => digest = Some(digest_field(value)?),
            "timestamp" => timestamp = Some(timestamp_field(value)?),
            "pcrs" => raw_pcrs = Some(pcr_map(value)?),
            "certificate" => certificate = Some(bytes_field(value, "certificate")?),
            "cabundle" => cabundle = cabundle_field(value)?,
            "public_key" => public_key = optional_bytes(value, "public_key")?,
            "user_data" => user_data = optional_bytes(value, "user_data")?,
            "nonce" => nonce = optional_bytes(value, "nonce")?,
            _ => {}
        }
    }

    let module_id = module_id.ok_or(DecodeError::MissingField("module_id"))?;
    let digest = digest.ok_or(DecodeError::MissingField("digest"))?;
    let timestamp_ms = timestamp.ok_or(DecodeError::MissingField("timestamp"))?;
    let pcrs = raw_pcrs.ok_or(DecodeError::MissingField("pcrs"))?;
    let certificate = certificate.ok_or(DecodeError::MissingField("certificate"))?;

    for (idx, value) in &pcrs {
        if value.len() != digest.output_len() {
            return Err(DecodeError::InvalidPcr(format!(
                "PCR{idx} has {} bytes, {digest} requires {}",
                value.len(),
                digest.output_len()
            )));
        }
    }

    Ok(AttestationRecord {
        module_id,
        timestamp_ms,
        digest,
        pcrs,
        certificate,
        cabundle,
        public_key,
        user_data,
        nonce,
    })
}

fn text_field(value: &Value, field: &'static str) -> Result<String, DecodeError> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| DecodeError::MalformedPayload(format!("{field} expected text")))
}

fn bytes_field(value: &Value, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    value
        .as_bytes()
        .map(|b| b.to_vec())
        .ok_or_else(|| DecodeError::MalformedPayload(format!("{field} expected bytes")))
}

/// CBOR null is tolerated as absent; anything else must be a byte string.
fn optional_bytes(value: &Value, field: &'static str) -> Result<Option<Vec<u8>>, DecodeError> {
    if value.is_null() {
        return Ok(None);
    }
    bytes_field(value, field).map(Some)
}

fn digest_field(value: &Value) -> Result<DigestAlgorithm, DecodeError> {
    let name = value
        .as_text()
        .ok_or_else(|| DecodeError::MalformedPayload("digest expected text".into()))?;
    DigestAlgorithm::from_name(name)
        .ok_or_else(|| DecodeError::MalformedPayload(format!("unsupported digest '{name}'")))
}

fn timestamp_field(value: &Value) -> Result<u64, DecodeError> {
    let integer = value
        .as_integer()
        .ok_or_else(|| DecodeError::MalformedPayload("timestamp expected integer".into()))?;
    u64::try_from(integer)
        .map_err(|_| DecodeError::MalformedPayload("timestamp out of range".into()))
}

fn pcr_map(value: &Value) -> Result<BTreeMap<u8, Vec<u8>>, DecodeError> {
    let entries = match value {
        Value::Map(entries) => entries,
        _ => return Err(DecodeError::MalformedPayload("pcrs expected map".into())),
    };
    let mut out = BTreeMap::new();
    for (key, value) in entries {
        let index = key
            .as_integer()
            .ok_or_else(|| DecodeError::InvalidPcr(format!("non-integer PCR index: {key:?}")))?;
        let index = i128::from(index);
        if !(0..=i128::from(MAX_PCR_INDEX)).contains(&index) {
            return Err(DecodeError::InvalidPcr(format!(
                "PCR index {index} outside 0..={MAX_PCR_INDEX}"
            )));
        }
        let index = index as u8;
        let bytes = value
            .as_bytes()
            .ok_or_else(|| DecodeError::InvalidPcr(format!("PCR{index} value expected bytes")))?;
        if out.insert(index, bytes.to_vec()).is_some() {
            return Err(DecodeError::InvalidPcr(format!(
                "duplicate PCR index {index}"
            )));
        }
    }
    Ok(out)
}

fn cabundle_field(value: &Value) -> Result<Vec<Vec<u8>>, DecodeError> {
    let entries = match value {
        Value::Array(entries) => entries,
        _ => {
            return Err(DecodeError::MalformedPayload(
                "cabundle expected array".into(),
            ))
        }
    };
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(bytes_field(entry, "cabundle entry")?);
    }
    Ok(out)
}
