use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use env_logger::Env;
use log::debug;
use nitro_attest::attestation::{
    now_millis, PcrPolicy, TrustAnchor, Verdict, VerificationResult, Verifier, VerifierConfig,
};
use serde_json::Value as JsonValue;
use std::{
    collections::BTreeMap,
    env, fs,
    io::Read,
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

type CliResult<T> = Result<T, anyhow::Error>;

/// CLI entrypoint: loads the trust anchor and policy, verifies the supplied
/// attestation document, and prints an itemized report.
///
/// Exit codes: 0 for a valid document, 1 for an invalid one, 2 when the
/// input could not be read or parsed at all (usage/caller-input error).
fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init()
        .ok();

    match run() {
        Ok(Verdict::Valid) => ExitCode::from(0),
        Ok(Verdict::Invalid) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> CliResult<Verdict> {
    let document_arg = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: nitro-attest <document-file|-> [root-pem]"))?;
    let document = load_document(&document_arg)?;
    debug!("document decoded: {} bytes", document.len());

    let root_path = resolve_root_pem_path()?;
    let anchor = TrustAnchor::from_pem_file(&root_path)?;
    debug!("trust anchor {} ({})", anchor.subject(), anchor.fingerprint());

    let mut cfg = VerifierConfig::default();
    cfg.expected_pcrs = load_expected_pcrs()?;
    if let Ok(secs) = env::var("NITRO_MAX_SKEW_SECS") {
        let secs: u64 = secs
            .parse()
            .map_err(|e| anyhow!("NITRO_MAX_SKEW_SECS: {e}"))?;
        cfg.max_skew = Duration::from_secs(secs);
    }
    if let Ok(policy) = env::var("NITRO_PCR_POLICY") {
        cfg.pcr_policy = match policy.as_str() {
            "subset" => PcrPolicy::Subset,
            "exact" => PcrPolicy::Exact,
            other => return Err(anyhow!("NITRO_PCR_POLICY must be subset or exact, got {other}")),
        };
    }
    if let Ok(depth) = env::var("NITRO_MAX_CHAIN_DEPTH") {
        cfg.max_chain_depth = depth
            .parse()
            .map_err(|e| anyhow!("NITRO_MAX_CHAIN_DEPTH: {e}"))?;
    }

    let requested_nonce = match env::var("NITRO_NONCE_HEX") {
        Ok(value) => Some(hex_to_bytes(&value).context("NITRO_NONCE_HEX")?),
        Err(_) => None,
    };

    let verifier = Verifier::new(anchor, cfg)?;
    let result = verifier.verify(&document, requested_nonce.as_deref(), now_millis());
    print_report(&result);
    Ok(result.verdict)
}

/// Reads the document from a file or stdin. Text input is decoded as hex
/// (optional `0x` prefix) or base64, in that order; binary input is passed
/// through untouched.
fn load_document(arg: &str) -> CliResult<Vec<u8>> {
    let raw = if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("read stdin")?;
        buf
    } else {
        fs::read(arg).with_context(|| format!("read {arg}"))?
    };

    match std::str::from_utf8(&raw) {
        Ok(text) => {
            let trimmed = text.trim();
            let stripped = trimmed.trim_start_matches("0x");
            if let Ok(bytes) = hex::decode(stripped) {
                return Ok(bytes);
            }
            if let Ok(bytes) = b64.decode(trimmed.as_bytes()) {
                return Ok(bytes);
            }
            Err(anyhow!("document is neither hex nor base64"))
        }
        Err(_) => Ok(raw),
    }
}

/// Decide which root certificate PEM to trust based on CLI/env input.
fn resolve_root_pem_path() -> CliResult<PathBuf> {
    if let Ok(path) = env::var("NITRO_ROOT_PEM_PATH") {
        return Ok(PathBuf::from(path));
    }
    if let Some(arg) = env::args().nth(2) {
        return Ok(PathBuf::from(arg));
    }
    Err(anyhow!(
        "provide root PEM path as second argument or set NITRO_ROOT_PEM_PATH"
    ))
}

/// Load the expected PCR baseline from disk: JSON `{"pcr0": "<hex>", ...}`.
fn load_expected_pcrs() -> CliResult<BTreeMap<u8, Vec<u8>>> {
    let path = match env::var("NITRO_EXPECTED_PCRS_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => return Ok(BTreeMap::new()),
    };
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {:?}", path))?;
    let json: JsonValue = serde_json::from_str(&contents)
        .with_context(|| format!("parse JSON from {:?}", path))?;
    let object = json
        .as_object()
        .ok_or_else(|| anyhow!("{:?}: expected a JSON object", path))?;

    let mut map = BTreeMap::new();
    for (key, value) in object {
        let Some(index) = key.strip_prefix("pcr") else {
            continue;
        };
        let index: u8 = index
            .parse()
            .map_err(|e| anyhow!("{key}: bad PCR index: {e}"))?;
        let hex_value = value
            .as_str()
            .ok_or_else(|| anyhow!("{key}: expected hex string"))?;
        map.insert(index, hex_to_bytes(hex_value).context(key.clone())?);
    }
    Ok(map)
}

/// Decode a hex string that may optionally be prefixed with `0x`.
fn hex_to_bytes(hex_str: &str) -> CliResult<Vec<u8>> {
    let trimmed = hex_str.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed).map_err(|e| anyhow!("hex decode error: {e}"))?;
    Ok(bytes)
}

fn print_report(result: &VerificationResult) {
    println!();
    println!("{}", "=".repeat(60));
    println!("ATTESTATION VERIFICATION RESULT");
    println!("{}", "=".repeat(60));
    println!();
    println!(
        "Valid            : {}",
        if result.is_valid() { "YES" } else { "NO" }
    );
    println!(
        "Real attestation : {}",
        if result.is_real_attestation {
            "YES"
        } else {
            "NO (input did not decode as an attestation document)"
        }
    );

    let summary = &result.summary;
    if let Some(module_id) = &summary.module_id {
        println!("Module ID        : {module_id}");
    }
    if let Some(timestamp_ms) = summary.timestamp_ms {
        println!("Timestamp (ms)   : {timestamp_ms}");
    }
    if let Some(digest) = summary.digest {
        println!("Digest           : {digest}");
    }
    if let Some(leaf) = &summary.leaf_fingerprint_sha256 {
        println!("Leaf SHA256      : {leaf}");
    }
    if let Some(root) = &summary.root_fingerprint_sha256 {
        println!("Root SHA256      : {root}");
    }
    if let Some(subject) = &summary.root_subject {
        println!("Root subject     : {subject}");
    }

    if !summary.pcrs_hex.is_empty() {
        println!();
        println!("PCR values:");
        for (index, value) in &summary.pcrs_hex {
            if value.len() > 32 {
                println!("  PCR{index}: {}...", &value[..32]);
            } else {
                println!("  PCR{index}: {value}");
            }
        }
    }

    println!();
    println!("Checks:");
    for finding in &result.findings {
        println!("  {} [{}] {}", finding.severity, finding.code, finding.message);
    }
    println!();
    println!("{}", "=".repeat(60));
}
