use std::{collections::BTreeMap, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Measurement comparison policy. Baseline comparison is opt-in per caller;
/// the policy decides what to do with PCR indices the baseline does not name.
pub enum PcrPolicy {
    /// Every baseline index must match; measured indices outside the
    /// baseline are informational.
    #[default]
    Subset,
    /// Additionally fail on measured indices absent from the baseline, for
    /// deployments that pin the complete register file.
    Exact,
}

#[derive(Debug, Clone)]
/// Parameters that drive freshness, measurement, and chain-depth policy.
pub struct VerifierConfig {
    /// Accepted clock drift around the caller's reference time.
    pub max_skew: Duration,
    /// Expected PCR values (index -> digest bytes). Empty means no baseline
    /// comparison.
    pub expected_pcrs: BTreeMap<u8, Vec<u8>>,
    pub pcr_policy: PcrPolicy,
    /// Maximum certificate chain depth (leaf + intermediates) accepted
    /// before any cryptographic work.
    pub max_chain_depth: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_skew: Duration::from_secs(300),
            expected_pcrs: BTreeMap::new(),
            pcr_policy: PcrPolicy::Subset,
            max_chain_depth: 10,
        }
    }
}
