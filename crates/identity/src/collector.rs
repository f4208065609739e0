//! Fingerprint collection.
//!
//! One call to [`Collector::collect`] is one collection cycle: every
//! configured proof is resolved in order, then the AMI is asked for node
//! metadata. The first failure ends the cycle; no partial record is built.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use nodeinit_core::Fingerprint;

use crate::ami::{Ami, NodeInfo};
use crate::error::{ActivateError, ActivateResult};
use crate::proof::{ProofResolver, ResolvedProof, SystemProbe};

/// Everything the activation submitter needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    /// Resolved proofs in configured order
    pub fingerprints: Vec<ResolvedProof>,
    /// Node metadata reported by the AMI
    pub node_info: NodeInfo,
    /// Collection timestamp (Unix epoch milliseconds)
    pub collected_at: u64,
}

impl ActivationRecord {
    /// Value of the first proof, which the control plane treats as
    /// authoritative.
    pub fn fingerprint_value(&self) -> Option<&str> {
        self.fingerprints.first().map(|p| p.value.as_str())
    }

    /// Stable device fingerprint: BLAKE3 over the ordered `proof=value`
    /// lines, hex encoded.
    ///
    /// Node info and the timestamp are excluded so the digest only changes
    /// when the identity does.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for resolved in &self.fingerprints {
            hasher.update(resolved.proof.as_str().as_bytes());
            hasher.update(b"=");
            hasher.update(resolved.value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// Resolves the configured proofs and merges in AMI node info.
pub struct Collector {
    fingerprints: Vec<Fingerprint>,
    probe: Arc<dyn SystemProbe>,
    ami: Arc<dyn Ami>,
}

impl Collector {
    pub fn new(
        fingerprints: Vec<Fingerprint>,
        probe: Arc<dyn SystemProbe>,
        ami: Arc<dyn Ami>,
    ) -> Self {
        Self {
            fingerprints,
            probe,
            ami,
        }
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    pub fn collect(&self) -> ActivateResult<ActivationRecord> {
        let resolver = ProofResolver::new(self.probe.as_ref());

        let mut fingerprints = Vec::with_capacity(self.fingerprints.len());
        for (index, fingerprint) in self.fingerprints.iter().enumerate() {
            let value = resolver
                .resolve(fingerprint)
                .map_err(|source| ActivateError::Proof {
                    index,
                    proof: fingerprint.proof.clone(),
                    source,
                })?;
            tracing::debug!(index, proof = %fingerprint.proof, "proof resolved");
            fingerprints.push(ResolvedProof {
                proof: fingerprint.proof.clone(),
                value,
            });
        }

        let node_info = self.ami.collect_node_info().map_err(ActivateError::Ami)?;

        Ok(ActivationRecord {
            fingerprints,
            node_info,
            collected_at: current_timestamp(),
        })
    }
}

/// Get current timestamp in milliseconds.
fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
