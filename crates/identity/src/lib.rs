//! Node identity collection and activation for NodeInit.
//!
//! A node proves who it is by resolving an ordered list of configured proofs
//! (boot id, system UUID, machine id, serial-number file, host name) and
//! pairing them with node metadata from the Abstracted Machine Interface
//! (AMI). The resulting [`ActivationRecord`] is handed to a [`Submitter`]
//! that registers the node with the control plane.
//!
//! # Components
//!
//! - [`ProofResolver`]: resolves one proof against a [`SystemProbe`]
//! - [`Collector`]: resolves every proof in order, fail-fast, then asks the AMI
//! - [`ActivationLoop`]: retries collect-and-submit on an interval until the
//!   node is activated or the loop is closed

pub mod activation;
pub mod ami;
pub mod collector;
pub mod error;
pub mod proof;

pub use activation::{ActivationLoop, LoopState, SubmitError, Submitter};
pub use ami::{Ami, AmiError, AmiRegistry, HostAmi, NodeInfo};
pub use collector::{ActivationRecord, Collector};
pub use error::{ActivateError, ActivateResult, ProofError};
pub use proof::{HostProbe, ProofResolver, ResolvedProof, SystemProbe};

// Re-export core types for convenience
pub use nodeinit_core::{Config, Fingerprint, Proof};
