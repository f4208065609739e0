//! Abstracted Machine Interface (AMI) boundary.
//!
//! The AMI describes the node the agent runs on. Real backends (container
//! engines, orchestrators) live outside this crate and plug in through
//! [`AmiRegistry`]; [`HostAmi`] covers the plain-host case.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use nodeinit_core::EngineConfig;

use crate::error::{ActivateError, ActivateResult};
use crate::proof::{HostProbe, SystemProbe};

/// Backend-defined failure; forwarded to callers unchanged.
pub type AmiError = anyhow::Error;

/// Node metadata copied into the activation payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Capability interface to the machine/platform backend.
pub trait Ami: Send + Sync {
    fn collect_node_info(&self) -> Result<NodeInfo, AmiError>;
}

type AmiFactory = Box<dyn Fn(&EngineConfig) -> Result<Arc<dyn Ami>, AmiError> + Send + Sync>;

/// Engine kinds the host process has wired up, keyed by `engine.kind`.
#[derive(Default)]
pub struct AmiRegistry {
    factories: HashMap<String, AmiFactory>,
}

impl AmiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the host backend available as `native`.
    pub fn with_native() -> Self {
        let mut registry = Self::new();
        registry.register(HostAmi::KIND, |_| Ok(Arc::new(HostAmi::new()) as Arc<dyn Ami>));
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&EngineConfig) -> Result<Arc<dyn Ami>, AmiError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Build the backend named by `engine.kind`.
    pub fn open(&self, engine: &EngineConfig) -> ActivateResult<Arc<dyn Ami>> {
        let factory = self
            .factories
            .get(&engine.kind)
            .ok_or_else(|| ActivateError::UnsupportedBackend(engine.kind.clone()))?;

        factory(engine).map_err(|source| ActivateError::Backend {
            kind: engine.kind.clone(),
            source,
        })
    }
}

impl fmt::Debug for AmiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("AmiRegistry").field("kinds", &kinds).finish()
    }
}

/// AMI backed by the local host, for nodes that run without an orchestrator.
#[derive(Debug, Default)]
pub struct HostAmi {
    probe: HostProbe,
}

impl HostAmi {
    pub const KIND: &'static str = "native";

    pub fn new() -> Self {
        Self {
            probe: HostProbe::new(),
        }
    }
}

impl Ami for HostAmi {
    fn collect_node_info(&self) -> Result<NodeInfo, AmiError> {
        let hostname = self
            .probe
            .host_name()
            .ok_or_else(|| anyhow::anyhow!("host name is not available"))?;

        let kernel_version = std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(NodeInfo {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            kernel_version,
            labels: BTreeMap::new(),
        })
    }
}
