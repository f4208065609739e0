//! Configuration management for NodeInit.
//!
//! The node agent reads a single TOML document. Every section has defaults so
//! a minimal file only needs the fingerprints to collect:
//!
//! ```toml
//! [engine]
//! kind = "native"
//!
//! [init.cloud.active]
//! interval_ms = 30000
//!
//! [[init.activate.fingerprints]]
//! proof = "machineID"
//!
//! [[init.activate.fingerprints]]
//! proof = "sn"
//! value = "/var/lib/nodeinit/sn.txt"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_ENGINE_KIND: &str = "native";
pub const DEFAULT_ACTIVE_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Execution backend the node runs on. The kind selects the AMI backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_kind")]
    pub kind: String,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub in_cluster: bool,
    #[serde(default)]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub activate: ActivateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub active: ActiveConfig,
}

/// Retry schedule of the activation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConfig {
    #[serde(default = "default_active_interval")]
    pub interval_ms: u64,
    /// Upper bound on how long `close` waits for an in-flight cycle
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivateConfig {
    /// Ordered proofs; the first one is the authoritative fingerprint value.
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
}

/// A single proof descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub proof: Proof,
    /// Interpreted per proof kind (file path for `sn`, unused otherwise)
    #[serde(default)]
    pub value: String,
}

/// Identity proof kinds.
///
/// Unknown names deserialize into `Other` rather than failing, so a typo in
/// the config surfaces as an unsupported proof at collection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Proof {
    BootId,
    SystemUuid,
    MachineId,
    Sn,
    HostName,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_engine_kind() -> String {
    DEFAULT_ENGINE_KIND.to_string()
}

fn default_active_interval() -> u64 {
    DEFAULT_ACTIVE_INTERVAL_MS
}

fn default_close_timeout() -> u64 {
    DEFAULT_CLOSE_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            kubernetes: KubernetesConfig::default(),
        }
    }
}

impl Default for ActiveConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_active_interval(),
            close_timeout_ms: default_close_timeout(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ActiveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Fingerprint {
    pub fn new(proof: Proof, value: impl Into<String>) -> Self {
        Self {
            proof,
            value: value.into(),
        }
    }
}

impl Proof {
    /// Wire name used in configuration files.
    pub fn as_str(&self) -> &str {
        match self {
            Proof::BootId => "bootID",
            Proof::SystemUuid => "systemUUID",
            Proof::MachineId => "machineID",
            Proof::Sn => "sn",
            Proof::HostName => "hostName",
            Proof::Other(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Proof::Other(_))
    }
}

impl From<String> for Proof {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "bootid" => Proof::BootId,
            "systemuuid" => Proof::SystemUuid,
            "machineid" => Proof::MachineId,
            "sn" => Proof::Sn,
            "hostname" => Proof::HostName,
            _ => Proof::Other(name),
        }
    }
}

impl From<&str> for Proof {
    fn from(name: &str) -> Self {
        Proof::from(name.to_string())
    }
}

impl From<Proof> for String {
    fn from(proof: Proof) -> Self {
        proof.as_str().to_string()
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Check the constraints serde cannot express.
    ///
    /// Unsupported proof kinds are deliberately accepted here; they fail at
    /// collection time.
    pub fn validate(&self) -> Result<()> {
        if self.engine.kind.trim().is_empty() {
            return Err(Error::Validation("engine.kind must not be empty".to_string()));
        }
        if self.init.cloud.active.interval_ms == 0 {
            return Err(Error::Validation(
                "init.cloud.active.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.init.cloud.active.close_timeout_ms == 0 {
            return Err(Error::Validation(
                "init.cloud.active.close_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let fingerprints = &self.init.activate.fingerprints;
        if fingerprints.is_empty() {
            return Err(Error::Validation(
                "init.activate.fingerprints must name at least one proof".to_string(),
            ));
        }
        for (index, fingerprint) in fingerprints.iter().enumerate() {
            if fingerprint.proof == Proof::Sn && fingerprint.value.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "fingerprint {} (sn) requires a file path value",
                    index
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.engine.kind, DEFAULT_ENGINE_KIND);
        assert_eq!(config.init.cloud.active.interval_ms, DEFAULT_ACTIVE_INTERVAL_MS);
        assert_eq!(config.init.cloud.active.close_timeout(), Duration::from_secs(5));
        assert_eq!(config.logger.level, "info");
        assert!(config.init.activate.fingerprints.is_empty());
    }

    #[test]
    fn test_parse_fingerprints_in_order() {
        let config = Config::from_toml_str(
            r#"
            [engine]
            kind = "kubernetes"

            [engine.kubernetes]
            in_cluster = true

            [init.cloud.active]
            interval_ms = 5000

            [[init.activate.fingerprints]]
            proof = "bootID"

            [[init.activate.fingerprints]]
            proof = "sn"
            value = "/etc/sn.txt"

            [[init.activate.fingerprints]]
            proof = "HOSTNAME"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.kind, "kubernetes");
        assert!(config.engine.kubernetes.in_cluster);
        assert_eq!(config.init.cloud.active.interval(), Duration::from_secs(5));

        let proofs: Vec<_> = config
            .init
            .activate
            .fingerprints
            .iter()
            .map(|f| f.proof.clone())
            .collect();
        assert_eq!(proofs, vec![Proof::BootId, Proof::Sn, Proof::HostName]);
        assert_eq!(config.init.activate.fingerprints[1].value, "/etc/sn.txt");
    }

    #[test]
    fn test_unknown_proof_is_kept() {
        let config = Config::from_toml_str(
            r#"
            [[init.activate.fingerprints]]
            proof = "Error"
            "#,
        )
        .unwrap();

        let proof = &config.init.activate.fingerprints[0].proof;
        assert_eq!(proof, &Proof::Other("Error".to_string()));
        assert!(!proof.is_supported());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proof_wire_names() {
        for proof in [
            Proof::BootId,
            Proof::SystemUuid,
            Proof::MachineId,
            Proof::Sn,
            Proof::HostName,
        ] {
            assert_eq!(Proof::from(proof.as_str()), proof);
        }
        assert_eq!(String::from(Proof::MachineId), "machineID");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.init.activate.fingerprints = vec![Fingerprint::new(Proof::MachineId, "")];
        config.init.cloud.active.interval_ms = 0;

        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_fingerprints() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_requires_sn_path() {
        let mut config = Config::default();
        config.init.activate.fingerprints = vec![Fingerprint::new(Proof::Sn, "  ")];
        assert!(config.validate().is_err());

        config.init.activate.fingerprints = vec![Fingerprint::new(Proof::Sn, "fv.txt")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodeinit.toml");
        std::fs::write(
            &path,
            "[[init.activate.fingerprints]]\nproof = \"systemUUID\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.init.activate.fingerprints[0].proof, Proof::SystemUuid);

        let missing = Config::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = Config::from_toml_str("[init.cloud.active]\ninterval_ms = \"soon\"\n");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
