//! Identity proof resolution.
//!
//! Each configured [`Fingerprint`] names a proof kind. Resolving it yields a
//! single non-empty string read from the host: a kernel-exposed identifier,
//! the host name, or the contents of a serial-number file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use nodeinit_core::{Fingerprint, Proof};

use crate::error::ProofError;

/// Linux location of the per-boot random identifier.
pub const BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";
/// DMI product UUID, readable by root on most x86 hosts.
pub const SYSTEM_UUID_PATH: &str = "/sys/class/dmi/id/product_uuid";
/// systemd machine id, with the dbus location as fallback.
pub const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Source of system-exposed identity values.
///
/// Returning `None` means the value is absent or unreadable; the resolver
/// turns that into [`ProofError::ValueNotFound`].
pub trait SystemProbe: Send + Sync {
    fn boot_id(&self) -> Option<String>;
    fn system_uuid(&self) -> Option<String>;
    fn machine_id(&self) -> Option<String>;
    fn host_name(&self) -> Option<String>;
}

/// Reads identity values from the local host.
#[derive(Debug, Clone)]
pub struct HostProbe {
    boot_id_path: PathBuf,
    system_uuid_path: PathBuf,
    machine_id_paths: Vec<PathBuf>,
}

impl HostProbe {
    pub fn new() -> Self {
        Self {
            boot_id_path: PathBuf::from(BOOT_ID_PATH),
            system_uuid_path: PathBuf::from(SYSTEM_UUID_PATH),
            machine_id_paths: MACHINE_ID_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Probe a host filesystem mounted somewhere other than `/`, such as the
    /// host root bind-mounted into a container.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let rebase = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            boot_id_path: rebase(BOOT_ID_PATH),
            system_uuid_path: rebase(SYSTEM_UUID_PATH),
            machine_id_paths: MACHINE_ID_PATHS.iter().map(|p| rebase(p)).collect(),
        }
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for HostProbe {
    fn boot_id(&self) -> Option<String> {
        read_trimmed(&self.boot_id_path)
    }

    fn system_uuid(&self) -> Option<String> {
        read_trimmed(&self.system_uuid_path)
    }

    fn machine_id(&self) -> Option<String> {
        self.machine_id_paths.iter().find_map(|p| read_trimmed(p))
    }

    fn host_name(&self) -> Option<String> {
        let name = hostname::get().ok()?.into_string().ok()?;
        non_empty(name)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => non_empty(raw),
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "system identity source unreadable");
            None
        }
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A proof together with the value it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProof {
    pub proof: Proof,
    pub value: String,
}

/// Resolves one proof descriptor at a time against a [`SystemProbe`].
pub struct ProofResolver<'a> {
    probe: &'a dyn SystemProbe,
}

impl<'a> ProofResolver<'a> {
    pub fn new(probe: &'a dyn SystemProbe) -> Self {
        Self { probe }
    }

    pub fn resolve(&self, fingerprint: &Fingerprint) -> Result<String, ProofError> {
        let value = match &fingerprint.proof {
            Proof::BootId => self.probe.boot_id(),
            Proof::SystemUuid => self.probe.system_uuid(),
            Proof::MachineId => self.probe.machine_id(),
            Proof::HostName => self.probe.host_name(),
            Proof::Sn => return read_serial_number(Path::new(&fingerprint.value)),
            other @ Proof::Other(_) => return Err(ProofError::TypeNotSupported(other.clone())),
        };

        value
            .and_then(non_empty)
            .ok_or_else(|| ProofError::ValueNotFound(fingerprint.proof.clone()))
    }
}

fn read_serial_number(path: &Path) -> Result<String, ProofError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ProofError::SerialNumberFile {
        path: path.to_path_buf(),
        source,
    })?;
    non_empty(raw).ok_or(ProofError::ValueNotFound(Proof::Sn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StaticProbe {
        boot_id: Option<String>,
        system_uuid: Option<String>,
        machine_id: Option<String>,
        host_name: Option<String>,
    }

    impl SystemProbe for StaticProbe {
        fn boot_id(&self) -> Option<String> {
            self.boot_id.clone()
        }
        fn system_uuid(&self) -> Option<String> {
            self.system_uuid.clone()
        }
        fn machine_id(&self) -> Option<String> {
            self.machine_id.clone()
        }
        fn host_name(&self) -> Option<String> {
            self.host_name.clone()
        }
    }

    #[test]
    fn test_missing_system_values() {
        let probe = StaticProbe::default();
        let resolver = ProofResolver::new(&probe);

        for proof in [
            Proof::BootId,
            Proof::SystemUuid,
            Proof::MachineId,
            Proof::HostName,
        ] {
            let err = resolver
                .resolve(&Fingerprint::new(proof.clone(), ""))
                .unwrap_err();
            assert!(matches!(err, ProofError::ValueNotFound(p) if p == proof));
        }
    }

    #[test]
    fn test_blank_system_value_is_not_found() {
        let probe = StaticProbe {
            machine_id: Some(" \n".to_string()),
            ..Default::default()
        };
        let resolver = ProofResolver::new(&probe);

        let err = resolver
            .resolve(&Fingerprint::new(Proof::MachineId, ""))
            .unwrap_err();
        assert!(matches!(err, ProofError::ValueNotFound(Proof::MachineId)));
    }

    #[test]
    fn test_resolves_system_values() {
        let probe = StaticProbe {
            boot_id: Some("b0".to_string()),
            system_uuid: Some("u0".to_string()),
            machine_id: Some("m0".to_string()),
            host_name: Some("edge-01".to_string()),
        };
        let resolver = ProofResolver::new(&probe);

        assert_eq!(resolver.resolve(&Fingerprint::new(Proof::BootId, "")).unwrap(), "b0");
        assert_eq!(resolver.resolve(&Fingerprint::new(Proof::SystemUuid, "")).unwrap(), "u0");
        assert_eq!(resolver.resolve(&Fingerprint::new(Proof::MachineId, "")).unwrap(), "m0");
        assert_eq!(
            resolver.resolve(&Fingerprint::new(Proof::HostName, "")).unwrap(),
            "edge-01"
        );
    }

    #[test]
    fn test_unsupported_proof() {
        let probe = StaticProbe::default();
        let resolver = ProofResolver::new(&probe);

        let err = resolver
            .resolve(&Fingerprint::new(Proof::from("Error"), ""))
            .unwrap_err();
        assert!(matches!(err, ProofError::TypeNotSupported(Proof::Other(ref name)) if name == "Error"));
    }

    #[test]
    fn test_serial_number_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sn.txt");
        std::fs::write(&path, "SN-0042\n").unwrap();

        let probe = StaticProbe::default();
        let resolver = ProofResolver::new(&probe);
        let value = resolver
            .resolve(&Fingerprint::new(Proof::Sn, path.to_string_lossy()))
            .unwrap();
        assert_eq!(value, "SN-0042");
    }

    #[test]
    fn test_missing_serial_number_file_is_io_error() {
        let probe = StaticProbe::default();
        let resolver = ProofResolver::new(&probe);

        let err = resolver
            .resolve(&Fingerprint::new(Proof::Sn, "fv.txt"))
            .unwrap_err();
        match err {
            ProofError::SerialNumberFile { path, source } => {
                assert_eq!(path, PathBuf::from("fv.txt"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected an I/O failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_serial_number_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sn.txt");
        std::fs::write(&path, "\n").unwrap();

        let probe = StaticProbe::default();
        let resolver = ProofResolver::new(&probe);
        let err = resolver
            .resolve(&Fingerprint::new(Proof::Sn, path.to_string_lossy()))
            .unwrap_err();
        assert!(matches!(err, ProofError::ValueNotFound(Proof::Sn)));
    }

    #[test]
    fn test_host_probe_with_root() {
        let root = tempfile::tempdir().unwrap();
        let kernel = root.path().join("proc/sys/kernel/random");
        std::fs::create_dir_all(&kernel).unwrap();
        std::fs::write(kernel.join("boot_id"), "6f1c\n").unwrap();
        let dbus = root.path().join("var/lib/dbus");
        std::fs::create_dir_all(&dbus).unwrap();
        std::fs::write(dbus.join("machine-id"), "abc123\n").unwrap();

        let probe = HostProbe::with_root(root.path());
        assert_eq!(probe.boot_id().as_deref(), Some("6f1c"));
        assert_eq!(probe.machine_id().as_deref(), Some("abc123"));
        assert_eq!(probe.system_uuid(), None);
    }
}
