//! Local record export.
//!
//! Stands in for the cloud transport: each accepted record is written as
//! pretty JSON, or logged when no output path is configured.

use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

use nodeinit_identity::{ActivationRecord, SubmitError, Submitter};

pub struct RecordExporter {
    path: Option<PathBuf>,
}

impl RecordExporter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Submitter for RecordExporter {
    fn submit(&self, record: &ActivationRecord) -> Result<(), SubmitError> {
        let json = serde_json::to_string_pretty(record)?;

        let Some(path) = &self.path else {
            info!(digest = %record.digest(), "activation record: {}", json);
            return Ok(());
        };

        // Write then rename so readers never see a partial record
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, json)
            .with_context(|| format!("writing {}", staging.display()))?;
        std::fs::rename(&staging, path)
            .with_context(|| format!("renaming {} to {}", staging.display(), path.display()))?;

        info!(digest = %record.digest(), path = %path.display(), "activation record exported");
        Ok(())
    }
}
