//! Append-only account-result log.
//!
//! One line-delimited JSON record per completed worker run. Each append is a
//! single `write` of one newline-terminated buffer, so concurrent workers
//! need no lock as long as the underlying filesystem keeps line writes
//! atomic.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
}

/// One completed provisioning attempt. Never mutated after being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub proxy_region: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl AccountRecord {
    pub fn success(email: impl Into<String>, proxy_region: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            proxy_region: proxy_region.into(),
            outcome: Outcome::Success,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn failure(
        email: impl Into<String>,
        proxy_region: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            proxy_region: proxy_region.into(),
            outcome: Outcome::Failed,
            error: Some(error.into()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Debug, Clone)]
pub struct RecordWriter {
    path: PathBuf,
}

impl RecordWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single newline-terminated write.
    pub fn append(&self, record: &AccountRecord) -> Result<(), RecordError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecordError::Append {
                path: self.path.clone(),
                source: e,
            })?;

        file.write_all(line.as_bytes())
            .map_err(|e| RecordError::Append {
                path: self.path.clone(),
                source: e,
            })
    }
}
