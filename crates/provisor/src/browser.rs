//! Browser-automation seam.
//!
//! The actual signup automation lives behind [`SignupFlow`]; this crate only
//! assembles everything the flow needs (account, proxy, region fingerprint,
//! mailbox, scratch profile directory) and hands it over as a
//! [`ProvisionContext`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use uuid::Uuid;

use crate::config::AccountCredentials;
use crate::error::WorkerError;
use crate::mailbox::MailboxSpec;
use crate::proxy::ProxyHandle;
use crate::region::RegionProfile;

/// Scratch directory for one worker's browser profile. Created under the OS
/// temp dir with a unique name; removed recursively on drop.
#[derive(Debug)]
pub struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    pub fn create(worker_index: usize) -> Result<Self, WorkerError> {
        let path = std::env::temp_dir().join(format!(
            "provisor-profile-{}-{}",
            worker_index,
            Uuid::new_v4()
        ));
        std::fs::create_dir_all(&path).map_err(WorkerError::ProfileDir)?;
        debug!("Created profile directory {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(
                "Failed to remove profile directory {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Everything a signup flow needs for one provisioning attempt.
#[derive(Debug)]
pub struct ProvisionContext {
    pub worker_index: usize,
    pub account: AccountCredentials,
    /// `None` when proxying is disabled or acquisition failed; the flow then
    /// runs with a direct connection.
    pub proxy: Option<ProxyHandle>,
    /// Effective region the attempt runs under (proxy-derived when known,
    /// configured region otherwise).
    pub region: String,
    pub profile: RegionProfile,
    pub user_agent: String,
    pub profile_dir: PathBuf,
    pub mailbox: MailboxSpec,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

/// The signup automation itself, supplied by the embedding application.
///
/// Implementations drive a browser (or any other signup mechanism) against
/// the prepared context, opening the mailbox via
/// [`MailSession::open`](crate::mailbox::MailSession::open) when the flow
/// reaches its verification step.
#[async_trait]
pub trait SignupFlow: Send + Sync {
    async fn run(&self, ctx: &ProvisionContext) -> Result<(), WorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_dir_created_and_removed_on_drop() {
        let dir = ProfileDir::create(7).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("provisor-profile-7-"));
        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_profile_dirs_are_unique_per_attempt() {
        let a = ProfileDir::create(0).unwrap();
        let b = ProfileDir::create(0).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
