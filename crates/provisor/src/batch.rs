//! Batch scheduler: one OS thread per account, staggered startup, one result
//! record per input account no matter what.
//!
//! Workers are isolated in their own threads with their own current-thread
//! runtimes, so one panicking signup flow never takes down its siblings. The
//! result channel is sized to the worker count, so a worker's final send can
//! never block behind a slow collector.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::browser::SignupFlow;
use crate::config::Config;
use crate::error::WorkerError;
use crate::record::{AccountRecord, RecordWriter};
use crate::region::RegionProfiles;
use crate::worker::run_account;

pub struct BatchScheduler {
    config: Arc<Config>,
    profiles: Arc<RegionProfiles>,
    flow: Arc<dyn SignupFlow>,
    records: Arc<RecordWriter>,
}

impl BatchScheduler {
    pub fn new(config: Config, flow: Arc<dyn SignupFlow>) -> Self {
        let profiles = RegionProfiles::new(config.region.profiles.clone());
        let records = RecordWriter::new(&config.batch.record_path);
        Self {
            config: Arc::new(config),
            profiles: Arc::new(profiles),
            flow,
            records: Arc::new(records),
        }
    }

    pub fn record_writer(&self) -> Arc<RecordWriter> {
        Arc::clone(&self.records)
    }

    /// Runs up to `worker_count` accounts concurrently (all configured
    /// accounts when `None`; always clamped to the account count). Worker `i`
    /// sleeps `i * stagger_seconds` before starting, appends its own record
    /// as soon as it finishes, and the batch returns one record per launched
    /// account, in input order. A panicked worker is reported as a failure
    /// record, never silently dropped.
    pub fn run_batch(&self, worker_count: Option<usize>) -> Vec<AccountRecord> {
        let accounts = &self.config.accounts;
        let count = worker_count
            .unwrap_or(accounts.len())
            .min(accounts.len());
        if count == 0 {
            warn!("No accounts to provision");
            return Vec::new();
        }

        let stagger = Duration::from_secs(self.config.batch.stagger_seconds);
        info!(
            "Launching {} workers ({}s stagger)",
            count,
            stagger.as_secs()
        );

        let (tx, rx) = crossbeam_channel::bounded::<(usize, AccountRecord)>(count);

        let mut handles = Vec::with_capacity(count);
        let mut unspawned: Vec<(usize, AccountRecord)> = Vec::new();
        for (i, account) in accounts.iter().take(count).cloned().enumerate() {
            let config = Arc::clone(&self.config);
            let profiles = Arc::clone(&self.profiles);
            let flow = Arc::clone(&self.flow);
            let records = Arc::clone(&self.records);
            let tx = tx.clone();

            let spawn = std::thread::Builder::new()
                .name(format!("provision-{}", i))
                .spawn(move || {
                    if !stagger.is_zero() && i > 0 {
                        std::thread::sleep(stagger * i as u32);
                    }

                    let record = match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(run_account(
                            i,
                            account,
                            &config,
                            &profiles,
                            flow.as_ref(),
                        )),
                        Err(e) => AccountRecord::failure(
                            &account_email_at(&config, i),
                            &config.region.current,
                            format!("Failed to build worker runtime: {}", e),
                        ),
                    };

                    if let Err(e) = records.append(&record) {
                        warn!("Failed to persist record for worker {}: {}", i, e);
                    }

                    // Capacity equals the worker count, so this never blocks.
                    let _ = tx.send((i, record));
                });

            match spawn {
                Ok(handle) => handles.push((i, handle)),
                Err(e) => {
                    let err = WorkerError::SpawnFailed(e.to_string());
                    warn!("{}", err);
                    let record = AccountRecord::failure(
                        &account_email_at(&self.config, i),
                        &self.config.region.current,
                        err.to_string(),
                    );
                    if let Err(e) = self.records.append(&record) {
                        warn!("Failed to persist record for worker {}: {}", i, e);
                    }
                    unspawned.push((i, record));
                }
            }
        }
        drop(tx);

        let mut panicked = Vec::new();
        for (i, handle) in handles {
            if handle.join().is_err() {
                warn!("Worker {} panicked", i);
                panicked.push(i);
            }
        }

        let mut slots: Vec<Option<AccountRecord>> = vec![None; count];
        for (i, record) in rx.iter() {
            slots[i] = Some(record);
        }
        for (i, record) in unspawned {
            slots[i] = Some(record);
        }
        for i in panicked {
            if slots[i].is_none() {
                let record = AccountRecord::failure(
                    &account_email_at(&self.config, i),
                    &self.config.region.current,
                    "worker panicked",
                );
                if let Err(e) = self.records.append(&record) {
                    warn!("Failed to persist record for worker {}: {}", i, e);
                }
                slots[i] = Some(record);
            }
        }

        let results: Vec<AccountRecord> = slots.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.succeeded()).count();
        info!(
            "Batch finished: {}/{} accounts provisioned",
            succeeded,
            results.len()
        );
        results
    }

    /// Provisions a single configured account, without stagger. Intended for
    /// one-off runs and retries of an account that failed in a batch.
    pub async fn provision_one(&self, index: usize) -> Result<AccountRecord, WorkerError> {
        let account = self
            .config
            .accounts
            .get(index)
            .cloned()
            .ok_or(WorkerError::NoSuchAccount(index))?;

        let record = run_account(
            index,
            account,
            &self.config,
            &self.profiles,
            self.flow.as_ref(),
        )
        .await;

        if let Err(e) = self.records.append(&record) {
            warn!("Failed to persist record for account {}: {}", index, e);
        }
        Ok(record)
    }
}

fn account_email_at(config: &Config, index: usize) -> String {
    config
        .accounts
        .get(index)
        .map(|a| a.email.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ProvisionContext;
    use crate::config::AccountCredentials;
    use crate::record::Outcome;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubFlow {
        fail_for: Option<String>,
    }

    #[async_trait]
    impl SignupFlow for StubFlow {
        async fn run(&self, ctx: &ProvisionContext) -> Result<(), WorkerError> {
            if self.fail_for.as_deref() == Some(ctx.account.email.as_str()) {
                Err(WorkerError::Signup("rejected".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn test_config(dir: &TempDir, emails: &[&str]) -> Config {
        let mut config = Config::default();
        config.batch.stagger_seconds = 0;
        config.batch.record_path = dir
            .path()
            .join("accounts.jsonl")
            .to_string_lossy()
            .into_owned();
        config.accounts = emails
            .iter()
            .map(|e| AccountCredentials {
                email: e.to_string(),
                client_id: None,
                refresh_token: None,
            })
            .collect();
        config
    }

    #[test]
    fn test_batch_records_every_account_in_order() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["a@example.com", "b@example.com", "c@example.com"]);
        let flow = Arc::new(StubFlow {
            fail_for: Some("b@example.com".to_string()),
        });

        let scheduler = BatchScheduler::new(config, flow);
        let results = scheduler.run_batch(None);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].email, "a@example.com");
        assert_eq!(results[1].email, "b@example.com");
        assert_eq!(results[2].email, "c@example.com");
        assert_eq!(results[0].outcome, Outcome::Success);
        assert_eq!(results[1].outcome, Outcome::Failed);
        assert_eq!(results[2].outcome, Outcome::Success);

        let content =
            std::fs::read_to_string(dir.path().join("accounts.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_worker_count_clamped_to_accounts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["a@example.com"]);
        let scheduler = BatchScheduler::new(config, Arc::new(StubFlow { fail_for: None }));
        let results = scheduler.run_batch(Some(10));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &[]);
        let scheduler = BatchScheduler::new(config, Arc::new(StubFlow { fail_for: None }));
        assert!(scheduler.run_batch(None).is_empty());
        assert!(!dir.path().join("accounts.jsonl").exists());
    }

    #[tokio::test]
    async fn test_provision_one_rejects_unknown_index() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["a@example.com"]);
        let scheduler = BatchScheduler::new(config, Arc::new(StubFlow { fail_for: None }));
        assert!(matches!(
            scheduler.provision_one(5).await,
            Err(WorkerError::NoSuchAccount(5))
        ));
    }

    #[tokio::test]
    async fn test_provision_one_appends_record() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["a@example.com"]);
        let scheduler = BatchScheduler::new(config, Arc::new(StubFlow { fail_for: None }));
        let record = scheduler.provision_one(0).await.unwrap();
        assert!(record.succeeded());

        let content =
            std::fs::read_to_string(dir.path().join("accounts.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
