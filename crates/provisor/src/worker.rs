//! One provisioning attempt: proxy, region, profile, mailbox, signup flow.

use std::time::Duration;

use log::{info, warn};
use tracing::info_span;

use crate::browser::{ProfileDir, ProvisionContext, SignupFlow};
use crate::config::{AccountCredentials, Config};
use crate::mailbox::MailboxSpec;
use crate::proxy::ProxyProvider;
use crate::record::AccountRecord;
use crate::region::RegionProfiles;

/// Selects the mailbox backend for an account. OAuth material present means
/// IMAP against the account's own inbox; otherwise a disposable hosted
/// address is allocated by the flow.
fn mailbox_spec_for(account: &AccountCredentials, config: &Config) -> MailboxSpec {
    match (&account.client_id, &account.refresh_token) {
        (Some(client_id), Some(refresh_token)) => MailboxSpec::Imap {
            address: account.email.clone(),
            client_id: client_id.clone(),
            refresh_token: secrecy::SecretString::from(refresh_token.clone()),
            token_url: None,
            imap_host: None,
        },
        _ => MailboxSpec::Hosted {
            api_url: config.email.api_url.clone(),
        },
    }
}

/// Runs one account end to end and reports the outcome as a record. Never
/// returns an error: every failure mode becomes a failure record so the batch
/// always accounts for every input account.
pub async fn run_account(
    index: usize,
    account: AccountCredentials,
    config: &Config,
    profiles: &RegionProfiles,
    flow: &dyn SignupFlow,
) -> AccountRecord {
    let span = info_span!("provision", worker = index, email = %account.email);
    let _guard = span.entered();

    let http_timeout = Duration::from_secs(config.http.timeout);

    // Proxy acquisition is optional by configuration and soft-fails: a worker
    // without a proxy still runs, direct.
    let proxy = if config.region.use_proxy {
        match ProxyProvider::new(&config.region, http_timeout) {
            Ok(provider) => {
                let handle = provider.acquire().await;
                match &handle {
                    Some(h) => info!("Using proxy {}", h.redacted()),
                    None => warn!("Proxy acquisition failed, continuing without a proxy"),
                }
                handle
            }
            Err(e) => {
                warn!("Could not build proxy client: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Proxy-derived region wins over the configured one.
    let region = proxy
        .as_ref()
        .and_then(|h| h.resolved.as_ref())
        .map(|hint| hint.region.clone())
        .unwrap_or_else(|| config.region.current.clone());
    info!("Operating region: {}", region);

    let profile = profiles.profile(&region).clone();
    let user_agent = profiles.user_agent(&region, config.region.device_type);

    let profile_dir = match ProfileDir::create(index) {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Failed to prepare profile directory: {}", e);
            return AccountRecord::failure(&account.email, &region, e.to_string());
        }
    };

    let ctx = ProvisionContext {
        worker_index: index,
        account: account.clone(),
        proxy,
        region: region.clone(),
        profile,
        user_agent,
        profile_dir: profile_dir.path().to_path_buf(),
        mailbox: mailbox_spec_for(&account, config),
        wait_timeout: Duration::from_secs(config.email.wait_timeout),
        poll_interval: Duration::from_secs(config.email.poll_interval),
        http_timeout,
    };

    match flow.run(&ctx).await {
        Ok(()) => {
            info!("Account provisioned");
            AccountRecord::success(&account.email, &region)
        }
        Err(e) => {
            warn!("Provisioning failed: {}", e);
            AccountRecord::failure(&account.email, &region, e.to_string())
        }
    }
}
