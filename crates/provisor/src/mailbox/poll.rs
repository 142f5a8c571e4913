//! Shared deadline loop for mailbox polling.

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// One backend fetch-and-scan pass. Failures inside a cycle are the
/// implementor's to log and swallow; a cycle reports a code or nothing.
#[async_trait]
pub(super) trait PollCycle: Send {
    async fn cycle(&mut self) -> Option<String>;
}

/// Runs cycles until one yields a code or the deadline passes, sleeping
/// `interval` between cycles. A zero timeout runs no cycle at all.
pub(super) async fn until_deadline<C: PollCycle>(
    cycle: &mut C,
    timeout: Duration,
    interval: Duration,
) -> Option<String> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(code) = cycle.cycle().await {
            return Some(code);
        }
        tokio::time::sleep(interval).await;
    }
    None
}
