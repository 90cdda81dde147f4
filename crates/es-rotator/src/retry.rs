//! Delay between retries of transient engine failures.

use std::time::Duration;

use async_trait::async_trait;

/// Waits between retry attempts.
///
/// The rotator never sleeps directly; tests swap in an implementation that
/// records the requested delays and returns immediately.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
