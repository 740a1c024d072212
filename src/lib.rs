//! EchoBot - Automated Livestreaming Agent
//!
//! A Rust service that drives an OBS scene/source graph to produce a
//! continuous live broadcast:
//! - Walks an ordered, cyclic playlist of scenes forever
//! - Rotates background scenes/sources via a cooperative cycler task
//! - Gates dynamically-generated segments on media readiness
//! - Ducks background music while foreground voice plays
//! - Generates AMA voice replies from recent chat activity

pub mod ama;
pub mod config;
pub mod cycler;
pub mod error;
pub mod events;
pub mod flow;
pub mod media;
pub mod obs;
pub mod playlist;
pub mod schedule;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{EchoBotError, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative cancellation token shared between the playlist driver and
/// background cycler tasks.
///
/// The transition is one-directional: once cancelled, a token never becomes
/// live again. `cancel` is idempotent. Tasks observe the token either by
/// polling [`CancelToken::is_cancelled`] between short sleeps or by awaiting
/// [`CancelToken::cancelled`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation and wake all waiters.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            // Re-check after registering so a cancel between the load and the
            // notified() call cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep for `duration` in slices of at most `poll_interval`, re-checking the
/// token after each slice so a stop request takes effect within one slice
/// rather than blocking for the full duration.
pub async fn sleep_interruptibly(
    duration: Duration,
    poll_interval: Duration,
    cancel: &CancelToken,
) {
    let poll = if poll_interval.is_zero() {
        duration
    } else {
        poll_interval
    };
    let mut slept = Duration::ZERO;
    while slept < duration && !cancel.is_cancelled() {
        let slice = poll.min(duration - slept);
        tokio::time::sleep(slice).await;
        slept += slice;
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_one_directional() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        // Idempotent
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interruptibly_runs_full_duration() {
        let token = CancelToken::new();
        let start = tokio::time::Instant::now();
        sleep_interruptibly(Duration::from_secs(10), Duration::from_millis(500), &token).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interruptibly_returns_within_one_slice_of_cancel() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let start = tokio::time::Instant::now();
        let handle = tokio::spawn(async move {
            sleep_interruptibly(
                Duration::from_secs(100),
                Duration::from_millis(500),
                &sleeper,
            )
            .await;
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
        handle.await.unwrap();
        // One 500 ms slice of latency at most, not the full 100 s
        assert!(start.elapsed() <= Duration::from_millis(850));
    }
}
