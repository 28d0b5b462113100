//! Cooperative stop handshake between a host's coordination task and the
//! task driving [`ChangeFeedPoller::poll`](super::ChangeFeedPoller::poll).
//!
//! Two flags: `requested` is set by the stopper, `running` is held by the
//! poller for the duration of a fetch cycle. A fetch blocked on a long poll
//! can only be interrupted through the feed's own `cancel`.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::client::ChangesFeed;

#[derive(Debug, Default)]
pub(crate) struct StopState {
    requested: AtomicBool,
    running: AtomicBool,
    idle: Notify,
}

impl StopState {
    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Marks a fetch cycle as running until dropped.
pub(crate) struct RunningGuard<'a>(&'a StopState);

impl<'a> RunningGuard<'a> {
    pub(crate) fn enter(state: &'a StopState) -> Self {
        state.running.store(true, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

/// Handle for stopping a [`ChangeFeedPoller`](super::ChangeFeedPoller) from
/// another task.
pub struct StopHandle<F> {
    state: Arc<StopState>,
    feed: Arc<F>,
    poll_delay: Duration,
}

impl<F> Clone for StopHandle<F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            feed: Arc::clone(&self.feed),
            poll_delay: self.poll_delay,
        }
    }
}

impl<F> std::fmt::Debug for StopHandle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("requested", &self.state.is_requested())
            .field("running", &self.state.is_running())
            .field("poll_delay", &self.poll_delay)
            .finish()
    }
}

impl<F: ChangesFeed> StopHandle<F> {
    pub(crate) fn new(state: Arc<StopState>, feed: Arc<F>, poll_delay: Duration) -> Self {
        Self {
            state,
            feed,
            poll_delay,
        }
    }

    /// Ask the poller to stop and cancel any fetch in flight. Returns
    /// immediately; no new fetch cycle starts afterwards.
    pub fn request_stop(&self) {
        self.state.requested.store(true, Ordering::SeqCst);
        self.feed.cancel();
    }

    /// Wait until no fetch cycle is running.
    ///
    /// Waits in rounds of at most the configured shutdown poll delay. Each
    /// round that ends with a cycle still running cancels the feed again, so a
    /// fetch that started just after [`request_stop`](Self::request_stop) is
    /// interrupted too.
    pub async fn wait_stopped(&self) {
        let mut rounds = 0u32;
        loop {
            let mut idle = pin!(self.state.idle.notified());
            idle.as_mut().enable();
            if !self.state.is_running() {
                tracing::debug!(rounds, "Change feed poller stopped");
                return;
            }
            if tokio::time::timeout(self.poll_delay, idle).await.is_err() {
                rounds += 1;
                if self.state.is_requested() {
                    self.feed.cancel();
                }
            }
        }
    }

    /// [`request_stop`](Self::request_stop) followed by
    /// [`wait_stopped`](Self::wait_stopped).
    pub async fn stop(&self) {
        self.request_stop();
        self.wait_stopped().await;
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.state.is_requested()
    }

    /// Whether a fetch cycle is currently executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}
