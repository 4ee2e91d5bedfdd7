//! Per-item debounce timers.
//!
//! Each item owns exactly one [`DebounceSlot`]. Arming the slot cancels the
//! timer it already holds and starts a new one, so a burst of edits inside
//! the quiet window collapses into a single fire.
//!
//! Aborting a tokio task only takes effect at its next `.await`, so a timer
//! that already woke up may still run after being replaced. Every arm
//! therefore hands the timer a token, and the timer must
//! [`claim`](DebounceSlot::claim) the slot with it before doing any work. A
//! superseded timer holds an old token and its claim fails.
//!
//! Slots are driven from inside a tokio runtime; [`DebounceSlot::arm`]
//! spawns onto the current one.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Quiet window used when no configuration overrides it.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1500);

#[derive(Debug, Default)]
pub struct DebounceSlot {
    token: u64,
    timer: Option<JoinHandle<()>>,
}

impl DebounceSlot {
    /// Cancel any armed timer and arm a new one.
    ///
    /// After `window` elapses, `on_fire` is called with the token of this
    /// arm. It should [`claim`](Self::claim) the slot before acting.
    pub fn arm<F, Fut>(&mut self, window: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = self.token;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            on_fire(token).await;
        }));
        token
    }

    /// Disarm the slot. A timer that already woke can no longer claim it.
    pub fn cancel(&mut self) {
        self.token += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Take ownership of the fire for `token`.
    ///
    /// Returns `true` exactly once, for the most recent arm, and leaves the
    /// slot disarmed. The firing task keeps running; it is no longer
    /// reachable through the slot.
    pub fn claim(&mut self, token: u64) -> bool {
        if self.timer.is_some() && token == self.token {
            self.timer = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }
}

impl Drop for DebounceSlot {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
