//! Fixed-cadence progress polling for one submitted test.
//!
//! A [`PollingController`] owns one spawned tick task. The task ends on the
//! termination sentinel, on the first failed tick, or when the controller is
//! stopped or dropped. Stopping is cooperative: a request already in flight
//! is allowed to finish, but its result is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::LoadTestService;
use crate::error::PollingError;
use crate::model::{ProgressSnapshot, TestId};

/// Default delay between two progress queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Receives the outcome of each tick.
///
/// The listener is moved into the tick task, so no callback can fire after
/// the task has ended. At most one of `on_terminate` / `on_error` is called,
/// at most once, and nothing is called after it.
pub trait PollListener: Send + 'static {
    /// A tick returned. `None` is the termination sentinel and is followed by
    /// `on_terminate`.
    fn on_update(&mut self, update: Option<&ProgressSnapshot>);

    fn on_terminate(&mut self);

    fn on_error(&mut self, error: PollingError);
}

/// Handle to a running polling session.
#[derive(Debug)]
pub struct PollingController {
    id: TestId,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollingController {
    /// Spawn the tick task. The first query is issued immediately, then one
    /// every `interval`. A zero interval is raised to one millisecond.
    pub fn start<L: PollListener>(
        service: Arc<dyn LoadTestService>,
        id: TestId,
        interval: Duration,
        listener: L,
    ) -> Self {
        Self::start_with_token(service, id, interval, CancellationToken::new(), listener)
    }

    /// Like [`start`](Self::start), but cancelled through a caller-owned
    /// token. Lets the listener check the same token before applying a
    /// result.
    pub fn start_with_token<L: PollListener>(
        service: Arc<dyn LoadTestService>,
        id: TestId,
        interval: Duration,
        token: CancellationToken,
        listener: L,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        info!(test_id = %id, interval_ms = interval.as_millis() as u64, "polling started");

        let task = tokio::spawn(poll_loop(
            service,
            id.clone(),
            interval,
            token.clone(),
            listener,
        ));

        Self {
            id,
            token,
            task: Some(task),
        }
    }

    pub fn test_id(&self) -> &TestId {
        &self.id
    }

    /// Halt the schedule. Safe to call any number of times, including after
    /// the session ended on its own.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!(test_id = %self.id, "stopping poller");
            self.token.cancel();
        }
    }

    /// Whether further ticks may still fire.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait for the tick task to exit. Does not stop it.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(test_id = %self.id, "poll task aborted: {}", e);
            }
        }
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn poll_loop<L: PollListener>(
    service: Arc<dyn LoadTestService>,
    id: TestId,
    interval: Duration,
    token: CancellationToken,
    mut listener: L,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(test_id = %id, ticks, "poller stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        ticks += 1;
        debug!(test_id = %id, tick = ticks, "polling for progress");
        let result = service.fetch_update(&id).await;

        if token.is_cancelled() {
            debug!(test_id = %id, tick = ticks, "discarding response from stopped session");
            return;
        }

        match result {
            Ok(Some(snapshot)) => {
                if !snapshot.is_consistent() {
                    warn!(test_id = %id, ?snapshot, "inconsistent progress counters");
                }
                listener.on_update(Some(&snapshot));
            }
            // The listener may share the token, so cancel only once it has
            // seen the final outcome.
            Ok(None) => {
                info!(test_id = %id, ticks, "test finished");
                listener.on_update(None);
                listener.on_terminate();
                token.cancel();
                return;
            }
            Err(e) => {
                warn!(test_id = %id, tick = ticks, error = %e, "poll tick failed; polling stopped");
                listener.on_error(e);
                token.cancel();
                return;
            }
        }
    }
}
