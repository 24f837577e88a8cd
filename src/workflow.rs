//! The submit-then-poll state machine for a single load test run.
//!
//! ```text
//! Idle --submit--> Submitting --ok(id)--> Polling --sentinel--> Completed
//!                       |                    |
//!                       +--error--> Failed <-+--tick error
//! ```
//!
//! `Completed` and `Failed` are terminal. Running another test needs a new
//! [`TestWorkflow`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::LoadTestService;
use crate::error::{PollingError, WorkflowError};
use crate::model::{ProgressSnapshot, TestConfigDraft, TestId};
use crate::poller::{PollListener, PollingController, DEFAULT_POLL_INTERVAL};

/// Observable state of a workflow.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Submitting,
    Polling {
        id: TestId,
        latest: Option<ProgressSnapshot>,
    },
    Completed {
        id: TestId,
        last: Option<ProgressSnapshot>,
    },
    Failed {
        /// Set when the failure happened after the service accepted the test.
        id: Option<TestId>,
        message: String,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Polling { .. } => "polling",
            WorkflowState::Completed { .. } => "completed",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed { .. } | WorkflowState::Failed { .. }
        )
    }

    pub fn test_id(&self) -> Option<&TestId> {
        match self {
            WorkflowState::Polling { id, .. } | WorkflowState::Completed { id, .. } => Some(id),
            WorkflowState::Failed { id, .. } => id.as_ref(),
            WorkflowState::Idle | WorkflowState::Submitting => None,
        }
    }

    /// Most recent progress snapshot, if any arrived.
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        match self {
            WorkflowState::Polling { latest, .. } => latest.as_ref(),
            WorkflowState::Completed { last, .. } => last.as_ref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::Failed { message, .. } => write!(f, "failed: {}", message),
            other => match other.test_id() {
                Some(id) => write!(f, "{} ({})", other.name(), id),
                None => write!(f, "{}", other.name()),
            },
        }
    }
}

/// One load test run, from submission to its terminal state.
///
/// Dropping the workflow stops its poller.
pub struct TestWorkflow {
    service: Arc<dyn LoadTestService>,
    poll_interval: Duration,
    state: Arc<watch::Sender<WorkflowState>>,
    poller: Option<PollingController>,
}

impl TestWorkflow {
    pub fn new(service: Arc<dyn LoadTestService>) -> Self {
        Self::with_poll_interval(service, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(service: Arc<dyn LoadTestService>, poll_interval: Duration) -> Self {
        let (tx, _) = watch::channel(WorkflowState::Idle);
        Self {
            service,
            poll_interval,
            state: Arc::new(tx),
            poller: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    /// Validate `draft`, submit it, and start polling on success.
    ///
    /// A validation failure leaves the workflow `Idle` and sends nothing. A
    /// submission failure moves it to `Failed`.
    pub async fn submit(&mut self, draft: TestConfigDraft) -> Result<TestId, WorkflowError> {
        {
            let current = self.state.borrow();
            if !matches!(*current, WorkflowState::Idle) {
                return Err(WorkflowError::AlreadyStarted {
                    state: current.name(),
                });
            }
        }

        let config = draft.validate()?;
        self.state.send_replace(WorkflowState::Submitting);

        let id = match self.service.submit(&config).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "submission failed");
                self.state.send_replace(WorkflowState::Failed {
                    id: None,
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        info!(test_id = %id, "test submitted; polling for progress");
        self.state.send_replace(WorkflowState::Polling {
            id: id.clone(),
            latest: None,
        });

        let token = CancellationToken::new();
        let listener = WorkflowListener {
            id: id.clone(),
            state: Arc::clone(&self.state),
            token: token.clone(),
        };
        self.stop();
        self.poller = Some(PollingController::start_with_token(
            Arc::clone(&self.service),
            id.clone(),
            self.poll_interval,
            token,
            listener,
        ));

        Ok(id)
    }

    /// Resolve once the workflow reaches `Completed` or `Failed`.
    ///
    /// Never resolves for a workflow that was stopped while polling.
    pub async fn wait_terminal(&self) -> WorkflowState {
        let mut rx = self.state.subscribe();
        let result = rx.wait_for(WorkflowState::is_terminal).await;
        match result {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.state(),
        }
    }

    /// Stop polling. The state stays where it is.
    ///
    /// The session is cancelled while the state lock is held, so once this
    /// returns no poll result can change the state.
    pub fn stop(&mut self) {
        if let Some(poller) = self.poller.take() {
            self.state.send_if_modified(|_| {
                poller.stop();
                false
            });
        }
    }
}

impl Drop for TestWorkflow {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Applies poll results to the workflow state, ignoring anything that does
/// not belong to the session it was created for or that arrives after the
/// session was stopped.
///
/// The token is checked inside the `send_if_modified` closure, under the same
/// lock [`TestWorkflow::stop`] cancels under.
struct WorkflowListener {
    id: TestId,
    state: Arc<watch::Sender<WorkflowState>>,
    token: CancellationToken,
}

impl WorkflowListener {
    fn owns(&self, id: &TestId) -> bool {
        *id == self.id && !self.token.is_cancelled()
    }
}

impl PollListener for WorkflowListener {
    fn on_update(&mut self, update: Option<&ProgressSnapshot>) {
        let Some(snapshot) = update else {
            return;
        };
        self.state.send_if_modified(|state| match state {
            WorkflowState::Polling { id, latest } if self.owns(id) => {
                *latest = Some(*snapshot);
                true
            }
            _ => false,
        });
    }

    fn on_terminate(&mut self) {
        self.state.send_if_modified(|state| match state {
            WorkflowState::Polling { id, latest } if self.owns(id) => {
                info!(test_id = %id, "workflow completed");
                let completed = WorkflowState::Completed {
                    id: id.clone(),
                    last: latest.take(),
                };
                *state = completed;
                true
            }
            _ => false,
        });
    }

    fn on_error(&mut self, error: PollingError) {
        self.state.send_if_modified(|state| match state {
            WorkflowState::Polling { id, .. } if self.owns(id) => {
                let failed = WorkflowState::Failed {
                    id: Some(id.clone()),
                    message: error.to_string(),
                };
                *state = failed;
                true
            }
            _ => false,
        });
    }
}
