//! Response state for a streamed download
//!
//! Once bytes have gone out the status code is fixed, so a pipeline failure
//! can only be reported while nothing has been sent yet.

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Idle,
    Spawned,
    Streaming,
    FailedBeforeStream,
    FailedAfterStream,
    Disconnected,
    Done,
}

impl ResponseState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResponseState::FailedBeforeStream
                | ResponseState::FailedAfterStream
                | ResponseState::Disconnected
                | ResponseState::Done
        )
    }
}

/// What to do with a pipeline failure in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Send an error status and JSON body
    Respond,
    /// Headers are out; log and let the stream end
    LogOnly,
    /// Nobody is listening
    Ignore,
}

/// Shared between the handler, the response body and the outcome watcher
#[derive(Debug, Clone)]
pub struct ResponseTracker {
    state: Arc<Mutex<ResponseState>>,
}

impl Default for ResponseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState::Idle)),
        }
    }

    pub fn state(&self) -> ResponseState {
        *self.lock()
    }

    pub fn spawned(&self) {
        self.transition(|state| match state {
            ResponseState::Idle => Some(ResponseState::Spawned),
            _ => None,
        });
    }

    /// First byte arrived; false if the client is already gone
    pub fn streaming(&self) -> bool {
        self.transition(|state| match state {
            ResponseState::Spawned => Some(ResponseState::Streaming),
            _ => None,
        })
    }

    /// Returns true when this call is the one that observed the disconnect
    pub fn disconnected(&self) -> bool {
        self.transition(|state| match state {
            ResponseState::Spawned | ResponseState::Streaming => {
                Some(ResponseState::Disconnected)
            }
            _ => None,
        })
    }

    pub fn failed(&self) -> FailureAction {
        let mut state = self.lock();
        match *state {
            ResponseState::Idle | ResponseState::Spawned => {
                *state = ResponseState::FailedBeforeStream;
                FailureAction::Respond
            }
            ResponseState::Streaming => {
                *state = ResponseState::FailedAfterStream;
                FailureAction::LogOnly
            }
            ResponseState::FailedBeforeStream
            | ResponseState::FailedAfterStream
            | ResponseState::Disconnected
            | ResponseState::Done => FailureAction::Ignore,
        }
    }

    pub fn completed(&self) {
        self.transition(|state| match state {
            ResponseState::Streaming => Some(ResponseState::Done),
            _ => None,
        });
    }

    fn transition(&self, next: impl FnOnce(ResponseState) -> Option<ResponseState>) -> bool {
        let mut state = self.lock();
        match next(*state) {
            Some(new_state) => {
                *state = new_state;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
