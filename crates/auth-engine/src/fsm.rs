//! Session state machine using rust-fsm.
//!
//! States are explicit rather than derived from storage checks, so the
//! controller cannot reach contradictory combinations like "authenticated
//! without a token".
//!
//! ## State diagram
//!
//! ```text
//! ┌─────────────────┐
//! │ Unauthenticated │ (initial)
//! └────────┬────────┘
//!          │ StartupCheck                      LoginSuccess (direct login)
//!          ▼                                            │
//! ┌─────────────────┐  TokenFound   ┌───────────────┐   │
//! │    Checking     │ ────────────► │   Verifying   │   │
//! └────────┬────────┘               └───────┬───────┘   │
//!          │ TokenMissing                   │           │
//!          ▼                                │ Verified  ▼
//! ┌─────────────────┐  VerifyErrored        └────► ┌───────────────┐
//! │   Refreshing    │ ◄─────────────────────       │ Authenticated │
//! └────────┬────────┘                              └───────┬───────┘
//!          │ LoginSuccess ────────────────────────────────►│
//!          │ RefreshFailed                                 │ LoggedOut /
//!          ▼                                               │ SessionRevoked
//!     Unauthenticated ◄────────────────────────────────────┘
//! ```
//!
//! `Refreshing` has no self-loop: a refresh either produces a session or
//! falls back to `Unauthenticated`, so at most one refresh attempt can
//! happen per startup cycle.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates the `session_machine` module: State, Input, StateMachine.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        StartupCheck => Checking,
        LoginSuccess => Authenticated
    },
    Checking => {
        TokenFound => Verifying,
        TokenMissing => Refreshing
    },
    Verifying => {
        // Backend confirmed the stored token
        Verified => Authenticated,
        // Backend answered 401; the session is dead
        VerifyRejected => Unauthenticated,
        // Transport or server failure; worth one refresh attempt
        VerifyErrored => Refreshing
    },
    Refreshing => {
        LoginSuccess => Authenticated,
        RefreshFailed => Unauthenticated
    },
    Authenticated => {
        LoginSuccess => Authenticated,
        LoggedOut => Unauthenticated,
        SessionRevoked => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Simplified session state for display and callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; login required.
    Unauthenticated,
    /// Startup check running (storage lookup).
    Checking,
    /// Stored token being verified with the backend.
    Verifying,
    /// Silent refresh in flight.
    Refreshing,
    /// Live session.
    Authenticated,
}

impl SessionState {
    /// True only for a live session.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    /// True for in-progress states where the UI should hold.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::Checking | SessionState::Verifying | SessionState::Refreshing
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => SessionState::Unauthenticated,
            SessionMachineState::Checking => SessionState::Checking,
            SessionMachineState::Verifying => SessionState::Verifying,
            SessionMachineState::Refreshing => SessionState::Refreshing,
            SessionMachineState::Authenticated => SessionState::Authenticated,
        }
    }
}
