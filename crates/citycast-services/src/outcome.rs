//! Outcome slot state machine.
//!
//! `Idle → Pending → {Succeeded, Failed}`. A new trigger may start from any
//! state; the offline short-circuit goes straight to `Failed`.

use citycast_core::FetchError;

/// Observable progress of one leg of the fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Idle,
    Pending,
    Succeeded(T),
    Failed(String),
}

impl<T> Default for FetchOutcome<T> {
    fn default() -> Self {
        FetchOutcome::Idle
    }
}

impl<T> FetchOutcome<T> {
    pub fn failed(error: &FetchError) -> Self {
        FetchOutcome::Failed(error.to_string())
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, FetchOutcome::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchOutcome::Pending)
    }

    /// True once the trigger that owns the slot has finished, either way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchOutcome::Succeeded(_) | FetchOutcome::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchOutcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            FetchOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Idle => "idle",
            FetchOutcome::Pending => "pending",
            FetchOutcome::Succeeded(_) => "succeeded",
            FetchOutcome::Failed(_) => "failed",
        }
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Nothing returns to `Idle`, and a success is only reachable from `Pending`.
    pub fn can_transition_to(&self, next: &FetchOutcome<T>) -> bool {
        match next {
            FetchOutcome::Idle => false,
            FetchOutcome::Pending | FetchOutcome::Failed(_) => true,
            FetchOutcome::Succeeded(_) => self.is_pending(),
        }
    }
}
