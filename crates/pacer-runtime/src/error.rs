#![forbid(unsafe_code)]

//! Operation failures.
//!
//! A queued action "fails" if it returns `Err` or panics. Failures never
//! abort the drain loop and never leave stale entries in the pending set; the
//! scheduler hands them to an optional [`FailureObserver`] and moves on.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use crate::dedup::OpId;

/// A boxed operation body.
pub(crate) type Action = Box<dyn FnOnce() -> Result<(), OperationError> + 'static>;

/// Why an operation did not complete normally.
#[derive(Debug)]
pub enum OperationError {
    /// The action returned an error message.
    Failed(String),
    /// The action panicked; the payload message is kept.
    Panicked(String),
    /// The action returned an arbitrary error value.
    Source(Box<dyn std::error::Error + 'static>),
}

impl OperationError {
    /// Build a [`Failed`](Self::Failed) error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wrap any error value.
    pub fn from_error<E: std::error::Error + 'static>(err: E) -> Self {
        Self::Source(Box::new(err))
    }

    /// Whether the action panicked.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panicked(message)
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "operation failed: {msg}"),
            Self::Panicked(msg) => write!(f, "operation panicked: {msg}"),
            Self::Source(err) => write!(f, "operation failed: {err}"),
        }
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<String> for OperationError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for OperationError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_string())
    }
}

/// A failed operation as seen by a [`FailureObserver`].
#[derive(Debug)]
pub struct FailureReport {
    /// Id the operation was submitted under.
    pub id: OpId,
    /// What went wrong.
    pub error: OperationError,
    /// Host time at which the failure was observed.
    pub at: Duration,
}

/// Callback invoked once per failed operation.
///
/// Observers run on the scheduler's thread with no scheduler borrow held, so
/// they may call back into the scheduler.
pub type FailureObserver = Rc<dyn Fn(&FailureReport)>;

/// Run `action`, turning a panic into [`OperationError::Panicked`].
pub(crate) fn run_guarded(action: Action) -> Result<(), OperationError> {
    match catch_unwind(AssertUnwindSafe(action)) {
        Ok(result) => result,
        Err(payload) => Err(OperationError::from_panic(payload)),
    }
}

/// Box an infallible closure as an [`Action`].
pub(crate) fn infallible<F>(action: F) -> Action
where
    F: FnOnce() + 'static,
{
    Box::new(move || {
        action();
        Ok(())
    })
}
