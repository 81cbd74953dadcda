use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::Phase;

/// The two conditions that escape the engine. Everything else a callback
/// does wrong is reported to the [`ExceptionHandler`] and contained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
	/// A digest or apply was started while another one is running in the
	/// same tree.
	#[error("{phase} already in progress")]
	InProgress { phase: Phase },
	/// The watch graph did not settle within the iteration budget.
	#[error("{ttl} digest iterations reached, aborting")]
	TtlExceeded { ttl: usize },
}

/// Failure reported by a fallible callback. Handed to the tree's
/// [`ExceptionHandler`] like a caught panic, without unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
	message: String,
}

impl CallbackError {
	pub fn new(message: impl Into<String>) -> Self {
		CallbackError {
			message: message.into(),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<&str> for CallbackError {
	fn from(message: &str) -> Self {
		CallbackError::new(message)
	}
}

impl From<String> for CallbackError {
	fn from(message: String) -> Self {
		CallbackError::new(message)
	}
}

pub type CallbackResult<T = ()> = Result<T, CallbackError>;

/// Which kind of user callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
	Watch,
	Listener,
	EvalAsync,
	ApplyAsync,
	PostDigest,
	Event,
}

#[derive(Debug, Clone)]
pub struct CallbackFailure {
	pub kind: CallbackKind,
	pub message: String,
}

impl CallbackFailure {
	fn from_error(kind: CallbackKind, error: CallbackError) -> Self {
		CallbackFailure {
			kind,
			message: error.message,
		}
	}

	fn from_panic(kind: CallbackKind, payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(s) = payload.downcast_ref::<&str>() {
			s.to_string()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			"<non-string panic payload>".to_string()
		};

		CallbackFailure { kind, message }
	}
}

impl Display for CallbackFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?} callback failed: {}", self.kind, self.message)
	}
}

/// Diagnostic sink for recovered callback failures.
pub trait ExceptionHandler {
	fn handle(&self, failure: CallbackFailure);
}

/// Default sink, logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExceptionHandler;

impl ExceptionHandler for TracingExceptionHandler {
	fn handle(&self, failure: CallbackFailure) {
		tracing::error!(kind = ?failure.kind, "{}", failure.message);
	}
}

/// Runs a user callback and reports an `Err` it returns to `handler`.
///
/// Panics are caught too where the target unwinds. Targets built with
/// `panic = "abort"` (wasm32) only get the `Err` path.
pub(crate) fn guarded<R>(
	handler: &dyn ExceptionHandler,
	kind: CallbackKind,
	func: impl FnOnce() -> CallbackResult<R>,
) -> Option<R> {
	match panic::catch_unwind(AssertUnwindSafe(func)) {
		Ok(Ok(result)) => Some(result),
		Ok(Err(error)) => {
			handler.handle(CallbackFailure::from_error(kind, error));
			None
		}
		Err(payload) => {
			handler.handle(CallbackFailure::from_panic(kind, payload));
			None
		}
	}
}
