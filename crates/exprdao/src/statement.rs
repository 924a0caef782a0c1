//! Collaborator contracts the cursor drives: a re-armable parameterized
//! statement, the row cursor one execution yields, and the cooperative
//! cancellation flag shared with whoever enforces timeouts.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::value::Value;

/// Forward-only access to the rows produced by one statement execution.
///
/// Column positions are 1-based.
pub trait RowCursor {
	/// Moves to the next row, returning `false` once the rows are exhausted.
	fn advance(&mut self) -> Result<bool>;

	fn column_count(&self) -> usize;

	fn column_label(&self, position: usize) -> Option<String>;

	/// Value of a column of the row the cursor is positioned on.
	fn value(&self, position: usize) -> Result<Value>;
}

/// One parameterized query. Ownership passes to the cursor that runs it,
/// which becomes responsible for closing it.
pub trait StatementHandle {
	type Rows: RowCursor;

	/// Runs the statement with its current bindings. Fails when the statement
	/// was already executed and has not been [`reset`](Self::reset) since.
	fn execute(&mut self) -> Result<Self::Rows>;

	fn is_executed(&self) -> bool;

	/// Re-arms an executed statement so it can run again with new bindings.
	fn reset(&mut self) -> Result<()>;

	fn bind(&mut self, position: usize, value: Value) -> Result<()>;

	fn cancel_token(&self) -> &CancelToken;

	fn is_canceled(&self) -> bool {
		self.cancel_token().is_canceled()
	}

	fn cancel(&self) {
		self.cancel_token().cancel();
	}

	fn close(&mut self) -> Result<()>;

	fn is_closed(&self) -> bool;
}

type CancelHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct CancelState {
	canceled: AtomicBool,
	hook: Option<CancelHook>,
}

/// Cooperative cancellation flag. Clones share the same flag, so a token
/// handed to a watchdog thread cancels the statement it was taken from.
#[derive(Clone, Default)]
pub struct CancelToken {
	state: Arc<CancelState>,
}

impl CancelToken {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Token that also runs `hook` the first time it is canceled, e.g. to
	/// interrupt a backend call already in flight.
	pub fn with_hook(hook: impl Fn() + Send + Sync + 'static) -> Self {
		Self { state: Arc::new(CancelState { canceled: AtomicBool::new(false), hook: Some(Box::new(hook)) }) }
	}

	pub fn cancel(&self) {
		if self.state.canceled.swap(true, Ordering::AcqRel) {
			return;
		}
		if let Some(hook) = &self.state.hook {
			hook();
		}
	}

	#[must_use]
	pub fn is_canceled(&self) -> bool {
		self.state.canceled.load(Ordering::Acquire)
	}
}

impl fmt::Debug for CancelToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CancelToken")
			.field("canceled", &self.is_canceled())
			.field("has_hook", &self.state.hook.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;

	#[test]
	fn clones_share_the_flag() {
		let token = CancelToken::new();
		let watchdog = token.clone();
		assert!(!token.is_canceled());
		watchdog.cancel();
		assert!(token.is_canceled());
	}

	#[test]
	fn hook_runs_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let token = CancelToken::with_hook(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		token.cancel();
		token.cancel();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn cancel_from_another_thread_is_visible() {
		let token = CancelToken::new();
		let remote = token.clone();
		std::thread::spawn(move || remote.cancel()).join().expect("join watchdog");
		assert!(token.is_canceled());
	}
}
