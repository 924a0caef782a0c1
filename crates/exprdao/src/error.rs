use std::error::Error as StdError;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
	/// A cursor or statement was given arguments it cannot work with.
	#[error("illegal argument: {0}")]
	IllegalArgument(String),

	/// An operation was called while the cursor was in the wrong state.
	#[error("illegal state: {0}")]
	IllegalState(String),

	/// Cancellation was observed on the statement being executed or read.
	#[error("query interrupted")]
	QueryInterrupted,

	/// A fetched row could not be turned into a record.
	#[error("cannot materialize column `{column}`: {reason}")]
	Materialize { column: String, reason: String },

	/// Failure reported by the statement or row cursor backend.
	#[error(transparent)]
	Backend(BoxError),
}

impl Error {
	pub fn backend<E: Into<BoxError>>(err: E) -> Self {
		Self::Backend(err.into())
	}

	pub(crate) fn illegal_argument(message: impl Into<String>) -> Self {
		Self::IllegalArgument(message.into())
	}

	pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
		Self::IllegalState(message.into())
	}

	#[must_use]
	pub const fn is_interrupted(&self) -> bool {
		matches!(self, Self::QueryInterrupted)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
