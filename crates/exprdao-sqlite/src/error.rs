use core::ffi::c_int;
use std::ffi::CStr;

use exprdao_sqlite_ffi::ffi;
use thiserror::Error;

/// Result code and message reported by SQLite.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("SQLite error {code}: {message}")]
pub struct Error {
	pub code: c_int,
	pub message: String,
}

impl Error {
	pub(crate) fn misuse(message: impl Into<String>) -> Self {
		Self { code: ffi::SQLITE_MISUSE, message: message.into() }
	}

	/// The primary result code, with extended-code bits stripped.
	#[must_use]
	pub const fn primary_code(&self) -> c_int {
		self.code & 0xff
	}

	#[must_use]
	pub const fn is_interrupt(&self) -> bool {
		self.primary_code() == ffi::SQLITE_INTERRUPT
	}
}

/// Always a backend failure. An interrupt only becomes `QueryInterrupted`
/// when the statement's own token asked for it, which the row cursor decides.
impl From<Error> for exprdao::Error {
	fn from(err: Error) -> Self {
		Self::backend(err)
	}
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn check_ok(db: *mut ffi::Sqlite3, code: c_int) -> Result<()> {
	if code == ffi::SQLITE_OK { Ok(()) } else { Err(sqlite_error(db, code)) }
}

pub(crate) fn sqlite_error(db: *mut ffi::Sqlite3, code: c_int) -> Error {
	Error { code, message: db_error_message(db) }
}

fn db_error_message(db: *mut ffi::Sqlite3) -> String {
	if db.is_null() {
		return "SQLite error".to_string();
	}

	let message_ptr = unsafe { ffi::sqlite3_errmsg(db) };
	if message_ptr.is_null() {
		return "SQLite error".to_string();
	}

	unsafe { CStr::from_ptr(message_ptr).to_string_lossy().into_owned() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bare_interrupt_stays_a_backend_error() {
		let err = Error { code: ffi::SQLITE_INTERRUPT, message: "interrupted".to_string() };
		assert!(err.is_interrupt());
		assert!(matches!(exprdao::Error::from(err), exprdao::Error::Backend(_)));
	}

	#[test]
	fn extended_codes_keep_their_primary_code() {
		// SQLITE_CONSTRAINT_UNIQUE
		let err = Error { code: 2067, message: "UNIQUE constraint failed".to_string() };
		assert_eq!(err.primary_code(), 19);
		assert!(!err.is_interrupt());
	}

	#[test]
	fn other_codes_become_backend_errors() {
		let err = Error::misuse("bad call");
		let converted = exprdao::Error::from(err.clone());
		assert!(matches!(converted, exprdao::Error::Backend(_)));
		assert_eq!(converted.to_string(), err.to_string());
		assert_eq!(err.to_string(), "SQLite error 21: bad call");
	}
}
