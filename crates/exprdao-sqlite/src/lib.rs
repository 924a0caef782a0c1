//! SQLite backend for `exprdao`: a thread-safe [`Connection`] that hands out
//! [`SqliteStatement`]s for a query cursor to own, page and cancel.

mod connection;
mod error;
mod statement;

pub use connection::Connection;
pub use error::{Error, Result};
pub use exprdao_sqlite_ffi::ffi;
pub use statement::{SqliteRows, SqliteStatement};

pub fn sqlite_lib_version() -> String {
	exprdao_sqlite_ffi::sqlite_lib_version()
}

pub fn sqlite_lib_version_number() -> i32 {
	exprdao_sqlite_ffi::sqlite_lib_version_number()
}

pub fn sqlite_source_id() -> String {
	exprdao_sqlite_ffi::sqlite_source_id()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sqlite_version_number_is_sane() {
		assert!(sqlite_lib_version_number() >= 3_022_000);
		assert!(!sqlite_source_id().is_empty());
	}
}
