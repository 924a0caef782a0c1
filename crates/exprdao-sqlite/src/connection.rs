use core::ffi::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use exprdao::Value;
use exprdao_sqlite_ffi::ffi;
use tracing::{debug, trace};

use crate::error::{Error, Result, sqlite_error};
use crate::statement::{RawStatement, SqliteStatement, step_cancel_requested};

/// Virtual machine instructions between cancel-token checks during a step.
const PROGRESS_INTERVAL: c_int = 1000;

/// Owned database handle, closed when the last statement or connection
/// clone holding it goes away.
pub(crate) struct RawConnection {
	db: NonNull<ffi::Sqlite3>,
}

// Opened with SQLITE_OPEN_FULLMUTEX, so SQLite serializes every call on the
// handle itself.
unsafe impl Send for RawConnection {}
unsafe impl Sync for RawConnection {}

impl RawConnection {
	pub(crate) const fn as_ptr(&self) -> *mut ffi::Sqlite3 {
		self.db.as_ptr()
	}

	/// Aborts whatever statement is running on the handle. Safe from any
	/// thread.
	pub(crate) fn interrupt(&self) {
		unsafe { ffi::sqlite3_interrupt(self.db.as_ptr()) };
	}
}

impl Drop for RawConnection {
	fn drop(&mut self) {
		let _ = unsafe { ffi::sqlite3_close_v2(self.db.as_ptr()) };
	}
}

#[derive(Clone)]
pub struct Connection {
	raw: Arc<RawConnection>,
	path: String,
}

impl Connection {
	pub fn open(path: &str) -> Result<Self> {
		let flags = ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
		Self::open_with_flags(path, flags)
	}

	pub fn open_read_only(path: &str) -> Result<Self> {
		Self::open_with_flags(path, ffi::SQLITE_OPEN_READONLY)
	}

	pub fn open_in_memory() -> Result<Self> {
		Self::open(":memory:")
	}

	fn open_with_flags(path: &str, flags: c_int) -> Result<Self> {
		let path_c = CString::new(path).map_err(|_| Error::misuse("database path contains a NUL byte"))?;
		let flags = flags | ffi::SQLITE_OPEN_URI | ffi::SQLITE_OPEN_FULLMUTEX;

		let mut db: *mut ffi::Sqlite3 = std::ptr::null_mut();
		let code =
			unsafe { ffi::sqlite3_open_v2(path_c.as_ptr(), &raw mut db, flags, std::ptr::null()) };
		if code != ffi::SQLITE_OK {
			let error = sqlite_error(db, code);
			if !db.is_null() {
				let _ = unsafe { ffi::sqlite3_close_v2(db) };
			}
			return Err(error);
		}

		let db =
			NonNull::new(db).ok_or_else(|| Error::misuse("SQLite returned a null connection handle"))?;
		let _ = unsafe { ffi::sqlite3_extended_result_codes(db.as_ptr(), 1) };
		unsafe {
			ffi::sqlite3_progress_handler(
				db.as_ptr(),
				PROGRESS_INTERVAL,
				Some(step_cancel_requested),
				std::ptr::null_mut(),
			);
		}

		debug!(path, sqlite_version = %crate::sqlite_lib_version(), "opened SQLite connection");
		Ok(Self { raw: Arc::new(RawConnection { db }), path: path.to_string() })
	}

	/// Runs one or more `;`-separated statements, discarding any rows.
	pub fn execute(&self, sql: &str) -> Result<()> {
		let sql_c = CString::new(sql).map_err(|_| Error::misuse("SQL contains a NUL byte"))?;
		let mut errmsg: *mut c_char = std::ptr::null_mut();
		let code = unsafe {
			ffi::sqlite3_exec(
				self.raw.as_ptr(),
				sql_c.as_ptr(),
				None,
				std::ptr::null_mut(),
				&raw mut errmsg,
			)
		};
		if errmsg.is_null() {
			return if code == ffi::SQLITE_OK { Ok(()) } else { Err(sqlite_error(self.raw.as_ptr(), code)) };
		}

		let message = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
		unsafe { ffi::sqlite3_free(errmsg.cast()) };
		if code == ffi::SQLITE_OK { Ok(()) } else { Err(Error { code, message }) }
	}

	/// Runs a single statement and collects every row.
	pub fn query_all(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
		let mut stmt = RawStatement::prepare(&self.raw, sql)?;
		let mut rows = Vec::new();
		while stmt.step()? {
			rows.push(stmt.row_values());
		}
		Ok(rows)
	}

	/// Validates `sql` and returns an unexecuted statement for a cursor to
	/// own.
	pub fn statement(&self, sql: &str) -> Result<SqliteStatement> {
		let stmt = RawStatement::prepare(&self.raw, sql)?;
		let parameter_count = stmt.parameter_count();
		trace!(sql, parameter_count, "validated statement");
		Ok(SqliteStatement::new(Arc::clone(&self.raw), sql.to_string(), parameter_count))
	}

	/// Interrupts every statement currently running on this connection. The
	/// affected cursors fail with a backend error, not `QueryInterrupted`.
	pub fn interrupt(&self) {
		self.raw.interrupt();
	}

	#[must_use]
	pub fn path(&self) -> &str {
		&self.path
	}
}

impl fmt::Debug for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection").field("path", &self.path).finish_non_exhaustive()
	}
}
