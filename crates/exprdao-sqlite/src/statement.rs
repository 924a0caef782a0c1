//! Statements a [`QueryCursor`](exprdao::QueryCursor) can own, and the rows
//! one execution yields.

use core::ffi::{c_int, c_void};
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use exprdao::{CancelToken, RowCursor, StatementHandle, Value};
use exprdao_sqlite_ffi::ffi;
use tracing::{debug, trace};

use crate::connection::RawConnection;
use crate::error::{Error, Result, check_ok, sqlite_error};

/// A prepared `sqlite3_stmt`, finalized on drop.
pub(crate) struct RawStatement {
	conn: Arc<RawConnection>,
	stmt: NonNull<ffi::Sqlite3Stmt>,
}

// Only ever touched by its single owner; the connection is in serialized mode.
unsafe impl Send for RawStatement {}

impl RawStatement {
	pub(crate) fn prepare(conn: &Arc<RawConnection>, sql: &str) -> Result<Self> {
		let sql_c = CString::new(sql).map_err(|_| Error::misuse("SQL contains a NUL byte"))?;

		let mut stmt: *mut ffi::Sqlite3Stmt = std::ptr::null_mut();
		let code = unsafe {
			ffi::sqlite3_prepare_v3(
				conn.as_ptr(),
				sql_c.as_ptr(),
				-1,
				0,
				&raw mut stmt,
				std::ptr::null_mut(),
			)
		};
		if code != ffi::SQLITE_OK {
			return Err(sqlite_error(conn.as_ptr(), code));
		}

		let stmt = NonNull::new(stmt).ok_or_else(|| Error::misuse("SQL did not produce a statement"))?;
		Ok(Self { conn: Arc::clone(conn), stmt })
	}

	pub(crate) fn parameter_count(&self) -> usize {
		let n = unsafe { ffi::sqlite3_bind_parameter_count(self.stmt.as_ptr()) };
		usize::try_from(n).unwrap_or_default()
	}

	fn bind(&mut self, index: c_int, value: &Value) -> Result<()> {
		let stmt = self.stmt.as_ptr();
		let code = match value {
			Value::Null => unsafe { ffi::sqlite3_bind_null(stmt, index) },
			Value::Integer(v) => unsafe { ffi::sqlite3_bind_int64(stmt, index, *v) },
			Value::Float(v) => unsafe { ffi::sqlite3_bind_double(stmt, index, *v) },
			Value::Text(v) => {
				let len = u64::try_from(v.len()).map_err(|_| Error::misuse("text parameter is too large"))?;
				unsafe {
					ffi::sqlite3_bind_text64(
						stmt,
						index,
						v.as_ptr().cast(),
						len,
						Some(sqlite_transient()),
						ffi::SQLITE_UTF8,
					)
				}
			}
			Value::Blob(v) => {
				let len = u64::try_from(v.len()).map_err(|_| Error::misuse("blob parameter is too large"))?;
				unsafe {
					ffi::sqlite3_bind_blob64(stmt, index, v.as_ptr().cast(), len, Some(sqlite_transient()))
				}
			}
		};
		check_ok(self.conn.as_ptr(), code)
	}

	pub(crate) fn step(&mut self) -> Result<bool> {
		let code = unsafe { ffi::sqlite3_step(self.stmt.as_ptr()) };
		match code {
			ffi::SQLITE_ROW => Ok(true),
			ffi::SQLITE_DONE => Ok(false),
			_ => Err(sqlite_error(self.conn.as_ptr(), code)),
		}
	}

	fn column_count(&self) -> usize {
		let n = unsafe { ffi::sqlite3_column_count(self.stmt.as_ptr()) };
		usize::try_from(n).unwrap_or_default()
	}

	fn column_name(&self, index: c_int) -> Option<String> {
		let ptr = unsafe { ffi::sqlite3_column_name(self.stmt.as_ptr(), index) };
		if ptr.is_null() {
			None
		} else {
			Some(unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() })
		}
	}

	pub(crate) fn row_values(&self) -> Vec<Value> {
		let mut row = Vec::with_capacity(self.column_count());
		for i in 0..self.column_count() {
			let Ok(index) = c_int::try_from(i) else {
				break;
			};
			row.push(self.column_value(index));
		}
		row
	}

	fn column_value(&self, index: c_int) -> Value {
		let stmt = self.stmt.as_ptr();
		match unsafe { ffi::sqlite3_column_type(stmt, index) } {
			ffi::SQLITE_INTEGER => Value::Integer(unsafe { ffi::sqlite3_column_int64(stmt, index) }),
			ffi::SQLITE_FLOAT => Value::Float(unsafe { ffi::sqlite3_column_double(stmt, index) }),
			ffi::SQLITE_TEXT => {
				let ptr = unsafe { ffi::sqlite3_column_text(stmt, index) };
				let bytes = column_bytes(stmt, index, ptr.cast());
				Value::Text(String::from_utf8_lossy(bytes).into_owned())
			}
			ffi::SQLITE_BLOB => {
				let ptr = unsafe { ffi::sqlite3_column_blob(stmt, index) };
				Value::Blob(column_bytes(stmt, index, ptr).to_vec())
			}
			_ => Value::Null,
		}
	}
}

impl Drop for RawStatement {
	fn drop(&mut self) {
		let _ = unsafe { ffi::sqlite3_finalize(self.stmt.as_ptr()) };
	}
}

/// Bytes of a text or blob column. Must be called after the pointer fetch,
/// as SQLite documents.
fn column_bytes<'a>(
	stmt: *mut ffi::Sqlite3Stmt,
	index: c_int,
	ptr: *const std::ffi::c_void,
) -> &'a [u8] {
	let len = unsafe { ffi::sqlite3_column_bytes(stmt, index) };
	let len = usize::try_from(len).unwrap_or_default();
	if ptr.is_null() || len == 0 {
		return &[];
	}
	unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) }
}

fn sqlite_transient() -> unsafe extern "C" fn(*mut std::ffi::c_void) {
	unsafe { std::mem::transmute::<isize, unsafe extern "C" fn(*mut std::ffi::c_void)>(-1_isize) }
}

thread_local! {
	/// Token of the statement this thread is stepping, read by the
	/// connection's progress handler.
	static STEPPING: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

/// Progress handler installed on every connection. A nonzero return makes
/// the `sqlite3_step` in flight on this thread fail with `SQLITE_INTERRUPT`,
/// leaving other statements on the connection untouched.
pub(crate) unsafe extern "C" fn step_cancel_requested(_: *mut c_void) -> c_int {
	let canceled = STEPPING
		.try_with(|slot| {
			slot.try_borrow().is_ok_and(|token| token.as_ref().is_some_and(CancelToken::is_canceled))
		})
		.unwrap_or(false);
	c_int::from(canceled)
}

/// Publishes a token to the progress handler for the duration of one step.
struct StepScope {
	previous: Option<CancelToken>,
}

impl StepScope {
	fn enter(token: &CancelToken) -> Self {
		Self { previous: STEPPING.replace(Some(token.clone())) }
	}
}

impl Drop for StepScope {
	fn drop(&mut self) {
		let previous = self.previous.take();
		let _ = STEPPING.try_with(|slot| slot.replace(previous));
	}
}

/// Parameterized query bound on a [`Connection`](crate::Connection).
///
/// Each execution prepares the SQL afresh and hands the prepared statement
/// to the returned [`SqliteRows`]; bindings survive [`reset`](StatementHandle::reset)
/// so a paged cursor only rebinds its window. Canceling the token aborts a
/// step of this statement already in flight, from any thread.
pub struct SqliteStatement {
	sql: String,
	parameter_count: usize,
	bindings: Vec<Value>,
	executed: bool,
	closed: bool,
	token: CancelToken,
	conn: Arc<RawConnection>,
}

impl SqliteStatement {
	pub(crate) fn new(conn: Arc<RawConnection>, sql: String, parameter_count: usize) -> Self {
		Self {
			sql,
			parameter_count,
			bindings: vec![Value::Null; parameter_count],
			executed: false,
			closed: false,
			token: CancelToken::new(),
			conn,
		}
	}

	#[must_use]
	pub fn sql(&self) -> &str {
		&self.sql
	}

	#[must_use]
	pub const fn parameter_count(&self) -> usize {
		self.parameter_count
	}

	/// Binds `values` to positions `1..=values.len()`.
	pub fn bind_all<I, V>(mut self, values: I) -> exprdao::Result<Self>
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		for (offset, value) in values.into_iter().enumerate() {
			self.bind(offset + 1, value.into())?;
		}
		Ok(self)
	}

	fn ensure_open(&self) -> exprdao::Result<()> {
		if self.closed {
			return Err(exprdao::Error::IllegalState(format!("statement is closed: {}", self.sql)));
		}
		Ok(())
	}
}

impl StatementHandle for SqliteStatement {
	type Rows = SqliteRows;

	fn execute(&mut self) -> exprdao::Result<SqliteRows> {
		self.ensure_open()?;
		if self.executed {
			return Err(exprdao::Error::IllegalState("statement already executed, reset it first".to_string()));
		}

		let mut stmt = RawStatement::prepare(&self.conn, &self.sql)?;
		for (offset, value) in self.bindings.iter().enumerate() {
			let index = c_int::try_from(offset + 1)
				.map_err(|_| Error::misuse("binding index did not fit in c_int"))?;
			stmt.bind(index, value)?;
		}
		self.executed = true;
		debug!(sql = %self.sql, "executing statement");

		let labels = (0..stmt.column_count())
			.map(|i| c_int::try_from(i).ok().and_then(|index| stmt.column_name(index)).unwrap_or_default())
			.collect();
		Ok(SqliteRows { stmt, labels, token: self.token.clone(), on_row: false })
	}

	fn is_executed(&self) -> bool {
		self.executed
	}

	fn reset(&mut self) -> exprdao::Result<()> {
		self.ensure_open()?;
		self.executed = false;
		Ok(())
	}

	fn bind(&mut self, position: usize, value: Value) -> exprdao::Result<()> {
		self.ensure_open()?;
		let count = self.parameter_count;
		let slot = position.checked_sub(1).and_then(|index| self.bindings.get_mut(index)).ok_or_else(|| {
			exprdao::Error::IllegalArgument(format!(
				"parameter position {position} is outside 1..={count}"
			))
		})?;
		trace!(position, value = value.type_name(), "bound parameter");
		*slot = value;
		Ok(())
	}

	fn cancel_token(&self) -> &CancelToken {
		&self.token
	}

	fn close(&mut self) -> exprdao::Result<()> {
		if !self.closed {
			trace!(sql = %self.sql, "closing statement");
			self.closed = true;
		}
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.closed
	}
}

impl fmt::Debug for SqliteStatement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SqliteStatement")
			.field("sql", &self.sql)
			.field("bindings", &self.bindings)
			.field("executed", &self.executed)
			.field("closed", &self.closed)
			.finish_non_exhaustive()
	}
}

/// Rows of one execution. Dropping them finalizes the prepared statement.
pub struct SqliteRows {
	stmt: RawStatement,
	labels: Vec<String>,
	token: CancelToken,
	on_row: bool,
}

impl RowCursor for SqliteRows {
	fn advance(&mut self) -> exprdao::Result<bool> {
		self.on_row = false;
		let stepped = {
			let _scope = StepScope::enter(&self.token);
			self.stmt.step()
		};
		match stepped {
			Ok(on_row) => {
				self.on_row = on_row;
				Ok(on_row)
			}
			Err(err) if err.is_interrupt() && self.token.is_canceled() => {
				debug!("statement step interrupted by its cancel token");
				Err(exprdao::Error::QueryInterrupted)
			}
			Err(err) => Err(err.into()),
		}
	}

	fn column_count(&self) -> usize {
		self.labels.len()
	}

	fn column_label(&self, position: usize) -> Option<String> {
		position.checked_sub(1).and_then(|index| self.labels.get(index)).cloned()
	}

	fn value(&self, position: usize) -> exprdao::Result<Value> {
		if !self.on_row {
			return Err(exprdao::Error::IllegalState("row cursor is not positioned on a row".to_string()));
		}
		let index = position
			.checked_sub(1)
			.filter(|index| *index < self.labels.len())
			.and_then(|index| c_int::try_from(index).ok())
			.ok_or_else(|| exprdao::Error::IllegalArgument(format!("no column at position {position}")))?;
		Ok(self.stmt.column_value(index))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Connection;

	fn connection() -> Connection {
		let db = Connection::open_in_memory().expect("open memory database");
		db.execute(
			"create table gene(gene_id text primary key, gene_name text, species_id integer, score real, raw blob);
			insert into gene values
				('ENSG01', 'APOC1', 9606, 0.5, x'0102'),
				('ENSG02', 'BRCA2', 9606, null, null),
				('ENSMUSG01', 'Apoc1', 10090, 1.5, null);",
		)
		.expect("create gene table");
		db
	}

	fn collect(rows: &mut SqliteRows) -> Vec<Vec<Value>> {
		let mut out = Vec::new();
		while rows.advance().expect("step") {
			out.push((1..=rows.column_count()).map(|p| rows.value(p).expect("value")).collect());
		}
		out
	}

	#[test]
	fn execute_binds_and_reads_all_value_types() {
		let db = connection();
		let mut statement = db
			.statement("select gene_id, score, raw, species_id from gene where species_id = ?1 order by gene_id")
			.expect("statement")
			.bind_all([9606_i64])
			.expect("bind");

		let mut rows = statement.execute().expect("execute");
		assert_eq!(rows.column_label(1).as_deref(), Some("gene_id"));
		assert_eq!(rows.column_label(5), None);
		assert_eq!(
			collect(&mut rows),
			vec![
				vec![Value::from("ENSG01"), Value::Float(0.5), Value::Blob(vec![1, 2]), Value::Integer(9606)],
				vec![Value::from("ENSG02"), Value::Null, Value::Null, Value::Integer(9606)],
			]
		);
	}

	#[test]
	fn execute_twice_needs_reset() {
		let db = connection();
		let mut statement = db.statement("select gene_id from gene where species_id = ?").expect("statement");
		statement.bind(1, Value::Integer(10090)).expect("bind");

		let mut first = statement.execute().expect("first execution");
		assert_eq!(collect(&mut first), vec![vec![Value::from("ENSMUSG01")]]);
		assert!(matches!(statement.execute(), Err(exprdao::Error::IllegalState(_))));

		statement.reset().expect("reset");
		statement.bind(1, Value::Integer(9606)).expect("rebind");
		let mut second = statement.execute().expect("second execution");
		assert_eq!(collect(&mut second).len(), 2);
	}

	#[test]
	fn bind_checks_positions() {
		let db = connection();
		let mut statement = db.statement("select ?1, ?2").expect("statement");
		assert_eq!(statement.parameter_count(), 2);
		assert!(matches!(statement.bind(0, Value::Null), Err(exprdao::Error::IllegalArgument(_))));
		assert!(matches!(statement.bind(3, Value::Null), Err(exprdao::Error::IllegalArgument(_))));
		statement.bind(2, Value::from("x")).expect("in range");
	}

	#[test]
	fn closed_statement_rejects_use() {
		let db = connection();
		let mut statement = db.statement("select 1").expect("statement");
		statement.close().expect("close");
		statement.close().expect("close is idempotent");
		assert!(statement.is_closed());
		assert!(statement.execute().is_err());
		assert!(statement.bind(1, Value::Null).is_err());
	}

	#[test]
	fn value_before_step_is_illegal() {
		let db = connection();
		let mut statement = db.statement("select 1").expect("statement");
		let rows = statement.execute().expect("execute");
		assert!(matches!(rows.value(1), Err(exprdao::Error::IllegalState(_))));
	}

	const LONG_COUNT: &str =
		"with recursive n(x) as (select 1 union all select x + 1 from n where x < 100000) select count(*) from n";

	#[test]
	fn canceled_token_interrupts_its_own_step() {
		let db = connection();
		let mut statement = db.statement(LONG_COUNT).expect("statement");
		let mut rows = statement.execute().expect("execute");
		statement.cancel();
		assert!(rows.advance().expect_err("interrupted").is_interrupted());
	}

	#[test]
	fn other_statement_tokens_do_not_interrupt_a_step() {
		let db = connection();
		let other = db.statement("select 1").expect("statement");
		other.cancel();

		let mut running = db.statement(LONG_COUNT).expect("statement");
		let mut rows = running.execute().expect("execute");
		assert!(rows.advance().expect("count completes"));
		assert_eq!(rows.value(1).expect("count"), Value::Integer(100_000));
	}

	#[test]
	fn connection_interrupt_is_a_backend_error() {
		let db = connection();
		let mut statement = db.statement("select 1").expect("statement");
		let mut rows = statement.execute().expect("execute");
		assert!(rows.advance().expect("first row"));
		db.interrupt();
		assert!(matches!(rows.advance(), Err(exprdao::Error::Backend(_))));
	}

	#[test]
	fn runtime_errors_surface_as_backend_errors() {
		let db = connection();
		let mut statement =
			db.statement("select abs(species_id * 0 - 9223372036854775807 - 1) from gene").expect("prepare succeeds");
		let mut rows = statement.execute().expect("execute");
		let err = rows.advance().expect_err("integer overflow");
		assert!(matches!(err, exprdao::Error::Backend(_)));
	}
}
