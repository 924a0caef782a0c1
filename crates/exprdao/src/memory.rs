//! In-memory statements replaying scripted rows. Every call the cursor
//! makes is counted in a shared [`CallLog`], which makes laziness, close
//! discipline and cancellation observable.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::statement::{CancelToken, RowCursor, StatementHandle};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct CallLog {
	executions: AtomicUsize,
	resets: AtomicUsize,
	closes: AtomicUsize,
	cancels: AtomicUsize,
	rows_fetched: AtomicUsize,
}

impl CallLog {
	#[must_use]
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	#[must_use]
	pub fn executions(&self) -> usize {
		self.executions.load(Ordering::SeqCst)
	}

	#[must_use]
	pub fn resets(&self) -> usize {
		self.resets.load(Ordering::SeqCst)
	}

	/// Every `close()` call, including repeated ones on the same statement.
	#[must_use]
	pub fn closes(&self) -> usize {
		self.closes.load(Ordering::SeqCst)
	}

	#[must_use]
	pub fn cancels(&self) -> usize {
		self.cancels.load(Ordering::SeqCst)
	}

	#[must_use]
	pub fn rows_fetched(&self) -> usize {
		self.rows_fetched.load(Ordering::SeqCst)
	}
}

#[derive(Debug)]
enum Script {
	/// One entry per execution; executions past the end return no rows.
	Pages(VecDeque<Vec<Vec<Value>>>),
	/// Sliced by the bound offset and row count parameters.
	Table { rows: Vec<Vec<Value>>, offset_param_index: usize, row_count_param_index: usize },
	Failing(String),
}

#[derive(Debug)]
pub struct MemoryStatement {
	labels: Vec<String>,
	script: Script,
	bindings: BTreeMap<usize, Value>,
	executed: bool,
	closed: bool,
	token: CancelToken,
	log: Arc<CallLog>,
}

impl MemoryStatement {
	/// Statement whose single execution yields `rows`.
	pub fn new<L: Into<String>>(labels: impl IntoIterator<Item = L>, rows: Vec<Vec<Value>>) -> Self {
		Self::with_script(labels, Script::Pages(VecDeque::from([rows])))
	}

	/// Statement yielding the next of `pages` on each execution.
	pub fn pages<L: Into<String>>(labels: impl IntoIterator<Item = L>, pages: Vec<Vec<Vec<Value>>>) -> Self {
		Self::with_script(labels, Script::Pages(pages.into()))
	}

	/// Statement behaving like `... LIMIT ?row_count OFFSET ?offset` over `rows`.
	pub fn sliced<L: Into<String>>(
		labels: impl IntoIterator<Item = L>,
		rows: Vec<Vec<Value>>,
		offset_param_index: usize,
		row_count_param_index: usize,
	) -> Self {
		Self::with_script(labels, Script::Table { rows, offset_param_index, row_count_param_index })
	}

	/// Statement whose execution fails with a backend error.
	pub fn failing<L: Into<String>>(labels: impl IntoIterator<Item = L>, message: &str) -> Self {
		Self::with_script(labels, Script::Failing(message.to_string()))
	}

	fn with_script<L: Into<String>>(labels: impl IntoIterator<Item = L>, script: Script) -> Self {
		let log = CallLog::new();
		Self {
			labels: labels.into_iter().map(Into::into).collect(),
			script,
			bindings: BTreeMap::new(),
			executed: false,
			closed: false,
			token: counting_token(&log),
			log,
		}
	}

	/// Shares `log` with other statements so a whole queue can be observed.
	#[must_use]
	pub fn with_log(mut self, log: &Arc<CallLog>) -> Self {
		self.token = counting_token(log);
		self.log = Arc::clone(log);
		self
	}

	#[must_use]
	pub fn log(&self) -> Arc<CallLog> {
		Arc::clone(&self.log)
	}

	#[must_use]
	pub fn binding(&self, position: usize) -> Option<&Value> {
		self.bindings.get(&position)
	}
}

fn slice_window(
	bindings: &BTreeMap<usize, Value>,
	offset_param_index: usize,
	row_count_param_index: usize,
) -> Result<(usize, usize)> {
	let read = |position: usize| -> Result<usize> {
		let bound = bindings.get(&position).and_then(Value::as_i64).ok_or_else(|| {
			Error::illegal_state(format!("parameter {position} is not bound to an integer"))
		})?;
		usize::try_from(bound).map_err(|_| Error::illegal_argument(format!("parameter {position} is negative")))
	};
	Ok((read(offset_param_index)?, read(row_count_param_index)?))
}

fn counting_token(log: &Arc<CallLog>) -> CancelToken {
	let log = Arc::clone(log);
	CancelToken::with_hook(move || {
		log.cancels.fetch_add(1, Ordering::SeqCst);
	})
}

impl StatementHandle for MemoryStatement {
	type Rows = MemoryRows;

	fn execute(&mut self) -> Result<MemoryRows> {
		if self.closed {
			return Err(Error::illegal_state("statement is closed"));
		}
		if self.executed {
			return Err(Error::illegal_state("statement already executed"));
		}
		self.executed = true;
		self.log.executions.fetch_add(1, Ordering::SeqCst);

		let rows = match &mut self.script {
			Script::Pages(pages) => pages.pop_front().unwrap_or_default(),
			Script::Table { rows, offset_param_index, row_count_param_index } => {
				let (offset, count) = slice_window(&self.bindings, *offset_param_index, *row_count_param_index)?;
				rows.iter().skip(offset).take(count).cloned().collect()
			}
			Script::Failing(message) => return Err(Error::backend(message.clone())),
		};
		Ok(MemoryRows::new(self.labels.clone(), rows, &self.log))
	}

	fn is_executed(&self) -> bool {
		self.executed
	}

	fn reset(&mut self) -> Result<()> {
		self.executed = false;
		self.log.resets.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn bind(&mut self, position: usize, value: Value) -> Result<()> {
		if position == 0 {
			return Err(Error::illegal_argument("parameter positions are 1-based"));
		}
		self.bindings.insert(position, value);
		Ok(())
	}

	fn cancel_token(&self) -> &CancelToken {
		&self.token
	}

	fn close(&mut self) -> Result<()> {
		self.closed = true;
		self.log.closes.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.closed
	}
}

#[derive(Debug)]
pub struct MemoryRows {
	labels: Vec<String>,
	pending: VecDeque<Vec<Value>>,
	current: Option<Vec<Value>>,
	log: Arc<CallLog>,
}

impl MemoryRows {
	fn new(labels: Vec<String>, rows: Vec<Vec<Value>>, log: &Arc<CallLog>) -> Self {
		Self { labels, pending: rows.into(), current: None, log: Arc::clone(log) }
	}
}

impl RowCursor for MemoryRows {
	fn advance(&mut self) -> Result<bool> {
		self.current = self.pending.pop_front();
		if self.current.is_some() {
			self.log.rows_fetched.fetch_add(1, Ordering::SeqCst);
		}
		Ok(self.current.is_some())
	}

	fn column_count(&self) -> usize {
		self.labels.len()
	}

	fn column_label(&self, position: usize) -> Option<String> {
		position.checked_sub(1).and_then(|index| self.labels.get(index)).cloned()
	}

	fn value(&self, position: usize) -> Result<Value> {
		let Some(row) = &self.current else {
			return Err(Error::illegal_state("row cursor is not positioned on a row"));
		};
		position
			.checked_sub(1)
			.and_then(|index| row.get(index))
			.cloned()
			.ok_or_else(|| Error::illegal_argument(format!("no column at position {position}")))
	}
}
