//! Forward-only cursor over a queue of statements, or over one statement
//! re-executed page by page.
//!
//! Statements run lazily: nothing touches the backend before the first
//! [`QueryCursor::advance`], and a statement only executes once its
//! predecessor has been exhausted and closed. Cancellation is polled on the
//! statement in use before every execute and around every row fetch.

use std::cell::Cell;
use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::dedup::{DedupRecord, DuplicateFilter};
use crate::error::{Error, Result};
use crate::materialize::{RecordMaterializer, RowView};
use crate::options::CursorOptions;
use crate::pagination::{PaginationController, PaginationOptions};
use crate::sequence::Records;
use crate::statement::{CancelToken, RowCursor, StatementHandle};
use crate::value::ColumnLabels;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorState {
	Created,
	Iterating,
	Exhausted,
	Closed,
	Canceled,
}

enum Source<S> {
	Queue(VecDeque<S>),
	Paged { statement: Option<S>, controller: PaginationController },
}

struct ActivePage<S: StatementHandle> {
	statement: S,
	rows: Option<S::Rows>,
	labels: ColumnLabels,
	fetched: u64,
}

impl<S: StatementHandle> ActivePage<S> {
	fn new(statement: S) -> Self {
		Self { statement, rows: None, labels: ColumnLabels::default(), fetched: 0 }
	}

	fn close(mut self) -> Result<()> {
		self.rows = None;
		self.statement.close()
	}
}

pub struct QueryCursor<S: StatementHandle, M, R> {
	source: Source<S>,
	active: Option<ActivePage<S>>,
	materializer: M,
	filter: Option<DuplicateFilter<R>>,
	current: Option<R>,
	state: CursorState,
	executions: u64,
	direct_access: Cell<bool>,
	sequence_taken: bool,
}

impl<S, M, R> QueryCursor<S, M, R>
where
	S: StatementHandle,
	M: RecordMaterializer<R>,
	R: DedupRecord,
{
	/// Cursor over `statements`, run strictly in order.
	pub fn new<I>(statements: I, materializer: M, filter_duplicates: bool) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
	{
		let queue: VecDeque<S> = statements.into_iter().collect();
		ensure_not_executed(queue.iter())?;
		Ok(Self::from_source(Source::Queue(queue), materializer, filter_duplicates))
	}

	/// Cursor re-executing `statement` with an advancing offset window.
	pub fn paged(
		statement: S,
		materializer: M,
		pagination: &PaginationOptions,
		filter_duplicates: bool,
	) -> Result<Self> {
		ensure_not_executed(std::iter::once(&statement))?;
		let controller = PaginationController::new(pagination)?;
		let source = Source::Paged { statement: Some(statement), controller };
		Ok(Self::from_source(source, materializer, filter_duplicates))
	}

	pub fn with_options<I>(statements: I, materializer: M, options: &CursorOptions) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
	{
		let Some(pagination) = &options.pagination else {
			return Self::new(statements, materializer, options.filter_duplicates);
		};

		let mut statements = statements.into_iter();
		let (Some(statement), None) = (statements.next(), statements.next()) else {
			return Err(Error::illegal_argument("a paged cursor takes exactly one statement"));
		};
		Self::paged(statement, materializer, pagination, options.filter_duplicates)
	}

	fn from_source(source: Source<S>, materializer: M, filter_duplicates: bool) -> Self {
		Self {
			source,
			active: None,
			materializer,
			filter: filter_duplicates.then(DuplicateFilter::new),
			current: None,
			state: CursorState::Created,
			executions: 0,
			direct_access: Cell::new(false),
			sequence_taken: false,
		}
	}

	/// Moves to the next distinct record. Returns `false` once every
	/// statement or page is exhausted; a canceled cursor keeps failing with
	/// [`Error::QueryInterrupted`].
	pub fn advance(&mut self) -> Result<bool> {
		self.direct_access.set(true);
		self.step()
	}

	/// The record produced by the last successful [`advance`](Self::advance).
	pub fn current(&self) -> Result<&R> {
		self.direct_access.set(true);
		if self.state != CursorState::Iterating {
			return Err(Error::illegal_state(format!("no current record in state {:?}", self.state)));
		}
		self.current.as_ref().ok_or_else(|| Error::illegal_state("no current record, call advance() first"))
	}

	/// Advances to exhaustion, collecting every record, then closes the cursor.
	pub fn drain_all(&mut self) -> Result<Vec<R>> {
		self.direct_access.set(true);
		let mut records = Vec::new();
		let drained = loop {
			match self.step() {
				Ok(true) => records.extend(self.current.take()),
				Ok(false) => break Ok(()),
				Err(err) => break Err(err),
			}
		};
		let closed = self.close();
		drained?;
		closed?;
		Ok(records)
	}

	/// Single-use iterator view. Fails when called twice or after the cursor
	/// was already read through [`advance`](Self::advance) or
	/// [`current`](Self::current).
	pub fn as_lazy_sequence(&mut self) -> Result<Records<'_, S, M, R>> {
		if self.sequence_taken {
			return Err(Error::illegal_state("lazy sequence already obtained from this cursor"));
		}
		if self.direct_access.get() {
			return Err(Error::illegal_state("cursor was already iterated directly"));
		}
		self.sequence_taken = true;
		Ok(Records::new(self))
	}

	pub(crate) fn step(&mut self) -> Result<bool> {
		match self.state {
			CursorState::Exhausted | CursorState::Closed => return Ok(false),
			CursorState::Canceled => return Err(Error::QueryInterrupted),
			CursorState::Created | CursorState::Iterating => {}
		}

		self.current = None;
		self.state = CursorState::Iterating;
		match self.fetch_next() {
			Ok(true) => Ok(true),
			Ok(false) => {
				debug!(executions = self.executions, "cursor exhausted");
				self.state = CursorState::Exhausted;
				self.release()?;
				Ok(false)
			}
			Err(err) => {
				self.state = if err.is_interrupted() { CursorState::Canceled } else { CursorState::Closed };
				if let Err(close_err) = self.release() {
					warn!(error = %close_err, "failed to release statements after cursor failure");
				}
				Err(err)
			}
		}
	}

	fn fetch_next(&mut self) -> Result<bool> {
		loop {
			if self.active.is_none() && !self.open_next_page()? {
				return Ok(false);
			}
			let Some(page) = self.active.as_mut() else {
				return Ok(false);
			};
			let Some(rows) = page.rows.as_mut() else {
				return Err(Error::illegal_state("active page has no open rows"));
			};

			if page.statement.is_canceled() {
				warn!(rows = page.fetched, "cancellation observed before row fetch");
				return Err(Error::QueryInterrupted);
			}
			let fetched = rows.advance();
			if page.statement.is_canceled() {
				warn!(rows = page.fetched, "cancellation observed after row fetch");
				return Err(Error::QueryInterrupted);
			}
			if !fetched? {
				self.finish_page()?;
				continue;
			}

			page.fetched += 1;
			let record = self.materializer.materialize(&RowView::new(&*rows, &page.labels))?;
			if let Some(filter) = self.filter.as_mut() {
				if !filter.admit(&record) {
					trace!(row = page.fetched, "duplicate record suppressed");
					continue;
				}
			}
			self.current = Some(record);
			return Ok(true);
		}
	}

	pub(crate) fn take_current(&mut self) -> Option<R> {
		self.current.take()
	}
}

impl<S: StatementHandle, M, R> QueryCursor<S, M, R> {
	/// Pops or re-arms the next statement and executes it. Returns `false`
	/// when the queue or pagination has nothing left to run.
	fn open_next_page(&mut self) -> Result<bool> {
		let (statement, window) = match &mut self.source {
			Source::Queue(queue) => match queue.pop_front() {
				Some(statement) => (statement, None),
				None => return Ok(false),
			},
			Source::Paged { statement, controller } => {
				if statement.is_none() {
					return Ok(false);
				}
				let Some(window) = controller.next_window() else {
					return Ok(false);
				};
				let Some(statement) = statement.take() else {
					return Ok(false);
				};
				(statement, Some(window))
			}
		};

		let page = self.active.insert(ActivePage::new(statement));
		if page.statement.is_canceled() {
			warn!(executions = self.executions, "cancellation observed before execution");
			return Err(Error::QueryInterrupted);
		}

		match window {
			Some(window) => {
				if page.statement.is_executed() {
					page.statement.reset()?;
				}
				window.bind(&mut page.statement)?;
				debug!(offset = window.offset, row_count = window.row_count, "executing page");
			}
			None => debug!(execution = self.executions + 1, "executing queued statement"),
		}

		let rows = page.statement.execute()?;
		self.executions += 1;
		page.labels = ColumnLabels::capture(&rows);
		page.rows = Some(rows);
		Ok(true)
	}

	/// Closes the exhausted page. In paged mode the statement is kept for the
	/// next window unless the controller decides to stop.
	fn finish_page(&mut self) -> Result<()> {
		let Some(mut page) = self.active.take() else {
			return Ok(());
		};
		page.rows = None;
		debug!(rows = page.fetched, "page exhausted");

		match &mut self.source {
			Source::Queue(_) => page.statement.close(),
			Source::Paged { statement, controller } => {
				if controller.finish_page(page.fetched).is_some() {
					page.statement.close()
				} else {
					*statement = Some(page.statement);
					Ok(())
				}
			}
		}
	}

	/// Closes the active page and every statement not yet run. Safe to call
	/// repeatedly: closed statements are no longer held.
	fn release(&mut self) -> Result<()> {
		let mut outcome = Ok(());
		if let Some(page) = self.active.take() {
			keep_first_error(&mut outcome, page.close());
		}
		match &mut self.source {
			Source::Queue(queue) => {
				for mut statement in queue.drain(..) {
					keep_first_error(&mut outcome, statement.close());
				}
			}
			Source::Paged { statement, .. } => {
				if let Some(mut statement) = statement.take() {
					keep_first_error(&mut outcome, statement.close());
				}
			}
		}
		self.current = None;
		outcome
	}

	/// Releases every statement. Idempotent and valid in any state.
	pub fn close(&mut self) -> Result<()> {
		let outcome = self.release();
		if !matches!(self.state, CursorState::Closed | CursorState::Canceled) {
			debug!(executions = self.executions, "cursor closed");
			self.state = CursorState::Closed;
		}
		outcome
	}

	/// Labels of the page currently being read, if one is open.
	#[must_use]
	pub fn column_labels(&self) -> Option<&ColumnLabels> {
		self.active.as_ref().filter(|page| page.rows.is_some()).map(|page| &page.labels)
	}

	/// Token of the statement in use, or of the next one to run.
	#[must_use]
	pub fn cancel_token(&self) -> Option<CancelToken> {
		if let Some(page) = &self.active {
			return Some(page.statement.cancel_token().clone());
		}
		let next = match &self.source {
			Source::Queue(queue) => queue.front(),
			Source::Paged { statement, .. } => statement.as_ref(),
		};
		next.map(|statement| statement.cancel_token().clone())
	}

	#[must_use]
	pub const fn is_filter_duplicates(&self) -> bool {
		self.filter.is_some()
	}

	#[must_use]
	pub const fn is_paged(&self) -> bool {
		matches!(self.source, Source::Paged { .. })
	}

	#[must_use]
	pub const fn state(&self) -> CursorState {
		self.state
	}

	/// Number of statement executions issued so far.
	#[must_use]
	pub const fn pages_executed(&self) -> u64 {
		self.executions
	}

	#[must_use]
	pub const fn pagination(&self) -> Option<&PaginationController> {
		match &self.source {
			Source::Paged { controller, .. } => Some(controller),
			Source::Queue(_) => None,
		}
	}
}

impl<S: StatementHandle, M, R> Drop for QueryCursor<S, M, R> {
	fn drop(&mut self) {
		if let Err(err) = self.release() {
			warn!(error = %err, "failed to close statements while dropping cursor");
		}
	}
}

fn ensure_not_executed<'a, S: StatementHandle + 'a>(statements: impl Iterator<Item = &'a S>) -> Result<()> {
	for (index, statement) in statements.enumerate() {
		if statement.is_executed() {
			return Err(Error::illegal_argument(format!("statement {index} was already executed")));
		}
	}
	Ok(())
}

fn keep_first_error(outcome: &mut Result<()>, result: Result<()>) {
	if let Err(err) = result {
		warn!(error = %err, "failed to close statement");
		if outcome.is_ok() {
			*outcome = Err(err);
		}
	}
}
