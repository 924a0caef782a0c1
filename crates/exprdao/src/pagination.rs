//! Paging by re-execution: one statement is run repeatedly with its
//! offset and row-count parameters advanced by a fixed window, for backends
//! where a single large-offset scan is expensive.
//!
//! An empty page does not prove the data is exhausted, since the source may
//! filter rows after slicing them. Paging only stops after
//! `empty_pages_before_stop` consecutive empty pages, or unconditionally once
//! `max_steps` pages have been issued.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::statement::StatementHandle;
use crate::value::Value;

pub const DEFAULT_EMPTY_PAGES_BEFORE_STOP: u32 = 2;

/// Pagination settings as loaded from configuration. Parameter indexes are
/// 1-based bind positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationOptions {
	pub offset_param_index: Option<usize>,
	pub row_count_param_index: Option<usize>,
	pub row_count: Option<u64>,
	pub max_steps: Option<u64>,
	pub empty_pages_before_stop: u32,
}

impl Default for PaginationOptions {
	fn default() -> Self {
		Self {
			offset_param_index: None,
			row_count_param_index: None,
			row_count: None,
			max_steps: None,
			empty_pages_before_stop: DEFAULT_EMPTY_PAGES_BEFORE_STOP,
		}
	}
}

impl PaginationOptions {
	#[must_use]
	pub fn new(offset_param_index: usize, row_count_param_index: usize, row_count: u64) -> Self {
		Self {
			offset_param_index: Some(offset_param_index),
			row_count_param_index: Some(row_count_param_index),
			row_count: Some(row_count),
			..Self::default()
		}
	}

	#[must_use]
	pub const fn with_max_steps(mut self, max_steps: u64) -> Self {
		self.max_steps = Some(max_steps);
		self
	}

	#[must_use]
	pub const fn with_empty_pages_before_stop(mut self, pages: u32) -> Self {
		self.empty_pages_before_stop = pages;
		self
	}

	pub fn validate(&self) -> Result<()> {
		let Some(offset) = self.offset_param_index else {
			return Err(Error::illegal_argument("pagination requires an offset parameter index"));
		};
		let Some(row_count_index) = self.row_count_param_index else {
			return Err(Error::illegal_argument("pagination requires a row count parameter index"));
		};
		if offset == 0 || row_count_index == 0 {
			return Err(Error::illegal_argument("parameter indexes are 1-based"));
		}
		if offset == row_count_index {
			return Err(Error::illegal_argument(format!(
				"offset and row count cannot share parameter index {offset}"
			)));
		}
		match self.row_count {
			None => return Err(Error::illegal_argument("pagination requires a row count")),
			Some(0) => return Err(Error::illegal_argument("row count must be greater than zero")),
			Some(_) => {}
		}
		if self.max_steps == Some(0) {
			return Err(Error::illegal_argument("max steps must be greater than zero"));
		}
		if self.empty_pages_before_stop == 0 {
			return Err(Error::illegal_argument("empty pages before stop must be greater than zero"));
		}
		Ok(())
	}
}

/// Parameters of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
	pub offset_param_index: usize,
	pub row_count_param_index: usize,
	pub offset: u64,
	pub row_count: u64,
}

impl PageWindow {
	pub fn bind<S: StatementHandle>(&self, statement: &mut S) -> Result<()> {
		statement.bind(self.offset_param_index, Value::Integer(to_sql_int(self.offset)?))?;
		statement.bind(self.row_count_param_index, Value::Integer(to_sql_int(self.row_count)?))
	}
}

fn to_sql_int(value: u64) -> Result<i64> {
	i64::try_from(value).map_err(|_| Error::illegal_argument(format!("{value} does not fit a SQL integer")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	MaxSteps,
	EmptyPages,
}

#[derive(Debug, Clone)]
pub struct PaginationController {
	offset_param_index: usize,
	row_count_param_index: usize,
	row_count: u64,
	max_steps: Option<u64>,
	empty_pages_before_stop: u32,
	current_offset: u64,
	steps_issued: u64,
	consecutive_empty: u32,
	page_open: bool,
	stopped: Option<StopReason>,
}

impl PaginationController {
	pub fn new(options: &PaginationOptions) -> Result<Self> {
		options.validate()?;
		let (Some(offset_param_index), Some(row_count_param_index), Some(row_count)) =
			(options.offset_param_index, options.row_count_param_index, options.row_count)
		else {
			return Err(Error::illegal_argument("incomplete pagination options"));
		};

		Ok(Self {
			offset_param_index,
			row_count_param_index,
			row_count,
			max_steps: options.max_steps,
			empty_pages_before_stop: options.empty_pages_before_stop,
			current_offset: 0,
			steps_issued: 0,
			consecutive_empty: 0,
			page_open: false,
			stopped: None,
		})
	}

	/// Issues the next page, or `None` once paging has stopped. A page must
	/// be finished before another one is issued.
	pub fn next_window(&mut self) -> Option<PageWindow> {
		if self.stopped.is_some() || self.page_open {
			return None;
		}
		self.page_open = true;
		self.steps_issued += 1;
		Some(PageWindow {
			offset_param_index: self.offset_param_index,
			row_count_param_index: self.row_count_param_index,
			offset: self.current_offset,
			row_count: self.row_count,
		})
	}

	/// Records how many rows the issued page returned and decides whether
	/// another page follows. Returns the reason when paging stops here.
	pub fn finish_page(&mut self, rows_fetched: u64) -> Option<StopReason> {
		if !self.page_open {
			return self.stopped;
		}
		self.page_open = false;

		if rows_fetched == 0 {
			self.consecutive_empty += 1;
		} else {
			self.consecutive_empty = 0;
		}

		let reason = if self.max_steps.is_some_and(|max| self.steps_issued >= max) {
			Some(StopReason::MaxSteps)
		} else if self.consecutive_empty >= self.empty_pages_before_stop {
			Some(StopReason::EmptyPages)
		} else {
			None
		};

		match reason {
			Some(reason) => {
				debug!(?reason, steps = self.steps_issued, offset = self.current_offset, "pagination stopped");
				self.stopped = Some(reason);
			}
			None => {
				self.current_offset += self.row_count;
				if rows_fetched == 0 {
					debug!(next_offset = self.current_offset, "empty page, probing next window");
				}
			}
		}
		reason
	}

	#[must_use]
	pub const fn current_offset(&self) -> u64 {
		self.current_offset
	}

	#[must_use]
	pub const fn steps_issued(&self) -> u64 {
		self.steps_issued
	}

	#[must_use]
	pub const fn row_count(&self) -> u64 {
		self.row_count
	}

	#[must_use]
	pub const fn max_steps(&self) -> Option<u64> {
		self.max_steps
	}

	#[must_use]
	pub const fn stop_reason(&self) -> Option<StopReason> {
		self.stopped
	}
}
