use std::iter::FusedIterator;

use crate::cursor::QueryCursor;
use crate::dedup::DedupRecord;
use crate::error::Result;
use crate::materialize::RecordMaterializer;
use crate::statement::StatementHandle;

/// Lazy, single-use view over a [`QueryCursor`].
///
/// Running the iterator to its end closes the cursor. Stopping early leaves
/// the cursor open until [`Records::close`] or the cursor's own `close` is
/// called.
pub struct Records<'a, S: StatementHandle, M, R> {
	cursor: &'a mut QueryCursor<S, M, R>,
	finished: bool,
}

impl<'a, S, M, R> Records<'a, S, M, R>
where
	S: StatementHandle,
	M: RecordMaterializer<R>,
	R: DedupRecord,
{
	pub(crate) const fn new(cursor: &'a mut QueryCursor<S, M, R>) -> Self {
		Self { cursor, finished: false }
	}

	pub fn close(self) -> Result<()> {
		self.cursor.close()
	}
}

impl<S, M, R> Iterator for Records<'_, S, M, R>
where
	S: StatementHandle,
	M: RecordMaterializer<R>,
	R: DedupRecord,
{
	type Item = Result<R>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}
		match self.cursor.step() {
			Ok(true) => self.cursor.take_current().map(Ok),
			Ok(false) => {
				self.finished = true;
				self.cursor.close().err().map(Err)
			}
			Err(err) => {
				self.finished = true;
				Some(Err(err))
			}
		}
	}
}

impl<S, M, R> FusedIterator for Records<'_, S, M, R>
where
	S: StatementHandle,
	M: RecordMaterializer<R>,
	R: DedupRecord,
{
}
