use std::collections::HashSet;
use std::hash::Hash;

use crate::value::Value;

/// Records the cursor can deduplicate by value.
///
/// A record without identity (missing the fields that identify it) is
/// treated as unequal to every other record, itself included, and is never
/// suppressed.
pub trait DedupRecord: Clone + Eq + Hash {
	fn has_identity(&self) -> bool {
		true
	}
}

impl DedupRecord for i64 {}
impl DedupRecord for String {}
impl DedupRecord for Value {}
impl DedupRecord for Vec<Value> {}

/// Every distinct record emitted over a cursor's lifetime. Entries are
/// never evicted, so memory grows with the number of distinct records.
#[derive(Debug, Clone)]
pub struct DuplicateFilter<R> {
	seen: HashSet<R>,
}

impl<R> Default for DuplicateFilter<R> {
	fn default() -> Self {
		Self { seen: HashSet::new() }
	}
}

impl<R: DedupRecord> DuplicateFilter<R> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` when `record` has not been emitted yet and remembers it.
	pub fn admit(&mut self, record: &R) -> bool {
		if !record.has_identity() {
			return true;
		}
		if self.seen.contains(record) {
			return false;
		}
		self.seen.insert(record.clone());
		true
	}

	#[must_use]
	pub fn contains(&self, record: &R) -> bool {
		record.has_identity() && self.seen.contains(record)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.seen.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.seen.is_empty()
	}
}
