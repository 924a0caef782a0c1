use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::statement::RowCursor;

/// A single column value as fetched from a row cursor.
///
/// Floats compare and hash by their bit pattern so that values can be used
/// as deduplication keys; `NaN` therefore equals an identical `NaN`.
#[derive(Debug, Clone)]
pub enum Value {
	Null,
	Integer(i64),
	Float(f64),
	Text(String),
	Blob(Vec<u8>),
}

impl Value {
	#[must_use]
	pub const fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	#[must_use]
	pub const fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Integer(v) => Some(*v),
			_ => None,
		}
	}

	#[must_use]
	#[expect(clippy::cast_precision_loss, reason = "integers widen to floats for numeric reads")]
	pub const fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Float(v) => Some(*v),
			Self::Integer(v) => Some(*v as f64),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(v) => Some(v),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_blob(&self) -> Option<&[u8]> {
		match self {
			Self::Blob(v) => Some(v),
			_ => None,
		}
	}

	#[must_use]
	pub const fn type_name(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Integer(_) => "integer",
			Self::Float(_) => "float",
			Self::Text(_) => "text",
			Self::Blob(_) => "blob",
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Integer(a), Self::Integer(b)) => a == b,
			(Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
			(Self::Text(a), Self::Text(b)) => a == b,
			(Self::Blob(a), Self::Blob(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for Value {}

impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		core::mem::discriminant(self).hash(state);
		match self {
			Self::Null => {}
			Self::Integer(v) => v.hash(state),
			Self::Float(v) => v.to_bits().hash(state),
			Self::Text(v) => v.hash(state),
			Self::Blob(v) => v.hash(state),
		}
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<Vec<u8>> for Value {
	fn from(value: Vec<u8>) -> Self {
		Self::Blob(value)
	}
}

impl<T: Into<Self>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// Column position (1-based) to label mapping of one executed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnLabels {
	labels: BTreeMap<usize, String>,
}

impl ColumnLabels {
	/// Reads every column label of a freshly executed row cursor.
	pub fn capture<C: RowCursor + ?Sized>(rows: &C) -> Self {
		let labels = (1..=rows.column_count())
			.map(|position| (position, rows.column_label(position).unwrap_or_default()))
			.collect();
		Self { labels }
	}

	#[must_use]
	pub fn get(&self, position: usize) -> Option<&str> {
		self.labels.get(&position).map(String::as_str)
	}

	#[must_use]
	pub fn position_of(&self, label: &str) -> Option<usize> {
		self.labels.iter().find(|(_, candidate)| candidate.as_str() == label).map(|(position, _)| *position)
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
		self.labels.iter().map(|(position, label)| (*position, label.as_str()))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.labels.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.labels.is_empty()
	}
}

impl<L: Into<String>> FromIterator<L> for ColumnLabels {
	fn from_iter<I: IntoIterator<Item = L>>(iter: I) -> Self {
		let labels = iter.into_iter().enumerate().map(|(index, label)| (index + 1, label.into())).collect();
		Self { labels }
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn floats_hash_by_bits() {
		let mut set = HashSet::new();
		assert!(set.insert(Value::Float(f64::NAN)));
		assert!(!set.insert(Value::Float(f64::NAN)));
		assert!(set.insert(Value::Float(0.5)));
		assert!(set.insert(Value::Integer(0)));
	}

	#[test]
	fn integer_and_float_are_distinct_values() {
		assert_ne!(Value::Integer(1), Value::Float(1.0));
		assert_eq!(Value::Integer(1).as_f64(), Some(1.0));
	}

	#[test]
	fn option_converts_to_null() {
		assert_eq!(Value::from(None::<i64>), Value::Null);
		assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
	}

	#[test]
	fn labels_are_one_based() {
		let labels: ColumnLabels = ["gene_id", "gene_name"].into_iter().collect();
		assert_eq!(labels.get(1), Some("gene_id"));
		assert_eq!(labels.get(0), None);
		assert_eq!(labels.position_of("gene_name"), Some(2));
		assert_eq!(labels.position_of("missing"), None);
		assert_eq!(labels.len(), 2);
	}
}
