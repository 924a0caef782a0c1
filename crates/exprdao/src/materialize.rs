use crate::error::{Error, Result};
use crate::statement::RowCursor;
use crate::value::{ColumnLabels, Value};

/// The row a cursor is positioned on, together with the labels captured
/// when its page was executed.
pub struct RowView<'a> {
	rows: &'a dyn RowCursor,
	labels: &'a ColumnLabels,
}

impl<'a> RowView<'a> {
	pub fn new(rows: &'a dyn RowCursor, labels: &'a ColumnLabels) -> Self {
		Self { rows, labels }
	}

	pub fn get(&self, position: usize) -> Result<Value> {
		self.rows.value(position)
	}

	pub fn get_by_label(&self, label: &str) -> Result<Option<Value>> {
		self.labels.position_of(label).map(|position| self.rows.value(position)).transpose()
	}

	#[must_use]
	pub const fn labels(&self) -> &'a ColumnLabels {
		self.labels
	}

	/// Every value of the row in column order.
	pub fn values(&self) -> Result<Vec<Value>> {
		(1..=self.rows.column_count()).map(|position| self.rows.value(position)).collect()
	}
}

/// Turns the current row into a typed record. Called exactly once per
/// fetched row, before duplicate filtering.
pub trait RecordMaterializer<R> {
	fn materialize(&mut self, row: &RowView<'_>) -> Result<R>;
}

impl<R, F> RecordMaterializer<R> for F
where
	F: FnMut(&RowView<'_>) -> Result<R>,
{
	fn materialize(&mut self, row: &RowView<'_>) -> Result<R> {
		self(row)
	}
}

/// Materializes each row as its raw values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuesMaterializer;

impl RecordMaterializer<Vec<Value>> for ValuesMaterializer {
	fn materialize(&mut self, row: &RowView<'_>) -> Result<Vec<Value>> {
		row.values()
	}
}

pub(crate) fn int_column(label: &str, value: Value) -> Result<Option<i64>> {
	match value {
		Value::Null => Ok(None),
		Value::Integer(v) => Ok(Some(v)),
		Value::Text(text) => {
			text.trim().parse().map(Some).map_err(|_| mismatch(label, "integer", &Value::Text(text)))
		}
		other => Err(mismatch(label, "integer", &other)),
	}
}

pub(crate) fn text_column(label: &str, value: Value) -> Result<Option<String>> {
	match value {
		Value::Null => Ok(None),
		Value::Text(v) => Ok(Some(v)),
		Value::Integer(v) => Ok(Some(v.to_string())),
		other => Err(mismatch(label, "text", &other)),
	}
}

pub(crate) fn bool_column(label: &str, value: Value) -> Result<Option<bool>> {
	match value {
		Value::Null => Ok(None),
		Value::Integer(0) => Ok(Some(false)),
		Value::Integer(1) => Ok(Some(true)),
		Value::Text(text) => match text.as_str() {
			"0" | "false" => Ok(Some(false)),
			"1" | "true" => Ok(Some(true)),
			_ => Err(mismatch(label, "boolean", &Value::Text(text))),
		},
		other => Err(mismatch(label, "boolean", &other)),
	}
}

fn mismatch(label: &str, expected: &str, found: &Value) -> Error {
	Error::Materialize {
		column: label.to_string(),
		reason: format!("expected {expected}, found {}", found.type_name()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn int_column_accepts_numeric_text() {
		assert_eq!(int_column("id", Value::Text(" 42".to_string())).expect("parse"), Some(42));
		assert_eq!(int_column("id", Value::Null).expect("null"), None);
		let err = int_column("id", Value::Float(1.5)).expect_err("float is rejected");
		assert_eq!(err.to_string(), "cannot materialize column `id`: expected integer, found float");
	}

	#[test]
	fn bool_column_reads_flags() {
		assert_eq!(bool_column("observed", Value::Integer(1)).expect("one"), Some(true));
		assert_eq!(bool_column("observed", Value::Text("false".to_string())).expect("text"), Some(false));
		assert!(bool_column("observed", Value::Integer(2)).is_err());
	}

	#[test]
	fn text_column_widens_integers() {
		assert_eq!(text_column("gene_id", Value::Integer(7)).expect("int"), Some("7".to_string()));
		assert!(text_column("gene_id", Value::Blob(vec![1])).is_err());
	}
}
