use exprdao::{Error, Result, RowView, Value};

pub fn rows(ids: &[i64]) -> Vec<Vec<Value>> {
	ids.iter().map(|id| vec![Value::Integer(*id)]).collect()
}

pub fn id(row: &RowView<'_>) -> Result<i64> {
	row.get(1)?.as_i64().ok_or_else(|| Error::Materialize {
		column: "id".to_string(),
		reason: "expected integer".to_string(),
	})
}
