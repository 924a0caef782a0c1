//! Transfer records of the expression-data schema and the materializer
//! that builds them from labelled columns.

use serde::{Deserialize, Serialize};

use crate::dedup::DedupRecord;
use crate::error::Result;
use crate::materialize::{RecordMaterializer, RowView, bool_column, int_column, text_column};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
	Species,
	Gene,
	AnatEntity,
	ExpressionCall,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpeciesRecord {
	pub id: Option<i64>,
	pub genus: Option<String>,
	pub species_name: Option<String>,
	pub common_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GeneRecord {
	pub id: Option<String>,
	pub name: Option<String>,
	pub description: Option<String>,
	pub species_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AnatEntityRecord {
	pub id: Option<String>,
	pub name: Option<String>,
	pub description: Option<String>,
}

/// Expression call of a gene in one condition. Identified by the gene and
/// the condition together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExpressionCallRecord {
	pub gene_id: Option<String>,
	pub condition_id: Option<i64>,
	pub anat_entity_id: Option<String>,
	pub call_type: Option<String>,
	pub observed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Record {
	Species(SpeciesRecord),
	Gene(GeneRecord),
	AnatEntity(AnatEntityRecord),
	ExpressionCall(ExpressionCallRecord),
}

impl Record {
	#[must_use]
	pub const fn kind(&self) -> RecordKind {
		match self {
			Self::Species(_) => RecordKind::Species,
			Self::Gene(_) => RecordKind::Gene,
			Self::AnatEntity(_) => RecordKind::AnatEntity,
			Self::ExpressionCall(_) => RecordKind::ExpressionCall,
		}
	}
}

impl DedupRecord for Record {
	fn has_identity(&self) -> bool {
		match self {
			Self::Species(species) => species.id.is_some(),
			Self::Gene(gene) => gene.id.is_some(),
			Self::AnatEntity(entity) => entity.id.is_some(),
			Self::ExpressionCall(call) => call.gene_id.is_some() && call.condition_id.is_some(),
		}
	}
}

/// Builds records of one kind from column labels. Columns the kind does not
/// know are ignored; absent columns leave their field empty.
#[derive(Debug, Clone, Copy)]
pub struct KindMaterializer {
	kind: RecordKind,
}

impl KindMaterializer {
	#[must_use]
	pub const fn new(kind: RecordKind) -> Self {
		Self { kind }
	}

	#[must_use]
	pub const fn kind(&self) -> RecordKind {
		self.kind
	}
}

impl RecordMaterializer<Record> for KindMaterializer {
	fn materialize(&mut self, row: &RowView<'_>) -> Result<Record> {
		match self.kind {
			RecordKind::Species => species(row).map(Record::Species),
			RecordKind::Gene => gene(row).map(Record::Gene),
			RecordKind::AnatEntity => anat_entity(row).map(Record::AnatEntity),
			RecordKind::ExpressionCall => expression_call(row).map(Record::ExpressionCall),
		}
	}
}

fn species(row: &RowView<'_>) -> Result<SpeciesRecord> {
	let mut record = SpeciesRecord::default();
	for (position, label) in row.labels().iter() {
		let value = row.get(position)?;
		match label {
			"species_id" => record.id = int_column(label, value)?,
			"genus" => record.genus = text_column(label, value)?,
			"species_name" => record.species_name = text_column(label, value)?,
			"common_name" => record.common_name = text_column(label, value)?,
			_ => {}
		}
	}
	Ok(record)
}

fn gene(row: &RowView<'_>) -> Result<GeneRecord> {
	let mut record = GeneRecord::default();
	for (position, label) in row.labels().iter() {
		let value = row.get(position)?;
		match label {
			"gene_id" => record.id = text_column(label, value)?,
			"gene_name" => record.name = text_column(label, value)?,
			"gene_description" => record.description = text_column(label, value)?,
			"species_id" => record.species_id = int_column(label, value)?,
			_ => {}
		}
	}
	Ok(record)
}

fn anat_entity(row: &RowView<'_>) -> Result<AnatEntityRecord> {
	let mut record = AnatEntityRecord::default();
	for (position, label) in row.labels().iter() {
		let value = row.get(position)?;
		match label {
			"anat_entity_id" => record.id = text_column(label, value)?,
			"anat_entity_name" => record.name = text_column(label, value)?,
			"anat_entity_description" => record.description = text_column(label, value)?,
			_ => {}
		}
	}
	Ok(record)
}

fn expression_call(row: &RowView<'_>) -> Result<ExpressionCallRecord> {
	let mut record = ExpressionCallRecord::default();
	for (position, label) in row.labels().iter() {
		let value = row.get(position)?;
		match label {
			"gene_id" => record.gene_id = text_column(label, value)?,
			"condition_id" => record.condition_id = int_column(label, value)?,
			"anat_entity_id" => record.anat_entity_id = text_column(label, value)?,
			"call_type" => record.call_type = text_column(label, value)?,
			"observed" => record.observed = bool_column(label, value)?,
			_ => {}
		}
	}
	Ok(record)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::statement::RowCursor;
	use crate::value::{ColumnLabels, Value};

	struct OneRow(Vec<(&'static str, Value)>);

	impl RowCursor for OneRow {
		fn advance(&mut self) -> Result<bool> {
			Ok(false)
		}

		fn column_count(&self) -> usize {
			self.0.len()
		}

		fn column_label(&self, position: usize) -> Option<String> {
			self.0.get(position - 1).map(|(label, _)| (*label).to_string())
		}

		fn value(&self, position: usize) -> Result<Value> {
			Ok(self.0.get(position - 1).map(|(_, value)| value.clone()).unwrap_or(Value::Null))
		}
	}

	fn materialize(kind: RecordKind, columns: Vec<(&'static str, Value)>) -> Result<Record> {
		let rows = OneRow(columns);
		let labels = ColumnLabels::capture(&rows);
		KindMaterializer::new(kind).materialize(&RowView::new(&rows, &labels))
	}

	#[test]
	fn gene_reads_labelled_columns_and_ignores_unknown_ones() {
		let record = materialize(
			RecordKind::Gene,
			vec![
				("gene_id", Value::from("ENSG00000139618")),
				("gene_name", Value::from("BRCA2")),
				("species_id", Value::Integer(9606)),
				("export_rank", Value::Float(1.5)),
			],
		)
		.expect("materialize gene");

		assert_eq!(
			record,
			Record::Gene(GeneRecord {
				id: Some("ENSG00000139618".to_string()),
				name: Some("BRCA2".to_string()),
				description: None,
				species_id: Some(9606),
			})
		);
		assert_eq!(record.kind(), RecordKind::Gene);
		assert!(record.has_identity());
	}

	#[test]
	fn expression_call_needs_gene_and_condition_for_identity() {
		let partial = materialize(
			RecordKind::ExpressionCall,
			vec![("gene_id", Value::from("ENSG01")), ("observed", Value::Integer(1))],
		)
		.expect("materialize call");
		assert!(!partial.has_identity());

		let complete = materialize(
			RecordKind::ExpressionCall,
			vec![("gene_id", Value::from("ENSG01")), ("condition_id", Value::Integer(3))],
		)
		.expect("materialize call");
		assert!(complete.has_identity());
	}

	#[test]
	fn wrongly_typed_column_fails() {
		let err = materialize(RecordKind::Species, vec![("species_id", Value::Blob(vec![0]))])
			.expect_err("blob species id");
		assert!(matches!(err, crate::Error::Materialize { ref column, .. } if column == "species_id"));
	}
}
