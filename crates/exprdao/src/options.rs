use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pagination::PaginationOptions;

/// How a cursor walks its statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CursorOptions {
	/// Suppress records value-equal to one already emitted by the cursor.
	pub filter_duplicates: bool,
	/// Re-execute a single statement page by page instead of running a queue.
	pub pagination: Option<PaginationOptions>,
}

impl CursorOptions {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub const fn with_filter_duplicates(mut self, filter: bool) -> Self {
		self.filter_duplicates = filter;
		self
	}

	#[must_use]
	pub fn paged(mut self, pagination: PaginationOptions) -> Self {
		self.pagination = Some(pagination);
		self
	}

	pub fn from_json_str(json: &str) -> Result<Self> {
		let options: Self = serde_json::from_str(json)
			.map_err(|err| Error::illegal_argument(format!("invalid cursor options: {err}")))?;
		options.validate()?;
		Ok(options)
	}

	pub fn validate(&self) -> Result<()> {
		self.pagination.as_ref().map_or(Ok(()), PaginationOptions::validate)
	}

	#[must_use]
	pub const fn is_paged(&self) -> bool {
		self.pagination.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loads_paged_options_from_json() {
		let options = CursorOptions::from_json_str(
			r#"{
				"filterDuplicates": true,
				"pagination": { "offsetParamIndex": 2, "rowCountParamIndex": 3, "rowCount": 10000, "maxSteps": 40 }
			}"#,
		)
		.expect("parse options");

		assert!(options.filter_duplicates);
		let pagination = options.pagination.expect("pagination");
		assert_eq!(pagination, PaginationOptions::new(2, 3, 10_000).with_max_steps(40));
	}

	#[test]
	fn empty_json_means_unpaged_without_filtering() {
		let options = CursorOptions::from_json_str("{}").expect("parse options");
		assert_eq!(options, CursorOptions::default());
		assert!(!options.is_paged());
	}

	#[test]
	fn missing_row_count_is_rejected() {
		let err = CursorOptions::from_json_str(r#"{"pagination": {"offsetParamIndex": 1, "rowCountParamIndex": 2}}"#)
			.expect_err("row count is required");
		assert!(matches!(err, Error::IllegalArgument(_)));
	}
}
