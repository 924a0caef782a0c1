//! Streaming access to expression data through pre-built, parameterized
//! statements.
//!
//! A [`QueryCursor`] walks an ordered queue of statements, or re-executes a
//! single statement page by page, materializing one typed record per row and
//! optionally dropping records it already emitted.

mod cursor;
mod dedup;
mod error;
mod materialize;
pub mod memory;
mod options;
mod pagination;
mod record;
mod sequence;
mod statement;
mod value;

pub use cursor::{CursorState, QueryCursor};
pub use dedup::{DedupRecord, DuplicateFilter};
pub use error::{BoxError, Error, Result};
pub use materialize::{RecordMaterializer, RowView, ValuesMaterializer};
pub use options::CursorOptions;
pub use pagination::{
	DEFAULT_EMPTY_PAGES_BEFORE_STOP, PageWindow, PaginationController, PaginationOptions, StopReason,
};
pub use record::{
	AnatEntityRecord, ExpressionCallRecord, GeneRecord, KindMaterializer, Record, RecordKind,
	SpeciesRecord,
};
pub use sequence::Records;
pub use statement::{CancelToken, RowCursor, StatementHandle};
pub use value::{ColumnLabels, Value};
