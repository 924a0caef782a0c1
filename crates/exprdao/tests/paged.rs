mod common;

use common::{id, rows};
use exprdao::memory::MemoryStatement;
use exprdao::{CursorOptions, CursorState, Error, PaginationOptions, QueryCursor, StopReason, StatementHandle};
use rstest::rstest;

fn pages(pages: &[&[i64]]) -> MemoryStatement {
	MemoryStatement::pages(["id"], pages.iter().map(|ids| rows(ids)).collect())
}

#[test]
fn stops_after_two_consecutive_empty_pages() {
	let statement = pages(&[&[1, 2], &[], &[], &[9]]);
	let log = statement.log();
	let mut cursor =
		QueryCursor::paged(statement, id, &PaginationOptions::new(1, 2, 2), false).expect("paged cursor");
	assert!(cursor.is_paged());

	assert_eq!(cursor.drain_all().expect("drain"), vec![1, 2]);
	assert_eq!(log.executions(), 3, "no fourth page after two empty ones");
	assert_eq!(log.resets(), 2);
	assert_eq!(log.closes(), 1, "the reused statement is closed once");
}

#[test]
fn an_empty_page_followed_by_data_resumes_iteration() {
	let statement = pages(&[&[1, 2], &[], &[3], &[], &[]]);
	let log = statement.log();
	let mut cursor =
		QueryCursor::paged(statement, id, &PaginationOptions::new(1, 2, 2), false).expect("paged cursor");

	assert_eq!(cursor.drain_all().expect("drain"), vec![1, 2, 3]);
	assert_eq!(log.executions(), 5);
}

#[rstest]
#[case::one_step(1, vec![1, 2])]
#[case::two_steps(2, vec![1, 2, 3, 4])]
#[case::more_steps_than_data(10, vec![1, 2, 3, 4, 5, 6])]
fn max_steps_caps_page_executions(#[case] max_steps: u64, #[case] expected: Vec<i64>) {
	let statement = pages(&[&[1, 2], &[3, 4], &[5, 6]]);
	let log = statement.log();
	let options = PaginationOptions::new(1, 2, 2).with_max_steps(max_steps);
	let mut cursor = QueryCursor::paged(statement, id, &options, false).expect("paged cursor");

	assert_eq!(cursor.drain_all().expect("drain"), expected);
	let executions = u64::try_from(log.executions()).expect("small count");
	assert!(executions <= max_steps);
}

#[test]
fn offset_window_slices_the_table() {
	let statement = MemoryStatement::sliced(["id"], rows(&[10, 11, 12, 13, 14, 15, 16]), 2, 3);
	let log = statement.log();
	let mut cursor =
		QueryCursor::paged(statement, id, &PaginationOptions::new(2, 3, 3), false).expect("paged cursor");

	let mut seen = Vec::new();
	while cursor.advance().expect("advance") {
		seen.push(*cursor.current().expect("current"));
	}
	assert_eq!(seen, vec![10, 11, 12, 13, 14, 15, 16]);
	// 3 + 3 + 1 rows, then two empty probes
	assert_eq!(log.executions(), 5);
	let controller = cursor.pagination().expect("paged cursor has a controller");
	assert_eq!(controller.current_offset(), 12);
	assert_eq!(controller.stop_reason(), Some(StopReason::EmptyPages));
}

#[test]
fn dedup_spans_pages() {
	let statement = pages(&[&[1, 2], &[2, 3], &[3, 1]]);
	let options = CursorOptions::new().with_filter_duplicates(true).paged(PaginationOptions::new(1, 2, 2));
	let mut cursor = QueryCursor::with_options([statement], id, &options).expect("paged cursor");
	assert!(cursor.is_filter_duplicates());

	assert_eq!(cursor.drain_all().expect("drain"), vec![1, 2, 3]);
}

#[test]
fn a_page_of_only_duplicates_is_not_empty() {
	let statement = pages(&[&[1, 2], &[1, 2], &[3], &[], &[]]);
	let log = statement.log();
	let mut cursor =
		QueryCursor::paged(statement, id, &PaginationOptions::new(1, 2, 2), true).expect("paged cursor");

	assert_eq!(cursor.drain_all().expect("drain"), vec![1, 2, 3]);
	assert_eq!(log.executions(), 5);
}

#[test]
fn missing_row_count_is_rejected_at_construction() {
	let statement = pages(&[&[1]]);
	let log = statement.log();
	let options = PaginationOptions { row_count: None, ..PaginationOptions::new(1, 2, 1) };

	let err = QueryCursor::paged(statement, id, &options, false).err().expect("invalid options");
	assert!(matches!(err, Error::IllegalArgument(_)));
	assert_eq!(log.executions(), 0);
}

#[test]
fn executed_statement_cannot_be_paged() {
	let mut statement = pages(&[&[1]]);
	let _rows = statement.execute().expect("execute elsewhere");
	let err = QueryCursor::paged(statement, id, &PaginationOptions::new(1, 2, 1), false)
		.err()
		.expect("executed statement");
	assert!(matches!(err, Error::IllegalArgument(_)));
}

#[test]
fn closing_mid_page_releases_the_statement() {
	let statement = pages(&[&[1, 2], &[3]]);
	let log = statement.log();
	let mut cursor =
		QueryCursor::paged(statement, id, &PaginationOptions::new(1, 2, 2), false).expect("paged cursor");

	assert!(cursor.advance().expect("advance"));
	cursor.close().expect("close");
	cursor.close().expect("close again");
	assert_eq!(log.closes(), 1);
	assert_eq!(cursor.state(), CursorState::Closed);
	assert!(!cursor.advance().expect("closed"));
}
