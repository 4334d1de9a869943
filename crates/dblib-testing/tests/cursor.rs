//! Result cursor behaviour over scripted batches.
//!
//! ```bash
//! RUST_LOG=dblib_stmt=trace cargo test -p dblib-testing --test cursor
//! ```

#![allow(clippy::unwrap_used)]

use dblib_stmt::{
    Connection, ConnectionConfig, CursorState, Error, PrepareOptions, TypeCategory,
};
use dblib_testing::{MockBatch, MockCall, MockColumn, MockProcess, MockResult, ScalarValue, fixtures};
use dblib_types::{HostValue, ParamType, Policy, TypeId};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn connection(batches: Vec<MockBatch>, policy: Policy) -> Connection<MockProcess> {
    init_tracing();
    let process = batches
        .into_iter()
        .fold(MockProcess::builder(), |b, batch| b.with_batch(batch))
        .build();
    Connection::new(process, ConnectionConfig::new().policy(policy))
}

#[test]
fn test_empty_rowset_skipped() {
    let mut conn = connection(
        vec![fixtures::empty_then_orders(2).unwrap()],
        Policy::new().skip_empty_rowsets(true),
    );
    let mut stmt = conn.prepare("UPDATE t SET a = 1; SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();

    assert_eq!(
        stmt.cursor_state(),
        CursorState::RowsetActive {
            columns: 3,
            rows: 2
        }
    );
    assert_eq!(stmt.row_count(), 2);
    assert_eq!(stmt.column_count(), 3);
    assert!(stmt.is_executed());

    let calls = stmt.connection().process().calls();
    assert_eq!(calls[0], MockCall::Cancel);
    assert_eq!(
        calls[1],
        MockCall::SendCommand("UPDATE t SET a = 1; SELECT * FROM orders".to_string())
    );
    assert_eq!(
        stmt.connection()
            .process()
            .count_calls(|c| *c == MockCall::NextResult),
        2
    );
}

#[test]
fn test_empty_rowset_not_skipped() {
    let mut conn = connection(vec![fixtures::empty_then_orders(2).unwrap()], Policy::new());
    let mut stmt = conn.prepare("UPDATE t SET a = 1; SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();

    assert_eq!(stmt.cursor_state(), CursorState::Exhausted);
    assert_eq!(stmt.column_count(), 0);
    assert_eq!(stmt.affected_rows(), 0);
    assert!(!stmt.fetch().unwrap());
}

#[test]
fn test_update_reports_affected_rows() {
    let mut conn = connection(
        vec![MockBatch::new().with_result(MockResult::done(5))],
        Policy::new().skip_empty_rowsets(true),
    );
    let mut stmt = conn.prepare("UPDATE t SET a = 1", PrepareOptions::new());
    stmt.execute().unwrap();

    assert_eq!(stmt.cursor_state(), CursorState::Exhausted);
    assert_eq!(stmt.row_count(), 5);
    assert_eq!(stmt.affected_rows(), 5);
}

#[test]
fn test_no_results() {
    let mut conn = connection(vec![MockBatch::new()], Policy::new());
    let mut stmt = conn.prepare("SET NOCOUNT ON", PrepareOptions::new());
    stmt.execute().unwrap();
    assert_eq!(stmt.cursor_state(), CursorState::Exhausted);
    assert!(!stmt.next_rowset().unwrap());
}

#[test]
fn test_fetch_rows_and_values() {
    let mut conn = connection(
        vec![MockBatch::new().with_result(fixtures::orders(2).unwrap())],
        Policy::new(),
    );
    let mut stmt = conn.prepare("SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();

    assert!(stmt.fetch().unwrap());
    assert_eq!(stmt.column_value(0).unwrap(), HostValue::Int(1));
    assert_eq!(stmt.column_value(1).unwrap(), HostValue::from("customer 1"));
    assert_eq!(stmt.column_value(2).unwrap(), HostValue::Double(10.5));

    assert!(stmt.fetch().unwrap());
    assert_eq!(stmt.column_value(0).unwrap(), HostValue::Int(2));

    assert!(!stmt.fetch().unwrap());
    assert_eq!(
        stmt.column_value(3).unwrap_err(),
        Error::ColumnOutOfRange { index: 3, count: 3 }
    );
}

#[test]
fn test_null_and_verbatim_text() {
    let columns = vec![
        MockColumn::int("a"),
        MockColumn::varchar("b", 10),
    ];
    let rows = vec![vec![ScalarValue::Null, ScalarValue::String("x  ".into())]];
    let mut conn = connection(
        vec![MockBatch::new().with_result(MockResult::rows(columns, rows).unwrap())],
        Policy::new().stringify_numerics(true),
    );
    let mut stmt = conn.prepare("SELECT a, b FROM t", PrepareOptions::new());
    stmt.execute().unwrap();
    assert!(stmt.fetch().unwrap());

    assert_eq!(stmt.column_value(0).unwrap(), HostValue::Null);
    assert_eq!(stmt.column_value(1).unwrap(), HostValue::from("x  "));
}

#[test]
fn test_stringify_numerics_policy() {
    let columns = vec![MockColumn::int("a")];
    let rows = vec![vec![ScalarValue::Int(42)]];
    let mut conn = connection(
        vec![MockBatch::new().with_result(MockResult::rows(columns, rows).unwrap())],
        Policy::new().stringify_numerics(true),
    );
    let mut stmt = conn.prepare("SELECT a FROM t", PrepareOptions::new());
    stmt.execute().unwrap();
    assert!(stmt.fetch().unwrap());
    assert_eq!(stmt.column_value(0).unwrap(), HostValue::from("42"));
}

#[test]
fn test_next_rowset_drains_rows() {
    let batch = MockBatch::new()
        .with_result(fixtures::orders(3).unwrap())
        .with_result(fixtures::orders(1).unwrap());
    let mut conn = connection(vec![batch], Policy::new());
    let mut stmt = conn.prepare("SELECT * FROM orders; SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();
    assert!(stmt.fetch().unwrap());

    assert!(stmt.next_rowset().unwrap());
    assert_eq!(stmt.row_count(), 1);
    assert!(stmt.fetch().unwrap());
    assert_eq!(stmt.column_value(0).unwrap(), HostValue::Int(1));
    assert!(!stmt.fetch().unwrap());

    assert!(!stmt.next_rowset().unwrap());
    assert_eq!(stmt.cursor_state(), CursorState::Exhausted);
}

#[test]
fn test_rowset_failure_recorded() {
    let batch = MockBatch::new()
        .with_result(fixtures::orders(1).unwrap())
        .with_result(MockResult::Fail);
    let mut conn = connection(vec![batch], Policy::new());
    let mut stmt = conn.prepare("SELECT 1; SELECT 2", PrepareOptions::new());
    stmt.execute().unwrap();

    assert_eq!(stmt.next_rowset().unwrap_err(), Error::RowsetFailed);
    let record = stmt.error().unwrap();
    assert_eq!(record.sqlstate, "HY000");
    assert_eq!(stmt.connection().last_error(), Some(record));
}

#[test]
fn test_fetch_failure() {
    let batch = MockBatch::new().with_result(fixtures::orders(3).unwrap().failing_after(1));
    let mut conn = connection(vec![batch], Policy::new());
    let mut stmt = conn.prepare("SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();

    assert!(stmt.fetch().unwrap());
    assert_eq!(stmt.fetch().unwrap_err(), Error::FetchFailed);
    assert!(stmt.error().is_some());
}

#[test]
fn test_execute_failure() {
    init_tracing();
    let process = MockProcess::builder()
        .with_failure(dblib_testing::FailPoint::ExecuteCommand)
        .build();
    let mut conn = Connection::new(process, ConnectionConfig::new());
    let mut stmt = conn.prepare("SELECT * FROM missing", PrepareOptions::new());

    assert_eq!(stmt.execute().unwrap_err(), Error::CommandFailed);
    assert!(!stmt.is_executed());
    assert_eq!(stmt.error().unwrap().message, "command execution failed");
}

#[test]
fn test_reexecute_clears_error() {
    let batch = MockBatch::new().with_result(MockResult::Fail);
    let mut conn = connection(vec![batch, MockBatch::new()], Policy::new());
    let mut stmt = conn.prepare("SELECT 1", PrepareOptions::new());

    assert_eq!(stmt.execute().unwrap_err(), Error::RowsetFailed);
    assert!(stmt.error().is_some());

    stmt.execute().unwrap();
    assert!(stmt.error().is_none());
    assert!(stmt.connection().last_error().is_none());
}

#[test]
fn test_describe_computed_names() {
    let columns = vec![
        MockColumn::computed(TypeId::Int4, 4),
        MockColumn::int("x"),
        MockColumn::computed(TypeId::VarChar, 10),
        MockColumn::computed(TypeId::Int4, 4),
    ];
    let rows = vec![vec![
        ScalarValue::Int(1),
        ScalarValue::Int(2),
        ScalarValue::String("a".into()),
        ScalarValue::Int(3),
    ]];
    let mut conn = connection(
        vec![MockBatch::new().with_result(MockResult::rows(columns, rows).unwrap())],
        Policy::new(),
    );
    let mut stmt = conn.prepare("SELECT 1, x, 'a', 3 FROM t", PrepareOptions::new());
    stmt.execute().unwrap();

    let names: Vec<String> = (0..4).map(|i| stmt.describe(i).unwrap().name).collect();
    assert_eq!(names, ["computed", "x", "computed1", "computed2"]);

    let again = stmt.describe(0).unwrap();
    assert_eq!(again.name, "computed");
    assert_eq!(again.max_len, 4);
    assert_eq!(again.param_type, ParamType::Variant);

    assert_eq!(
        stmt.describe(4).unwrap_err(),
        Error::ColumnOutOfRange { index: 4, count: 4 }
    );
    assert!(stmt.error().is_none());
}

#[test]
fn test_column_meta() {
    let columns = vec![
        MockColumn::int("id").with_source("orders.id").with_user_type(7),
        MockColumn::new("price", TypeId::Decimal, 17).with_type_info(10, 2),
        MockColumn::new("flag", TypeId::Bit, 1),
        MockColumn::new("odd", TypeId::MoneyN, 8).without_type_info(),
    ];
    let mut conn = connection(
        vec![MockBatch::new().with_result(MockResult::rows(columns, Vec::new()).unwrap())],
        Policy::new(),
    );
    let mut stmt = conn.prepare("SELECT id, price, flag, odd FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();

    let id = stmt.column_meta(0).unwrap();
    assert_eq!(id.native_type, "int");
    assert_eq!(id.native_type_id, 56);
    assert_eq!(id.native_user_type_id, 7);
    assert_eq!(id.column_source, "orders.id");
    assert_eq!(id.category, TypeCategory::Integer);

    let price = stmt.column_meta(1).unwrap();
    assert_eq!((price.precision, price.scale), (10, 2));
    assert_eq!(price.max_length, 17);
    assert_eq!(price.native_type, "decimal");
    assert_eq!(price.column_source, "");
    assert_eq!(price.category, TypeCategory::String);

    assert_eq!(stmt.column_meta(2).unwrap().category, TypeCategory::Integer);
    assert_eq!(stmt.column_meta(3).unwrap_err(), Error::NoTypeInfo(3));
    assert!(matches!(
        stmt.column_meta(9),
        Err(Error::ColumnOutOfRange { index: 9, .. })
    ));
}

#[test]
fn test_dispose_clears_connection_error() {
    let batch = MockBatch::new()
        .with_result(fixtures::orders(1).unwrap())
        .with_result(MockResult::Fail);
    let mut conn = connection(vec![batch], Policy::new());
    let mut stmt = conn.prepare("SELECT 1; SELECT 2", PrepareOptions::new());
    stmt.execute().unwrap();
    assert_eq!(stmt.next_rowset().unwrap_err(), Error::RowsetFailed);
    assert!(stmt.connection().last_error().is_some());

    stmt.dispose();

    assert!(conn.last_error().is_none());
    assert_eq!(conn.process().calls().last(), Some(&MockCall::Cancel));
}

#[test]
fn test_dispose_cancels() {
    let mut conn = connection(
        vec![MockBatch::new().with_result(fixtures::orders(3).unwrap())],
        Policy::new(),
    );
    let mut stmt = conn.prepare("SELECT * FROM orders", PrepareOptions::new());
    stmt.execute().unwrap();
    stmt.dispose();

    assert_eq!(conn.process().calls().last(), Some(&MockCall::Cancel));
}
