//! Scripted protocol handle for statement tests.
//!
//! [`MockProcess`] replays queued [`MockBatch`]es: each command execution
//! or RPC call consumes the next batch, whose results are then walked with
//! `next_result`/`next_row`. Every call is recorded so tests can assert on
//! what was sent.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dblib_testing::mock_process::{MockBatch, MockColumn, MockProcess, MockResult, ScalarValue};
//!
//! let process = MockProcess::builder()
//!     .with_batch(MockBatch::new().with_result(MockResult::rows(
//!         vec![MockColumn::int("id")],
//!         vec![vec![ScalarValue::Int(1)]],
//!     )?))
//!     .build();
//! ```

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use dblib_stmt::{
    ColumnTypeInfo, DbProcess, ProcessFailure, ResultsStatus, RetCode, RowStatus, RpcParam,
    RpcStatus,
};
use dblib_types::{Converter, DateRec, NativeConverter, TdsVersion, TypeId};
use thiserror::Error;

/// Error building a mock script.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockError {
    /// A row does not have one value per column.
    #[error("row {row} has {actual} values, expected {expected}")]
    RowWidth {
        /// Row index.
        row: usize,
        /// Columns in the result.
        expected: usize,
        /// Values in the row.
        actual: usize,
    },
}

/// Result type for mock script construction.
pub type Result<T> = std::result::Result<T, MockError>;

/// A value in a mock row or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// NULL.
    Null,
    /// `bit`.
    Bit(bool),
    /// `tinyint`.
    TinyInt(u8),
    /// `smallint`.
    SmallInt(i16),
    /// `int`.
    Int(i32),
    /// `bigint`.
    BigInt(i64),
    /// `float`.
    Double(f64),
    /// `varchar`.
    String(String),
    /// `varbinary`.
    Binary(Vec<u8>),
    /// Pre-encoded buffer of any type.
    Raw(TypeId, Bytes),
}

impl ScalarValue {
    /// Natural wire type of the value.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Null | Self::String(_) => TypeId::VarChar,
            Self::Bit(_) => TypeId::Bit,
            Self::TinyInt(_) => TypeId::Int1,
            Self::SmallInt(_) => TypeId::Int2,
            Self::Int(_) => TypeId::Int4,
            Self::BigInt(_) => TypeId::Int8,
            Self::Double(_) => TypeId::Float8,
            Self::Binary(_) => TypeId::VarBinary,
            Self::Raw(ty, _) => *ty,
        }
    }

    /// Buffer as the protocol hands it out; `None` for NULL.
    #[must_use]
    pub fn encode(&self) -> Option<Bytes> {
        let bytes = match self {
            Self::Null => return None,
            Self::Bit(v) => Bytes::copy_from_slice(&[u8::from(*v)]),
            Self::TinyInt(v) => Bytes::copy_from_slice(&[*v]),
            Self::SmallInt(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Self::Int(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Self::BigInt(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Self::Double(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            Self::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            Self::Binary(b) => Bytes::copy_from_slice(b),
            Self::Raw(_, b) => b.clone(),
        };
        Some(bytes)
    }
}

/// Mock column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockColumn {
    /// Column name; empty for computed columns.
    pub name: String,
    /// Wire type.
    pub type_id: TypeId,
    /// Maximum length.
    pub max_length: i32,
    /// Precision and scale; `None` when the protocol has no type info.
    pub type_info: Option<ColumnTypeInfo>,
    /// Source column.
    pub source: Option<String>,
    /// User-defined type id.
    pub user_type: i32,
}

impl MockColumn {
    /// Create a column definition.
    pub fn new(name: impl Into<String>, type_id: TypeId, max_length: i32) -> Self {
        Self {
            name: name.into(),
            type_id,
            max_length,
            type_info: Some(ColumnTypeInfo::default()),
            source: None,
            user_type: 0,
        }
    }

    /// Create an `int` column.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, TypeId::Int4, 4)
    }

    /// Create a `bigint` column.
    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, TypeId::Int8, 8)
    }

    /// Create a `varchar(n)` column.
    pub fn varchar(name: impl Into<String>, max_len: i32) -> Self {
        Self::new(name, TypeId::VarChar, max_len)
    }

    /// Create an unnamed column, as returned for expressions.
    pub fn computed(type_id: TypeId, max_length: i32) -> Self {
        Self::new("", type_id, max_length)
    }

    /// Set precision and scale.
    #[must_use]
    pub fn with_type_info(mut self, precision: i32, scale: i32) -> Self {
        self.type_info = Some(ColumnTypeInfo { precision, scale });
        self
    }

    /// Report no type information.
    #[must_use]
    pub fn without_type_info(mut self) -> Self {
        self.type_info = None;
        self
    }

    /// Set the source column.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the user-defined type id.
    #[must_use]
    pub fn with_user_type(mut self, user_type: i32) -> Self {
        self.user_type = user_type;
        self
    }
}

/// One result of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResult {
    /// A result set.
    Rows {
        /// Column definitions.
        columns: Vec<MockColumn>,
        /// Row buffers, one per column.
        rows: Vec<Vec<Option<Bytes>>>,
        /// Reported row count.
        count: i64,
        /// Fail the fetch after this many rows.
        fail_after: Option<usize>,
    },
    /// A result without columns, e.g. from `UPDATE`.
    Done {
        /// Reported row count.
        count: i64,
    },
    /// `dbresults` fails.
    Fail,
}

impl MockResult {
    /// A result set from scalar rows.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<ScalarValue>>) -> Result<Self> {
        let expected = columns.len();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(row, values)| {
                if values.len() == expected {
                    Ok(values.iter().map(ScalarValue::encode).collect())
                } else {
                    Err(MockError::RowWidth {
                        row,
                        expected,
                        actual: values.len(),
                    })
                }
            })
            .collect::<Result<Vec<Vec<Option<Bytes>>>>>()?;
        let count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        Ok(Self::Rows {
            columns,
            rows,
            count,
            fail_after: None,
        })
    }

    /// A result without columns.
    #[must_use]
    pub fn done(count: i64) -> Self {
        Self::Done { count }
    }

    /// Fail row fetching after `rows` rows.
    #[must_use]
    pub fn failing_after(mut self, rows: usize) -> Self {
        if let Self::Rows { fail_after, .. } = &mut self {
            *fail_after = Some(rows);
        }
        self
    }
}

/// Everything the server sends back for one command batch or RPC call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockBatch {
    /// Results in order.
    pub results: Vec<MockResult>,
    /// Output parameter values in order.
    pub returns: Vec<ScalarValue>,
    /// Procedure return status.
    pub return_status: Option<i32>,
}

impl MockBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result.
    #[must_use]
    pub fn with_result(mut self, result: MockResult) -> Self {
        self.results.push(result);
        self
    }

    /// Append an output parameter value.
    #[must_use]
    pub fn with_return(mut self, value: ScalarValue) -> Self {
        self.returns.push(value);
        self
    }

    /// Set the procedure return status.
    #[must_use]
    pub fn with_return_status(mut self, status: i32) -> Self {
        self.return_status = Some(status);
        self
    }
}

/// A call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `send_command`.
    SendCommand,
    /// `execute_command`.
    ExecuteCommand,
    /// `rpc_init`.
    RpcInit,
    /// The n-th (0-based) `rpc_param` of a call.
    RpcParam(usize),
    /// `rpc_exec`.
    RpcExec,
    /// `sql_ok`.
    SqlOk,
}

/// A parameter as it was attached to an RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedParam {
    /// Name, `None` for unnamed parameters.
    pub name: Option<String>,
    /// Status bits.
    pub status: RpcStatus,
    /// Wire type code.
    pub type_code: i32,
    /// Maximum returned length.
    pub max_len: Option<usize>,
    /// Value buffer.
    pub value: Option<Bytes>,
}

impl RecordedParam {
    /// Value as text, for `varchar` parameters.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.value
            .as_deref()
            .and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// A recorded protocol call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `send_command`.
    SendCommand(String),
    /// `execute_command`.
    ExecuteCommand,
    /// `next_result`.
    NextResult,
    /// `next_row`.
    NextRow,
    /// `rpc_init`.
    RpcInit(String),
    /// `rpc_param`.
    RpcParam(RecordedParam),
    /// `rpc_exec`.
    RpcExec,
    /// `sql_ok`.
    SqlOk,
    /// `rpc_reset`.
    RpcReset,
    /// `cancel`.
    Cancel,
}

/// Result set being read.
#[derive(Debug)]
struct ActiveResult {
    columns: Vec<MockColumn>,
    rows: VecDeque<Vec<Option<Bytes>>>,
    current: Option<Vec<Option<Bytes>>>,
    fetched: usize,
    fail_after: Option<usize>,
}

/// Builder for [`MockProcess`].
#[derive(Debug, Default)]
pub struct MockProcessBuilder {
    batches: VecDeque<MockBatch>,
    failures: HashSet<FailPoint>,
    version: TdsVersion,
}

impl MockProcessBuilder {
    /// Queue a batch.
    #[must_use]
    pub fn with_batch(mut self, batch: MockBatch) -> Self {
        self.batches.push_back(batch);
        self
    }

    /// Make a call fail.
    #[must_use]
    pub fn with_failure(mut self, point: FailPoint) -> Self {
        self.failures.insert(point);
        self
    }

    /// Set the negotiated protocol version.
    #[must_use]
    pub fn with_tds_version(mut self, version: TdsVersion) -> Self {
        self.version = version;
        self
    }

    /// Build the process.
    #[must_use]
    pub fn build(self) -> MockProcess {
        MockProcess {
            batches: self.batches,
            failures: self.failures,
            version: self.version,
            calls: Vec::new(),
            pending: VecDeque::new(),
            active: None,
            count: -1,
            returns: Vec::new(),
            return_status: None,
            rpc_params: 0,
        }
    }
}

/// Scripted [`DbProcess`].
#[derive(Debug)]
pub struct MockProcess {
    batches: VecDeque<MockBatch>,
    failures: HashSet<FailPoint>,
    version: TdsVersion,
    calls: Vec<MockCall>,
    pending: VecDeque<MockResult>,
    active: Option<ActiveResult>,
    count: i64,
    returns: Vec<(TypeId, Option<Bytes>)>,
    return_status: Option<i32>,
    rpc_params: usize,
}

impl MockProcess {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> MockProcessBuilder {
        MockProcessBuilder::default()
    }

    /// Every call made so far.
    #[must_use]
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Forget recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Count recorded calls matching a predicate.
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Parameters attached since the last `rpc_init`.
    #[must_use]
    pub fn rpc_params(&self) -> Vec<&RecordedParam> {
        let start = self
            .calls
            .iter()
            .rposition(|c| matches!(c, MockCall::RpcInit(_)))
            .map_or(0, |i| i + 1);
        self.calls[start..]
            .iter()
            .filter_map(|c| match c {
                MockCall::RpcParam(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Name passed to the last `rpc_init`.
    #[must_use]
    pub fn last_rpc_name(&self) -> Option<&str> {
        self.calls.iter().rev().find_map(|c| match c {
            MockCall::RpcInit(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Batches not yet consumed.
    #[must_use]
    pub fn remaining_batches(&self) -> usize {
        self.batches.len()
    }

    /// Queue another batch.
    pub fn push_batch(&mut self, batch: MockBatch) {
        self.batches.push_back(batch);
    }

    fn check(&self, point: FailPoint) -> RetCode {
        if self.failures.contains(&point) {
            Err(ProcessFailure)
        } else {
            Ok(())
        }
    }

    /// Make the next batch's results current.
    fn load_batch(&mut self) {
        let batch = self.batches.pop_front().unwrap_or_default();
        self.pending = batch.results.into();
        self.active = None;
        self.count = -1;
        self.returns = batch
            .returns
            .iter()
            .map(|v| (v.type_id(), v.encode()))
            .collect();
        self.return_status = batch.return_status;
    }

    fn column(&self, index: usize) -> Option<&MockColumn> {
        self.active.as_ref().and_then(|a| a.columns.get(index))
    }
}

impl Converter for MockProcess {
    fn will_convert(&self, code: i32) -> bool {
        NativeConverter.will_convert(code)
    }

    fn convert_to_char(&self, code: i32, data: &[u8], dest: &mut [u8]) -> i32 {
        NativeConverter.convert_to_char(code, data, dest)
    }

    fn convert_to_float(&self, code: i32, data: &[u8]) -> Option<f64> {
        NativeConverter.convert_to_float(code, data)
    }

    fn crack_datetime(&self, code: i32, data: &[u8]) -> Option<DateRec> {
        NativeConverter.crack_datetime(code, data)
    }
}

impl DbProcess for MockProcess {
    fn send_command(&mut self, sql: &str) -> RetCode {
        self.calls.push(MockCall::SendCommand(sql.to_string()));
        self.check(FailPoint::SendCommand)
    }

    fn execute_command(&mut self) -> RetCode {
        self.calls.push(MockCall::ExecuteCommand);
        self.check(FailPoint::ExecuteCommand)?;
        self.load_batch();
        Ok(())
    }

    fn next_result(&mut self) -> ResultsStatus {
        self.calls.push(MockCall::NextResult);
        self.active = None;
        match self.pending.pop_front() {
            None => ResultsStatus::NoMoreResults,
            Some(MockResult::Fail) => ResultsStatus::Fail,
            Some(MockResult::Done { count }) => {
                self.count = count;
                ResultsStatus::Succeed
            }
            Some(MockResult::Rows {
                columns,
                rows,
                count,
                fail_after,
            }) => {
                self.count = count;
                self.active = Some(ActiveResult {
                    columns,
                    rows: rows.into(),
                    current: None,
                    fetched: 0,
                    fail_after,
                });
                ResultsStatus::Succeed
            }
        }
    }

    fn next_row(&mut self) -> RowStatus {
        self.calls.push(MockCall::NextRow);
        let Some(active) = self.active.as_mut() else {
            return RowStatus::NoMoreRows;
        };
        if active.fail_after == Some(active.fetched) {
            return RowStatus::Fail;
        }
        active.current = active.rows.pop_front();
        match active.current {
            Some(_) => {
                active.fetched += 1;
                RowStatus::Row
            }
            None => RowStatus::NoMoreRows,
        }
    }

    fn column_count(&self) -> i32 {
        self.active
            .as_ref()
            .map_or(0, |a| i32::try_from(a.columns.len()).unwrap_or(i32::MAX))
    }

    fn row_count(&self) -> i64 {
        self.count
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.column(index).map(|c| c.name.as_str())
    }

    fn column_length(&self, index: usize) -> i32 {
        self.column(index).map_or(-1, |c| c.max_length)
    }

    fn column_type(&self, index: usize) -> i32 {
        self.column(index).map_or(-1, |c| c.type_id.code())
    }

    fn column_type_info(&self, index: usize) -> Option<ColumnTypeInfo> {
        self.column(index).and_then(|c| c.type_info)
    }

    fn column_source(&self, index: usize) -> Option<&str> {
        self.column(index).and_then(|c| c.source.as_deref())
    }

    fn column_user_type(&self, index: usize) -> i32 {
        self.column(index).map_or(0, |c| c.user_type)
    }

    fn column_data(&self, index: usize) -> Option<&[u8]> {
        self.active
            .as_ref()
            .and_then(|a| a.current.as_ref())
            .and_then(|row| row.get(index))
            .and_then(|v| v.as_deref())
    }

    fn return_count(&self) -> usize {
        self.returns.len()
    }

    fn return_type(&self, index: usize) -> i32 {
        self.returns.get(index).map_or(-1, |(ty, _)| ty.code())
    }

    fn return_data(&self, index: usize) -> Option<&[u8]> {
        self.returns.get(index).and_then(|(_, v)| v.as_deref())
    }

    fn has_return_status(&self) -> bool {
        self.return_status.is_some()
    }

    fn return_status(&self) -> i32 {
        self.return_status.unwrap_or_default()
    }

    fn rpc_init(&mut self, name: &str) -> RetCode {
        self.calls.push(MockCall::RpcInit(name.to_string()));
        self.rpc_params = 0;
        self.check(FailPoint::RpcInit)
    }

    fn rpc_param(&mut self, param: &RpcParam<'_>) -> RetCode {
        self.calls.push(MockCall::RpcParam(RecordedParam {
            name: param.name.map(str::to_string),
            status: param.status,
            type_code: param.type_code,
            max_len: param.max_len,
            value: param.value.map(Bytes::copy_from_slice),
        }));
        let index = self.rpc_params;
        self.rpc_params += 1;
        self.check(FailPoint::RpcParam(index))
    }

    fn rpc_exec(&mut self) -> RetCode {
        self.calls.push(MockCall::RpcExec);
        self.check(FailPoint::RpcExec)?;
        self.load_batch();
        Ok(())
    }

    fn sql_ok(&mut self) -> RetCode {
        self.calls.push(MockCall::SqlOk);
        self.check(FailPoint::SqlOk)
    }

    fn rpc_reset(&mut self) {
        self.calls.push(MockCall::RpcReset);
        self.rpc_params = 0;
    }

    fn cancel(&mut self) {
        self.calls.push(MockCall::Cancel);
        self.pending.clear();
        self.active = None;
    }

    fn tds_version(&self) -> TdsVersion {
        self.version
    }
}
