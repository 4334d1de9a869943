//! The protocol handle consumed by statements.
//!
//! [`DbProcess`] is the surface of a dblib `DBPROCESS` this layer needs:
//! command submission, result and row iteration, column and return-value
//! accessors, RPC construction and cancellation. Column and return-value
//! indexes are 0-based here; implementations over a real client library add
//! one when calling into it.

use bitflags::bitflags;
use dblib_types::{Converter, TdsVersion};
use thiserror::Error;

/// A protocol call reported `FAIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("protocol call failed")]
pub struct ProcessFailure;

/// Result of a protocol call that either succeeds or fails.
pub type RetCode = std::result::Result<(), ProcessFailure>;

/// Outcome of asking for the next result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsStatus {
    /// A result set is current.
    Succeed,
    /// Every result set has been consumed.
    NoMoreResults,
    /// The request failed.
    Fail,
}

/// Outcome of asking for the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// A row is current.
    Row,
    /// The current result set has no more rows.
    NoMoreRows,
    /// The request failed.
    Fail,
}

/// Precision and scale of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnTypeInfo {
    /// Declared precision.
    pub precision: i32,
    /// Declared scale.
    pub scale: i32,
}

bitflags! {
    /// RPC parameter status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RpcStatus: u8 {
        /// Ask the server to return the parameter's value.
        const RETURN = 0x01;
    }
}

/// One parameter attached to an RPC call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpcParam<'a> {
    /// `@`-prefixed name, `None` for positional parameters.
    pub name: Option<&'a str>,
    /// Status bits.
    pub status: RpcStatus,
    /// Wire type code.
    pub type_code: i32,
    /// Maximum returned length; only set for output parameters.
    pub max_len: Option<usize>,
    /// Encoded value, `None` for null.
    pub value: Option<&'a [u8]>,
}

impl RpcParam<'_> {
    /// Check whether the server is asked to return this parameter.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.status.contains(RpcStatus::RETURN)
    }
}

/// A dblib connection handle.
///
/// Every call is blocking. Implementations also provide the conversion
/// facility used to materialize column and return values.
pub trait DbProcess: Converter {
    /// Append text to the command buffer (`dbcmd`).
    fn send_command(&mut self, sql: &str) -> RetCode;

    /// Send the command buffer to the server (`dbsqlexec`).
    fn execute_command(&mut self) -> RetCode;

    /// Move to the next result set (`dbresults`).
    fn next_result(&mut self) -> ResultsStatus;

    /// Move to the next row of the current result set (`dbnextrow`).
    fn next_row(&mut self) -> RowStatus;

    /// Columns in the current result set.
    fn column_count(&self) -> i32;

    /// Row count reported for the current result (`DBCOUNT`).
    fn row_count(&self) -> i64;

    /// Server-reported column name; `None` or empty for computed columns.
    fn column_name(&self, index: usize) -> Option<&str>;

    /// Maximum column length.
    fn column_length(&self, index: usize) -> i32;

    /// Column wire type code.
    fn column_type(&self, index: usize) -> i32;

    /// Column precision and scale.
    fn column_type_info(&self, index: usize) -> Option<ColumnTypeInfo>;

    /// Source column of a column, for browse-mode results.
    fn column_source(&self, index: usize) -> Option<&str>;

    /// User-defined type id of a column.
    fn column_user_type(&self, index: usize) -> i32;

    /// Current row's buffer for a column; `None` for null.
    fn column_data(&self, index: usize) -> Option<&[u8]>;

    /// Output values returned by the last RPC (`dbnumrets`).
    fn return_count(&self) -> usize;

    /// Wire type code of an output value.
    fn return_type(&self, index: usize) -> i32;

    /// Buffer of an output value; `None` for null.
    fn return_data(&self, index: usize) -> Option<&[u8]>;

    /// Whether the procedure's return status is available.
    fn has_return_status(&self) -> bool;

    /// The procedure's return status.
    fn return_status(&self) -> i32;

    /// Start building an RPC call to `name`.
    fn rpc_init(&mut self, name: &str) -> RetCode;

    /// Attach a parameter to the RPC call being built.
    fn rpc_param(&mut self, param: &RpcParam<'_>) -> RetCode;

    /// Send the RPC call.
    fn rpc_exec(&mut self) -> RetCode;

    /// Wait for the server's completion status (`dbsqlok`).
    fn sql_ok(&mut self) -> RetCode;

    /// Discard a partially built RPC call.
    fn rpc_reset(&mut self);

    /// Discard any pending results (`dbcancel`).
    fn cancel(&mut self);

    /// Negotiated protocol version.
    fn tds_version(&self) -> TdsVersion;
}
