//! Statement error types.

use thiserror::Error;

/// SQLSTATE reported for every server-class failure at this layer.
pub const GENERAL_ERROR: &str = "HY000";

/// Errors raised by statement operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Advancing to the next result set failed.
    #[error("rowset retrieval failed")]
    RowsetFailed,

    /// Fetching the next row failed.
    #[error("row fetch failed")]
    FetchFailed,

    /// Sending or executing a command batch failed.
    #[error("command execution failed")]
    CommandFailed,

    /// The RPC call could not be initialized.
    #[error("RPC: unable to init")]
    RpcInit,

    /// A parameter could not be attached to the RPC call.
    #[error("RPC: unable to set parameter {name}")]
    RpcBind {
        /// Parameter name, or its position for unnamed parameters.
        name: String,
    },

    /// The RPC call or its completion check failed.
    #[error("RPC: execution failed")]
    RpcExec,

    /// The server returned fewer output values than were bound.
    #[error("RPC: missing output parameter at position {position} ({available} returned)")]
    MissingOutputParam {
        /// Retrieval position assigned at bind time.
        position: usize,
        /// Number of output values the server reported.
        available: usize,
    },

    /// The bound value has no wire representation.
    #[error("RPC: unsupported variable type {type_name}")]
    UnsupportedParamType {
        /// Host type name of the rejected value.
        type_name: &'static str,
    },

    /// A statement handle was bound as a parameter.
    #[error("statement handles cannot be bound as parameters")]
    ParamIsStatement,

    /// Column index outside the active rowset.
    #[error("column {index} out of range ({count} columns)")]
    ColumnOutOfRange {
        /// Requested index.
        index: usize,
        /// Columns in the active rowset.
        count: usize,
    },

    /// No parameter is bound under this key.
    #[error("unknown parameter {0}")]
    UnknownParam(String),

    /// The attribute is fixed at prepare time.
    #[error("attribute is read-only")]
    ReadOnlyAttribute,

    /// The attribute only applies to RPC statements.
    #[error("attribute requires an RPC statement")]
    AttributeRequiresRpc,

    /// The protocol has no type information for the column.
    #[error("no type information for column {0}")]
    NoTypeInfo(usize),
}

impl Error {
    /// SQLSTATE for server-class errors, `None` for local contract
    /// violations.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&'static str> {
        self.is_server_error().then_some(GENERAL_ERROR)
    }

    /// Check if this error belongs to the generic server-error class.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::RowsetFailed
                | Self::FetchFailed
                | Self::CommandFailed
                | Self::RpcInit
                | Self::RpcBind { .. }
                | Self::RpcExec
                | Self::MissingOutputParam { .. }
                | Self::UnsupportedParamType { .. }
        )
    }

    /// The error record to store for this error, if it is server-class.
    #[must_use]
    pub fn record(&self) -> Option<ErrorRecord> {
        self.sqlstate().map(|sqlstate| ErrorRecord {
            sqlstate,
            message: self.to_string(),
        })
    }
}

/// Last reported failure, kept on the statement and on the connection.
///
/// Overwritten by each new failure, never appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// SQLSTATE code.
    pub sqlstate: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Result type for statement operations.
pub type Result<T> = std::result::Result<T, Error>;
