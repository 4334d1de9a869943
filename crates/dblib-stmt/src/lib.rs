//! # dblib-stmt
//!
//! Statement handles over a dblib-style TDS client.
//!
//! A [`Connection`] wraps a protocol handle implementing [`DbProcess`].
//! Statements prepared on it run either as a language batch or as an RPC
//! call, and read results through a [`Cursor`] that walks result sets and
//! rows and materializes column values with the connection's
//! [`Policy`](dblib_types::Policy).
//!
//! ## RPC statements
//!
//! | Mode | Procedure called | Parameters sent |
//! |------|------------------|-----------------|
//! | [`RpcMode::Procedure`] | the statement text | bound parameters |
//! | [`RpcMode::ExecSql`] | `sp_executesql` | rewritten text, declaration list, bound parameters |
//!
//! Positional parameters are bound before named ones; an input-output
//! parameter named `@RETVAL` receives the procedure's return status.
//!
//! ```rust,ignore
//! use dblib_stmt::{BoundParam, Connection, ConnectionConfig, ParamKey, PrepareOptions};
//!
//! let mut conn = Connection::new(process, ConnectionConfig::default());
//! let mut stmt = conn.prepare("SELECT * FROM t WHERE c = ?", PrepareOptions::exec_sql());
//! stmt.bind_param(BoundParam::new(ParamKey::Position(0), "x"))?;
//! stmt.execute()?;
//! while stmt.fetch()? {
//!     let value = stmt.column_value(0)?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod instrumentation;
pub mod params;
pub mod process;
pub mod rewrite;
pub mod rpc;
pub mod statement;

pub use config::{ConnectionConfig, PrepareOptions, RpcMode};
pub use connection::Connection;
pub use cursor::{ColumnDescriptor, Cursor, CursorState};
pub use error::{Error, ErrorRecord, GENERAL_ERROR, Result};
pub use instrumentation::SanitizationConfig;
pub use params::{BoundParam, ParamBinder, ParamDirection, ParamKey, ParamState, RETURN_STATUS_NAME};
pub use process::{
    ColumnTypeInfo, DbProcess, ProcessFailure, ResultsStatus, RetCode, RowStatus, RpcParam,
    RpcStatus,
};
pub use rewrite::rewrite_markers;
pub use rpc::{EXECSQL_PROCEDURE, RpcState, declarations};
pub use statement::{ColumnMeta, Statement, StatementAttr, TypeCategory};
