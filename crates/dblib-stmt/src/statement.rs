//! Prepared statements.
//!
//! A [`Statement`] either sends its text as a language batch or, when
//! prepared as an RPC, calls a procedure (or `sp_executesql`) with its
//! bound parameters. Execution primes the cursor on the first result set;
//! rows, further result sets and column values are then read through the
//! statement.

use dblib_types::{HostValue, ParamType, TypeId, materialize, native_type_name};

use crate::config::PrepareOptions;
use crate::connection::Connection;
use crate::cursor::{ColumnDescriptor, Cursor, CursorState};
use crate::error::{Error, ErrorRecord, Result};
use crate::instrumentation::extract_operation;
use crate::params::{BoundParam, ParamBinder, ParamKey};
use crate::process::DbProcess;
use crate::rpc::{RpcCall, RpcState};

/// Statement attributes settable after prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementAttr {
    /// Whether the statement executes as an RPC. Read-only.
    Rpc,
    /// Whether results of an RPC are discarded on execution.
    RpcSkipResults,
}

/// Host type category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Materialized as an integer.
    Integer,
    /// Materialized as a string or byte string.
    String,
}

/// Column metadata of the active rowset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ColumnMeta {
    /// Maximum length.
    pub max_length: i32,
    /// Declared precision.
    pub precision: i32,
    /// Declared scale.
    pub scale: i32,
    /// Source column, empty when the server did not report one.
    pub column_source: String,
    /// Native type name, `unknown` for unmapped codes.
    pub native_type: &'static str,
    /// Wire type code.
    pub native_type_id: i32,
    /// User-defined type id.
    pub native_user_type_id: i32,
    /// Host type category.
    pub category: TypeCategory,
}

/// A prepared statement bound to its connection.
#[derive(Debug)]
pub struct Statement<'c, P> {
    conn: &'c mut Connection<P>,
    query: String,
    active_query: String,
    rpc: Option<RpcState>,
    executed: bool,
    params: Vec<BoundParam>,
    binder: ParamBinder,
    cursor: Cursor,
    error: Option<ErrorRecord>,
}

impl<'c, P: DbProcess> Statement<'c, P> {
    pub(crate) fn new(conn: &'c mut Connection<P>, query: String, options: PrepareOptions) -> Self {
        let rpc = options.rpc.map(|mode| RpcState {
            mode,
            skip_results: options.skip_results,
        });
        Self {
            conn,
            active_query: query.clone(),
            query,
            rpc,
            executed: false,
            params: Vec::new(),
            binder: ParamBinder::new(),
            cursor: Cursor::new(),
            error: None,
        }
    }

    /// Statement text as prepared.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Text actually sent; differs from [`Self::query`] after the first
    /// `sp_executesql` execution rewrote its markers.
    #[must_use]
    pub fn active_query(&self) -> &str {
        &self.active_query
    }

    /// Check whether the statement executes as an RPC.
    #[must_use]
    pub fn is_rpc(&self) -> bool {
        self.rpc.is_some()
    }

    /// Check whether the statement has executed successfully at least once.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Last server-class failure of this statement.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    /// The owning connection.
    #[must_use]
    pub fn connection(&self) -> &Connection<P> {
        &*self.conn
    }

    /// Cursor position.
    #[must_use]
    pub fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }

    /// Columns in the active rowset.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.cursor.column_count()
    }

    /// Rows reported for the active rowset, or for the execution when no
    /// rowset is active.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        match self.cursor.state() {
            CursorState::RowsetActive { rows, .. } => rows,
            _ => self.cursor.affected_rows(),
        }
    }

    /// Row count reported when the last execution was primed.
    #[must_use]
    pub fn affected_rows(&self) -> i64 {
        self.cursor.affected_rows()
    }

    /// Execute the statement.
    ///
    /// Cancels anything left over from a previous execution first. Output
    /// parameters are updated when the server has returned their values.
    pub fn execute(&mut self) -> Result<()> {
        self.close_cursor();
        let result = self.run();
        self.note(result)
    }

    fn run(&mut self) -> Result<()> {
        let config = &self.conn.config;
        tracing::debug!(
            operation = extract_operation(&self.query),
            sql = %config.sanitization.sanitize(&self.query),
            rpc = ?self.rpc.map(|rpc| rpc.mode),
            params = self.params.len(),
            "executing statement"
        );
        let skip_empty = config.policy.skip_empty_rowsets;
        let process = &mut self.conn.process;

        match self.rpc {
            Some(rpc) => {
                RpcCall {
                    mode: rpc.mode,
                    query: &self.query,
                    active_query: &mut self.active_query,
                    first_execution: !self.executed,
                    params: &mut self.params,
                    binder: &mut self.binder,
                }
                .execute(process)?;

                if rpc.skip_results {
                    self.cursor.discard(process);
                    self.executed = true;
                    return self.retrieve_outputs();
                }
            }
            None => {
                process
                    .send_command(&self.active_query)
                    .map_err(|_| Error::CommandFailed)?;
                process.execute_command().map_err(|_| Error::CommandFailed)?;
            }
        }

        self.cursor.prime(process, skip_empty)?;
        self.executed = true;
        self.retrieve_outputs()
    }

    /// Fetch the next row of the active rowset.
    ///
    /// Returns `false` at the end of the rowset.
    pub fn fetch(&mut self) -> Result<bool> {
        let result = match self.cursor.fetch_row(&mut self.conn.process) {
            Ok(row) => self.retrieve_outputs().map(|()| row),
            Err(err) => Err(err),
        };
        self.note(result)
    }

    /// Advance to the next result set, discarding unread rows.
    ///
    /// Returns `false` when there are no further result sets.
    pub fn next_rowset(&mut self) -> Result<bool> {
        let skip_empty = self.conn.config.policy.skip_empty_rowsets;
        let result = self.cursor.next_rowset(&mut self.conn.process, skip_empty);
        self.note(result)
    }

    /// Describe a column of the active rowset.
    pub fn describe(&mut self, index: usize) -> Result<ColumnDescriptor> {
        let result = self.cursor.describe(&self.conn.process, index);
        self.note(result)
    }

    /// Current row's value of a column.
    pub fn column_value(&self, index: usize) -> Result<HostValue> {
        self.check_column(index)?;
        let process = &self.conn.process;
        Ok(materialize(
            process.column_type(index),
            process.column_data(index),
            &self.conn.config.policy,
            process,
        ))
    }

    /// Metadata of a column of the active rowset.
    pub fn column_meta(&self, index: usize) -> Result<ColumnMeta> {
        self.check_column(index)?;
        let process = &self.conn.process;
        let info = process
            .column_type_info(index)
            .ok_or(Error::NoTypeInfo(index))?;
        let code = process.column_type(index);
        let category = if TypeId::from_code(code).is_some_and(TypeId::is_integer_like) {
            TypeCategory::Integer
        } else {
            TypeCategory::String
        };

        Ok(ColumnMeta {
            max_length: process.column_length(index),
            precision: info.precision,
            scale: info.scale,
            column_source: process.column_source(index).unwrap_or_default().to_string(),
            native_type: native_type_name(code),
            native_type_id: code,
            native_user_type_id: process.column_user_type(index),
            category,
        })
    }

    fn check_column(&self, index: usize) -> Result<()> {
        let count = self.cursor.column_count();
        if index >= count {
            return Err(Error::ColumnOutOfRange { index, count });
        }
        Ok(())
    }

    /// Bind a parameter, replacing any parameter with the same key.
    ///
    /// Plain statements keep the parameter for the host but send nothing.
    pub fn bind_param(&mut self, mut param: BoundParam) -> Result<()> {
        if self.rpc.is_some() {
            if param.param_type == ParamType::Stmt {
                return Err(Error::ParamIsStatement);
            }
            param.key = param.key.normalize();
            self.binder.alloc(&param);
        }

        tracing::trace!(param = %param.key, direction = ?param.direction, "parameter bound");
        match self.params.iter_mut().find(|p| p.key == param.key) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
        Ok(())
    }

    /// Remove a bound parameter.
    pub fn unbind_param(&mut self, key: &ParamKey) -> Result<BoundParam> {
        let key = self.lookup_key(key);
        let index = self
            .params
            .iter()
            .position(|p| p.key == key)
            .ok_or_else(|| Error::UnknownParam(key.to_string()))?;
        self.binder.free(&key);
        Ok(self.params.remove(index))
    }

    /// A bound parameter, with its current value.
    #[must_use]
    pub fn param(&self, key: &ParamKey) -> Option<&BoundParam> {
        let key = self.lookup_key(key);
        self.params.iter().find(|p| p.key == key)
    }

    /// Bound parameters in their current order.
    #[must_use]
    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    /// Update a bound parameter's value before the next execution.
    pub fn set_param_value(&mut self, key: &ParamKey, value: impl Into<HostValue>) -> Result<()> {
        let key = self.lookup_key(key);
        let param = self
            .params
            .iter_mut()
            .find(|p| p.key == key)
            .ok_or_else(|| Error::UnknownParam(key.to_string()))?;
        param.value = value.into();
        Ok(())
    }

    fn lookup_key(&self, key: &ParamKey) -> ParamKey {
        if self.rpc.is_some() {
            key.clone().normalize()
        } else {
            key.clone()
        }
    }

    /// Read an attribute as a host boolean.
    #[must_use]
    pub fn attribute(&self, attr: StatementAttr) -> HostValue {
        let value = match attr {
            StatementAttr::Rpc => self.rpc.is_some(),
            StatementAttr::RpcSkipResults => self.rpc.is_some_and(|rpc| rpc.skip_results),
        };
        HostValue::Bool(value)
    }

    /// Set an attribute from a host value, interpreted by truthiness.
    pub fn set_attribute(&mut self, attr: StatementAttr, value: &HostValue) -> Result<()> {
        match attr {
            StatementAttr::Rpc => Err(Error::ReadOnlyAttribute),
            StatementAttr::RpcSkipResults => match self.rpc.as_mut() {
                Some(rpc) => {
                    rpc.skip_results = value.is_truthy();
                    Ok(())
                }
                None => Err(Error::AttributeRequiresRpc),
            },
        }
    }

    /// Cancel pending results and release the statement.
    pub fn dispose(mut self) {
        self.close_cursor();
    }

    fn retrieve_outputs(&mut self) -> Result<()> {
        if self.rpc.is_none() {
            return Ok(());
        }
        let process = &self.conn.process;
        let policy = &self.conn.config.policy;
        for param in &mut self.params {
            self.binder.retrieve(process, policy, param)?;
        }
        Ok(())
    }

    fn close_cursor(&mut self) {
        self.cursor.close(&mut self.conn.process);
        self.conn.last_error = None;
        self.error = None;
    }

    /// Record a server-class failure on the statement and the connection.
    fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if let Some(record) = err.record() {
                tracing::debug!(sqlstate = record.sqlstate, error = %err, "statement failed");
                self.conn.last_error = Some(record.clone());
                self.error = Some(record);
            }
        }
        result
    }
}
