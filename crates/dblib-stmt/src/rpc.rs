//! RPC execution.
//!
//! A call is built in four steps: resolve every parameter's value, start
//! the call, attach parameters in bind order, then send it and wait for the
//! server's completion status. In `sp_executesql` mode the rewritten
//! statement text and the parameter declaration list go first, as unnamed
//! `varchar` parameters.

use dblib_types::TypeId;

use crate::config::RpcMode;
use crate::error::{Error, Result};
use crate::params::{BoundParam, ParamBinder, declaration_type};
use crate::process::{DbProcess, RpcParam, RpcStatus};
use crate::rewrite::rewrite_markers;

/// Procedure that runs parameterized ad-hoc SQL.
pub const EXECSQL_PROCEDURE: &str = "sp_executesql";

/// RPC settings of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcState {
    /// How the statement text is sent.
    pub mode: RpcMode,
    /// Discard results after execution.
    pub skip_results: bool,
}

/// Build the `sp_executesql` declaration list, e.g. `@1 int,@name varchar(8000) out`.
///
/// The return-status parameter is not declared.
#[must_use]
pub fn declarations(params: &[BoundParam], binder: &ParamBinder) -> String {
    params
        .iter()
        .filter_map(|param| {
            let state = binder.state(&param.key)?;
            if state.return_status {
                return None;
            }
            let mut decl = format!("{} {}", param.key, declaration_type(state.wire_type));
            if state.output {
                decl.push_str(" out");
            }
            Some(decl)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Everything one RPC execution needs from its statement.
pub(crate) struct RpcCall<'a> {
    pub mode: RpcMode,
    pub query: &'a str,
    pub active_query: &'a mut String,
    pub first_execution: bool,
    pub params: &'a mut [BoundParam],
    pub binder: &'a mut ParamBinder,
}

impl RpcCall<'_> {
    /// Send the call and wait for its completion status.
    ///
    /// A failed bind resets the partially built call; a failed send cancels
    /// pending results.
    pub fn execute<P: DbProcess + ?Sized>(self, process: &mut P) -> Result<()> {
        let Self {
            mode,
            query,
            active_query,
            first_execution,
            params,
            binder,
        } = self;

        let version = process.tds_version();
        for param in params.iter_mut() {
            binder.prepare_value(param, version)?;
        }

        let target = match mode {
            RpcMode::Procedure => query,
            RpcMode::ExecSql => EXECSQL_PROCEDURE,
        };
        tracing::debug!(procedure = target, params = params.len(), "initializing RPC");
        process.rpc_init(target).map_err(|_| Error::RpcInit)?;

        binder.sort_for_binding(params);

        if let Err(err) = bind_all(process, mode, query, active_query, first_execution, params, binder) {
            tracing::debug!(error = %err, "resetting RPC");
            process.rpc_reset();
            return Err(err);
        }

        if process.rpc_exec().is_err() || process.sql_ok().is_err() {
            process.cancel();
            return Err(Error::RpcExec);
        }

        tracing::trace!(outputs = binder.return_count(), "RPC sent");
        Ok(())
    }
}

fn bind_all<P: DbProcess + ?Sized>(
    process: &mut P,
    mode: RpcMode,
    query: &str,
    active_query: &mut String,
    first_execution: bool,
    params: &[BoundParam],
    binder: &mut ParamBinder,
) -> Result<()> {
    if mode == RpcMode::ExecSql {
        if first_execution {
            *active_query = rewrite_markers(query).into_owned();
        }
        bind_text(process, "@stmt", active_query)?;

        if !params.is_empty() {
            let decls = declarations(params, binder);
            tracing::trace!(declarations = %decls, "binding declarations");
            bind_text(process, "@params", &decls)?;
        }
    }

    binder.begin_binding();
    for param in params {
        binder.bind(process, &param.key)?;
    }
    Ok(())
}

/// Attach an unnamed `varchar` input parameter.
fn bind_text<P: DbProcess + ?Sized>(process: &mut P, label: &str, text: &str) -> Result<()> {
    let param = RpcParam {
        name: None,
        status: RpcStatus::empty(),
        type_code: TypeId::VarChar.code(),
        max_len: None,
        value: Some(text.as_bytes()),
    };
    process.rpc_param(&param).map_err(|_| Error::RpcBind {
        name: label.to_string(),
    })
}
