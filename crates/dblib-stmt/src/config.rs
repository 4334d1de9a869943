//! Connection and statement configuration.

use dblib_types::Policy;

use crate::instrumentation::SanitizationConfig;

/// Connection-level configuration.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// Materialization policy shared by every statement on the connection.
    pub policy: Policy,
    /// Statement-text sanitization for logging.
    pub sanitization: SanitizationConfig,
}

impl ConnectionConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the materialization policy.
    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the logging sanitization.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }
}

/// How an RPC statement's text is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMode {
    /// The text is a stored procedure name.
    Procedure,
    /// The text is arbitrary SQL run through `sp_executesql`.
    ExecSql,
}

/// Options fixed when a statement is prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Execute as an RPC call instead of a language batch.
    pub rpc: Option<RpcMode>,
    /// Discard every result of an RPC call on execution.
    pub skip_results: bool,
}

impl PrepareOptions {
    /// Plain language batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call the statement text as a stored procedure.
    #[must_use]
    pub fn procedure() -> Self {
        Self {
            rpc: Some(RpcMode::Procedure),
            skip_results: false,
        }
    }

    /// Run the statement text through `sp_executesql`.
    #[must_use]
    pub fn exec_sql() -> Self {
        Self {
            rpc: Some(RpcMode::ExecSql),
            skip_results: false,
        }
    }

    /// Discard results on execution; only meaningful for RPC statements.
    #[must_use]
    pub fn skip_results(mut self, skip: bool) -> Self {
        self.skip_results = skip;
        self
    }

    /// Check whether the statement executes as an RPC call.
    #[must_use]
    pub fn is_rpc(&self) -> bool {
        self.rpc.is_some()
    }
}
