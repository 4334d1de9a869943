//! Connection wrapper owning the protocol handle.

use dblib_types::Policy;

use crate::config::{ConnectionConfig, PrepareOptions};
use crate::error::ErrorRecord;
use crate::process::DbProcess;
use crate::statement::Statement;

/// A protocol handle plus the state statements share through it.
///
/// Statements borrow the connection mutably, so at most one statement
/// drives the handle at a time.
#[derive(Debug)]
pub struct Connection<P> {
    pub(crate) process: P,
    pub(crate) config: ConnectionConfig,
    pub(crate) last_error: Option<ErrorRecord>,
}

impl<P: DbProcess> Connection<P> {
    /// Wrap an open protocol handle.
    pub fn new(process: P, config: ConnectionConfig) -> Self {
        tracing::debug!(
            tds_version = %process.tds_version(),
            policy = ?config.policy,
            "connection ready"
        );
        Self {
            process,
            config,
            last_error: None,
        }
    }

    /// Prepare a statement.
    ///
    /// `skip_results` is ignored unless the statement is an RPC.
    pub fn prepare(&mut self, query: impl Into<String>, options: PrepareOptions) -> Statement<'_, P> {
        Statement::new(self, query.into(), options)
    }

    /// Materialization policy.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.config.policy
    }

    /// Replace the materialization policy.
    pub fn set_policy(&mut self, policy: Policy) {
        self.config.policy = policy;
    }

    /// Connection configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Last server-class failure of any statement on this connection.
    #[must_use]
    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last_error.as_ref()
    }

    /// The protocol handle.
    #[must_use]
    pub fn process(&self) -> &P {
        &self.process
    }

    /// The protocol handle, mutably.
    pub fn process_mut(&mut self) -> &mut P {
        &mut self.process
    }

    /// Unwrap the protocol handle.
    pub fn into_process(self) -> P {
        self.process
    }
}
