//! Host value coercion errors.

use thiserror::Error;

/// Errors that can occur while coercing a host value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The value has no scalar form for the requested target.
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion {
        /// Source host type name.
        from: &'static str,
        /// Target type name.
        to: &'static str,
    },
}
