//! Connection-level conversion policy.

/// Per-connection flags shared read-only by every statement.
///
/// Changed only through connection configuration. Statement execution
/// never writes to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Policy {
    /// Render every numeric column through the string conversion path.
    pub stringify_numerics: bool,
    /// Render datetime columns through the string conversion path instead
    /// of the fixed `YYYY-MM-DD HH:MM:SS` literal.
    pub convert_datetime: bool,
    /// Return uniqueidentifier values as 36-character strings instead of
    /// 16 raw bytes.
    pub stringify_uniqueidentifier: bool,
    /// Skip result sets without columns when advancing.
    pub skip_empty_rowsets: bool,
}

impl Policy {
    /// Create a policy with every flag off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether numerics are stringified.
    #[must_use]
    pub fn stringify_numerics(mut self, enabled: bool) -> Self {
        self.stringify_numerics = enabled;
        self
    }

    /// Set whether datetimes use the string conversion path.
    #[must_use]
    pub fn convert_datetime(mut self, enabled: bool) -> Self {
        self.convert_datetime = enabled;
        self
    }

    /// Set whether uniqueidentifiers are stringified.
    #[must_use]
    pub fn stringify_uniqueidentifier(mut self, enabled: bool) -> Self {
        self.stringify_uniqueidentifier = enabled;
        self
    }

    /// Set whether empty result sets are skipped.
    #[must_use]
    pub fn skip_empty_rowsets(mut self, enabled: bool) -> Self {
        self.skip_empty_rowsets = enabled;
        self
    }
}
