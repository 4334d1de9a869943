//! Result cursor over one execution's result sets.
//!
//! ## State Transitions
//!
//! ```text
//! NoRowset -> RowsetActive (advance finds a result set with columns)
//! NoRowset -> Exhausted (no result sets, or an empty one is not skipped)
//! RowsetActive -> RowsetActive (next_rowset finds another result set)
//! RowsetActive -> Exhausted (next_rowset runs out)
//! any -> NoRowset (close)
//! ```
//!
//! Row and column counts are only meaningful in `RowsetActive`.

use dblib_types::ParamType;

use crate::error::{Error, Result};
use crate::process::{DbProcess, ResultsStatus, RowStatus};

/// Cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    /// No execution has produced a result set yet.
    #[default]
    NoRowset,
    /// A result set with columns is current.
    RowsetActive {
        /// Columns in the result set.
        columns: usize,
        /// Row count the protocol reported when it became current.
        rows: i64,
    },
    /// No further result set is available.
    Exhausted,
}

/// Per-column description of the active rowset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ColumnDescriptor {
    /// Server-reported name, or a synthesized `computed`/`computedN`.
    pub name: String,
    /// Maximum length.
    pub max_len: i32,
    /// Declared parameter kind; always [`ParamType::Variant`] because the
    /// concrete kind is decided when the value is materialized.
    pub param_type: ParamType,
}

/// Drives `dbresults`/`dbnextrow` for one statement.
#[derive(Debug, Default)]
pub struct Cursor {
    state: CursorState,
    computed_names: usize,
    affected_rows: i64,
}

impl Cursor {
    /// Create a cursor with no rowset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Columns in the active rowset, 0 otherwise.
    #[must_use]
    pub fn column_count(&self) -> usize {
        match self.state {
            CursorState::RowsetActive { columns, .. } => columns,
            _ => 0,
        }
    }

    /// Rows reported for the active rowset, 0 otherwise.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        match self.state {
            CursorState::RowsetActive { rows, .. } => rows,
            _ => 0,
        }
    }

    /// Row count the protocol reported when the execution was primed.
    #[must_use]
    pub fn affected_rows(&self) -> i64 {
        self.affected_rows
    }

    /// Cancel pending results and forget the current rowset.
    pub fn close<P: DbProcess + ?Sized>(&mut self, process: &mut P) {
        process.cancel();
        self.state = CursorState::NoRowset;
        self.affected_rows = 0;
        tracing::trace!("cursor closed");
    }

    /// Move to the next result set, skipping empty ones when asked.
    ///
    /// Returns `true` when a result set with columns became current.
    pub fn advance_rowset<P: DbProcess + ?Sized>(
        &mut self,
        process: &mut P,
        skip_empty: bool,
    ) -> Result<bool> {
        loop {
            let status = process.next_result();
            let columns = process.column_count();

            match status {
                ResultsStatus::Fail => {
                    self.state = CursorState::Exhausted;
                    return Err(Error::RowsetFailed);
                }
                ResultsStatus::NoMoreResults => {
                    tracing::trace!("no more result sets");
                    self.state = CursorState::Exhausted;
                    return Ok(false);
                }
                ResultsStatus::Succeed if columns > 0 => {
                    let rows = process.row_count();
                    let columns = usize::try_from(columns).unwrap_or_default();
                    tracing::trace!(columns, rows, "result set active");
                    self.state = CursorState::RowsetActive { columns, rows };
                    return Ok(true);
                }
                ResultsStatus::Succeed if skip_empty => {
                    tracing::trace!("skipping empty result set");
                }
                ResultsStatus::Succeed => {
                    tracing::trace!("empty result set");
                    self.state = CursorState::Exhausted;
                    return Ok(false);
                }
            }
        }
    }

    /// Fetch the next row of the active rowset.
    ///
    /// Returns `false` at the end of the rowset.
    pub fn fetch_row<P: DbProcess + ?Sized>(&mut self, process: &mut P) -> Result<bool> {
        if !matches!(self.state, CursorState::RowsetActive { .. }) {
            return Ok(false);
        }

        match process.next_row() {
            RowStatus::Row => Ok(true),
            RowStatus::NoMoreRows => Ok(false),
            RowStatus::Fail => Err(Error::FetchFailed),
        }
    }

    /// Drain the current rowset, then advance to the next one.
    pub fn next_rowset<P: DbProcess + ?Sized>(
        &mut self,
        process: &mut P,
        skip_empty: bool,
    ) -> Result<bool> {
        loop {
            match process.next_row() {
                RowStatus::Row => {}
                RowStatus::NoMoreRows => break,
                RowStatus::Fail => return Err(Error::FetchFailed),
            }
        }

        self.advance_rowset(process, skip_empty)
    }

    /// Consume every remaining row of every result set.
    ///
    /// No rowset becomes active. Stops early if the protocol fails.
    pub fn discard<P: DbProcess + ?Sized>(&mut self, process: &mut P) {
        let mut discarded = 0usize;
        while process.next_result() == ResultsStatus::Succeed {
            while process.next_row() == RowStatus::Row {
                discarded += 1;
            }
        }
        tracing::trace!(rows = discarded, "results discarded");
        self.state = CursorState::NoRowset;
    }

    /// Advance to the first rowset of a fresh execution.
    ///
    /// Finding no rowset with columns is not an error.
    pub fn prime<P: DbProcess + ?Sized>(&mut self, process: &mut P, skip_empty: bool) -> Result<()> {
        self.advance_rowset(process, skip_empty)?;
        self.affected_rows = process.row_count();
        Ok(())
    }

    /// Describe a column of the active rowset.
    ///
    /// Describing column 0 restarts the `computed` name sequence.
    pub fn describe<P: DbProcess + ?Sized>(
        &mut self,
        process: &P,
        index: usize,
    ) -> Result<ColumnDescriptor> {
        let count = self.column_count();
        if index >= count {
            return Err(Error::ColumnOutOfRange { index, count });
        }

        if index == 0 {
            self.computed_names = 0;
        }

        let name = match process.column_name(index).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => {
                let name = match self.computed_names {
                    0 => "computed".to_string(),
                    n => format!("computed{n}"),
                };
                self.computed_names += 1;
                name
            }
        };

        Ok(ColumnDescriptor {
            name,
            max_len: process.column_length(index),
            param_type: ParamType::Variant,
        })
    }
}
