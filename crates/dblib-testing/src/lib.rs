//! # dblib-testing
//!
//! Test infrastructure for the dblib statement crates.
//!
//! ## Features
//!
//! - Scripted [`DbProcess`](dblib_stmt::DbProcess) that replays queued
//!   batches and records every call
//! - Failure injection at each protocol call
//! - Fixtures for common result shapes
//!
//! ## Example
//!
//! ```rust,ignore
//! use dblib_stmt::{Connection, ConnectionConfig, PrepareOptions};
//! use dblib_testing::{fixtures, mock_process::MockProcess};
//!
//! let process = MockProcess::builder()
//!     .with_batch(fixtures::empty_then_orders(2)?)
//!     .build();
//! let mut conn = Connection::new(process, ConnectionConfig::default());
//! let mut stmt = conn.prepare("SELECT * FROM orders", PrepareOptions::new());
//! stmt.execute()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_process;

pub use mock_process::{
    FailPoint, MockBatch, MockCall, MockColumn, MockError, MockProcess, MockProcessBuilder,
    MockResult, RecordedParam, ScalarValue,
};
