//! # dblib-types
//!
//! Wire type table and column materialization for the dblib statement
//! bridge.
//!
//! This crate turns the typed byte buffers a dblib-style TDS client hands
//! out (column data, RPC return values) into host values, and names the
//! wire types for column metadata. It performs no I/O.
//!
//! ## Materialization
//!
//! | Wire type | Host value |
//! |-----------|------------|
//! | `char`, `varchar`, `text`, `binary`, `varbinary`, `image` | byte string, verbatim |
//! | `tinyint`, `bit`, `smallint`, `int`, `bigint` | integer |
//! | `real`, `float` | double |
//! | `decimal`, `numeric`, `money`, `smallmoney` | double (lossy) |
//! | `datetime`, `smalldatetime`, `datetime2` | `YYYY-MM-DD HH:MM:SS` string |
//! | `uniqueidentifier` | 16 raw bytes, or a 36-character string |
//! | anything else convertible | converter text, trailing spaces trimmed |
//!
//! The connection [`Policy`] can force numerics and datetimes through the
//! converter's text form instead.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod convert;
pub mod error;
pub mod materialize;
pub mod policy;
pub mod types;
pub mod value;
pub mod version;

pub use convert::{Converter, DateRec, NativeConverter};
pub use error::TypeError;
pub use materialize::{DATETIME_MAX_LEN, materialize, should_stringify};
pub use policy::Policy;
pub use types::{TypeId, native_type_name};
pub use value::{HostValue, ParamType};
pub use version::TdsVersion;
