//! TDS protocol version tiers.

use core::fmt;

/// Protocol tier reported by the client library for an open connection.
///
/// Variants are ordered, so tier checks are plain comparisons. Only the
/// tier matters at this layer: it gates how long string parameters may be
/// sent as output parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum TdsVersion {
    /// TDS 4.2 (SQL Server 4.x, Sybase)
    V4_2,
    /// TDS 5.0 (Sybase ASE)
    V5_0,
    /// TDS 7.0 (SQL Server 7.0)
    V7_0,
    /// TDS 7.1 (SQL Server 2000)
    V7_1,
    /// TDS 7.2 (SQL Server 2005)
    V7_2,
    /// TDS 7.3 (SQL Server 2008)
    V7_3,
    /// TDS 7.4 (SQL Server 2012 and later)
    #[default]
    V7_4,
    /// TDS 8.0 (strict encryption)
    V8_0,
}

impl TdsVersion {
    /// Map a `DBTDS_*` code as returned by `dbtds()`.
    ///
    /// Pre-4.2 tiers and unknown codes give `None`.
    #[must_use]
    pub const fn from_dbtds(code: i32) -> Option<Self> {
        Some(match code {
            4 => Self::V4_2,
            7 => Self::V5_0,
            8 => Self::V7_0,
            9 => Self::V7_1,
            10 => Self::V7_2,
            11 => Self::V7_3,
            12 => Self::V7_4,
            13 => Self::V8_0,
            _ => return None,
        })
    }

    /// Check whether values longer than 8000 bytes can travel as output
    /// parameters.
    ///
    /// Before TDS 7.2 such a parameter cannot be declared as `text`, so the
    /// binder falls back to `varchar(8000)`.
    #[must_use]
    pub fn supports_large_parameters(self) -> bool {
        self >= Self::V7_2
    }

    /// Parse a `tds version` value from freetds.conf, e.g. `"7.3"`.
    ///
    /// `"auto"` is not a tier and gives `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let version = match s.trim() {
            "4.2" => Self::V4_2,
            "5.0" => Self::V5_0,
            "7.0" => Self::V7_0,
            "7.1" => Self::V7_1,
            "7.2" => Self::V7_2,
            "7.3" => Self::V7_3,
            "7.4" => Self::V7_4,
            "8.0" | "8" => Self::V8_0,
            _ => return None,
        };
        Some(version)
    }
}

impl fmt::Display for TdsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self {
            Self::V4_2 => "4.2",
            Self::V5_0 => "5.0",
            Self::V7_0 => "7.0",
            Self::V7_1 => "7.1",
            Self::V7_2 => "7.2",
            Self::V7_3 => "7.3",
            Self::V7_4 => "7.4",
            Self::V8_0 => "8.0",
        };
        write!(f, "TDS {tier}")
    }
}
