//! Wire type codes as reported by the dblib column and return-value accessors.
//!
//! dblib normalizes most nullable TDS types to their fixed counterparts
//! before reporting them (an `INTN` column of width 4 is reported as
//! [`TypeId::Int4`]), so the codes seen here are a mix of plain TDS type
//! bytes and the Sybase-era aliases some servers still send.

/// Wire type identifiers known to this layer.
///
/// Codes outside this set are still accepted everywhere a raw code is taken;
/// they are simply treated as "unknown" by [`native_type_name`] and routed
/// through the generic conversion path by the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // Character and binary
    /// Fixed-length character (`SQLCHAR`).
    Char = 0x2F,
    /// Variable-length character (`SQLVARCHAR`).
    VarChar = 0x27,
    /// Large fixed-length character.
    BigChar = 0xAF,
    /// Large variable-length character.
    BigVarChar = 0xA7,
    /// Legacy text (`SQLTEXT`).
    Text = 0x23,
    /// Fixed-length binary (`SQLBINARY`).
    Binary = 0x2D,
    /// Variable-length binary (`SQLVARBINARY`).
    VarBinary = 0x25,
    /// Large fixed-length binary.
    BigBinary = 0xAD,
    /// Large variable-length binary.
    BigVarBinary = 0xA5,
    /// Legacy image (`SQLIMAGE`).
    Image = 0x22,
    /// Row version (binary(8)).
    Timestamp = 0xBD,

    // Unicode character, delivered already converted to the client charset
    /// Sybase-era nvarchar alias.
    SybNVarChar = 0x1F,
    /// Variable-length Unicode character.
    NVarChar = 0xE7,
    /// Fixed-length Unicode character.
    NChar = 0xEF,
    /// Legacy Unicode text.
    NText = 0x63,
    /// XML document.
    Xml = 0xF1,

    // Integers
    /// Unsigned 8-bit integer (`SQLINT1`).
    Int1 = 0x30,
    /// Bit (`SQLBIT`).
    Bit = 0x32,
    /// Nullable bit.
    BitN = 0x68,
    /// 16-bit integer (`SQLINT2`).
    Int2 = 0x34,
    /// 32-bit integer (`SQLINT4`).
    Int4 = 0x38,
    /// 64-bit integer (`SQLINT8`).
    Int8 = 0x7F,
    /// Nullable integer of 1, 2, 4 or 8 bytes.
    IntN = 0x26,

    // Floating point
    /// 32-bit float (`SQLFLT4`).
    Float4 = 0x3B,
    /// 64-bit float (`SQLFLT8`).
    Float8 = 0x3E,

    // Exact numerics
    /// Decimal (`SQLDECIMAL`).
    Decimal = 0x6A,
    /// Numeric (`SQLNUMERIC`).
    Numeric = 0x6C,
    /// Sybase-era decimal alias.
    SybDecimal = 0x37,
    /// Sybase-era numeric alias.
    SybNumeric = 0x3F,
    /// 8-byte money (`SQLMONEY`).
    Money = 0x3C,
    /// 4-byte money (`SQLMONEY4`).
    Money4 = 0x7A,
    /// Nullable money (`SQLMONEYN`).
    MoneyN = 0x6E,

    // Date and time
    /// 8-byte datetime (`SQLDATETIME`).
    DateTime = 0x3D,
    /// 4-byte smalldatetime (`SQLDATETIM4`).
    DateTime4 = 0x3A,
    /// datetime2 (`SQLMSDATETIME2`).
    DateTime2 = 0x2A,
    /// Date only.
    Date = 0x28,
    /// Time only.
    Time = 0x29,
    /// datetime2 plus a UTC offset.
    DateTimeOffset = 0x2B,

    // Everything else
    /// Unique identifier (`SQLUNIQUE`).
    Guid = 0x24,
    /// sql_variant.
    Variant = 0x62,
    /// Spatial CLR type.
    Geometry = 0xF0,
}

impl TypeId {
    /// Look up a wire code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let ty = match code {
            0x2F => Self::Char,
            0x27 => Self::VarChar,
            0xAF => Self::BigChar,
            0xA7 => Self::BigVarChar,
            0x23 => Self::Text,
            0x2D => Self::Binary,
            0x25 => Self::VarBinary,
            0xAD => Self::BigBinary,
            0xA5 => Self::BigVarBinary,
            0x22 => Self::Image,
            0xBD => Self::Timestamp,
            0x1F => Self::SybNVarChar,
            0xE7 => Self::NVarChar,
            0xEF => Self::NChar,
            0x63 => Self::NText,
            0xF1 => Self::Xml,
            0x30 => Self::Int1,
            0x32 => Self::Bit,
            0x68 => Self::BitN,
            0x34 => Self::Int2,
            0x38 => Self::Int4,
            0x7F => Self::Int8,
            0x26 => Self::IntN,
            0x3B => Self::Float4,
            0x3E => Self::Float8,
            0x6A => Self::Decimal,
            0x6C => Self::Numeric,
            0x37 => Self::SybDecimal,
            0x3F => Self::SybNumeric,
            0x3C => Self::Money,
            0x7A => Self::Money4,
            0x6E => Self::MoneyN,
            0x3D => Self::DateTime,
            0x3A => Self::DateTime4,
            0x2A => Self::DateTime2,
            0x28 => Self::Date,
            0x29 => Self::Time,
            0x2B => Self::DateTimeOffset,
            0x24 => Self::Guid,
            0x62 => Self::Variant,
            0xF0 => Self::Geometry,
            _ => return None,
        };
        Some(ty)
    }

    /// The raw wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as u8 as i32
    }

    /// True for the three datetime types that can be calendar-cracked.
    #[must_use]
    pub const fn is_crackable_datetime(self) -> bool {
        matches!(self, Self::DateTime | Self::DateTime4 | Self::DateTime2)
    }

    /// True for the exact-numeric family converted through `f64`.
    #[must_use]
    pub const fn is_decimal_family(self) -> bool {
        matches!(
            self,
            Self::Decimal | Self::Numeric | Self::Money | Self::Money4 | Self::MoneyN
        )
    }

    /// Coarse host category used in column metadata.
    ///
    /// Only the narrow integer family is reported as integer-like; `bigint`
    /// is string-like because it may not fit the host's native integer.
    #[must_use]
    pub const fn is_integer_like(self) -> bool {
        matches!(self, Self::Bit | Self::Int1 | Self::Int2 | Self::Int4)
    }
}

/// Display name for a wire code, `"unknown"` for codes without one.
///
/// The dblib type printer reports e.g. `varchar` as `char`, so names come
/// from this table instead.
#[must_use]
pub fn native_type_name(code: i32) -> &'static str {
    let Some(ty) = TypeId::from_code(code) else {
        return "unknown";
    };

    match ty {
        TypeId::SybNVarChar | TypeId::NVarChar => "nvarchar",
        TypeId::Image => "image",
        TypeId::Text => "text",
        TypeId::Guid => "uniqueidentifier",
        TypeId::VarBinary | TypeId::BigVarBinary => "varbinary",
        TypeId::IntN | TypeId::Int8 => "bigint",
        TypeId::VarChar | TypeId::BigVarChar => "varchar",
        TypeId::Date => "date",
        TypeId::Time => "time",
        TypeId::DateTime2 => "datetime2",
        TypeId::DateTimeOffset => "datetimeoffset",
        TypeId::Binary | TypeId::BigBinary => "binary",
        TypeId::Char | TypeId::BigChar => "char",
        TypeId::Int1 => "tinyint",
        TypeId::Bit | TypeId::BitN => "bit",
        TypeId::Int2 => "smallint",
        TypeId::SybDecimal | TypeId::Decimal => "decimal",
        TypeId::Int4 => "int",
        TypeId::DateTime4 => "smalldatetime",
        TypeId::Float4 => "real",
        TypeId::Money => "money",
        TypeId::DateTime => "datetime",
        TypeId::Float8 => "float",
        TypeId::SybNumeric | TypeId::Numeric => "numeric",
        TypeId::Variant => "sql_variant",
        TypeId::NText => "ntext",
        TypeId::Money4 => "smallmoney",
        TypeId::Timestamp => "timestamp",
        TypeId::NChar => "nchar",
        TypeId::Geometry => "geometry",
        TypeId::Xml => "xml",
        // dblib reports money columns as SQLMONEY; the nullable code never
        // reaches metadata.
        TypeId::MoneyN => "unknown",
    }
}
