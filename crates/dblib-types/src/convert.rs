//! The generic type-to-type converter facility.
//!
//! dblib exposes `dbwillconvert`, `dbconvert` and `dbdatecrack` for turning
//! a column buffer into another representation. [`Converter`] is that
//! facility as a trait so the materializer can be driven by the real client
//! library or by [`NativeConverter`], which understands the fixed TDS
//! layouts directly.

use std::borrow::Cow;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::TypeId;

/// Calendar fields of a datetime value, as produced by date cracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRec {
    /// Four-digit year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
    /// Hour, 0-23.
    pub hour: u32,
    /// Minute, 0-59.
    pub minute: u32,
    /// Second, 0-59.
    pub second: u32,
    /// Sub-second part in nanoseconds.
    pub nanosecond: u32,
}

impl DateRec {
    /// Render as `YYYY-MM-DD HH:MM:SS`.
    #[must_use]
    pub fn to_literal(&self) -> String {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl From<NaiveDateTime> for DateRec {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            nanosecond: dt.nanosecond(),
        }
    }
}

/// Conversion services offered by the protocol client.
///
/// `data` is always the column or return-value buffer exactly as the
/// protocol reports it; `code` is its wire type code.
pub trait Converter {
    /// Whether values of `code` can be converted to a character form.
    fn will_convert(&self, code: i32) -> bool;

    /// Convert to characters into `dest`.
    ///
    /// Returns the number of bytes written, or a non-positive value when
    /// the conversion fails or does not fit.
    fn convert_to_char(&self, code: i32, data: &[u8], dest: &mut [u8]) -> i32;

    /// Convert a numeric value to an 8-byte float.
    fn convert_to_float(&self, code: i32, data: &[u8]) -> Option<f64>;

    /// Decompose a datetime value into calendar fields.
    fn crack_datetime(&self, code: i32, data: &[u8]) -> Option<DateRec>;
}

impl<C: Converter + ?Sized> Converter for &C {
    fn will_convert(&self, code: i32) -> bool {
        (**self).will_convert(code)
    }

    fn convert_to_char(&self, code: i32, data: &[u8], dest: &mut [u8]) -> i32 {
        (**self).convert_to_char(code, data, dest)
    }

    fn convert_to_float(&self, code: i32, data: &[u8]) -> Option<f64> {
        (**self).convert_to_float(code, data)
    }

    fn crack_datetime(&self, code: i32, data: &[u8]) -> Option<DateRec> {
        (**self).crack_datetime(code, data)
    }
}

/// Converter over the fixed TDS value layouts.
///
/// | type | layout |
/// |------|--------|
/// | integers, floats | little-endian, `intn` by buffer width |
/// | `money` | high `i32` then low `u32`, ten-thousandths |
/// | `smallmoney` | `i32`, ten-thousandths |
/// | `decimal`/`numeric` | precision, scale, sign (1 = negative), big-endian magnitude |
/// | `datetime` | `i32` days since 1900-01-01, `u32` 1/300 s ticks |
/// | `smalldatetime` | `u16` days since 1900-01-01, `u16` minutes |
/// | `datetime2` | 3-5 byte time ticks, 3-byte days since 0001-01-01 |
/// | `uniqueidentifier` | mixed-endian GUID |
///
/// Character types convert verbatim, binary types to lowercase hex.
/// Short buffers are zero-extended.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeConverter;

/// Classic `Mon dd yyyy hh:mm:ss:mmmAM` layout used for datetime to char.
const CLASSIC_DATETIME_FORMAT: &str = "%b %d %Y %I:%M:%S:%3f%p";

/// Money values print with two decimal places.
const MONEY_DISPLAY_SCALE: u32 = 2;

impl Converter for NativeConverter {
    fn will_convert(&self, code: i32) -> bool {
        TypeId::from_code(code).is_some_and(|ty| !matches!(ty, TypeId::Variant | TypeId::Geometry))
    }

    fn convert_to_char(&self, code: i32, data: &[u8], dest: &mut [u8]) -> i32 {
        let Some(text) = TypeId::from_code(code).and_then(|ty| render_char(ty, data)) else {
            return -1;
        };
        if text.len() > dest.len() {
            return -1;
        }
        dest[..text.len()].copy_from_slice(&text);
        i32::try_from(text.len()).unwrap_or(-1)
    }

    fn convert_to_float(&self, code: i32, data: &[u8]) -> Option<f64> {
        let ty = TypeId::from_code(code)?;
        match decode(ty, data)? {
            Native::Int(v) => Some(v as f64),
            Native::Float(v) => Some(v),
            Native::Money(v) => v.to_f64(),
            Native::Exact(digits) => digits.parse().ok(),
            Native::Text(text) => std::str::from_utf8(text).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    fn crack_datetime(&self, code: i32, data: &[u8]) -> Option<DateRec> {
        let ty = TypeId::from_code(code)?;
        if !ty.is_crackable_datetime() {
            return None;
        }
        match decode(ty, data)? {
            Native::DateTime(dt) | Native::DateTime2(dt) => Some(dt.into()),
            _ => None,
        }
    }
}

/// A decoded fixed-layout value.
enum Native<'a> {
    Text(&'a [u8]),
    Binary(&'a [u8]),
    Int(i64),
    Float(f64),
    Money(Decimal),
    /// Exact numeric rendered as a plain decimal string.
    Exact(String),
    DateTime(NaiveDateTime),
    DateTime2(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTimeOffset(NaiveDateTime, i16),
    Guid(uuid::Uuid),
}

fn decode(ty: TypeId, data: &[u8]) -> Option<Native<'_>> {
    let value = match ty {
        TypeId::Char
        | TypeId::VarChar
        | TypeId::BigChar
        | TypeId::BigVarChar
        | TypeId::Text
        | TypeId::SybNVarChar
        | TypeId::NVarChar
        | TypeId::NChar
        | TypeId::NText
        | TypeId::Xml => Native::Text(data),
        TypeId::Binary
        | TypeId::VarBinary
        | TypeId::BigBinary
        | TypeId::BigVarBinary
        | TypeId::Image
        | TypeId::Timestamp => Native::Binary(data),
        TypeId::Int1 => Native::Int(i64::from(fixed::<1>(data)[0])),
        TypeId::Bit | TypeId::BitN => Native::Int(i64::from(fixed::<1>(data)[0] != 0)),
        TypeId::Int2 => Native::Int(i64::from(i16::from_le_bytes(fixed(data)))),
        TypeId::Int4 => Native::Int(i64::from(i32::from_le_bytes(fixed(data)))),
        TypeId::Int8 => Native::Int(i64::from_le_bytes(fixed(data))),
        TypeId::IntN => match data.len() {
            1 => Native::Int(i64::from(data[0])),
            2 => Native::Int(i64::from(i16::from_le_bytes(fixed(data)))),
            4 => Native::Int(i64::from(i32::from_le_bytes(fixed(data)))),
            8 => Native::Int(i64::from_le_bytes(fixed(data))),
            _ => return None,
        },
        TypeId::Float4 => Native::Float(f64::from(f32::from_le_bytes(fixed(data)))),
        TypeId::Float8 => Native::Float(f64::from_le_bytes(fixed(data))),
        TypeId::Money => Native::Money(money8(data)),
        TypeId::Money4 => Native::Money(money4(data)),
        TypeId::MoneyN if data.len() == 4 => Native::Money(money4(data)),
        TypeId::MoneyN => Native::Money(money8(data)),
        TypeId::Decimal | TypeId::Numeric | TypeId::SybDecimal | TypeId::SybNumeric => {
            Native::Exact(exact_numeric(data)?)
        }
        TypeId::DateTime => Native::DateTime(datetime(data)?),
        TypeId::DateTime4 => Native::DateTime(smalldatetime(data)?),
        TypeId::DateTime2 => {
            let split = data.len().checked_sub(3)?;
            let time = time_ticks(&data[..split])?;
            Native::DateTime2(date_from_days(&data[split..])?.and_time(time))
        }
        TypeId::Date => Native::Date(date_from_days(data)?),
        TypeId::Time => Native::Time(time_ticks(data)?),
        TypeId::DateTimeOffset => {
            let split = data.len().checked_sub(5)?;
            let time = time_ticks(&data[..split])?;
            let utc = date_from_days(&data[split..split + 3])?.and_time(time);
            let offset = i16::from_le_bytes(fixed(&data[split + 3..]));
            let local = utc.checked_add_signed(chrono::Duration::minutes(i64::from(offset)))?;
            Native::DateTimeOffset(local, offset)
        }
        TypeId::Guid => {
            let raw: [u8; 16] = fixed(data);
            let d1 = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            let d2 = u16::from_le_bytes([raw[4], raw[5]]);
            let d3 = u16::from_le_bytes([raw[6], raw[7]]);
            let mut d4 = [0u8; 8];
            d4.copy_from_slice(&raw[8..]);
            Native::Guid(uuid::Uuid::from_fields(d1, d2, d3, &d4))
        }
        TypeId::Variant | TypeId::Geometry => return None,
    };
    Some(value)
}

fn render_char(ty: TypeId, data: &[u8]) -> Option<Cow<'_, [u8]>> {
    let text = match decode(ty, data)? {
        Native::Text(text) => return Some(Cow::Borrowed(text)),
        Native::Binary(bytes) => hex(bytes),
        Native::Int(v) => v.to_string(),
        Native::Float(v) if ty == TypeId::Float4 => (v as f32).to_string(),
        Native::Float(v) => v.to_string(),
        Native::Money(v) => {
            let rounded = v.round_dp_with_strategy(
                MONEY_DISPLAY_SCALE,
                RoundingStrategy::MidpointAwayFromZero,
            );
            format!("{rounded:.2}")
        }
        Native::Exact(digits) => digits,
        Native::DateTime(dt) => dt.format(CLASSIC_DATETIME_FORMAT).to_string(),
        Native::DateTime2(dt) => dt.format("%Y-%m-%d %H:%M:%S%.7f").to_string(),
        Native::Date(d) => d.format("%Y-%m-%d").to_string(),
        Native::Time(t) => t.format("%H:%M:%S%.7f").to_string(),
        Native::DateTimeOffset(local, offset) => {
            let sign = if offset < 0 { '-' } else { '+' };
            let minutes = offset.unsigned_abs();
            format!(
                "{} {sign}{:02}:{:02}",
                local.format("%Y-%m-%d %H:%M:%S%.7f"),
                minutes / 60,
                minutes % 60
            )
        }
        Native::Guid(g) => g.hyphenated().to_string().to_ascii_uppercase(),
    };
    Some(Cow::Owned(text.into_bytes()))
}

/// Copy up to `N` bytes, zero-extending short input.
fn fixed<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = data.len().min(N);
    out[..len].copy_from_slice(&data[..len]);
    out
}

fn hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0F)]));
    }
    out
}

fn money8(data: &[u8]) -> Decimal {
    let raw: [u8; 8] = fixed(data);
    let high = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let low = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let units = (i64::from(high) << 32) | i64::from(low);
    Decimal::new(units, 4)
}

fn money4(data: &[u8]) -> Decimal {
    Decimal::new(i64::from(i32::from_le_bytes(fixed(data))), 4)
}

/// Render `[precision, scale, sign, magnitude...]` as a decimal string.
fn exact_numeric(data: &[u8]) -> Option<String> {
    let (&[_precision, scale, sign], magnitude) = data.split_first_chunk::<3>()?;
    let magnitude = magnitude
        .iter()
        .skip_while(|&&b| b == 0)
        .copied()
        .collect::<Vec<_>>();
    if magnitude.len() > 16 {
        return None;
    }
    let mut be = [0u8; 16];
    be[16 - magnitude.len()..].copy_from_slice(&magnitude);
    let units = u128::from_be_bytes(be);

    if let Ok(signed) = i128::try_from(units) {
        if let Ok(mut d) = Decimal::try_from_i128_with_scale(signed, u32::from(scale)) {
            d.set_sign_negative(sign == 1 && !d.is_zero());
            return Some(d.to_string());
        }
    }

    // Beyond 96 bits: place the decimal point by hand.
    let digits = units.to_string();
    let scale = usize::from(scale);
    let mut out = String::with_capacity(digits.len() + 3);
    if sign == 1 && units != 0 {
        out.push('-');
    }
    if digits.len() > scale {
        let (int, frac) = digits.split_at(digits.len() - scale);
        out.push_str(int);
        if !frac.is_empty() {
            out.push('.');
            out.push_str(frac);
        }
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat(scale - digits.len()));
        out.push_str(&digits);
    }
    Some(out)
}

fn epoch_1900() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
}

fn datetime(data: &[u8]) -> Option<NaiveDateTime> {
    let raw: [u8; 8] = fixed(data);
    let days = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let ticks = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);

    let date = epoch_1900()?.checked_add_signed(chrono::Duration::days(i64::from(days)))?;

    // 1/300 s ticks, rounded to the nearest millisecond
    let total_ms = (u64::from(ticks) * 10 + 1) / 3;
    let secs = u32::try_from(total_ms / 1000).ok()?;
    let nanos = u32::try_from((total_ms % 1000) * 1_000_000).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?;
    Some(date.and_time(time))
}

fn smalldatetime(data: &[u8]) -> Option<NaiveDateTime> {
    let raw: [u8; 4] = fixed(data);
    let days = u16::from_le_bytes([raw[0], raw[1]]);
    let minutes = u16::from_le_bytes([raw[2], raw[3]]);

    let date = epoch_1900()?.checked_add_days(chrono::Days::new(u64::from(days)))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(u32::from(minutes) * 60, 0)?;
    Some(date.and_time(time))
}

fn date_from_days(data: &[u8]) -> Option<NaiveDate> {
    let raw: [u8; 3] = fixed(data);
    let days = u32::from_le_bytes([raw[0], raw[1], raw[2], 0]);
    NaiveDate::from_ymd_opt(1, 1, 1)?.checked_add_days(chrono::Days::new(u64::from(days)))
}

/// Time-of-day ticks; the byte width implies the scale.
fn time_ticks(data: &[u8]) -> Option<NaiveTime> {
    let unit_nanos: u64 = match data.len() {
        3 => 10_000_000,
        4 => 100_000,
        5 => 100,
        _ => return None,
    };
    let raw: [u8; 8] = fixed(data);
    let nanos = u64::from_le_bytes(raw).checked_mul(unit_nanos)?;
    let secs = u32::try_from(nanos / 1_000_000_000).ok()?;
    let frac = u32::try_from(nanos % 1_000_000_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn to_char(ty: TypeId, data: &[u8]) -> String {
        let mut buf = [0u8; 128];
        let n = NativeConverter.convert_to_char(ty.code(), data, &mut buf);
        assert!(n >= 0, "conversion of {ty:?} failed");
        String::from_utf8(buf[..n as usize].to_vec()).unwrap()
    }

    fn datetime_bytes(days: i32, ticks: u32) -> Vec<u8> {
        let mut v = days.to_le_bytes().to_vec();
        v.extend_from_slice(&ticks.to_le_bytes());
        v
    }

    #[test]
    fn test_char_passthrough() {
        assert_eq!(to_char(TypeId::VarChar, b"hello  "), "hello  ");
        assert_eq!(to_char(TypeId::NVarChar, "h\u{e9}".as_bytes()), "h\u{e9}");
    }

    #[test]
    fn test_binary_hex() {
        assert_eq!(to_char(TypeId::VarBinary, &[0xDE, 0xAD, 0x01]), "dead01");
        assert_eq!(to_char(TypeId::Binary, &[]), "");
    }

    #[test]
    fn test_integers() {
        assert_eq!(to_char(TypeId::Int4, &(-42i32).to_le_bytes()), "-42");
        assert_eq!(to_char(TypeId::Int1, &[250]), "250");
        assert_eq!(to_char(TypeId::IntN, &7i16.to_le_bytes()), "7");
        assert_eq!(to_char(TypeId::Bit, &[3]), "1");
    }

    #[test]
    fn test_intn_bad_width() {
        let mut buf = [0u8; 16];
        assert_eq!(
            NativeConverter.convert_to_char(TypeId::IntN.code(), &[1, 2, 3], &mut buf),
            -1
        );
    }

    #[test]
    fn test_money() {
        // 12.3456 = 123456 ten-thousandths
        let units: i64 = 123_456;
        let mut data = ((units >> 32) as i32).to_le_bytes().to_vec();
        data.extend_from_slice(&(units as u32).to_le_bytes());

        assert_eq!(to_char(TypeId::Money, &data), "12.35");
        let f = NativeConverter
            .convert_to_float(TypeId::Money.code(), &data)
            .unwrap();
        assert!((f - 12.3456).abs() < 1e-9);

        let small = (-5_000i32).to_le_bytes();
        assert_eq!(to_char(TypeId::Money4, &small), "-0.50");
        assert_eq!(to_char(TypeId::MoneyN, &small), "-0.50");
    }

    #[test]
    fn test_negative_money8() {
        let units: i64 = -10_000;
        let mut data = ((units >> 32) as i32).to_le_bytes().to_vec();
        data.extend_from_slice(&(units as u32).to_le_bytes());
        assert_eq!(to_char(TypeId::Money, &data), "-1.00");
    }

    #[test]
    fn test_decimal() {
        // 123.45, precision 5 scale 2
        let data = [5, 2, 0, 0x30, 0x39];
        assert_eq!(to_char(TypeId::Decimal, &data), "123.45");
        let data = [5, 2, 1, 0x30, 0x39];
        assert_eq!(to_char(TypeId::Numeric, &data), "-123.45");
        assert_eq!(
            NativeConverter.convert_to_float(TypeId::Decimal.code(), &data),
            Some(-123.45)
        );
    }

    #[test]
    fn test_decimal_beyond_96_bits() {
        // 10^30 with scale 2
        let units: u128 = 10u128.pow(30);
        let mut data = vec![38, 2, 0];
        data.extend_from_slice(&units.to_be_bytes());
        assert_eq!(
            to_char(TypeId::Decimal, &data),
            "10000000000000000000000000000.00"
        );
    }

    #[test]
    fn test_decimal_too_short() {
        let mut buf = [0u8; 16];
        assert_eq!(
            NativeConverter.convert_to_char(TypeId::Decimal.code(), &[5, 2], &mut buf),
            -1
        );
    }

    #[test]
    fn test_datetime() {
        // 2024-01-15 is 45304 days after 1900-01-01; 13:45:30.500
        let ticks = (13 * 3600 + 45 * 60 + 30) * 300 + 150;
        let data = datetime_bytes(45_304, ticks);

        assert_eq!(to_char(TypeId::DateTime, &data), "Jan 15 2024 01:45:30:500PM");

        let rec = NativeConverter
            .crack_datetime(TypeId::DateTime.code(), &data)
            .unwrap();
        assert_eq!(rec.to_literal(), "2024-01-15 13:45:30");
        assert_eq!(rec.nanosecond, 500_000_000);
    }

    #[test]
    fn test_datetime_before_1900() {
        let data = datetime_bytes(-1, 0);
        let rec = NativeConverter
            .crack_datetime(TypeId::DateTime.code(), &data)
            .unwrap();
        assert_eq!(rec.to_literal(), "1899-12-31 00:00:00");
    }

    #[test]
    fn test_smalldatetime() {
        let mut data = 45_304u16.to_le_bytes().to_vec();
        data.extend_from_slice(&(9u16 * 60 + 5).to_le_bytes());
        let rec = NativeConverter
            .crack_datetime(TypeId::DateTime4.code(), &data)
            .unwrap();
        assert_eq!(rec.to_literal(), "2024-01-15 09:05:00");
    }

    #[test]
    fn test_datetime2() {
        // 00:00:01.5 at scale 7, 0001-01-02
        let ticks: u64 = 15_000_000;
        let mut data = ticks.to_le_bytes()[..5].to_vec();
        data.extend_from_slice(&[1, 0, 0]);

        assert_eq!(
            to_char(TypeId::DateTime2, &data),
            "0001-01-02 00:00:01.5000000"
        );
        let rec = NativeConverter
            .crack_datetime(TypeId::DateTime2.code(), &data)
            .unwrap();
        assert_eq!(rec.to_literal(), "0001-01-02 00:00:01");
    }

    #[test]
    fn test_datetimeoffset() {
        let ticks: u64 = 0;
        let mut data = ticks.to_le_bytes()[..5].to_vec();
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&(-90i16).to_le_bytes());
        assert_eq!(
            to_char(TypeId::DateTimeOffset, &data),
            "0000-12-31 22:30:00.0000000 -01:30"
        );
    }

    #[test]
    fn test_crack_rejects_non_datetime() {
        assert!(NativeConverter
            .crack_datetime(TypeId::Date.code(), &[0, 0, 0])
            .is_none());
        assert!(NativeConverter
            .crack_datetime(TypeId::Int4.code(), &[0; 4])
            .is_none());
    }

    #[test]
    fn test_guid() {
        let data = [
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        assert_eq!(
            to_char(TypeId::Guid, &data),
            "00112233-4455-6677-8899-AABBCCDDEEFF"
        );
    }

    #[test]
    fn test_will_convert() {
        assert!(NativeConverter.will_convert(TypeId::Xml.code()));
        assert!(NativeConverter.will_convert(TypeId::Timestamp.code()));
        assert!(!NativeConverter.will_convert(TypeId::Variant.code()));
        assert!(!NativeConverter.will_convert(0x99));
    }

    #[test]
    fn test_dest_too_small() {
        let mut buf = [0u8; 2];
        assert_eq!(
            NativeConverter.convert_to_char(TypeId::VarChar.code(), b"abc", &mut buf),
            -1
        );
    }

    #[test]
    fn test_short_buffer_zero_extended() {
        assert_eq!(to_char(TypeId::Int4, &[1]), "1");
    }

    #[test]
    fn test_float_from_text() {
        assert_eq!(
            NativeConverter.convert_to_float(TypeId::VarChar.code(), b" 2.5 "),
            Some(2.5)
        );
        assert_eq!(
            NativeConverter.convert_to_float(TypeId::VarChar.code(), b"x"),
            None
        );
    }
}
