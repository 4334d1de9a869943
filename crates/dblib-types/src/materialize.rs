//! Column materialization: wire buffer plus type code to host value.

use bytes::Bytes;

use crate::convert::Converter;
use crate::policy::Policy;
use crate::types::TypeId;
use crate::value::HostValue;

/// Minimum scratch space for a datetime rendered through the converter.
pub const DATETIME_MAX_LEN: usize = 63;

/// Scratch space for a uniqueidentifier rendered as text, plus terminator.
const GUID_TEXT_CAP: usize = 37;

/// Whether a wire integer of `width` bytes fits the host integer.
const fn fits_host_int(width: usize) -> bool {
    width <= std::mem::size_of::<i64>()
}

/// Convert one column (or return value) buffer into a host value.
///
/// `data` is `None` when the protocol reports no buffer at all, which is
/// always materialized as [`HostValue::Null`]. An empty but present buffer
/// is a real (empty) value.
pub fn materialize<C>(code: i32, data: Option<&[u8]>, policy: &Policy, conv: &C) -> HostValue
where
    C: Converter + ?Sized,
{
    let Some(data) = data else {
        return HostValue::Null;
    };

    let ty = TypeId::from_code(code);
    if should_stringify(ty, policy) && conv.will_convert(code) {
        return stringify(code, ty, data, conv);
    }

    let Some(ty) = ty else {
        return convertible(code, None, data, conv);
    };

    match ty {
        TypeId::Char
        | TypeId::VarChar
        | TypeId::Text
        | TypeId::Binary
        | TypeId::VarBinary
        | TypeId::Image => HostValue::Str(Bytes::copy_from_slice(data)),

        TypeId::DateTime | TypeId::DateTime4 | TypeId::DateTime2 => conv
            .crack_datetime(code, data)
            .map_or(HostValue::Null, |rec| HostValue::from(rec.to_literal())),

        TypeId::Float4 => HostValue::Double(f64::from(f32::from_le_bytes(fixed(data)))),
        TypeId::Float8 => HostValue::Double(f64::from_le_bytes(fixed(data))),
        TypeId::Int8 => HostValue::Int(i64::from_le_bytes(fixed(data))),
        TypeId::Int4 => HostValue::Int(i64::from(i32::from_le_bytes(fixed(data)))),
        TypeId::Int2 => HostValue::Int(i64::from(i16::from_le_bytes(fixed(data)))),
        TypeId::Int1 | TypeId::Bit => HostValue::Int(i64::from(fixed::<1>(data)[0])),

        TypeId::Decimal | TypeId::Numeric | TypeId::Money | TypeId::Money4 | TypeId::MoneyN => {
            conv.convert_to_float(code, data)
                .map_or(HostValue::Null, HostValue::Double)
        }

        TypeId::Guid if policy.stringify_uniqueidentifier => {
            let mut buf = [0u8; GUID_TEXT_CAP];
            let len = conv.convert_to_char(code, data, &mut buf);
            let text = usize::try_from(len).map_or(&[][..], |n| &buf[..n.min(GUID_TEXT_CAP)]);
            HostValue::Str(Bytes::from(text.to_ascii_uppercase()))
        }
        TypeId::Guid => HostValue::Str(Bytes::copy_from_slice(&fixed::<16>(data))),

        TypeId::BigChar
        | TypeId::BigVarChar
        | TypeId::BigBinary
        | TypeId::BigVarBinary
        | TypeId::Timestamp
        | TypeId::SybNVarChar
        | TypeId::NVarChar
        | TypeId::NChar
        | TypeId::NText
        | TypeId::Xml
        | TypeId::BitN
        | TypeId::IntN
        | TypeId::SybDecimal
        | TypeId::SybNumeric
        | TypeId::Date
        | TypeId::Time
        | TypeId::DateTimeOffset
        | TypeId::Variant
        | TypeId::Geometry => convertible(code, Some(ty), data, conv),
    }
}

/// Whether a column of this type takes the string conversion path.
#[must_use]
pub fn should_stringify(ty: Option<TypeId>, policy: &Policy) -> bool {
    let Some(ty) = ty else {
        return false;
    };

    match ty {
        ty if ty.is_decimal_family() => policy.stringify_numerics,
        TypeId::Float4
        | TypeId::Float8
        | TypeId::Int4
        | TypeId::Int2
        | TypeId::Int1
        | TypeId::Bit => policy.stringify_numerics,
        TypeId::Int8 => policy.stringify_numerics || !fits_host_int(8),
        TypeId::DateTime | TypeId::DateTime4 | TypeId::DateTime2 => policy.convert_datetime,
        _ => false,
    }
}

fn convertible<C>(code: i32, ty: Option<TypeId>, data: &[u8], conv: &C) -> HostValue
where
    C: Converter + ?Sized,
{
    if conv.will_convert(code) {
        stringify(code, ty, data, conv)
    } else {
        HostValue::Null
    }
}

/// The generic string conversion path.
///
/// Trailing spaces are trimmed from the converted text; a failed
/// conversion yields an empty string rather than null.
fn stringify<C>(code: i32, ty: Option<TypeId>, data: &[u8], conv: &C) -> HostValue
where
    C: Converter + ?Sized,
{
    let mut cap = 32 + 2 * data.len();
    if ty.is_some_and(TypeId::is_crackable_datetime) {
        cap = cap.max(DATETIME_MAX_LEN);
    }

    let mut buf = vec![0u8; cap];
    let len = conv.convert_to_char(code, data, &mut buf);
    let Ok(len) = usize::try_from(len) else {
        return HostValue::Str(Bytes::new());
    };

    buf.truncate(len.min(cap));
    while buf.last() == Some(&b' ') {
        buf.pop();
    }
    HostValue::Str(Bytes::from(buf))
}

fn fixed<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = data.len().min(N);
    out[..len].copy_from_slice(&data[..len]);
    out
}
