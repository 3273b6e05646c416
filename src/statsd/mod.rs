use std::fmt::Display;

pub mod client;
pub mod conn;
pub mod options;
pub mod safe_conn;
pub mod tags;
pub mod writer;

/// A metric value.
///
/// Every integer width shares one decimal rule, and each float precision is
/// printed as the shortest plain decimal that round-trips at that precision
/// (`0.1f32` is `0.1`, never `0.100000001`). Non-finite floats are written as
/// `NaN`, `+Inf` and `-Inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// `i8` value.
    I8(i8),
    /// `i16` value.
    I16(i16),
    /// `i32` value.
    I32(i32),
    /// `i64` value.
    I64(i64),
    /// `isize` value.
    Isize(isize),
    /// `u8` value.
    U8(u8),
    /// `u16` value.
    U16(u16),
    /// `u32` value.
    U32(u32),
    /// `u64` value.
    U64(u64),
    /// `usize` value.
    Usize(usize),
    /// `f32` value.
    F32(f32),
    /// `f64` value.
    F64(f64),
}

macro_rules! impl_from_number {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

impl_from_number!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize,
    f32 => F32, f64 => F64,
);

impl Number {
    /// Returns the value as `f64` for the float variants.
    #[must_use]
    pub fn as_float(self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Strictly below zero. Negative zero and NaN are not negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        match self {
            Self::I8(v) => v < 0,
            Self::I16(v) => v < 0,
            Self::I32(v) => v < 0,
            Self::I64(v) => v < 0,
            Self::Isize(v) => v < 0,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) | Self::Usize(_) => false,
            Self::F32(v) => v < 0.0,
            Self::F64(v) => v < 0.0,
        }
    }

    pub(crate) fn append_to(self, buf: &mut Vec<u8>, int_writer: &mut itoa::Buffer) {
        match self {
            Self::I8(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::I16(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::I32(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::I64(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::Isize(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::U8(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::U16(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::U32(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::U64(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::Usize(v) => buf.extend_from_slice(int_writer.format(v).as_bytes()),
            Self::F32(v) => append_float(buf, v, v.is_nan(), v.is_infinite(), v < 0.0),
            Self::F64(v) => append_float(buf, v, v.is_nan(), v.is_infinite(), v < 0.0),
        }
    }
}

fn append_float(buf: &mut Vec<u8>, value: impl Display, nan: bool, infinite: bool, negative: bool) {
    if nan {
        buf.extend_from_slice(b"NaN");
    } else if infinite {
        buf.extend_from_slice(if negative { b"-Inf" } else { b"+Inf" });
    } else {
        // `Display` for floats is the shortest round-trip form without an exponent.
        buf.extend_from_slice(value.to_string().as_bytes());
    }
}

/// Wire type codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetricType {
    Count,
    Gauge,
    Timing,
    Histogram,
    Set,
}

impl MetricType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "c",
            Self::Gauge => "g",
            Self::Timing => "ms",
            Self::Histogram => "h",
            Self::Set => "s",
        }
    }
}
