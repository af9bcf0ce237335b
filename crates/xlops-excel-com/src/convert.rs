//! Typed reads: converting raw cell values into Rust types.

use xlops_protocol::CellValue;

/// A type a cell value can be read as.
///
/// Conversions are strict: `None` means the cell's value has no sensible
/// reading as `Self`, and callers turn that into
/// [`BridgeError::Conversion`](crate::BridgeError::Conversion).
pub trait FromCellValue: Sized {
    /// Name used in conversion errors.
    const TARGET: &'static str;

    fn from_cell_value(value: &CellValue) -> Option<Self>;
}

impl FromCellValue for CellValue {
    const TARGET: &'static str = "cell value";

    fn from_cell_value(value: &CellValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromCellValue for String {
    const TARGET: &'static str = "string";

    fn from_cell_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Null | CellValue::Error(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl FromCellValue for f64 {
    const TARGET: &'static str = "f64";

    fn from_cell_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Number(n) => Some(*n),
            CellValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromCellValue for bool {
    const TARGET: &'static str = "bool";

    fn from_cell_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Bool(b) => Some(*b),
            CellValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Exclusive upper bound of an integer type, exact as an f64.
///
/// `MAX as f64` rounds up to a power of two for 64-bit types, so it cannot
/// serve as an inclusive bound.
fn upper_bound(bits: u32, signed: bool) -> f64 {
    2f64.powi(bits as i32 - i32::from(signed))
}

macro_rules! impl_from_cell_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromCellValue for $ty {
                const TARGET: &'static str = stringify!($ty);

                fn from_cell_value(value: &CellValue) -> Option<Self> {
                    match value {
                        // Engines report every number as a double
                        CellValue::Number(n) if n.fract() == 0.0
                            && *n >= <$ty>::MIN as f64
                            && *n < upper_bound(<$ty>::BITS, <$ty>::MIN != 0) => Some(*n as $ty),
                        CellValue::String(s) => s.trim().parse().ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_cell_value_int!(i32, i64, u32, u64);

impl<T: FromCellValue> FromCellValue for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_cell_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Null => Some(None),
            other => T::from_cell_value(other).map(Some),
        }
    }
}
