//! Element types a channel can store.
//!
//! The set is closed: [`ElementType`] is the runtime tag, [`Element`] the
//! sealed compile-time counterpart implemented for exactly the same eight
//! types, and [`Scalar`] a single value of any of them. Code that has to act
//! on a runtime tag goes through [`with_element_type!`], which expands to one
//! monomorphized arm per type.

use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;
use half::f16;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
}

impl ElementType {
    pub const ALL: [ElementType; 8] = [
        ElementType::U8,
        ElementType::I8,
        ElementType::U16,
        ElementType::I16,
        ElementType::U32,
        ElementType::I32,
        ElementType::F16,
        ElementType::F32,
    ];

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 | ElementType::F16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::U8 => "uint8",
            ElementType::I8 => "int8",
            ElementType::U16 => "uint16",
            ElementType::I16 => "int16",
            ElementType::U32 => "uint32",
            ElementType::I32 => "int32",
            ElementType::F16 => "float16",
            ElementType::F32 => "float32",
        }
    }

    /// Parse a type name such as `uint16`, `u16`, `half` or `f32`.
    ///
    /// Anything outside the supported set, `bool` included, fails with
    /// [`Error::InvalidType`].
    pub fn from_name(name: &str) -> Result<Self> {
        let dtype = match name.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => ElementType::U8,
            "int8" | "i8" => ElementType::I8,
            "uint16" | "u16" => ElementType::U16,
            "int16" | "i16" => ElementType::I16,
            "uint32" | "u32" => ElementType::U32,
            "int32" | "i32" => ElementType::I32,
            "float16" | "f16" | "half" => ElementType::F16,
            "float32" | "f32" | "float" => ElementType::F32,
            _ => {
                return Err(Error::InvalidType(format!(
                    "'{}' (supported: uint8, int8, uint16, int16, uint32, int32, float16, float32)",
                    name
                )))
            }
        };
        Ok(dtype)
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F16 | ElementType::F32)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ElementType::from_name(s)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A pixel component type a channel can hold.
pub trait Element: sealed::Sealed + Pod + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: ElementType;

    fn into_scalar(self) -> Scalar;

    /// Saturating conversion; NaN becomes zero for integer types.
    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_primitive_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const DTYPE: ElementType = ElementType::$variant;

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }

            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }
        )*
    };
}

impl_primitive_element!(
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
);

impl sealed::Sealed for f16 {}

impl Element for f16 {
    const DTYPE: ElementType = ElementType::F16;

    fn into_scalar(self) -> Scalar {
        Scalar::F16(self)
    }

    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
}

impl From<f16> for Scalar {
    fn from(value: f16) -> Self {
        Scalar::F16(value)
    }
}

/// Run `$body` with `$T` bound to the Rust type behind `$dtype`.
#[macro_export]
macro_rules! with_element_type {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::ElementType::U8 => {
                type $T = u8;
                $body
            }
            $crate::ElementType::I8 => {
                type $T = i8;
                $body
            }
            $crate::ElementType::U16 => {
                type $T = u16;
                $body
            }
            $crate::ElementType::I16 => {
                type $T = i16;
                $body
            }
            $crate::ElementType::U32 => {
                type $T = u32;
                $body
            }
            $crate::ElementType::I32 => {
                type $T = i32;
                $body
            }
            $crate::ElementType::F16 => {
                type $T = $crate::f16;
                $body
            }
            $crate::ElementType::F32 => {
                type $T = f32;
                $body
            }
        }
    };
}

/// One value of any supported element type, e.g. the fill of a lazy chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F16(f16),
    F32(f32),
}

impl Scalar {
    pub fn zero(dtype: ElementType) -> Self {
        Self::from_f64(dtype, 0.0)
    }

    /// Convert `value` into a scalar of `dtype` (saturating for integers).
    pub fn from_f64(dtype: ElementType, value: f64) -> Self {
        with_element_type!(dtype, T => <T as Element>::from_f64(value).into_scalar())
    }

    pub fn dtype(self) -> ElementType {
        match self {
            Scalar::U8(_) => ElementType::U8,
            Scalar::I8(_) => ElementType::I8,
            Scalar::U16(_) => ElementType::U16,
            Scalar::I16(_) => ElementType::I16,
            Scalar::U32(_) => ElementType::U32,
            Scalar::I32(_) => ElementType::I32,
            Scalar::F16(_) => ElementType::F16,
            Scalar::F32(_) => ElementType::F32,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Scalar::U8(v) => v.to_f64(),
            Scalar::I8(v) => v.to_f64(),
            Scalar::U16(v) => v.to_f64(),
            Scalar::I16(v) => v.to_f64(),
            Scalar::U32(v) => v.to_f64(),
            Scalar::I32(v) => v.to_f64(),
            Scalar::F16(v) => Element::to_f64(v),
            Scalar::F32(v) => v.to_f64(),
        }
    }

    /// Re-express this value as `dtype`, keeping it unchanged if it already is one.
    pub fn cast(self, dtype: ElementType) -> Self {
        if self.dtype() == dtype {
            self
        } else {
            Self::from_f64(dtype, self.to_f64())
        }
    }

    /// The value as `T`, if `T` is this scalar's type.
    pub fn get<T: Element>(self) -> Option<T> {
        if T::DTYPE != self.dtype() {
            return None;
        }
        let (bytes, len) = self.ne_bytes();
        Some(bytemuck::pod_read_unaligned(&bytes[..len]))
    }

    fn ne_bytes(self) -> ([u8; 4], usize) {
        let mut buf = [0u8; 4];
        let len = match self {
            Scalar::U8(v) => copy_ne(&mut buf, &[v]),
            Scalar::I8(v) => copy_ne(&mut buf, &[v]),
            Scalar::U16(v) => copy_ne(&mut buf, &[v]),
            Scalar::I16(v) => copy_ne(&mut buf, &[v]),
            Scalar::U32(v) => copy_ne(&mut buf, &[v]),
            Scalar::I32(v) => copy_ne(&mut buf, &[v]),
            Scalar::F16(v) => copy_ne(&mut buf, &[v]),
            Scalar::F32(v) => copy_ne(&mut buf, &[v]),
        };
        (buf, len)
    }

    /// Fill `out` with repeated native-endian copies of this value.
    pub(crate) fn fill_bytes(self, out: &mut [u8]) {
        let (bytes, len) = self.ne_bytes();
        for element in out.chunks_exact_mut(len) {
            element.copy_from_slice(&bytes[..len]);
        }
    }
}

fn copy_ne<T: Pod>(buf: &mut [u8; 4], value: &[T]) -> usize {
    let bytes: &[u8] = bytemuck::cast_slice(value);
    buf[..bytes.len()].copy_from_slice(bytes);
    bytes.len()
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_f64(), self.dtype())
    }
}

/// View a typed slice as native-endian bytes.
pub fn as_bytes<T: Element>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

/// Copy native-endian bytes into a typed vector. `bytes.len()` must be a
/// multiple of `size_of::<T>()`.
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytemuck::pod_collect_to_vec(bytes)
}

/// Convert a native-endian buffer of `from` elements into one of `to` elements.
pub fn convert_bytes(bytes: &[u8], from: ElementType, to: ElementType) -> Vec<u8> {
    if from == to {
        return bytes.to_vec();
    }
    let values: Vec<f64> = with_element_type!(from, S => {
        from_bytes::<S>(bytes).into_iter().map(Element::to_f64).collect()
    });
    encode_f64(&values, to)
}

/// Encode `values` as native-endian bytes of `dtype`.
pub fn encode_f64(values: &[f64], dtype: ElementType) -> Vec<u8> {
    with_element_type!(dtype, T => {
        let typed: Vec<T> = values.iter().map(|&v| <T as Element>::from_f64(v)).collect();
        as_bytes(&typed).to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_names() {
        assert_eq!(ElementType::U8.size(), 1);
        assert_eq!(ElementType::F16.size(), 2);
        assert_eq!(ElementType::I32.size(), 4);
        for dtype in ElementType::ALL {
            assert_eq!(dtype.name().parse::<ElementType>().unwrap(), dtype);
        }
        assert_eq!(ElementType::from_name("half").unwrap(), ElementType::F16);
    }

    #[test]
    fn bool_is_not_an_element_type() {
        let err = ElementType::from_name("bool").unwrap_err();
        assert!(matches!(err, Error::InvalidType(_)));
        assert!(ElementType::from_name("float64").is_err());
    }

    #[test]
    fn element_tags_match() {
        assert_eq!(<u16 as Element>::DTYPE, ElementType::U16);
        assert_eq!(<f16 as Element>::DTYPE, ElementType::F16);
        assert_eq!(Scalar::from(7i8).dtype(), ElementType::I8);
    }

    #[test]
    fn scalar_conversion_saturates() {
        assert_eq!(Scalar::from_f64(ElementType::U8, 300.0), Scalar::U8(255));
        assert_eq!(Scalar::from_f64(ElementType::I16, -1e9), Scalar::I16(i16::MIN));
        assert_eq!(Scalar::from_f64(ElementType::U32, f64::NAN), Scalar::U32(0));
        assert_eq!(Scalar::U16(25).cast(ElementType::F32), Scalar::F32(25.0));
        assert_eq!(Scalar::F16(f16::from_f32(1.5)).get::<f16>(), Some(f16::from_f32(1.5)));
        assert_eq!(Scalar::U8(3).get::<u16>(), None);
    }

    #[test]
    fn fill_bytes_repeats_native_value() {
        let mut out = vec![0u8; 8];
        Scalar::U16(0x0102).fill_bytes(&mut out);
        assert_eq!(from_bytes::<u16>(&out), vec![0x0102; 4]);
    }

    #[test]
    fn convert_between_types() {
        let src = as_bytes(&[0.0f32, 1.0, 255.0, 1000.0]).to_vec();
        let out = convert_bytes(&src, ElementType::F32, ElementType::U8);
        assert_eq!(out, vec![0, 1, 255, 255]);

        let halves = convert_bytes(&src, ElementType::F32, ElementType::F16);
        assert_eq!(from_bytes::<f16>(&halves)[2], f16::from_f32(255.0));
    }
}
