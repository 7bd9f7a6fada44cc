//! Element type descriptors
//!
//! A [`DType`] is the compact tag stored in every array record and in the
//! metadata snapshot, e.g. `<i2` (little-endian 16-bit signed integer) or
//! `|u1` (single byte, byte order not applicable).
//!
//! ```text
//! <byte order> <kind> <size>
//!      <  >  |    b i u f c S U V
//! ```
//!
//! `U` sizes count UCS-4 code points, every other kind counts bytes. Object
//! element types (`O`) cannot be represented by the format and are rejected.

use crate::error::{ContainerError, Result};
use std::fmt;
use std::str::FromStr;

/// Byte order of a multi-byte element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte and raw byte-string elements
    NotApplicable,
}

impl ByteOrder {
    fn as_char(self) -> char {
        match self {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        }
    }

    fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    UInt,
    Float,
    Complex,
    /// Fixed-width byte string
    Bytes,
    /// Fixed-width UCS-4 text
    Unicode,
    /// Raw fixed-width bytes
    Void,
}

impl Kind {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'b' => Kind::Bool,
            'i' => Kind::Int,
            'u' => Kind::UInt,
            'f' => Kind::Float,
            'c' => Kind::Complex,
            'S' => Kind::Bytes,
            'U' => Kind::Unicode,
            'V' => Kind::Void,
            _ => return None,
        })
    }

    fn as_char(self) -> char {
        match self {
            Kind::Bool => 'b',
            Kind::Int => 'i',
            Kind::UInt => 'u',
            Kind::Float => 'f',
            Kind::Complex => 'c',
            Kind::Bytes => 'S',
            Kind::Unicode => 'U',
            Kind::Void => 'V',
        }
    }

    fn accepts_itemsize(self, itemsize: usize) -> bool {
        match self {
            Kind::Bool => itemsize == 1,
            Kind::Int | Kind::UInt => matches!(itemsize, 1 | 2 | 4 | 8),
            Kind::Float => matches!(itemsize, 2 | 4 | 8 | 16),
            Kind::Complex => matches!(itemsize, 8 | 16 | 32),
            Kind::Unicode => itemsize % 4 == 0,
            Kind::Bytes | Kind::Void => true,
        }
    }
}

/// Element type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    byte_order: ByteOrder,
    kind: Kind,
    itemsize: usize,
}

impl DType {
    /// Build a descriptor, normalising the byte order the same way the tag
    /// parser does (single-byte and byte-string kinds never carry one).
    pub fn new(byte_order: ByteOrder, kind: Kind, itemsize: usize) -> Result<Self> {
        if !kind.accepts_itemsize(itemsize) {
            return Err(ContainerError::UnsupportedDType(format!(
                "{}{} is not a valid item size",
                kind.as_char(),
                itemsize
            )));
        }

        let byte_order = match kind {
            Kind::Bytes | Kind::Void => ByteOrder::NotApplicable,
            Kind::Unicode => match byte_order {
                ByteOrder::NotApplicable => ByteOrder::native(),
                other => other,
            },
            _ if itemsize == 1 => ByteOrder::NotApplicable,
            _ => match byte_order {
                ByteOrder::NotApplicable => ByteOrder::native(),
                other => other,
            },
        };

        Ok(DType {
            byte_order,
            kind,
            itemsize,
        })
    }

    /// Descriptor for a native Rust element stored little-endian.
    pub(crate) const fn little_endian(kind: Kind, itemsize: usize) -> Self {
        let byte_order = if itemsize == 1 {
            ByteOrder::NotApplicable
        } else {
            ByteOrder::Little
        };
        DType {
            byte_order,
            kind,
            itemsize,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Size of one element in bytes
    pub fn itemsize(&self) -> usize {
        self.itemsize
    }
}

impl FromStr for DType {
    type Err = ContainerError;

    fn from_str(tag: &str) -> Result<Self> {
        let unsupported = || ContainerError::UnsupportedDType(tag.to_string());

        let mut chars = tag.chars().peekable();
        let byte_order = match chars.peek() {
            Some('<') => Some(ByteOrder::Little),
            Some('>') => Some(ByteOrder::Big),
            Some('|') => Some(ByteOrder::NotApplicable),
            Some('=') => Some(ByteOrder::native()),
            _ => None,
        };
        if byte_order.is_some() {
            chars.next();
        }

        let kind_char = chars.next().ok_or_else(unsupported)?;
        if kind_char == 'O' {
            return Err(ContainerError::UnsupportedDType(format!(
                "{} (object elements cannot be stored)",
                tag
            )));
        }
        let kind = Kind::from_char(kind_char).ok_or_else(unsupported)?;

        let size: String = chars.collect();
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unsupported());
        }
        let size: usize = size.parse().map_err(|_| unsupported())?;
        let itemsize = match kind {
            Kind::Unicode => size.checked_mul(4).ok_or_else(unsupported)?,
            _ => size,
        };

        DType::new(
            byte_order.unwrap_or(ByteOrder::NotApplicable),
            kind,
            itemsize,
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = match self.kind {
            Kind::Unicode => self.itemsize / 4,
            _ => self.itemsize,
        };
        write!(
            f,
            "{}{}{}",
            self.byte_order.as_char(),
            self.kind.as_char(),
            size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_tags() {
        let dt: DType = "<i2".parse().unwrap();
        assert_eq!(dt.kind(), Kind::Int);
        assert_eq!(dt.itemsize(), 2);
        assert_eq!(dt.byte_order(), ByteOrder::Little);
        assert_eq!(dt.to_string(), "<i2");

        let dt: DType = ">f8".parse().unwrap();
        assert_eq!(dt.byte_order(), ByteOrder::Big);
        assert_eq!(dt.to_string(), ">f8");
    }

    #[test]
    fn test_single_byte_normalised() {
        let dt: DType = "<u1".parse().unwrap();
        assert_eq!(dt.to_string(), "|u1");

        let dt: DType = "|b1".parse().unwrap();
        assert_eq!(dt.kind(), Kind::Bool);
    }

    #[test]
    fn test_unicode_counts_code_points() {
        let dt: DType = "<U3".parse().unwrap();
        assert_eq!(dt.itemsize(), 12);
        assert_eq!(dt.to_string(), "<U3");
    }

    #[test]
    fn test_byte_strings() {
        let dt: DType = "|S5".parse().unwrap();
        assert_eq!(dt.itemsize(), 5);
        assert_eq!(dt.to_string(), "|S5");
    }

    #[test]
    fn test_rejects_object_and_garbage() {
        assert!(matches!(
            "|O".parse::<DType>(),
            Err(ContainerError::UnsupportedDType(_))
        ));
        assert!("<O8".parse::<DType>().is_err());
        assert!("".parse::<DType>().is_err());
        assert!("<x4".parse::<DType>().is_err());
        assert!("<i3".parse::<DType>().is_err());
        assert!("<i".parse::<DType>().is_err());
        assert!("<i-2".parse::<DType>().is_err());
    }
}
