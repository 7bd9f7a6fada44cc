//! In-memory n-dimensional array values
//!
//! [`NdArray`] is the value handed to [`GroupMut::create_array`] and returned by
//! [`ArrayHandle::read`]. It is deliberately small: an element type, a shape, a
//! memory order and one contiguous buffer. Typed access goes through the
//! [`Element`] trait for the primitive numeric types.
//!
//! [`GroupMut::create_array`]: crate::GroupMut::create_array
//! [`ArrayHandle::read`]: crate::ArrayHandle::read

use crate::dtype::{DType, Kind};
use crate::error::{ContainerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory order of a multi-dimensional buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// C order: last index varies fastest
    #[serde(rename = "C")]
    RowMajor,
    /// Fortran order: first index varies fastest
    #[serde(rename = "F")]
    ColumnMajor,
}

impl Order {
    /// Single byte stored in array records
    pub fn as_byte(self) -> u8 {
        match self {
            Order::RowMajor => b'C',
            Order::ColumnMajor => b'F',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'C' => Some(Order::RowMajor),
            b'F' => Some(Order::ColumnMajor),
            _ => None,
        }
    }

    fn flipped(self) -> Self {
        match self {
            Order::RowMajor => Order::ColumnMajor,
            Order::ColumnMajor => Order::RowMajor,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Order::RowMajor => "C",
            Order::ColumnMajor => "F",
        })
    }
}

/// Primitive element stored little-endian
pub trait Element: Copy {
    const DTYPE: DType;

    fn write_le(&self, out: &mut Vec<u8>);

    /// `bytes` is exactly `DTYPE.itemsize()` long
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::little_endian($kind, std::mem::size_of::<$ty>());

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_element! {
    i8 => Kind::Int,
    i16 => Kind::Int,
    i32 => Kind::Int,
    i64 => Kind::Int,
    u8 => Kind::UInt,
    u16 => Kind::UInt,
    u32 => Kind::UInt,
    u64 => Kind::UInt,
    f32 => Kind::Float,
    f64 => Kind::Float,
}

impl Element for bool {
    const DTYPE: DType = DType::little_endian(Kind::Bool, 1);

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Number of elements described by `shape`
pub(crate) fn element_count(shape: &[u64]) -> Result<u64> {
    shape.iter().try_fold(1u64, |acc, &dim| {
        acc.checked_mul(dim)
            .ok_or(ContainerError::SizeOverflow(acc as u128 * dim as u128))
    })
}

/// Owned n-dimensional array
#[derive(Clone)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<u64>,
    order: Order,
    data: Vec<u8>,
}

impl NdArray {
    /// Wrap a raw buffer laid out in `order`.
    ///
    /// Fails if the buffer length does not match `shape` and the item size.
    pub fn from_bytes(
        dtype: DType,
        shape: impl Into<Vec<u64>>,
        order: Order,
        data: Vec<u8>,
    ) -> Result<Self> {
        let shape = shape.into();
        let count = element_count(&shape)?;
        let expected = count
            .checked_mul(dtype.itemsize() as u64)
            .ok_or(ContainerError::SizeOverflow(
                count as u128 * dtype.itemsize() as u128,
            ))?;

        if expected != data.len() as u64 {
            return Err(ContainerError::ShapeMismatch {
                shape,
                itemsize: dtype.itemsize(),
                expected,
                actual: data.len() as u64,
            });
        }

        Ok(NdArray {
            dtype,
            shape,
            order,
            data,
        })
    }

    /// Build a row-major array from elements listed in row-major order.
    pub fn from_vec<T: Element>(shape: impl Into<Vec<u64>>, values: &[T]) -> Result<Self> {
        Self::from_bytes(T::DTYPE, shape, Order::RowMajor, encode_elements(values))
    }

    /// Build a column-major array from elements listed in column-major order.
    pub fn from_vec_column_major<T: Element>(
        shape: impl Into<Vec<u64>>,
        values: &[T],
    ) -> Result<Self> {
        Self::from_bytes(T::DTYPE, shape, Order::ColumnMajor, encode_elements(values))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Number of elements
    pub fn len(&self) -> u64 {
        // Validated at construction.
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The contiguous buffer in this array's own memory order
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Reverse the axes.
    ///
    /// The buffer is untouched: a row-major array of shape `s` is the same
    /// memory as a column-major array of shape `reverse(s)`.
    pub fn transpose(self) -> Self {
        let mut shape = self.shape;
        shape.reverse();
        NdArray {
            dtype: self.dtype,
            shape,
            order: self.order.flipped(),
            data: self.data,
        }
    }

    /// Bytes of every element visited in logical row-major order.
    pub fn to_row_major_bytes(&self) -> Vec<u8> {
        if self.order == Order::RowMajor || self.shape.len() <= 1 || self.data.is_empty() {
            return self.data.clone();
        }

        let itemsize = self.dtype.itemsize();
        let ndim = self.shape.len();

        let mut strides = vec![0u64; ndim];
        let mut stride = itemsize as u64;
        for (axis, dim) in self.shape.iter().enumerate() {
            strides[axis] = stride;
            stride *= dim;
        }

        let mut out = Vec::with_capacity(self.data.len());
        let mut index = vec![0u64; ndim];
        loop {
            let offset: u64 = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
            let start = offset as usize;
            out.extend_from_slice(&self.data[start..start + itemsize]);

            // Odometer over the logical index, last axis fastest.
            let mut axis = ndim;
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < self.shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }

    /// Elements in logical row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype != T::DTYPE {
            return Err(ContainerError::UnsupportedDType(format!(
                "array holds {} elements, requested {}",
                self.dtype,
                T::DTYPE
            )));
        }

        Ok(self
            .to_row_major_bytes()
            .chunks_exact(self.dtype.itemsize())
            .map(T::read_le)
            .collect())
    }
}

fn encode_elements<T: Element>(values: &[T]) -> Vec<u8> {
    let mut data = Vec::with_capacity(values.len() * T::DTYPE.itemsize());
    for value in values {
        value.write_le(&mut data);
    }
    data
}

/// Equal when element type, shape and every element match, whatever the
/// memory order of either side.
impl PartialEq for NdArray {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.shape == other.shape
            && (self.order == other.order && self.data == other.data
                || self.to_row_major_bytes() == other.to_row_major_bytes())
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dtype", &self.dtype.to_string())
            .field("shape", &self.shape)
            .field("order", &self.order)
            .field("bytes", &self.data.len())
            .finish()
    }
}
