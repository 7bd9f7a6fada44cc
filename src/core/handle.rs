use crate::array::{NdArray, Order};
use crate::container::Container;
use crate::dtype::DType;
use crate::error::Result;

/// Locator for one array stored in the data file.
///
/// Handles are created once, either by a write or by loading the metadata
/// snapshot, and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayHandle {
    pub(crate) group: String,
    pub(crate) name: String,
    pub(crate) record_offset: u64,
    pub(crate) data_offset: u64,
    pub(crate) dtype: DType,
    pub(crate) shape: Vec<u64>,
    pub(crate) order: Order,
    pub(crate) bytes_len: u64,
}

impl ArrayHandle {
    /// Path of the group the array was written into
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset of the record header in the data file
    pub fn record_offset(&self) -> u64 {
        self.record_offset
    }

    /// Offset of the first payload byte in the data file
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Payload length in bytes
    pub fn bytes_len(&self) -> u64 {
        self.bytes_len
    }

    /// Read the array back through a read-mode container.
    pub fn read(&self, container: &Container) -> Result<NdArray> {
        container.read_array(self)
    }

    /// Rebuild the array from its payload.
    ///
    /// Column-major payloads are laid out with the reversed shape and then
    /// transposed back.
    pub(crate) fn decode(&self, payload: Vec<u8>) -> Result<NdArray> {
        match self.order {
            Order::RowMajor => {
                NdArray::from_bytes(self.dtype, self.shape.clone(), Order::RowMajor, payload)
            }
            Order::ColumnMajor => {
                let mut reversed = self.shape.clone();
                reversed.reverse();
                Ok(NdArray::from_bytes(self.dtype, reversed, Order::RowMajor, payload)?.transpose())
            }
        }
    }
}
