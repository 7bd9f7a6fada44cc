use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a [`ContainerError`].
///
/// Callers that only care whether something was a misuse, bad input or damaged
/// file can match on this instead of on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation invoked in the wrong mode or on a closed session
    Usage,
    /// Malformed input rejected before any state was touched
    Validation,
    /// Files on disk disagree with the recorded offsets
    Corruption,
    /// Unknown group, array or attribute
    NotFound,
    /// Container files missing or colliding
    Resource,
    /// Underlying I/O or JSON failure
    Io,
}

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Operation not permitted in {mode} mode: {operation}")]
    WrongMode {
        mode: &'static str,
        operation: &'static str,
    },

    #[error("Container session is closed")]
    Closed,

    #[error("Invalid group path: {0:?}")]
    InvalidGroupPath(String),

    #[error("Invalid group name: {0:?} (must be non-empty and must not contain '/')")]
    InvalidGroupName(String),

    #[error("Invalid mode: {0:?} (expected \"r\" or \"w\")")]
    InvalidMode(String),

    #[error("Invalid value for attribute {name:?}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("Unsupported element type: {0}")]
    UnsupportedDType(String),

    #[error("Shape {shape:?} with item size {itemsize} needs {expected} bytes, got {actual}")]
    ShapeMismatch {
        shape: Vec<u64>,
        itemsize: usize,
        expected: u64,
        actual: u64,
    },

    #[error("Length {0} does not fit in a 64-bit length field")]
    SizeOverflow(u128),

    #[error("Malformed record at log offset {offset}: {reason}")]
    InvalidRecord { offset: u64, reason: String },

    #[error("Corrupted data file: expected {expected} bytes at offset {offset}, read {actual}")]
    Corruption {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid file header: expected {expected:?}")]
    InvalidHeader { expected: &'static str },

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Array {name:?} not found in group {group}")]
    ArrayNotFound { group: String, name: String },

    #[error("Attribute {name:?} not found in group {group}")]
    AttributeNotFound { group: String, name: String },

    #[error("Unable to open for reading: neither {metadata:?} nor {log:?} exists")]
    ContainerNotFound { metadata: PathBuf, log: PathBuf },

    #[error("Container files must be distinct: {0:?} is used twice")]
    FileCollision(PathBuf),

    #[error("Append to {0:?} failed earlier; its offsets are no longer known")]
    Poisoned(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContainerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::WrongMode { .. } | ContainerError::Closed => ErrorKind::Usage,
            ContainerError::InvalidGroupPath(_)
            | ContainerError::InvalidGroupName(_)
            | ContainerError::InvalidMode(_)
            | ContainerError::InvalidAttribute { .. }
            | ContainerError::UnsupportedDType(_)
            | ContainerError::ShapeMismatch { .. }
            | ContainerError::SizeOverflow(_)
            | ContainerError::InvalidRecord { .. } => ErrorKind::Validation,
            ContainerError::Corruption { .. } | ContainerError::InvalidHeader { .. } => {
                ErrorKind::Corruption
            }
            ContainerError::GroupNotFound(_)
            | ContainerError::ArrayNotFound { .. }
            | ContainerError::AttributeNotFound { .. } => ErrorKind::NotFound,
            ContainerError::ContainerNotFound { .. } | ContainerError::FileCollision(_) => {
                ErrorKind::Resource
            }
            ContainerError::Poisoned(_)
            | ContainerError::Io(_)
            | ContainerError::Serialization(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ContainerError::Closed.kind(), ErrorKind::Usage);
        assert_eq!(
            ContainerError::InvalidGroupPath("//".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ContainerError::Corruption {
                offset: 0,
                expected: 4,
                actual: 2
            }
            .kind(),
            ErrorKind::Corruption
        );
        assert_eq!(
            ContainerError::GroupNotFound("/x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ContainerError::FileCollision(PathBuf::from("a")).kind(),
            ErrorKind::Resource
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: ContainerError =
            std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("disk gone"));
    }
}
