use crate::error::{ContainerError, Result};

/// First line of the binary data file
pub const DATA_MAGIC: &[u8] = b"%BINSEEK v001\n";

/// First line of the structural log file
pub const LOG_MAGIC: &[u8] = b"%BINSEEKLOG v001\n";

/// Which of the two append-only files a header belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Data,
    Log,
}

impl FileKind {
    /// Header bytes written when a container is opened for writing
    pub fn magic(self) -> &'static [u8] {
        match self {
            FileKind::Data => DATA_MAGIC,
            FileKind::Log => LOG_MAGIC,
        }
    }

    fn magic_str(self) -> &'static str {
        match self {
            FileKind::Data => "%BINSEEK v001",
            FileKind::Log => "%BINSEEKLOG v001",
        }
    }

    /// Length of the header, i.e. the offset of the first record
    pub fn header_len(self) -> u64 {
        self.magic().len() as u64
    }

    /// Check that `bytes` starts with this file's header.
    ///
    /// Returns the offset of the first record.
    pub fn validate(self, bytes: &[u8]) -> Result<u64> {
        let magic = self.magic();
        if bytes.len() < magic.len() || &bytes[..magic.len()] != magic {
            return Err(ContainerError::InvalidHeader {
                expected: self.magic_str(),
            });
        }
        Ok(magic.len() as u64)
    }
}
