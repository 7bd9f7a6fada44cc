//! Disk I/O for the append-only container files

use crate::error::{ContainerError, Result};
use crate::header::FileKind;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only file that knows the offset of its next byte
pub struct AppendFile {
    writer: BufWriter<File>,
    offset: u64,
    path: PathBuf,
    poisoned: bool,
}

impl AppendFile {
    /// Create (or truncate) the file and write its header.
    pub fn create<P: AsRef<Path>>(path: P, kind: FileKind) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(kind.magic())?;

        Ok(AppendFile {
            writer,
            offset: kind.header_len(),
            path: path.as_ref().to_path_buf(),
            poisoned: false,
        })
    }

    /// Offset the next appended byte will land at
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append `parts` back to back, returning the offset of the first byte.
    ///
    /// A failed write may leave part of a record behind, so every later
    /// append is refused with [`ContainerError::Poisoned`].
    pub fn append(&mut self, parts: &[&[u8]]) -> Result<u64> {
        if self.poisoned {
            return Err(ContainerError::Poisoned(self.path.clone()));
        }

        let start = self.offset;
        let mut written = 0u64;
        for part in parts {
            if let Err(e) = self.writer.write_all(part) {
                self.poisoned = true;
                return Err(e.into());
            }
            written += part.len() as u64;
        }
        self.offset = start
            .checked_add(written)
            .ok_or(ContainerError::SizeOverflow(start as u128 + written as u128))?;
        Ok(start)
    }

    /// Push buffered bytes to the OS and sync them to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read side of the binary data file
pub struct DataReader {
    file: File,
    path: PathBuf,
}

impl DataReader {
    /// Open the data file for reading.
    ///
    /// The header is only checked once it is complete; a writer that has not
    /// flushed yet may leave the file shorter than its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(&path)?;

        let header_len = FileKind::Data.header_len();
        if file.metadata()?.len() >= header_len {
            let mut header = vec![0u8; header_len as usize];
            file.read_exact(&mut header)?;
            FileKind::Data.validate(&header)?;
        }

        Ok(DataReader {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Fewer bytes on disk than recorded means the file was truncated or the
    /// offsets are wrong; that is reported as corruption, never padded.
    pub fn read_exact_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let file_len = self.file.metadata()?.len();
        let available = file_len.saturating_sub(offset);
        if available < len {
            return Err(ContainerError::Corruption {
                offset,
                expected: len,
                actual: available,
            });
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = Vec::with_capacity(len as usize);
        (&mut self.file).take(len).read_to_end(&mut buffer)?;

        if buffer.len() as u64 != len {
            return Err(ContainerError::Corruption {
                offset,
                expected: len,
                actual: buffer.len() as u64,
            });
        }

        Ok(buffer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
