//! # binseek - Append-Only Hierarchical Array Container
//!
//! A container is three files kept in step:
//!
//! - **data file** (`.hdat`): array records, each a header followed by the raw payload
//! - **structural log** (`.hlog`): one record per array or attribute write
//! - **metadata snapshot** (the path you open): the group tree as JSON
//!
//! Writers only ever append to the data file and the log, so a concurrent
//! reader can use whatever has been flushed. The snapshot is rewritten as a
//! whole on flush and close.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binseek::{Container, NdArray, Result};
//!
//! # fn main() -> Result<()> {
//! // Write
//! let mut container = Container::open("run.hbin", "w")?;
//! let mut group = container.create_group("/A/B")?;
//! group.set_attr("label", "first run")?;
//! group.set_attr("gain", 2.5)?;
//! group.create_array("arr1", &NdArray::from_vec(vec![3], &[1i16, 2, 3])?)?;
//! container.close()?;
//!
//! // Read
//! let container = Container::open("run.hbin", "r")?;
//! let handle = container.group("/A/B")?.get_array("arr1")?;
//! let values: Vec<i16> = handle.read(&container)?.to_vec()?;
//! assert_eq!(values, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use binseek::{ContainerBuilder, Mode, Result};
//!
//! # fn main() -> Result<()> {
//! let mut container = ContainerBuilder::new()
//!     .mode(Mode::Write)
//!     .data_path("/scratch/run.bin")
//!     .autoflush(false)
//!     .open("/scratch/run.json")?;
//!
//! container.create_group("/settings")?.set_attr("seed", 42)?;
//! container.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Flat module paths for the engine
pub use crate::core::{
    array, attr, container, dtype, error, group, handle, header, io, record, snapshot, validation,
};

pub use crate::core::{
    array::{Element, NdArray, Order},
    attr::{AttrValue, IntoAttrValue},
    container::{Container, ContainerOptions, GroupMut, Mode},
    dtype::{ByteOrder, DType, Kind},
    error::{ContainerError, ErrorKind, Result},
    group::Group,
    handle::ArrayHandle,
    record::{LogReader, LogRecord},
    validation::ContainerPaths,
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Open a container with default settings.
///
/// Shorthand for [`Container::open`].
pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<Container> {
    Container::open(path, mode)
}

/// Builder for customizing how a container is opened
///
/// # Examples
///
/// ```rust,no_run
/// use binseek::{ContainerBuilder, Mode};
///
/// let container = ContainerBuilder::new()
///     .mode(Mode::Write)
///     .log_path("events.hlog")
///     .write_metadata(false)
///     .open("events.hbin")?;
/// # Ok::<(), binseek::ContainerError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    mode: Mode,
    data_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    autoflush: bool,
    write_metadata: bool,
}

impl ContainerBuilder {
    /// Create a builder for a read session with autoflush and snapshots on
    pub fn new() -> Self {
        ContainerBuilder {
            mode: Mode::Read,
            data_path: None,
            log_path: None,
            autoflush: true,
            write_metadata: true,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse `"r"` or `"w"`.
    pub fn mode_str(mut self, mode: &str) -> Result<Self> {
        self.mode = mode.parse()?;
        Ok(self)
    }

    /// Set the data file path (defaults to the metadata path with `.hdat`)
    pub fn data_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Set the log file path (defaults to the metadata path with `.hlog`)
    pub fn log_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Flush the data file and log after every write
    pub fn autoflush(mut self, autoflush: bool) -> Self {
        self.autoflush = autoflush;
        self
    }

    /// Write the metadata snapshot on flush and close
    pub fn write_metadata(mut self, write_metadata: bool) -> Self {
        self.write_metadata = write_metadata;
        self
    }

    pub fn options(&self) -> ContainerOptions {
        ContainerOptions {
            mode: self.mode,
            data_path: self.data_path.clone(),
            log_path: self.log_path.clone(),
            autoflush: self.autoflush,
            write_metadata: self.write_metadata,
        }
    }

    /// Open the container whose metadata snapshot lives at `path`
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Container> {
        debug!(
            "Opening {:?} with autoflush={} write_metadata={}",
            path.as_ref(),
            self.autoflush,
            self.write_metadata
        );
        Container::open_with(path, self.options())
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
