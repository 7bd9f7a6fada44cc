//! Container session
//!
//! A [`Container`] owns the three files of one container for the lifetime of
//! a session. Write sessions append records to the data file and the log and
//! write the metadata snapshot on flush and close. Read sessions load the
//! snapshot once and serve array payloads from the data file.

use crate::array::NdArray;
use crate::attr::{AttrValue, IntoAttrValue};
use crate::error::{ContainerError, Result};
use crate::group::{canonical_path, Group, GroupTree};
use crate::handle::ArrayHandle;
use crate::header::FileKind;
use crate::io::{AppendFile, DataReader};
use crate::record::{encode_array_header, encode_array_log_record, encode_attr_record, LogReader};
use crate::snapshot;
use crate::validation::{child_path, validate_group_name, ContainerPaths};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Access mode of a session, fixed at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read-only: arrays can be read, nothing can be written
    Read,
    /// Write-only: records are appended, arrays cannot be read back
    Write,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::Write => "w",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Mode::Read),
            "w" => Ok(Mode::Write),
            other => Err(ContainerError::InvalidMode(other.to_string())),
        }
    }
}

/// Session settings
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    pub mode: Mode,
    /// Data file; defaults to the metadata path with an `hdat` extension
    pub data_path: Option<PathBuf>,
    /// Log file; defaults to the metadata path with an `hlog` extension
    pub log_path: Option<PathBuf>,
    /// Flush both append-only files after every write
    pub autoflush: bool,
    /// Write the metadata snapshot on flush and close
    pub write_metadata: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            mode: Mode::Read,
            data_path: None,
            log_path: None,
            autoflush: true,
            write_metadata: true,
        }
    }
}

enum Backend {
    Writer { data: AppendFile, log: AppendFile },
    Reader { data: Mutex<DataReader> },
    Closed,
}

/// An open container session
pub struct Container {
    mode: Mode,
    paths: ContainerPaths,
    backend: Backend,
    autoflush: bool,
    write_metadata: bool,
    dirty: bool,
    loaded: bool,
    tree: GroupTree,
}

impl Container {
    /// Open a container with default settings.
    ///
    /// `mode` is `"r"` or `"w"`; anything else fails before a file is touched.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use binseek::{Container, NdArray};
    ///
    /// # fn main() -> binseek::Result<()> {
    /// let mut container = Container::open("run.hbin", "w")?;
    /// let mut group = container.create_group("/A/B")?;
    /// group.set_attr("units", "mV")?;
    /// group.create_array("trace", &NdArray::from_vec(vec![3], &[1i16, 2, 3])?)?;
    /// container.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        let mode: Mode = mode.parse()?;
        Self::open_with(
            path,
            ContainerOptions {
                mode,
                ..ContainerOptions::default()
            },
        )
    }

    /// Open a container with explicit settings.
    pub fn open_with<P: AsRef<Path>>(path: P, options: ContainerOptions) -> Result<Self> {
        let paths = ContainerPaths::resolve(
            path,
            options.data_path.as_deref(),
            options.log_path.as_deref(),
        )?;

        info!(
            "Opening container {:?} in mode '{}'",
            paths.metadata, options.mode
        );

        match options.mode {
            Mode::Write => Self::create_writer(paths, &options),
            Mode::Read => Self::open_reader(paths, &options),
        }
    }

    fn create_writer(paths: ContainerPaths, options: &ContainerOptions) -> Result<Self> {
        let data = AppendFile::create(&paths.data, FileKind::Data)?;
        let log = AppendFile::create(&paths.log, FileKind::Log)?;

        // Offsets in an old snapshot point into the data file just truncated
        match std::fs::remove_file(&paths.metadata) {
            Ok(()) => debug!("Removed stale metadata snapshot {:?}", paths.metadata),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut container = Container {
            mode: Mode::Write,
            paths,
            backend: Backend::Writer { data, log },
            autoflush: options.autoflush,
            write_metadata: options.write_metadata,
            dirty: false,
            loaded: true,
            tree: GroupTree::new(),
        };

        if container.autoflush {
            container.flush_files()?;
        } else {
            container.dirty = true;
        }
        Ok(container)
    }

    fn open_reader(paths: ContainerPaths, options: &ContainerOptions) -> Result<Self> {
        if !paths.metadata.exists() && !paths.log.exists() {
            return Err(ContainerError::ContainerNotFound {
                metadata: paths.metadata,
                log: paths.log,
            });
        }

        let data = DataReader::open(&paths.data)?;

        let mut container = Container {
            mode: Mode::Read,
            paths,
            backend: Backend::Reader {
                data: Mutex::new(data),
            },
            autoflush: options.autoflush,
            write_metadata: options.write_metadata,
            dirty: false,
            loaded: false,
            tree: GroupTree::new(),
        };
        container.load_metadata()?;
        Ok(container)
    }

    fn load_metadata(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        if !snapshot::load(&mut self.tree, &self.paths.metadata)? {
            warn!(
                "No metadata snapshot at {:?}; opening with an empty group tree",
                self.paths.metadata
            );
        }
        self.loaded = true;
        info!(
            "Loaded {} groups from {:?}",
            self.tree.len(),
            self.paths.metadata
        );
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True while appended records may not have reached the disk yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn autoflush(&self) -> bool {
        self.autoflush
    }

    pub fn write_metadata(&self) -> bool {
        self.write_metadata
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.backend, Backend::Closed)
    }

    pub fn metadata_path(&self) -> &Path {
        &self.paths.metadata
    }

    pub fn data_path(&self) -> &Path {
        &self.paths.data
    }

    pub fn log_path(&self) -> &Path {
        &self.paths.log
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ContainerError::Closed);
        }
        Ok(())
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        self.ensure_active()?;
        if self.mode != Mode::Write {
            return Err(ContainerError::WrongMode {
                mode: self.mode.as_str(),
                operation,
            });
        }
        Ok(())
    }

    /// Get or create the group at an absolute path, creating every missing
    /// intermediate group.
    ///
    /// `"/"` is the root and `"/A/"` is the same group as `"/A"`. In read
    /// mode only existing groups can be requested.
    pub fn create_group(&mut self, path: &str) -> Result<GroupMut<'_>> {
        self.ensure_active()?;
        let path = canonical_path(path)?;

        if !self.tree.contains(&path) {
            self.check_writable("create_group")?;
            self.tree.ensure(&path)?;
        }

        Ok(GroupMut {
            container: self,
            path,
        })
    }

    /// Look up an existing group.
    pub fn group(&self, path: &str) -> Result<&Group> {
        self.ensure_active()?;
        let path = canonical_path(path)?;
        self.tree
            .get(&path)
            .ok_or(ContainerError::GroupNotFound(path))
    }

    /// Look up an existing group for writing.
    pub fn group_mut(&mut self, path: &str) -> Result<GroupMut<'_>> {
        self.ensure_active()?;
        let path = canonical_path(path)?;
        if !self.tree.contains(&path) {
            return Err(ContainerError::GroupNotFound(path));
        }
        Ok(GroupMut {
            container: self,
            path,
        })
    }

    pub fn root(&self) -> Result<&Group> {
        self.ensure_active()?;
        Ok(self.tree.root())
    }

    /// Number of groups, not counting the root
    pub fn len(&self) -> Result<usize> {
        self.ensure_active()?;
        Ok(self.tree.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Names of the root's direct children
    pub fn list_groups(&self) -> Result<Vec<&str>> {
        Ok(self.root()?.list_groups())
    }

    /// Every group except the root, in creation order
    pub fn all_groups(&self) -> Result<Vec<&Group>> {
        self.ensure_active()?;
        Ok(self.tree.all().collect())
    }

    /// Create the group at `group_path` if needed and write `array` into it.
    pub fn create_array(
        &mut self,
        group_path: &str,
        name: &str,
        array: &NdArray,
    ) -> Result<ArrayHandle> {
        self.check_writable("create_array")?;
        self.create_group(group_path)?.create_array(name, array)
    }

    /// Decoder over the structural log as currently flushed.
    pub fn log_reader(&self) -> Result<LogReader> {
        self.ensure_active()?;
        LogReader::open(&self.paths.log)
    }

    fn writer(&mut self, operation: &'static str) -> Result<(&mut AppendFile, &mut AppendFile)> {
        match &mut self.backend {
            Backend::Writer { data, log } => Ok((data, log)),
            Backend::Reader { .. } => Err(ContainerError::WrongMode {
                mode: Mode::Read.as_str(),
                operation,
            }),
            Backend::Closed => Err(ContainerError::Closed),
        }
    }

    fn write_array(&mut self, group: &str, name: &str, array: &NdArray) -> Result<ArrayHandle> {
        self.check_writable("create_array")?;
        let header = encode_array_header(group, name, array)?;
        let payload = array.as_bytes();

        let (data, log) = self.writer("create_array")?;
        let record_offset = data.append(&[&header, payload])?;
        log.append(&[&encode_array_log_record(&header, record_offset)])?;

        let handle = ArrayHandle {
            group: group.to_string(),
            name: name.to_string(),
            record_offset,
            data_offset: record_offset + header.len() as u64,
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
            order: array.order(),
            bytes_len: payload.len() as u64,
        };
        debug!(
            "Appended array {}:{} ({} bytes) at offset {}",
            group,
            name,
            handle.bytes_len,
            record_offset
        );

        self.tree
            .get_mut(group)
            .ok_or_else(|| ContainerError::GroupNotFound(group.to_string()))?
            .insert_array(handle.clone());
        self.after_write()?;
        Ok(handle)
    }

    fn write_attr(&mut self, group: &str, name: &str, value: AttrValue) -> Result<()> {
        let record = encode_attr_record(group, name, &value)?;

        let (_, log) = self.writer("set_attr")?;
        let offset = log.append(&[&record])?;
        debug!("Appended attribute {}:{} at log offset {}", group, name, offset);

        self.tree
            .get_mut(group)
            .ok_or_else(|| ContainerError::GroupNotFound(group.to_string()))?
            .insert_attr(name, value);
        self.after_write()
    }

    fn after_write(&mut self) -> Result<()> {
        if self.autoflush {
            self.flush_files()
        } else {
            self.dirty = true;
            Ok(())
        }
    }

    fn flush_files(&mut self) -> Result<()> {
        if let Backend::Writer { data, log } = &mut self.backend {
            data.flush()?;
            log.flush()?;
        }
        Ok(())
    }

    /// Read the array behind `handle`. Read mode only.
    pub fn read_array(&self, handle: &ArrayHandle) -> Result<NdArray> {
        match &self.backend {
            Backend::Reader { data } => {
                debug!(
                    "Reading {} bytes of {}:{} at offset {}",
                    handle.bytes_len, handle.group, handle.name, handle.data_offset
                );
                let payload = data
                    .lock()
                    .read_exact_at(handle.data_offset, handle.bytes_len)?;
                handle.decode(payload)
            }
            Backend::Writer { .. } => Err(ContainerError::WrongMode {
                mode: Mode::Write.as_str(),
                operation: "read",
            }),
            Backend::Closed => Err(ContainerError::Closed),
        }
    }

    /// Write the snapshot (when enabled) and push both append-only files
    /// to disk. Does nothing in read mode.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_with(self.write_metadata)
    }

    /// Like [`Container::flush`], choosing explicitly whether to write the
    /// snapshot.
    pub fn flush_with(&mut self, metadata: bool) -> Result<()> {
        self.ensure_active()?;
        if self.mode == Mode::Read {
            return Ok(());
        }

        // The snapshot must never name bytes that are not on disk yet
        self.flush_files()?;
        if metadata {
            snapshot::write(&self.tree, &self.paths.metadata)?;
        }
        self.dirty = false;
        debug!("Flushed container {:?}", self.paths.metadata);
        Ok(())
    }

    /// End the session. Write sessions store the final snapshot (when
    /// enabled) and flush both files. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        let result = match self.mode {
            Mode::Write => self.finish(),
            Mode::Read => Ok(()),
        };
        self.backend = Backend::Closed;

        info!("Closed container {:?}", self.paths.metadata);
        result
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_files()?;
        if self.write_metadata {
            snapshot::write(&self.tree, &self.paths.metadata)?;
        }
        self.dirty = false;
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close container {:?}: {}", self.paths.metadata, e);
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("metadata", &self.paths.metadata)
            .field("mode", &self.mode)
            .field("groups", &self.tree.len())
            .field("dirty", &self.dirty)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Mutable view of one group inside a session
#[derive(Debug)]
pub struct GroupMut<'a> {
    container: &'a mut Container,
    path: String,
}

impl<'a> GroupMut<'a> {
    /// Get or create the direct child `name`.
    pub fn create_group(self, name: &str) -> Result<GroupMut<'a>> {
        self.container.ensure_active()?;
        validate_group_name(name)?;

        let path = child_path(&self.path, name);
        if !self.container.tree.contains(&path) {
            self.container.check_writable("create_group")?;
            self.container.tree.ensure_child(&self.path, name)?;
        }

        Ok(GroupMut {
            container: self.container,
            path,
        })
    }

    /// Append `array` to the data file and record it under `name`.
    ///
    /// Writing a name twice points the group at the newer record; the older
    /// bytes stay in the file.
    pub fn create_array(&mut self, name: &str, array: &NdArray) -> Result<ArrayHandle> {
        self.container.write_array(&self.path, name, array)
    }

    /// Set an attribute.
    ///
    /// Unsupported values are rejected before anything is written, leaving
    /// the group untouched.
    pub fn set_attr<V: IntoAttrValue>(&mut self, name: &str, value: V) -> Result<()> {
        self.container.check_writable("set_attr")?;
        let value = value.into_attr_value(name)?;
        self.container.write_attr(&self.path, name, value)
    }
}

impl Deref for GroupMut<'_> {
    type Target = Group;

    fn deref(&self) -> &Group {
        // Groups are never removed, and a GroupMut is only built for a path
        // present in the tree.
        self.container.tree.existing(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_write(dir: &TempDir) -> Container {
        Container::open(dir.path().join("c.hbin"), "w").unwrap()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("r".parse::<Mode>().unwrap(), Mode::Read);
        assert_eq!("w".parse::<Mode>().unwrap(), Mode::Write);
        assert!(matches!(
            "rw".parse::<Mode>(),
            Err(ContainerError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_create_group_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let mut c = open_write(&dir);

        assert_eq!(c.create_group("/").unwrap().path(), "/");
        assert_eq!(c.create_group("/A/").unwrap().path(), "/A");
        assert_eq!(c.create_group("/A/B").unwrap().parent(), Some("/A"));
        assert_eq!(c.len().unwrap(), 2);
        assert_eq!(c.list_groups().unwrap(), vec!["A"]);

        assert!(c.create_group("").is_err());
        assert!(c.create_group("A").is_err());
        assert!(c.create_group("/A//B").is_err());
        assert_eq!(c.len().unwrap(), 2);
    }

    #[test]
    fn test_child_group() {
        let dir = TempDir::new().unwrap();
        let mut c = open_write(&dir);

        let child = c.create_group("/A").unwrap().create_group("B").unwrap();
        assert_eq!(child.path(), "/A/B");
        assert_eq!(child.name(), "B");

        assert!(matches!(
            c.create_group("/A").unwrap().create_group("x/y"),
            Err(ContainerError::InvalidGroupName(_))
        ));
    }

    #[test]
    fn test_group_lookup() {
        let dir = TempDir::new().unwrap();
        let mut c = open_write(&dir);
        c.create_group("/A/B").unwrap();

        assert_eq!(c.group("/A/B/").unwrap().name(), "B");
        assert!(matches!(
            c.group("/nope"),
            Err(ContainerError::GroupNotFound(_))
        ));
        assert!(matches!(
            c.group_mut("/nope"),
            Err(ContainerError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_read_in_write_mode_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut c = open_write(&dir);
        let arr = NdArray::from_vec(vec![2], &[1u8, 2]).unwrap();
        let handle = c.create_array("/g", "a", &arr).unwrap();

        let err = handle.read(&c).unwrap_err();
        assert!(matches!(err, ContainerError::WrongMode { mode: "w", .. }));
    }

    #[test]
    fn test_closed_session() {
        let dir = TempDir::new().unwrap();
        let mut c = open_write(&dir);
        c.close().unwrap();
        c.close().unwrap();

        assert!(c.is_closed());
        assert!(matches!(c.create_group("/A"), Err(ContainerError::Closed)));
        assert!(matches!(c.root(), Err(ContainerError::Closed)));
        assert!(matches!(c.len(), Err(ContainerError::Closed)));
        assert!(matches!(c.flush(), Err(ContainerError::Closed)));
        assert!(matches!(
            c.create_array("/A", "a", &NdArray::from_vec(vec![1], &[1u8]).unwrap()),
            Err(ContainerError::Closed)
        ));
    }

    #[test]
    fn test_write_mode_removes_stale_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.hbin");
        std::fs::write(&path, "{}").unwrap();

        let c = Container::open(&path, "w").unwrap();
        assert!(!path.exists());
        drop(c);
        assert!(path.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_flush_publishes_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("full.hbin");
        let mut c = Container::open_with(
            &path,
            ContainerOptions {
                mode: Mode::Write,
                data_path: Some(PathBuf::from("/dev/full")),
                autoflush: false,
                ..ContainerOptions::default()
            },
        )
        .unwrap();
        c.create_array("/g", "a", &NdArray::from_vec(vec![4], &[1u32, 2, 3, 4]).unwrap())
            .unwrap();

        let err = c.flush().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(c.is_dirty());
        assert!(!path.exists());

        assert!(c.close().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_read_missing_container() {
        let dir = TempDir::new().unwrap();
        let err = Container::open(dir.path().join("absent.hbin"), "r").unwrap_err();
        assert!(matches!(err, ContainerError::ContainerNotFound { .. }));
    }
}
