//! Validation for group paths and container file names
//!
//! Group paths are absolute and slash-delimited:
//!
//! - `/` is the root group
//! - `/A/B` names group `B` inside group `A`
//! - a single trailing slash is tolerated (`/A/` is `/A`)
//! - empty paths, relative paths and empty segments (`/A//B`) are rejected

use crate::error::{ContainerError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Pattern for valid absolute group paths
const GROUP_PATH_PATTERN: &str = r"^/([^/]+(/[^/]+)*/?)?$";

/// Extension of the binary data file when none is given
pub const DATA_EXTENSION: &str = "hdat";

/// Extension of the structural log file when none is given
pub const LOG_EXTENSION: &str = "hlog";

fn group_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(GROUP_PATH_PATTERN).expect("group path pattern is valid"))
}

/// Validate an absolute group path and split it into segments.
///
/// The root path yields no segments.
///
/// # Examples
///
/// ```
/// use binseek::validation::split_group_path;
///
/// assert_eq!(split_group_path("/A/B").unwrap(), vec!["A", "B"]);
/// assert!(split_group_path("/").unwrap().is_empty());
/// assert!(split_group_path("/A//B").is_err());
/// assert!(split_group_path("").is_err());
/// ```
pub fn split_group_path(path: &str) -> Result<Vec<&str>> {
    if !group_path_regex().is_match(path) {
        return Err(ContainerError::InvalidGroupPath(path.to_string()));
    }

    Ok(path.split('/').filter(|segment| !segment.is_empty()).collect())
}

/// Validate a single group name used relative to a parent group.
pub fn validate_group_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(ContainerError::InvalidGroupName(name.to_string()));
    }
    Ok(())
}

/// Join a parent path and a child name.
pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// The three files making up one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPaths {
    pub metadata: PathBuf,
    pub data: PathBuf,
    pub log: PathBuf,
}

impl ContainerPaths {
    /// Resolve the data and log paths, deriving missing ones from the
    /// metadata path by replacing its extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use binseek::validation::ContainerPaths;
    /// use std::path::Path;
    ///
    /// let paths = ContainerPaths::resolve("run/check.hbin", None, None).unwrap();
    /// assert_eq!(paths.data, Path::new("run/check.hdat"));
    /// assert_eq!(paths.log, Path::new("run/check.hlog"));
    ///
    /// // Colliding names are rejected before anything is opened
    /// assert!(ContainerPaths::resolve("a.hdat", None, None).is_err());
    /// ```
    pub fn resolve(
        metadata: impl AsRef<Path>,
        data: Option<&Path>,
        log: Option<&Path>,
    ) -> Result<Self> {
        let metadata = metadata.as_ref().to_path_buf();
        let data = data
            .map(Path::to_path_buf)
            .unwrap_or_else(|| metadata.with_extension(DATA_EXTENSION));
        let log = log
            .map(Path::to_path_buf)
            .unwrap_or_else(|| metadata.with_extension(LOG_EXTENSION));

        if data == metadata || log == metadata {
            return Err(ContainerError::FileCollision(metadata));
        }
        if data == log {
            return Err(ContainerError::FileCollision(data));
        }

        Ok(ContainerPaths {
            metadata,
            data,
            log,
        })
    }
}
