//! Container engine: record codec, group tree, snapshot and session

pub mod array;
pub mod attr;
pub mod container;
pub mod dtype;
pub mod error;
pub mod group;
pub mod handle;
pub mod header;
pub mod io;
pub mod record;
pub mod snapshot;
pub mod validation;

pub use container::{Container, ContainerOptions, GroupMut, Mode};
pub use error::{ContainerError, ErrorKind, Result};
