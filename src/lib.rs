pub mod common;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod library;
pub mod materialize;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use common::{initialize_logging, normalize_filename, LogOutput};
pub use config::{Config, ConfigError};
pub use error::{RecoverError, RecoverExpectedError, Result};
pub use hierarchy::{HierarchyOptions, HierarchyPath, PlaylistHierarchy};
pub use library::{Library, Playlist, Track, TrackId};
pub use materialize::{copy_playlists, FailureReason, MaterializeReport, Materializer, PlaylistReport, TrackFailure};
pub use resolver::{Resolution, TrackResolver};

#[cfg(test)]
mod config_test;
