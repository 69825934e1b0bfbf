//! Write every playlist path out as a directory of copied media files.
//!
//! Paths are independent, so they are fanned out over a fixed-size rayon pool. Within a path the
//! leaf playlist's tracks are copied one after another, in playlist order. A track that cannot be
//! found or copied is logged and recorded in the report; it never stops the run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{RecoverError, Result};
use crate::hierarchy::{HierarchyOptions, HierarchyPath, PlaylistHierarchy};
use crate::library::{Library, TrackId};
use crate::resolver::{Resolution, TrackResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The playlist references a track id the library does not contain.
    NotFound,
    /// The track record carries no location.
    MissingLocation,
    /// Neither the stored location nor the fallback search produced a file.
    Unresolved(PathBuf),
    Copy { path: PathBuf, message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "track does not exist"),
            FailureReason::MissingLocation => write!(f, "track has no location"),
            FailureReason::Unresolved(path) => write!(f, "can't find {}", path.display()),
            FailureReason::Copy { path, message } => write!(f, "can't copy {}: {}", path.display(), message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFailure {
    pub track_id: TrackId,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistReport {
    pub pid: String,
    pub name: String,
    pub destination: PathBuf,
    /// Files written into `destination`, in playlist order.
    pub copied: Vec<PathBuf>,
    pub failures: Vec<TrackFailure>,
    /// Set when `destination` could not be created; no track was attempted.
    pub dir_error: Option<String>,
}

impl PlaylistReport {
    pub fn is_clean(&self) -> bool {
        self.dir_error.is_none() && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub playlists: Vec<PlaylistReport>,
}

impl MaterializeReport {
    /// True when every directory was created and every track copied. Callers use this for the
    /// process exit status.
    pub fn is_clean(&self) -> bool {
        self.playlists.iter().all(PlaylistReport::is_clean)
    }

    pub fn copied_count(&self) -> usize {
        self.playlists.iter().map(|p| p.copied.len()).sum()
    }

    /// Failed tracks plus playlists whose directory could not be created.
    pub fn failure_count(&self) -> usize {
        self.playlists
            .iter()
            .map(|p| p.failures.len() + usize::from(p.dir_error.is_some()))
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PlaylistReport, &TrackFailure)> + '_ {
        self.playlists.iter().flat_map(|p| p.failures.iter().map(move |f| (p, f)))
    }
}

pub struct Materializer<'a> {
    library: &'a Library,
    hierarchy: &'a PlaylistHierarchy,
    resolver: TrackResolver,
    max_proc: usize,
}

impl<'a> Materializer<'a> {
    pub fn new(library: &'a Library, hierarchy: &'a PlaylistHierarchy, resolver: TrackResolver) -> Self {
        Materializer {
            library,
            hierarchy,
            resolver,
            max_proc: num_cpus::get().max(1),
        }
    }

    pub fn with_max_proc(mut self, max_proc: usize) -> Self {
        self.max_proc = max_proc.max(1);
        self
    }

    pub fn materialize(&self, target_root: &Path) -> Result<MaterializeReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_proc)
            .thread_name(|i| format!("materialize-{i}"))
            .build()
            .map_err(|e| RecoverError::Generic(format!("Failed to start worker pool: {e}")))?;
        debug!(
            "Materializing {} playlist paths into {} with {} workers",
            self.hierarchy.paths().len(),
            target_root.display(),
            self.max_proc
        );

        let playlists = pool.install(|| {
            self.hierarchy
                .paths()
                .par_iter()
                .map(|path| self.materialize_path(path, target_root))
                .collect::<Vec<_>>()
        });
        Ok(MaterializeReport { playlists })
    }

    /// Create the directory for one path and copy its leaf playlist's tracks into it.
    pub fn materialize_path(&self, path: &HierarchyPath, target_root: &Path) -> PlaylistReport {
        let destination = self.hierarchy.destination(path, target_root);
        let mut report = PlaylistReport {
            pid: path.leaf().to_string(),
            name: String::new(),
            destination: destination.clone(),
            copied: Vec::new(),
            failures: Vec::new(),
            dir_error: None,
        };
        let Some(playlist) = self.hierarchy.leaf_playlist(path) else {
            report.dir_error = Some(format!("playlist {} is not part of the hierarchy", path.leaf()));
            return report;
        };
        report.name = playlist.name.clone();

        // create_dir_all treats a directory that already exists (or that a sibling worker just
        // created) as success.
        if let Err(e) = fs::create_dir_all(&destination) {
            warn!("Can't create {} for playlist {}: {}", destination.display(), playlist.name, e);
            report.dir_error = Some(e.to_string());
            return report;
        }

        for track_id in &playlist.track_ids {
            match self.copy_track(track_id, &destination) {
                Ok(copied) => report.copied.push(copied),
                Err(reason) => {
                    warn!(
                        "Can't copy track {} for playlist {} into {}: {}",
                        track_id,
                        playlist.name,
                        destination.display(),
                        reason
                    );
                    report.failures.push(TrackFailure {
                        track_id: track_id.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            "Copied {}/{} tracks for playlist {}",
            report.copied.len(),
            playlist.track_ids.len(),
            playlist.name
        );
        report
    }

    fn copy_track(&self, track_id: &TrackId, destination: &Path) -> std::result::Result<PathBuf, FailureReason> {
        let track = self.library.track_by_id(track_id).map_err(|_| FailureReason::NotFound)?;
        let source = match self.resolver.resolve(track).map_err(|_| FailureReason::MissingLocation)? {
            Resolution::Unresolved(path) => return Err(FailureReason::Unresolved(path)),
            resolved => resolved.into_path(),
        };
        let Some(file_name) = source.file_name() else {
            return Err(FailureReason::Unresolved(source.clone()));
        };
        let target = destination.join(file_name);
        fs::copy(&source, &target).map_err(|e| FailureReason::Copy {
            path: source.clone(),
            message: e.to_string(),
        })?;
        Ok(target)
    }
}

/// Load the configured library, rebuild its playlist tree and copy everything into
/// `target_dir`. Only a missing/malformed document or a broken hierarchy is an `Err`; per-track
/// problems are in the report.
pub fn copy_playlists(c: &Config) -> Result<MaterializeReport> {
    let library = Library::load(&c.library_file)?;
    let hierarchy = PlaylistHierarchy::build_with(library.all_playlists(), &HierarchyOptions::from_config(c))?;
    let resolver = TrackResolver::new(c.library_root.clone());

    let report = Materializer::new(&library, &hierarchy, resolver)
        .with_max_proc(c.max_proc)
        .materialize(&c.target_dir)?;

    if report.is_clean() {
        info!("Copied {} tracks into {}", report.copied_count(), c.target_dir.display());
    } else {
        warn!(
            "Copied {} tracks into {}; {} could not be copied",
            report.copied_count(),
            c.target_dir.display(),
            report.failure_count()
        );
    }
    Ok(report)
}
