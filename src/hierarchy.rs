//! Rebuild the playlist folder tree from flat parent references.
//!
//! Playlists live in an arena keyed by pid and point at their parent by pid only. Each leaf
//! playlist (one nobody names as parent) yields exactly one [`HierarchyPath`], found by walking
//! parent links upward from the leaf.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::sanitize_dirname;
use crate::config::{Config, DEFAULT_MAX_HIERARCHY_DEPTH};
use crate::error::{RecoverExpectedError, Result};
use crate::library::Playlist;

/// Display name of the implicit playlist holding the whole library.
pub const RESERVED_LIBRARY_NAME: &str = "Library";

/// Root-to-leaf sequence of pids. Every element but the last has children; the last has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchyPath(Vec<String>);

impl HierarchyPath {
    pub fn pids(&self) -> &[String] {
        &self.0
    }

    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn root(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyOptions {
    pub max_depth: usize,
    /// Names excluded on top of [`RESERVED_LIBRARY_NAME`].
    pub ignored_names: Vec<String>,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        HierarchyOptions {
            max_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
            ignored_names: Vec::new(),
        }
    }
}

impl HierarchyOptions {
    pub fn from_config(c: &Config) -> Self {
        HierarchyOptions {
            max_depth: c.max_hierarchy_depth,
            ignored_names: c.ignore_playlists.clone(),
        }
    }

    fn excludes(&self, playlist: &Playlist) -> bool {
        playlist.is_system() || playlist.name == RESERVED_LIBRARY_NAME || self.ignored_names.contains(&playlist.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistHierarchy {
    playlists: HashMap<String, Playlist>,
    paths: Vec<HierarchyPath>,
}

impl PlaylistHierarchy {
    pub fn build(playlists: &[Playlist]) -> Result<PlaylistHierarchy> {
        Self::build_with(playlists, &HierarchyOptions::default())
    }

    pub fn build_with(playlists: &[Playlist], options: &HierarchyOptions) -> Result<PlaylistHierarchy> {
        let mut arena: HashMap<String, Playlist> = HashMap::new();
        let mut parents: HashMap<String, String> = HashMap::new();

        for playlist in playlists {
            if options.excludes(playlist) {
                debug!("Skipping system playlist {} ({})", playlist.name, playlist.pid);
                continue;
            }
            if let Some(parent_pid) = &playlist.parent_pid {
                parents.insert(playlist.pid.clone(), parent_pid.clone());
            }
            arena.insert(playlist.pid.clone(), playlist.clone());
        }

        // A parent that was filtered out (or never existed) cannot name a directory.
        parents.retain(|child, parent| {
            if arena.contains_key(parent) {
                return true;
            }
            warn!(
                "Playlist {} refers to unknown parent {}, treating it as top-level",
                arena.get(child).map(|p| p.name.as_str()).unwrap_or(child.as_str()),
                parent
            );
            false
        });

        let has_children: HashSet<&String> = parents.values().collect();
        let mut leaves: Vec<&String> = arena.keys().filter(|pid| !has_children.contains(pid)).collect();
        leaves.sort();

        let mut paths = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            paths.push(walk_to_root(leaf, &parents, options.max_depth)?);
        }

        // Anything still unvisited is only reachable through a closed loop of parents.
        let visited: HashSet<&str> = paths.iter().flat_map(|p| p.pids().iter().map(String::as_str)).collect();
        let mut stranded: Vec<String> = arena.keys().filter(|pid| !visited.contains(pid.as_str())).cloned().collect();
        if !stranded.is_empty() {
            stranded.sort();
            return Err(RecoverExpectedError::HierarchyCycle { pids: stranded }.into());
        }

        paths.sort();
        debug!("Built {} playlist paths from {} playlists", paths.len(), arena.len());
        Ok(PlaylistHierarchy { playlists: arena, paths })
    }

    pub fn paths(&self) -> &[HierarchyPath] {
        &self.paths
    }

    pub fn playlist(&self, pid: &str) -> Option<&Playlist> {
        self.playlists.get(pid)
    }

    pub fn playlists(&self) -> &HashMap<String, Playlist> {
        &self.playlists
    }

    /// The playlist whose tracks end up in the path's directory.
    pub fn leaf_playlist(&self, path: &HierarchyPath) -> Option<&Playlist> {
        self.playlists.get(path.leaf())
    }

    pub fn names<'a>(&'a self, path: &'a HierarchyPath) -> Vec<&'a str> {
        path.pids()
            .iter()
            .map(|pid| self.playlists.get(pid).map(|p| p.name.as_str()).unwrap_or(pid.as_str()))
            .collect()
    }

    /// `target_root` joined with the display name of every playlist along `path`.
    pub fn destination(&self, path: &HierarchyPath, target_root: &Path) -> PathBuf {
        let mut destination = target_root.to_path_buf();
        for name in self.names(path) {
            destination.push(sanitize_dirname(name));
        }
        destination
    }
}

fn walk_to_root(leaf: &str, parents: &HashMap<String, String>, max_depth: usize) -> Result<HierarchyPath> {
    let mut pids = vec![leaf.to_string()];
    let mut seen: HashSet<&str> = HashSet::from([leaf]);
    let mut pid = leaf;

    while let Some(parent) = parents.get(pid) {
        if !seen.insert(parent.as_str()) {
            pids.push(parent.clone());
            pids.reverse();
            return Err(RecoverExpectedError::HierarchyCycle { pids }.into());
        }
        pids.push(parent.clone());
        if pids.len() > max_depth {
            return Err(RecoverExpectedError::HierarchyTooDeep {
                pid: leaf.to_string(),
                max_depth,
            }
            .into());
        }
        pid = parent.as_str();
    }

    pids.reverse();
    Ok(HierarchyPath(pids))
}

#[cfg(test)]
impl HierarchyPath {
    pub(crate) fn from_pids(pids: &[&str]) -> Self {
        HierarchyPath(pids.iter().map(|p| p.to_string()).collect())
    }
}
