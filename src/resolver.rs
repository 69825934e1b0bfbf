//! Map a track's stored location onto a file that actually exists.
//!
//! Stored locations go stale: the library moves to another disk, or files get re-ripped with a
//! different track number prefix. The stored URI is first rebased onto the caller's library root.
//! When that path is missing, the surrounding directories are scanned for a file with the same
//! [`normalize_filename`] form.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::common::{file_name_string, normalize_filename};
use crate::error::{RecoverExpectedError, Result};
use crate::library::Track;

/// How many directories the fallback search climbs: the file's own directory, then its parent.
pub const FALLBACK_SEARCH_LEVELS: usize = 2;

// Everything up through the last segment literally named "iTunes".
static ITUNES_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^file://.*/iTunes/").unwrap());
static FILE_SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^file://(localhost)?").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The rebased stored location exists.
    Direct(PathBuf),
    /// The rebased location was missing; a file with the same normalized name was found nearby.
    Fallback(PathBuf),
    /// Nothing was found. Carries the rebased location, which does not exist.
    Unresolved(PathBuf),
}

impl Resolution {
    pub fn path(&self) -> &Path {
        match self {
            Resolution::Direct(p) | Resolution::Fallback(p) | Resolution::Unresolved(p) => p.as_path(),
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Resolution::Direct(p) | Resolution::Fallback(p) | Resolution::Unresolved(p) => p,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved(_))
    }
}

#[derive(Debug, Clone)]
pub struct TrackResolver {
    library_root: PathBuf,
}

impl TrackResolver {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        TrackResolver {
            library_root: library_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    pub fn resolve(&self, track: &Track) -> Result<Resolution> {
        let location = track.location.as_deref().ok_or_else(|| RecoverExpectedError::MissingLocation {
            id: track.id.to_string(),
        })?;
        Ok(self.resolve_location(location))
    }

    pub fn resolve_location(&self, location: &str) -> Resolution {
        let path = self.transform_location(location);
        if path.exists() {
            return Resolution::Direct(path);
        }
        match fallback_search(&path) {
            Some(found) => {
                debug!("Resolved missing {} to {}", path.display(), found.display());
                Resolution::Fallback(found)
            }
            None => Resolution::Unresolved(path),
        }
    }

    /// Percent-decode `location` and rebase its `.../iTunes/` prefix onto the library root. A
    /// location without such a segment only loses its `file://` scheme.
    pub fn transform_location(&self, location: &str) -> PathBuf {
        let decoded = percent_decode(location);
        if let Some(m) = ITUNES_PREFIX_REGEX.find(&decoded) {
            // The remainder must stay relative, or join would replace the root.
            return self.library_root.join(decoded[m.end()..].trim_start_matches('/'));
        }
        PathBuf::from(FILE_SCHEME_REGEX.replace(&decoded, "").as_ref())
    }
}

fn percent_decode(location: &str) -> Cow<'_, str> {
    match urlencoding::decode(location) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Owned(String::from_utf8_lossy(&urlencoding::decode_binary(location.as_bytes())).into_owned()),
    }
}

/// Look for a file whose normalized name matches `missing`'s, starting in its directory and
/// climbing at most [`FALLBACK_SEARCH_LEVELS`] levels. Each directory tree is scanned once.
pub fn fallback_search(missing: &Path) -> Option<PathBuf> {
    let target = normalize_filename(&file_name_string(missing)?);
    let mut dir = missing.parent().filter(|p| !p.as_os_str().is_empty())?.to_path_buf();
    let mut searched: Vec<PathBuf> = Vec::with_capacity(FALLBACK_SEARCH_LEVELS);

    for _ in 0..FALLBACK_SEARCH_LEVELS {
        if searched.contains(&dir) {
            break;
        }
        debug!("Searching {} for {}", dir.display(), target);
        if let Some(found) = search_tree(&dir, &target, &searched) {
            return Some(found);
        }
        searched.push(dir.clone());
        let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf) else {
            break;
        };
        dir = parent;
    }
    None
}

fn search_tree(dir: &Path, target: &str, skip: &[PathBuf]) -> Option<PathBuf> {
    candidate_files(dir, skip).find(|p| p.file_name().is_some_and(|n| normalize_filename(&n.to_string_lossy()) == target))
}

/// Files under `dir` in file-name order, not descending into any directory listed in `skip`.
pub(crate) fn candidate_files<'a>(dir: &Path, skip: &'a [PathBuf]) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !e.file_type().is_dir() || !skip.iter().any(|s| s == e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}
