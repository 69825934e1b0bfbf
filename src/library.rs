//! Read access to an exported music library document.
//!
//! The document is the generic tree a plist/XML decoder produces, rendered as JSON: a `Tracks`
//! collection and a `Playlists` sequence. Track identifiers show up as integers in some records
//! and as strings in others, so everything is normalized to [`TrackId`] here and the rest of the
//! crate never looks at the raw representation.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::common::expand_home_path;
use crate::error::{RecoverError, RecoverExpectedError, Result};

const TRACKS_KEY: &str = "Tracks";
const PLAYLISTS_KEY: &str = "Playlists";
const TRACK_ID_KEY: &str = "Track ID";
const LOCATION_KEY: &str = "Location";
const NAME_KEY: &str = "Name";
const PERSISTENT_ID_KEY: &str = "Playlist Persistent ID";
const PARENT_PERSISTENT_ID_KEY: &str = "Parent Persistent ID";
const DISTINGUISHED_KIND_KEY: &str = "Distinguished Kind";
const MASTER_KEY: &str = "Master";
const PLAYLIST_ITEMS_KEY: &str = "Playlist Items";

/// Canonical track identifier. `42` and `"42"` are the same track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize an identifier taken straight from the document. Only strings and integers are
    /// identifiers; anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<TrackId> {
        match value {
            Value::String(s) => Some(TrackId::from(s.as_str())),
            Value::Number(n) => n
                .as_i64()
                .map(TrackId::from)
                .or_else(|| n.as_u64().map(TrackId::from)),
            _ => None,
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        TrackId(s.trim().to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        TrackId::from(s.as_str())
    }
}

impl From<&TrackId> for TrackId {
    fn from(id: &TrackId) -> Self {
        id.clone()
    }
}

impl From<i64> for TrackId {
    fn from(n: i64) -> Self {
        TrackId(n.to_string())
    }
}

impl From<u64> for TrackId {
    fn from(n: u64) -> Self {
        TrackId(n.to_string())
    }
}

impl From<i32> for TrackId {
    fn from(n: i32) -> Self {
        TrackId(n.to_string())
    }
}

impl From<u32> for TrackId {
    fn from(n: u32) -> Self {
        TrackId(n.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// The stored location reference, usually a percent-encoded `file://` URI. Streamed entries
    /// have none.
    pub location: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub pid: String,
    pub name: String,
    pub parent_pid: Option<String>,
    pub track_ids: Vec<TrackId>,
    /// Set for smart/special playlists the application generates itself.
    pub distinguished: bool,
    /// Set for the implicit playlist holding the whole library.
    pub master: bool,
}

impl Playlist {
    pub fn is_system(&self) -> bool {
        self.distinguished || self.master
    }
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    tracks: HashMap<TrackId, Track>,
    playlists: Vec<Playlist>,
}

impl Library {
    /// Read a JSON rendering of the library export from disk. `~` is expanded.
    pub fn load(path: &Path) -> Result<Library> {
        let path = expand_home_path(path.to_path_buf());
        if !path.is_file() {
            warn!("Can't find library file {}", path.display());
            return Err(RecoverExpectedError::FileNotFound { path }.into());
        }
        let reader = BufReader::new(File::open(&path)?);
        let document: Value = serde_json::from_reader(reader)?;
        let library = Library::from_document(document)?;
        info!("Successfully loaded {}", path.display());
        Ok(library)
    }

    pub fn from_document(document: Value) -> Result<Library> {
        let Value::Object(mut root) = document else {
            return Err(RecoverExpectedError::malformed("document root must be a mapping").into());
        };

        let tracks = match root.remove(TRACKS_KEY) {
            None | Some(Value::Null) => HashMap::new(),
            Some(Value::Object(records)) => {
                let mut tracks = HashMap::with_capacity(records.len());
                for (key, record) in records {
                    let track = parse_track(Some(&key), &record)?;
                    tracks.insert(track.id.clone(), track);
                }
                tracks
            }
            Some(Value::Array(records)) => {
                let mut tracks = HashMap::with_capacity(records.len());
                for record in &records {
                    let track = parse_track(None, record)?;
                    tracks.insert(track.id.clone(), track);
                }
                tracks
            }
            Some(_) => {
                return Err(RecoverExpectedError::malformed(format!("{TRACKS_KEY} must be a mapping or a sequence")).into())
            }
        };

        let playlists = match root.remove(PLAYLISTS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(records)) => records.iter().map(parse_playlist).collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(RecoverExpectedError::malformed(format!("{PLAYLISTS_KEY} must be a sequence")).into()),
        };

        debug!("Read {} tracks and {} playlists", tracks.len(), playlists.len());
        Ok(Library { tracks, playlists })
    }

    /// Look up a track by identifier. Integer and string identifiers are interchangeable.
    pub fn track_by_id(&self, id: impl Into<TrackId>) -> Result<&Track> {
        let id = id.into();
        self.tracks.get(&id).ok_or_else(|| {
            RecoverError::from(RecoverExpectedError::TrackNotFound {
                id: id.as_str().to_string(),
            })
        })
    }

    /// Every playlist record in document order, system playlists included.
    pub fn all_playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

fn parse_track(key: Option<&str>, record: &Value) -> Result<Track> {
    let record = as_mapping(record, TRACKS_KEY)?;
    let id = match record.get(TRACK_ID_KEY) {
        Some(value) => TrackId::from_value(value)
            .ok_or_else(|| RecoverExpectedError::malformed(format!("invalid {TRACK_ID_KEY}: {value}")))?,
        None => match key {
            Some(key) => TrackId::from(key),
            None => return Err(RecoverExpectedError::malformed(format!("track record without {TRACK_ID_KEY}")).into()),
        },
    };
    let location = optional_string(record, LOCATION_KEY, &id)?;
    let name = optional_string(record, NAME_KEY, &id)?.unwrap_or_default();
    Ok(Track { id, location, name })
}

fn parse_playlist(record: &Value) -> Result<Playlist> {
    let record = as_mapping(record, PLAYLISTS_KEY)?;
    let pid = match record.get(PERSISTENT_ID_KEY) {
        Some(Value::String(s)) => s.clone(),
        _ => {
            return Err(RecoverExpectedError::malformed(format!("playlist record without a string {PERSISTENT_ID_KEY}")).into())
        }
    };
    let name = optional_string(record, NAME_KEY, &pid)?.unwrap_or_else(|| pid.clone());
    let parent_pid = optional_string(record, PARENT_PERSISTENT_ID_KEY, &pid)?;
    let distinguished = record.contains_key(DISTINGUISHED_KIND_KEY);
    let master = matches!(record.get(MASTER_KEY), Some(Value::Bool(true)));

    let mut track_ids = Vec::new();
    match record.get(PLAYLIST_ITEMS_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                match item.get(TRACK_ID_KEY).and_then(TrackId::from_value) {
                    Some(id) => track_ids.push(id),
                    None => warn!("Skipping unreadable item {} in playlist {}", item, name),
                }
            }
        }
        Some(_) => {
            return Err(RecoverExpectedError::malformed(format!("{PLAYLIST_ITEMS_KEY} of playlist {pid} must be a sequence")).into())
        }
    }

    Ok(Playlist {
        pid,
        name,
        parent_pid,
        track_ids,
        distinguished,
        master,
    })
}

fn as_mapping<'a>(record: &'a Value, collection: &str) -> Result<&'a Map<String, Value>> {
    record
        .as_object()
        .ok_or_else(|| RecoverExpectedError::malformed(format!("every entry of {collection} must be a mapping")).into())
}

fn optional_string(record: &Map<String, Value>, key: &str, owner: &dyn fmt::Display) -> Result<Option<String>> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RecoverExpectedError::malformed(format!("{key} of {owner} must be a string: got {other}")).into()),
    }
}
