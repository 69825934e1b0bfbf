use std::fs;
use std::path::Path;
use std::sync::Once;

use serde_json::{json, Value};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init() -> TempDir {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
    TempDir::new().expect("failed to create temp dir")
}

/// A location as the export stores it: a percent-encoded URI under some old `.../iTunes/` folder.
pub fn itunes_location(relative: &str) -> String {
    let encoded: Vec<String> = relative.split('/').map(|s| urlencoding::encode(s).into_owned()).collect();
    format!("file:///Volumes/Old%20Disk/Users/someone/Music/iTunes/{}", encoded.join("/"))
}

pub fn track(id: i64, relative: &str) -> Value {
    json!({
        "Track ID": id,
        "Name": relative.rsplit('/').next().unwrap_or(relative),
        "Location": itunes_location(relative),
    })
}

pub fn playlist(pid: &str, name: &str, parent: Option<&str>, track_ids: &[i64]) -> Value {
    let mut record = json!({
        "Playlist Persistent ID": pid,
        "Name": name,
        "Playlist Items": track_ids.iter().map(|id| json!({ "Track ID": id })).collect::<Vec<_>>(),
    });
    if let Some(parent) = parent {
        record["Parent Persistent ID"] = json!(parent);
    }
    record
}

/// Tracks keyed by their string id, the way the export stores them.
pub fn document(tracks: Vec<Value>, playlists: Vec<Value>) -> Value {
    let mut by_id = serde_json::Map::new();
    for t in tracks {
        by_id.insert(t["Track ID"].to_string(), t);
    }
    json!({ "Tracks": by_id, "Playlists": playlists })
}

pub fn touch(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("failed to create parent dir");
    fs::write(path, contents).expect("failed to write file");
}
