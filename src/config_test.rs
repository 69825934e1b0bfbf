use crate::config::*;
use std::path::Path;
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, content: &str) -> std::path::PathBuf {
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, content).unwrap();
    config_path
}

#[test]
fn test_config_minimal() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
        library_file = "~/Music/iTunes/iTunes Music Library.json"
        target_dir = "~/Desktop/playlists"
        "#,
    );

    let config = Config::parse(Some(&config_path)).unwrap();

    let home = dirs::home_dir().unwrap();
    assert_eq!(config.library_file, home.join("Music/iTunes/iTunes Music Library.json"));
    assert_eq!(config.library_root, home.join("Music/iTunes"));
    assert_eq!(config.target_dir, home.join("Desktop/playlists"));
    assert_eq!(config.max_hierarchy_depth, DEFAULT_MAX_HIERARCHY_DEPTH);
    assert!(config.max_proc >= 1);
    assert!(config.ignore_playlists.is_empty());
}

#[test]
fn test_config_full() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
        library_file = "/backup/iTunes Music Library.json"
        library_root = "/srv/music"
        target_dir = "/tmp/playlists"
        max_proc = 8
        max_hierarchy_depth = 5
        ignore_playlists = ["Voice Memos", "Audiobooks"]
        "#,
    );

    let config = Config::parse(Some(&config_path)).unwrap();

    assert_eq!(config.library_root, Path::new("/srv/music"));
    assert_eq!(config.target_dir, Path::new("/tmp/playlists"));
    assert_eq!(config.max_proc, 8);
    assert_eq!(config.max_hierarchy_depth, 5);
    assert_eq!(config.ignore_playlists, vec!["Voice Memos", "Audiobooks"]);
}

#[test]
fn test_config_not_found() {
    let result = Config::parse(Some(Path::new("/nonexistent/config.toml")));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_config_decode_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(&temp_dir, "library_file = [unclosed");
    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::Decode { .. })));
}

#[test]
fn test_config_missing_key_validation() {
    let temp_dir = TempDir::new().unwrap();

    let config_path = write_config(&temp_dir, r#"target_dir = "/tmp/playlists""#);
    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::MissingKey { key, .. }) if key == "library_file"));

    let config_path = write_config(&temp_dir, r#"library_file = "/backup/library.json""#);
    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::MissingKey { key, .. }) if key == "target_dir"));
}

#[test]
fn test_config_value_validation() {
    let temp_dir = TempDir::new().unwrap();

    for bad in ["max_proc = -1", "max_proc = 0", "max_proc = \"four\""] {
        let config_path = write_config(
            &temp_dir,
            &format!(
                r#"
                library_file = "/backup/library.json"
                target_dir = "/tmp/playlists"
                {bad}
                "#
            ),
        );
        let result = Config::parse(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "max_proc"), "{bad}");
    }

    let config_path = write_config(
        &temp_dir,
        r#"
        library_file = "/backup/library.json"
        target_dir = "/tmp/playlists"
        ignore_playlists = ["ok", 3]
        "#,
    );
    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "ignore_playlists"));

    let config_path = write_config(
        &temp_dir,
        r#"
        library_file = 12
        target_dir = "/tmp/playlists"
        "#,
    );
    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "library_file"));
}

#[test]
fn test_config_unrecognized_keys() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        &temp_dir,
        r#"
        library_file = "/backup/library.json"
        target_dir = "/tmp/playlists"
        unknown_field = "value"
        "#,
    );

    let result = Config::parse(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::UnrecognizedKeys { keys, .. }) if keys == vec!["unknown_field".to_string()]));
}

#[test]
fn test_config_new_defaults() {
    let config = Config::new("/backup/iTunes/Library.json", "/tmp/out");
    assert_eq!(config.library_root, Path::new("/backup/iTunes"));
    assert_eq!(config.max_hierarchy_depth, DEFAULT_MAX_HIERARCHY_DEPTH);

    let config = config.with_library_root("/srv/music");
    assert_eq!(config.library_root, Path::new("/srv/music"));
}

#[test]
fn test_config_new_expands_home() {
    let home = dirs::home_dir().unwrap();
    let config = Config::new("~/Music/iTunes/Library.json", "~/Desktop/playlists");
    assert_eq!(config.library_file, home.join("Music/iTunes/Library.json"));
    assert_eq!(config.library_root, home.join("Music/iTunes"));
    assert_eq!(config.target_dir, home.join("Desktop/playlists"));

    let config = config.with_library_root("~/Media");
    assert_eq!(config.library_root, home.join("Media"));
}
