//! User configuration (`~/.config/tracksink.yaml`).
//!
//! ```yaml
//! playlists:
//!   - Commute
//!   - Running
//! library: /Users/me/Music/iTunes/iTunes Music Library.xml
//! target: /Volumes/WALKMAN/MUSIC
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const CONFIG_FILENAME: &str = "tracksink.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playlists: Vec<String>,
    #[serde(default)]
    pub library: Option<PathBuf>,
    #[serde(default)]
    pub target: Option<PathBuf>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join(CONFIG_FILENAME))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::not_found("Config", path.display().to_string()));
            }
            Err(e) => return Err(SyncError::io(path, e)),
        };
        Self::from_yaml(&text, path)
    }

    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SyncError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Where iTunes keeps its library export by default.
pub fn default_library_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join("Music")
            .join("iTunes")
            .join("iTunes Music Library.xml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = "playlists:\n  - Commute\n  - Running\nlibrary: /lib.xml\ntarget: /Volumes/W/MUSIC\n";
        let config = Config::from_yaml(yaml, Path::new("c.yaml")).unwrap();
        assert_eq!(config.playlists, vec!["Commute", "Running"]);
        assert_eq!(config.library, Some(PathBuf::from("/lib.xml")));
        assert_eq!(config.target, Some(PathBuf::from("/Volumes/W/MUSIC")));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_yaml("playlists: [Mix]\n", Path::new("c.yaml")).unwrap();
        assert_eq!(config.playlists, vec!["Mix"]);
        assert_eq!(config.library, None);
        assert_eq!(config.target, None);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::from_yaml("playlists: {broken", Path::new("c.yaml"));
        assert!(matches!(result, Err(SyncError::Config { .. })));
    }

    #[test]
    fn test_load_missing_config() {
        let temp = tempfile::tempdir().unwrap();
        let result = Config::load(&temp.path().join(CONFIG_FILENAME));
        assert!(matches!(result, Err(SyncError::NotFound { .. })));
    }

    #[test]
    fn test_load_config_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "playlists:\n  - Mix\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().playlists, vec!["Mix"]);
    }
}
