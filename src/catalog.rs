//! Music catalog: the source of truth for playlist contents.
//!
//! The planner only sees [`Catalog`]. [`ItunesLibrary`] decodes the iTunes
//! "Music Library.xml" property list, [`MemoryCatalog`] is built in code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::paths::location_to_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Stable across renumbering and reordering inside the catalog.
    pub identity: String,
    /// Catalog-local numeric id, kept for diagnostics only.
    pub catalog_id: Option<String>,
    pub display_name: String,
    /// `None` when the file is not present locally.
    pub location: Option<PathBuf>,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
}

pub trait Catalog {
    fn playlists(&self) -> &[Playlist];

    fn playlist(&self, name: &str) -> Option<&Playlist> {
        self.playlists().iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    playlists: Vec<Playlist>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlist(mut self, playlist: Playlist) -> Self {
        self.insert(playlist);
        self
    }

    /// Adds a playlist, replacing any existing one with the same name.
    pub fn insert(&mut self, playlist: Playlist) {
        self.playlists.retain(|p| p.name != playlist.name);
        self.playlists.push(playlist);
    }
}

impl Catalog for MemoryCatalog {
    fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }
}

#[derive(Debug, Deserialize)]
struct RawLibrary {
    #[serde(rename = "Tracks", default)]
    tracks: HashMap<String, RawTrack>,
    #[serde(rename = "Playlists", default)]
    playlists: Vec<RawPlaylist>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(rename = "Track ID")]
    track_id: i64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "Date Modified", default)]
    date_modified: Option<plist::Date>,
    #[serde(rename = "Persistent ID")]
    persistent_id: String,
    #[serde(rename = "Location", default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Playlist Persistent ID", default)]
    persistent_id: String,
    #[serde(rename = "Playlist Items", default)]
    items: Vec<RawPlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistItem {
    #[serde(rename = "Track ID")]
    track_id: i64,
}

impl RawTrack {
    fn into_track(self) -> Track {
        let last_modified = self
            .date_modified
            .map(|d| DateTime::<Utc>::from(SystemTime::from(d)))
            .unwrap_or_else(|| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));
        Track {
            identity: self.persistent_id,
            catalog_id: Some(self.track_id.to_string()),
            display_name: self.name,
            location: self.location.as_deref().and_then(location_to_path),
            last_modified,
            size_bytes: self.size,
        }
    }
}

/// Catalog decoded from an iTunes library property list.
#[derive(Debug, Clone)]
pub struct ItunesLibrary {
    path: PathBuf,
    playlists: Vec<Playlist>,
}

impl ItunesLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::not_found("Library", path.display().to_string()));
        }
        let data = std::fs::read(path).map_err(|e| SyncError::io(path, e))?;
        Self::from_bytes(&data, path)
    }

    pub fn from_bytes(data: &[u8], origin: &Path) -> Result<Self> {
        let raw: RawLibrary = plist::from_bytes(data).map_err(|e| SyncError::Catalog {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let tracks: HashMap<i64, Track> = raw
            .tracks
            .into_values()
            .map(|t| (t.track_id, t.into_track()))
            .collect();

        // Playlist items that point at unknown tracks are dropped.
        let playlists = raw
            .playlists
            .into_iter()
            .map(|p| Playlist {
                id: p.persistent_id,
                name: p.name,
                tracks: p
                    .items
                    .iter()
                    .filter_map(|item| tracks.get(&item.track_id).cloned())
                    .collect(),
            })
            .collect();

        Ok(Self {
            path: origin.to_path_buf(),
            playlists,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Catalog for ItunesLibrary {
    fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }
}
