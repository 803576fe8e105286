//! Sink metadata store.
//!
//! Every playlist owns one directory under the sink root. Its `meta.json`
//! records, per track identity, the file name that was last written and the
//! catalog modification time at that point. The file is only ever replaced by
//! writing `meta.temp.json` and renaming it over the canonical name.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::sync_engine::types::SyncOptions;

pub const META_JSON_FILENAME: &str = "meta.json";
pub const META_JSON_TEMP_FILENAME: &str = "meta.temp.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub origin_persistent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    pub filename: String,
    pub modified_time: DateTime<Utc>,
}

/// Root directory of the materialized tree.
#[derive(Debug, Clone)]
pub struct Sink {
    path: PathBuf,
    options: SyncOptions,
}

impl Sink {
    pub fn new(path: impl Into<PathBuf>, options: SyncOptions) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(SyncError::not_found(
                "Sink directory",
                path.display().to_string(),
            ));
        }
        Ok(Self { path, options })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Open the store for one playlist directory.
    pub fn open_dir(&self, name: &str, create_if_absent: bool) -> Result<SinkDir> {
        let dir_path = self.path.join(crate::paths::escape_filename(name));
        if !dir_path.exists() {
            if !create_if_absent {
                return Err(SyncError::not_found(
                    "Sink directory",
                    dir_path.display().to_string(),
                ));
            }
            return self.create_dir(dir_path);
        }
        SinkDir::load(dir_path)
    }

    fn create_dir(&self, dir_path: PathBuf) -> Result<SinkDir> {
        if self.options.dry_run {
            info!("DRYRUN: Creating new sink dir: {}", dir_path.display());
        } else {
            info!("Creating new sink dir: {}", dir_path.display());
            fs::create_dir_all(&dir_path).map_err(|e| SyncError::io(&dir_path, e))?;
        }
        Ok(SinkDir::empty(dir_path))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedSinkDir {
    #[serde(default)]
    tracks: BTreeMap<String, TrackMeta>,
    #[serde(default)]
    origin_playlist_id: String,
    #[serde(default)]
    origin_playlist_name: String,
}

/// The metadata store of a single playlist directory.
#[derive(Debug, Clone)]
pub struct SinkDir {
    path: PathBuf,
    tracks: BTreeMap<String, TrackMeta>,
    origin_playlist_id: String,
    origin_playlist_name: String,
    checked: HashSet<String>,
}

impl SinkDir {
    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            tracks: BTreeMap::new(),
            origin_playlist_id: String::new(),
            origin_playlist_name: String::new(),
            checked: HashSet::new(),
        }
    }

    fn load(path: PathBuf) -> Result<Self> {
        let meta_path = path.join(META_JSON_FILENAME);
        let data = match fs::read(&meta_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Directory created by a run that never committed its metadata.
                debug!("No {} in {}, starting empty", META_JSON_FILENAME, path.display());
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(SyncError::io(&meta_path, e)),
        };
        let persisted: PersistedSinkDir =
            serde_json::from_slice(&data).map_err(|e| SyncError::CorruptState {
                path: meta_path.clone(),
                message: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for (id, meta) in &persisted.tracks {
            if meta.origin_persistent_id != *id {
                return Err(SyncError::CorruptState {
                    path: meta_path,
                    message: format!("entry {id} is recorded as {}", meta.origin_persistent_id),
                });
            }
            if !seen.insert(meta.filename.as_str()) {
                return Err(SyncError::CorruptState {
                    path: meta_path,
                    message: format!("file name {} is used by more than one track", meta.filename),
                });
            }
        }

        Ok(Self {
            path,
            tracks: persisted.tracks,
            origin_playlist_id: persisted.origin_playlist_id,
            origin_playlist_name: persisted.origin_playlist_name,
            checked: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_JSON_FILENAME)
    }

    pub fn meta_temp_path(&self) -> PathBuf {
        self.path.join(META_JSON_TEMP_FILENAME)
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    pub fn entry(&self, identity: &str) -> Option<&TrackMeta> {
        self.tracks.get(identity)
    }

    pub fn tracks(&self) -> &BTreeMap<String, TrackMeta> {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn origin_playlist_id(&self) -> &str {
        &self.origin_playlist_id
    }

    pub fn origin_playlist_name(&self) -> &str {
        &self.origin_playlist_name
    }

    pub fn set_origin(&mut self, playlist_id: &str, playlist_name: &str) {
        self.origin_playlist_id = playlist_id.to_string();
        self.origin_playlist_name = playlist_name.to_string();
    }

    pub fn begin_run(&mut self) {
        self.checked.clear();
    }

    pub fn mark_checked(&mut self, identity: &str) {
        self.checked.insert(identity.to_string());
    }

    pub fn is_checked(&self, identity: &str) -> bool {
        self.checked.contains(identity)
    }

    /// Entries not matched during this run, ordered by file name.
    pub fn unmatched_entries(&self) -> Vec<TrackMeta> {
        let mut stale: Vec<TrackMeta> = self
            .tracks
            .values()
            .filter(|meta| !self.checked.contains(&meta.origin_persistent_id))
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.filename.cmp(&b.filename));
        stale
    }

    pub fn replace_all(&mut self, tracks: BTreeMap<String, TrackMeta>) {
        self.tracks = tracks;
    }

    /// Serialize the current state for a later two-step write.
    pub fn snapshot(&self) -> Result<MetadataSnapshot> {
        let persisted = PersistedSinkDir {
            tracks: self.tracks.clone(),
            origin_playlist_id: self.origin_playlist_id.clone(),
            origin_playlist_name: self.origin_playlist_name.clone(),
        };
        let data = serde_json::to_vec_pretty(&persisted).map_err(|e| {
            SyncError::io(self.meta_path(), std::io::Error::new(ErrorKind::InvalidData, e))
        })?;
        Ok(MetadataSnapshot {
            data,
            target_path: self.meta_path(),
            temp_path: self.meta_temp_path(),
        })
    }

    /// Write `meta.json` atomically.
    pub fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        snapshot.write_temp()?;
        snapshot.commit()
    }
}

/// Serialized metadata waiting to be swapped in.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    data: Vec<u8>,
    target_path: PathBuf,
    temp_path: PathBuf,
}

impl MetadataSnapshot {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn write_temp(&self) -> Result<()> {
        let mut file = File::create(&self.temp_path).map_err(|e| SyncError::io(&self.temp_path, e))?;
        file.write_all(&self.data)
            .map_err(|e| SyncError::io(&self.temp_path, e))?;
        file.sync_all().map_err(|e| SyncError::io(&self.temp_path, e))
    }

    pub fn commit(&self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target_path)
            .map_err(|e| SyncError::io(&self.target_path, e))
    }
}
