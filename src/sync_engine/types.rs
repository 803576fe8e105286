use serde::{Deserialize, Serialize};

use crate::system_integration::DiskUsage;

/// Run-wide switches, threaded into the sink and the engine at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Stamp the source modification time on copied files.
    pub preserve_times: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            preserve_times: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionKind {
    Copy,
    Rename,
    Delete,
    WriteMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Performing,
    Finishing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineProgress {
    pub phase: EnginePhase,
    pub processed_bytes: u64,
    pub total_bytes: u64,
    pub current: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineReport {
    pub actions: usize,
    pub bytes_transferred: u64,
    pub dry_run: bool,
}

/// Expected state of the target volume once the queue is applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskProjection {
    pub usage: DiskUsage,
    pub net_delta: i64,
}

impl DiskProjection {
    pub fn projected_used(&self) -> i128 {
        self.usage.used() as i128 + self.net_delta as i128
    }

    pub fn fits(&self) -> bool {
        self.projected_used() <= self.usage.total as i128
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CapacityCheck {
    NothingToDo,
    Proceed(DiskProjection),
}

/// Planning outcome for one playlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistReport {
    pub name: String,
    pub total: usize,
    /// Tracks whose source file is not available locally.
    pub skipped: usize,
    pub unchanged: usize,
    pub copying: usize,
    pub renaming: usize,
    pub deleting: usize,
    /// Stale or replaced files that could not be removed.
    pub left_in_place: usize,
    pub metadata_updated: bool,
}

impl PlaylistReport {
    pub fn syncing(&self) -> usize {
        self.copying + self.renaming
    }

    pub fn is_noop(&self) -> bool {
        self.syncing() == 0 && self.deleting == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunOutcome {
    UpToDate,
    DryRun(EngineReport),
    Applied(EngineReport),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub playlists: Vec<PlaylistReport>,
    pub projection: Option<DiskProjection>,
    pub outcome: RunOutcome,
}
