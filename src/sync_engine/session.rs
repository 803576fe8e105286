use std::collections::HashMap;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{Result, SyncError};
use crate::paths::escape_filename;
use crate::sink::Sink;
use crate::sync_engine::engine::ActionEngine;
use crate::sync_engine::planner::Planner;
use crate::sync_engine::types::{
    CapacityCheck, EngineProgress, PlaylistReport, RunOutcome, RunReport,
};

/// One sync run: plan every requested playlist into a shared queue, then
/// check capacity and apply the queue.
pub struct SyncSession<'c, C: Catalog> {
    catalog: &'c C,
    sink: Sink,
    engine: ActionEngine,
    reports: Vec<PlaylistReport>,
    /// Sink directory name to the playlist planned into it.
    claimed: HashMap<String, String>,
}

impl<'c, C: Catalog> SyncSession<'c, C> {
    pub fn new(catalog: &'c C, sink: Sink) -> Self {
        let engine = ActionEngine::new(sink.options().clone());
        Self {
            catalog,
            sink,
            engine,
            reports: Vec::new(),
            claimed: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    pub fn reports(&self) -> &[PlaylistReport] {
        &self.reports
    }

    /// Plan the named playlists in order.
    ///
    /// Every name is resolved against the catalog before any sink directory
    /// is created, so a missing playlist leaves the target untouched. A name
    /// given twice is planned once. Two playlists whose names escape to the
    /// same directory are rejected.
    pub fn plan<S: AsRef<str>>(&mut self, playlists: &[S]) -> Result<&[PlaylistReport]> {
        info!("Reading catalog and checking sink state...");
        let catalog = self.catalog;
        let mut claimed = self.claimed.clone();
        let mut resolved = Vec::new();
        for name in playlists {
            let name = name.as_ref();
            let playlist = catalog
                .playlist(name)
                .ok_or_else(|| SyncError::not_found("Playlist", name))?;
            let dir = escape_filename(&playlist.name);
            match claimed.get(&dir) {
                Some(owner) if *owner == playlist.name => {
                    warn!("Playlist {name:?} requested more than once, syncing it once");
                }
                Some(owner) => {
                    return Err(SyncError::DirectoryClash {
                        dir,
                        first: owner.clone(),
                        second: playlist.name.clone(),
                    });
                }
                None => {
                    claimed.insert(dir, playlist.name.clone());
                    resolved.push(playlist);
                }
            }
        }
        self.claimed = claimed;

        for playlist in resolved {
            let dir = self.sink.open_dir(&playlist.name, true)?;
            let mut planner = Planner::new(playlist, dir);
            let report = planner.plan(&mut self.engine)?;
            self.reports.push(report);
        }
        Ok(&self.reports)
    }

    /// Check capacity and apply everything planned so far.
    pub fn execute(mut self, progress: impl FnMut(EngineProgress)) -> Result<RunReport> {
        info!("Checking operation...");
        let projection = match self.engine.check_capacity(self.sink.path())? {
            CapacityCheck::NothingToDo => {
                return Ok(RunReport {
                    playlists: self.reports,
                    projection: None,
                    outcome: RunOutcome::UpToDate,
                });
            }
            CapacityCheck::Proceed(projection) => projection,
        };

        let report = self.engine.run(progress)?;
        let outcome = if report.dry_run {
            RunOutcome::DryRun(report)
        } else {
            info!("Done.");
            RunOutcome::Applied(report)
        };
        Ok(RunReport {
            playlists: self.reports,
            projection: Some(projection),
            outcome,
        })
    }
}
