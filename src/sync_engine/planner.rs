//! Reconciliation of one playlist against its sink directory.
//!
//! Mark and sweep: every stored entry matched by a catalog track is marked
//! during the diff, whatever is left unmarked afterwards is stale.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::catalog::{Playlist, Track};
use crate::error::Result;
use crate::paths::ordered_file_name;
use crate::sink::{SinkDir, TrackMeta};
use crate::sync_engine::actions::{
    CopyAction, DeleteAction, MutationAction, RenameAction, WriteMetadataAction,
};
use crate::sync_engine::engine::ActionEngine;
use crate::sync_engine::types::PlaylistReport;
use crate::system_integration::is_writable;

/// A copy or rename that has been decided but not yet turned into an action.
#[derive(Debug)]
enum Transfer<'t> {
    Copy {
        track: &'t Track,
        source: PathBuf,
        to: PathBuf,
    },
    Rename {
        track: &'t Track,
        source: PathBuf,
        from: PathBuf,
        to: PathBuf,
    },
}

impl Transfer<'_> {
    fn to(&self) -> &PathBuf {
        match self {
            Transfer::Copy { to, .. } | Transfer::Rename { to, .. } => to,
        }
    }

    fn vacates(&self) -> Option<&PathBuf> {
        match self {
            Transfer::Copy { .. } => None,
            Transfer::Rename { from, .. } => Some(from),
        }
    }

    /// Re-copy from the catalog instead of moving the stored file.
    fn into_copy(self) -> Self {
        match self {
            Transfer::Rename {
                track, source, to, ..
            } => Transfer::Copy { track, source, to },
            copy => copy,
        }
    }
}

pub struct Planner<'a> {
    playlist: &'a Playlist,
    dir: SinkDir,
}

impl<'a> Planner<'a> {
    pub fn new(playlist: &'a Playlist, dir: SinkDir) -> Self {
        Self { playlist, dir }
    }

    /// Diff the playlist against the store and queue the resulting actions.
    ///
    /// Queue order for this playlist: deletions, then copies and renames,
    /// then the metadata write. Nothing is queued, and the store is left as
    /// loaded, when the playlist is already in sync.
    pub fn plan(&mut self, engine: &mut ActionEngine) -> Result<PlaylistReport> {
        let playlist = self.playlist;
        let tracks = &playlist.tracks;
        let preserve_times = engine.options().preserve_times;
        let mut report = PlaylistReport {
            name: playlist.name.clone(),
            total: tracks.len(),
            ..PlaylistReport::default()
        };

        info!("Planning playlist '{}' ({} tracks)", playlist.name, tracks.len());
        self.dir.begin_run();

        let mut deletes: Vec<Box<dyn MutationAction>> = Vec::new();
        let mut transfers: Vec<Transfer<'a>> = Vec::new();
        let mut desired: BTreeMap<String, TrackMeta> = BTreeMap::new();
        let mut retained: Vec<TrackMeta> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for (index, track) in tracks.iter().enumerate() {
            if !seen.insert(track.identity.as_str()) {
                warn!("-- SKIP  : {} (listed more than once)", track.display_name);
                report.skipped += 1;
                continue;
            }
            let Some(source) = track.location.clone() else {
                debug!("-- SKIP  : {} (not available locally)", track.display_name);
                report.skipped += 1;
                if let Some(meta) = self.dir.entry(&track.identity) {
                    retained.push(meta.clone());
                }
                continue;
            };

            let file_name = ordered_file_name(index, tracks.len(), &track.display_name, &source);
            let to = self.dir.file_path(&file_name);

            match self.dir.entry(&track.identity).cloned() {
                None => {
                    info!("-- COPY  : {}", track.display_name);
                    transfers.push(Transfer::Copy { track, source, to });
                }
                Some(meta) => {
                    let prev = self.dir.file_path(&meta.filename);
                    if meta.modified_time < track.last_modified {
                        if is_writable(&prev) {
                            info!(
                                "-- UPDATE: {} ({} -> {})",
                                track.display_name, meta.filename, file_name
                            );
                            deletes.push(Box::new(DeleteAction::new(&prev)?));
                        } else {
                            warn!(
                                "-- UPDATE: {} (could not delete old file {})",
                                track.display_name, meta.filename
                            );
                            report.left_in_place += 1;
                        }
                        transfers.push(Transfer::Copy { track, source, to });
                    } else if prev == to {
                        debug!("-- NOP   : {}", track.display_name);
                        report.unchanged += 1;
                    } else if is_writable(&prev) {
                        info!(
                            "-- RENAME: {} ({} -> {})",
                            track.display_name, meta.filename, file_name
                        );
                        transfers.push(Transfer::Rename {
                            track,
                            source,
                            from: prev,
                            to,
                        });
                    } else {
                        info!(
                            "-- COPY**: {} (unable to find previous file: {})",
                            track.display_name, meta.filename
                        );
                        transfers.push(Transfer::Copy { track, source, to });
                    }
                    self.dir.mark_checked(&track.identity);
                }
            }

            desired.insert(
                track.identity.clone(),
                TrackMeta {
                    origin_persistent_id: track.identity.clone(),
                    origin_id: track.catalog_id.clone(),
                    filename: file_name,
                    modified_time: track.last_modified,
                },
            );
        }

        let retained_ids: HashSet<String> = retained
            .iter()
            .map(|m| m.origin_persistent_id.clone())
            .collect();
        for meta in self.dir.unmatched_entries() {
            if retained_ids.contains(&meta.origin_persistent_id) {
                continue;
            }
            let path = self.dir.file_path(&meta.filename);
            if is_writable(&path) {
                info!("-- DELETE: {}", meta.filename);
                deletes.push(Box::new(DeleteAction::new(&path)?));
            } else {
                warn!(
                    "Trash failed: {} (ID: {})",
                    meta.filename, meta.origin_persistent_id
                );
                report.left_in_place += 1;
            }
        }

        let transfers = schedule(transfers);
        report.deleting = deletes.len();
        for transfer in &transfers {
            match transfer {
                Transfer::Copy { .. } => report.copying += 1,
                Transfer::Rename { .. } => report.renaming += 1,
            }
        }
        info!(
            "Playlist '{}': {} skipped, {} syncing, {} deleting",
            playlist.name,
            report.skipped,
            report.syncing(),
            report.deleting
        );
        if report.is_noop() {
            return Ok(report);
        }

        // Build every action before queueing any, so a vanished source
        // leaves the queue untouched.
        let mut actions = deletes;
        for transfer in transfers {
            let action: Box<dyn MutationAction> = match transfer {
                Transfer::Copy { track, source, to } => Box::new(CopyAction::new(
                    &source,
                    &to,
                    &track.identity,
                    preserve_times,
                )?),
                Transfer::Rename { from, to, .. } => Box::new(RenameAction::new(&from, &to)),
            };
            actions.push(action);
        }

        let claimed: HashSet<String> = desired.values().map(|m| m.filename.clone()).collect();
        for meta in retained {
            if claimed.contains(&meta.filename) {
                warn!(
                    "Dropping {} from metadata: its file name is now used by another track",
                    meta.filename
                );
                continue;
            }
            desired.insert(meta.origin_persistent_id.clone(), meta);
        }
        self.dir.replace_all(desired);
        self.dir.set_origin(&playlist.id, &playlist.name);
        actions.push(Box::new(WriteMetadataAction::new(self.dir.snapshot()?)));

        for action in actions {
            engine.push(action);
        }
        report.metadata_updated = true;
        Ok(report)
    }
}

/// Order transfers so a file is never overwritten before the rename that
/// moves it away has finished.
///
/// Catalog order is kept wherever possible. A rename cycle is broken by
/// re-copying one of its members from the catalog.
fn schedule(mut pending: Vec<Transfer<'_>>) -> Vec<Transfer<'_>> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let sources: HashSet<&PathBuf> = pending.iter().filter_map(|t| t.vacates()).collect();
        let ready = pending.iter().position(|t| {
            !sources.contains(t.to()) || t.vacates() == Some(t.to())
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                let Some(index) = pending.iter().position(|t| t.vacates().is_some()) else {
                    break;
                };
                let transfer = pending.remove(index);
                warn!(
                    "Rename cycle at {}: copying from catalog instead",
                    transfer.to().display()
                );
                pending.insert(index, transfer.into_copy());
            }
        }
    }
    ordered.extend(pending);
    ordered
}
