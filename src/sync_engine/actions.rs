//! Two-phase filesystem mutations.
//!
//! `perform` does the bulk work and may be repeated after an interruption;
//! `finish` is a single rename or remove that makes the change visible.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SyncError};
use crate::paths::escape_filename;
use crate::sink::MetadataSnapshot;
use crate::sync_engine::types::ActionKind;

const KIB: usize = 1024;

pub trait MutationAction: fmt::Debug {
    fn kind(&self) -> ActionKind;

    /// Path that is created, replaced or removed by `finish`.
    fn target(&self) -> &Path;

    fn perform(&mut self) -> Result<()>;

    fn finish(&mut self) -> Result<()>;

    fn describe(&self) -> String;

    /// Bytes added to (positive) or freed from (negative) the target volume.
    fn net_size_delta(&self) -> i64;

    /// Bytes that go through the progress meter.
    fn transfer_cost(&self) -> u64;
}

/// Copy a source file into the sink through a resumable temp file.
#[derive(Debug)]
pub struct CopyAction {
    from: PathBuf,
    to: PathBuf,
    temp_path: PathBuf,
    size: u64,
    preserve_times: bool,
}

impl CopyAction {
    /// Fails right away when the source cannot be read.
    pub fn new(from: &Path, to: &Path, identity: &str, preserve_times: bool) -> Result<Self> {
        let meta = fs::metadata(from).map_err(|e| SyncError::io(from, e))?;
        if !meta.is_file() {
            return Err(SyncError::io(
                from,
                io::Error::new(ErrorKind::InvalidInput, "source is not a regular file"),
            ));
        }
        let temp_name = format!("{}.tmp", escape_filename(identity));
        let temp_path = to
            .parent()
            .map(|dir| dir.join(&temp_name))
            .unwrap_or_else(|| PathBuf::from(&temp_name));
        Ok(Self {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            temp_path,
            size: meta.len(),
            preserve_times,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    fn transfer(&self) -> Result<()> {
        let source = File::open(&self.from).map_err(|e| SyncError::io(&self.from, e))?;
        let mut reader = BufReader::new(source);
        let mut temp = File::create(&self.temp_path).map_err(|e| SyncError::io(&self.temp_path, e))?;
        io::copy(&mut reader, &mut temp).map_err(|e| SyncError::io(&self.temp_path, e))?;
        temp.sync_all().map_err(|e| SyncError::io(&self.temp_path, e))?;
        drop(temp);

        if self.preserve_times {
            let meta = fs::metadata(&self.from).map_err(|e| SyncError::io(&self.from, e))?;
            let mtime = filetime::FileTime::from_last_modification_time(&meta);
            filetime::set_file_mtime(&self.temp_path, mtime)
                .map_err(|e| SyncError::io(&self.temp_path, e))?;
        }
        Ok(())
    }
}

impl MutationAction for CopyAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Copy
    }

    fn target(&self) -> &Path {
        &self.to
    }

    fn perform(&mut self) -> Result<()> {
        match fs::metadata(&self.temp_path) {
            Ok(meta) if meta.len() == self.size => {
                debug!(
                    "Skipping: {} (temp: {}, size match)",
                    self.to.display(),
                    self.temp_path.display()
                );
                Ok(())
            }
            Ok(_) => {
                debug!(
                    "Overwrite: broken file {} (temp: {})",
                    self.to.display(),
                    self.temp_path.display()
                );
                self.transfer()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => self.transfer(),
            Err(e) => Err(SyncError::io(&self.temp_path, e)),
        }
    }

    fn finish(&mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.to).map_err(|e| SyncError::io(&self.to, e))
    }

    fn describe(&self) -> String {
        format!("COPY   {} --> {}", self.from.display(), self.to.display())
    }

    fn net_size_delta(&self) -> i64 {
        self.size as i64
    }

    fn transfer_cost(&self) -> u64 {
        self.size
    }
}

#[derive(Debug)]
pub struct RenameAction {
    from: PathBuf,
    to: PathBuf,
}

impl RenameAction {
    pub fn new(from: &Path, to: &Path) -> Self {
        Self {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
    }
}

impl MutationAction for RenameAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Rename
    }

    fn target(&self) -> &Path {
        &self.to
    }

    fn perform(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        fs::rename(&self.from, &self.to).map_err(|e| SyncError::io(&self.from, e))
    }

    fn describe(&self) -> String {
        format!("RENAME {} --> {}", self.from.display(), self.to.display())
    }

    fn net_size_delta(&self) -> i64 {
        0
    }

    fn transfer_cost(&self) -> u64 {
        0
    }
}

#[derive(Debug)]
pub struct DeleteAction {
    target: PathBuf,
    size: u64,
}

impl DeleteAction {
    /// Captures the size now so the capacity check can credit it.
    pub fn new(target: &Path) -> Result<Self> {
        let meta = fs::metadata(target).map_err(|e| SyncError::io(target, e))?;
        Ok(Self {
            target: target.to_path_buf(),
            size: meta.len(),
        })
    }
}

impl MutationAction for DeleteAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Delete
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn perform(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        fs::remove_file(&self.target).map_err(|e| SyncError::io(&self.target, e))
    }

    fn describe(&self) -> String {
        format!("DELETE {}", self.target.display())
    }

    fn net_size_delta(&self) -> i64 {
        -(self.size as i64)
    }

    fn transfer_cost(&self) -> u64 {
        0
    }
}

#[derive(Debug)]
pub struct WriteMetadataAction {
    snapshot: MetadataSnapshot,
}

impl WriteMetadataAction {
    pub fn new(snapshot: MetadataSnapshot) -> Self {
        Self { snapshot }
    }
}

impl MutationAction for WriteMetadataAction {
    fn kind(&self) -> ActionKind {
        ActionKind::WriteMetadata
    }

    fn target(&self) -> &Path {
        self.snapshot.target_path()
    }

    fn perform(&mut self) -> Result<()> {
        self.snapshot.write_temp()
    }

    fn finish(&mut self) -> Result<()> {
        self.snapshot.commit()
    }

    fn describe(&self) -> String {
        format!(
            "WRITE  {} ({} KiB)",
            self.snapshot.target_path().display(),
            self.snapshot.len() / KIB
        )
    }

    fn net_size_delta(&self) -> i64 {
        self.snapshot.len() as i64
    }

    fn transfer_cost(&self) -> u64 {
        self.snapshot.len() as u64
    }
}
