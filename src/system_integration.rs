use std::path::Path;

use nix::unistd::AccessFlags;

use crate::error::{Result, SyncError};

/// Capacity of the volume holding a path, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    /// Space available to unprivileged writers.
    pub free: u64,
}

impl DiskUsage {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

/// Query total and free space of the volume holding `path` via statvfs.
pub fn disk_usage(path: &Path) -> Result<DiskUsage> {
    let stat = nix::sys::statvfs::statvfs(path)
        .map_err(|errno| SyncError::io(path, std::io::Error::from(errno)))?;
    let unit = stat.fragment_size() as u64;
    Ok(DiskUsage {
        total: stat.blocks() as u64 * unit,
        free: stat.blocks_available() as u64 * unit,
    })
}

/// Whether the current process may modify the file at `path`.
///
/// A missing file is reported as not writable.
pub fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, AccessFlags::W_OK).is_ok()
}
