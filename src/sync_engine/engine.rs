use std::path::Path;

use tracing::{debug, error, info};

use crate::error::{Result, SyncError};
use crate::sync_engine::actions::MutationAction;
use crate::sync_engine::types::{
    CapacityCheck, DiskProjection, EnginePhase, EngineProgress, EngineReport, SyncOptions,
};
use crate::system_integration::{disk_usage, DiskUsage};

const MIB: u64 = 1024 * 1024;

/// Owns the action queue of one run and applies it in two sweeps.
///
/// Every queued action is performed before any of them is finished, so a
/// failure during the perform sweep leaves nothing visible in the target.
#[derive(Debug)]
pub struct ActionEngine {
    actions: Vec<Box<dyn MutationAction>>,
    options: SyncOptions,
    phase: EnginePhase,
}

impl ActionEngine {
    pub fn new(options: SyncOptions) -> Self {
        Self {
            actions: Vec::new(),
            options,
            phase: EnginePhase::Idle,
        }
    }

    pub fn push(&mut self, action: Box<dyn MutationAction>) {
        debug!("queued: {}", action.describe());
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Box<dyn MutationAction>] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn net_size_delta(&self) -> i64 {
        self.actions.iter().map(|a| a.net_size_delta()).sum()
    }

    pub fn transfer_cost(&self) -> u64 {
        self.actions.iter().map(|a| a.transfer_cost()).sum()
    }

    /// Pre-flight check against the volume holding `target`.
    pub fn check_capacity(&self, target: &Path) -> Result<CapacityCheck> {
        if self.actions.is_empty() {
            info!("No actions: nothing to do");
            return Ok(CapacityCheck::NothingToDo);
        }
        let usage = disk_usage(target)?;
        self.check_capacity_with(target, usage)
    }

    pub fn check_capacity_with(&self, target: &Path, usage: DiskUsage) -> Result<CapacityCheck> {
        if self.actions.is_empty() {
            info!("No actions: nothing to do");
            return Ok(CapacityCheck::NothingToDo);
        }
        let projection = DiskProjection {
            usage,
            net_delta: self.net_size_delta(),
        };
        let percent = |bytes: i64| {
            if usage.total == 0 {
                0
            } else {
                (bytes as i128 * 100 / usage.total as i128) as i64
            }
        };
        info!(
            "Disk {}: free {}MB ({}%), will consume {}MB ({}%)",
            target.display(),
            usage.free / MIB,
            percent(usage.free as i64),
            projection.net_delta / MIB as i64,
            percent(projection.net_delta)
        );
        if !projection.fits() {
            return Err(SyncError::InsufficientCapacity {
                path: target.to_path_buf(),
                required: projection.net_delta,
                available: usage.free,
            });
        }
        Ok(CapacityCheck::Proceed(projection))
    }

    /// Apply the queue: `perform` on every action, then `finish` on every action.
    ///
    /// The first error aborts the run. In dry-run mode the actions are only
    /// described.
    pub fn run(&mut self, mut progress: impl FnMut(EngineProgress)) -> Result<EngineReport> {
        let total_bytes = self.transfer_cost();

        if self.options.dry_run {
            for action in &self.actions {
                info!("DRYRUN: {}", action.describe());
            }
            self.phase = EnginePhase::Done;
            return Ok(EngineReport {
                actions: self.actions.len(),
                bytes_transferred: 0,
                dry_run: true,
            });
        }

        self.phase = EnginePhase::Performing;
        let mut processed_bytes = 0u64;
        for action in self.actions.iter_mut() {
            debug!("{}", action.describe());
            progress(EngineProgress {
                phase: EnginePhase::Performing,
                processed_bytes,
                total_bytes,
                current: Some(action.describe()),
            });
            if let Err(e) = action.perform() {
                error!("Error: {e}");
                self.phase = EnginePhase::Failed;
                return Err(e);
            }
            processed_bytes += action.transfer_cost();
        }

        info!("Finishing sync...");
        self.phase = EnginePhase::Finishing;
        progress(EngineProgress {
            phase: EnginePhase::Finishing,
            processed_bytes,
            total_bytes,
            current: None,
        });
        for action in self.actions.iter_mut() {
            debug!("finish: {}", action.describe());
            if let Err(e) = action.finish() {
                error!("Error: {e}");
                self.phase = EnginePhase::Failed;
                return Err(e);
            }
        }

        self.phase = EnginePhase::Done;
        progress(EngineProgress {
            phase: EnginePhase::Done,
            processed_bytes,
            total_bytes,
            current: None,
        });
        Ok(EngineReport {
            actions: self.actions.len(),
            bytes_transferred: processed_bytes,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_engine::actions::{CopyAction, DeleteAction, RenameAction};
    use crate::sync_engine::types::ActionKind;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records the order in which the engine calls into it.
    #[derive(Debug)]
    struct Probe {
        name: &'static str,
        target: PathBuf,
        log: Arc<Mutex<Vec<String>>>,
        fail_perform: bool,
        fail_finish: bool,
        delta: i64,
    }

    impl Probe {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                target: PathBuf::from(name),
                log: Arc::clone(log),
                fail_perform: false,
                fail_finish: false,
                delta: 0,
            }
        }
    }

    impl MutationAction for Probe {
        fn kind(&self) -> ActionKind {
            ActionKind::Rename
        }

        fn target(&self) -> &Path {
            &self.target
        }

        fn perform(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("perform {}", self.name));
            if self.fail_perform {
                return Err(SyncError::io(&self.target, std::io::Error::other("boom")));
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("finish {}", self.name));
            if self.fail_finish {
                return Err(SyncError::io(&self.target, std::io::Error::other("boom")));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            format!("PROBE  {}", self.name)
        }

        fn net_size_delta(&self) -> i64 {
            self.delta
        }

        fn transfer_cost(&self) -> u64 {
            self.delta.max(0) as u64
        }
    }

    fn usage(total: u64, free: u64) -> DiskUsage {
        DiskUsage { total, free }
    }

    #[test]
    fn test_empty_queue_is_nothing_to_do() {
        let engine = ActionEngine::new(SyncOptions::default());
        let check = engine.check_capacity_with(Path::new("/sink"), usage(0, 0)).unwrap();
        assert_eq!(check, CapacityCheck::NothingToDo);
    }

    #[test]
    fn test_capacity_gate_rejects_oversized_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        let mut big = Probe::new("big", &log);
        big.delta = 1_001;
        engine.push(Box::new(big));

        let result = engine.check_capacity_with(Path::new("/sink"), usage(10_000, 1_000));
        assert!(matches!(
            result,
            Err(SyncError::InsufficientCapacity {
                required: 1_001,
                available: 1_000,
                ..
            })
        ));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(engine.phase(), EnginePhase::Idle);
    }

    #[test]
    fn test_capacity_gate_accepts_exact_fit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        let mut exact = Probe::new("exact", &log);
        exact.delta = 1_000;
        engine.push(Box::new(exact));

        let check = engine
            .check_capacity_with(Path::new("/sink"), usage(10_000, 1_000))
            .unwrap();
        match check {
            CapacityCheck::Proceed(projection) => {
                assert_eq!(projection.net_delta, 1_000);
                assert_eq!(projection.projected_used(), 10_000);
                assert!(projection.fits());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_capacity_gate_credits_deletions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        let mut freed = Probe::new("delete", &log);
        freed.delta = -500;
        let mut added = Probe::new("copy", &log);
        added.delta = 1_400;
        engine.push(Box::new(freed));
        engine.push(Box::new(added));

        let check = engine
            .check_capacity_with(Path::new("/sink"), usage(10_000, 1_000))
            .unwrap();
        match check {
            CapacityCheck::Proceed(projection) => {
                assert_eq!(projection.net_delta, 900);
                assert_eq!(projection.projected_used(), 9_900);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_check_capacity_on_real_volume() {
        let temp = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        engine.push(Box::new(Probe::new("tiny", &log)));
        let check = engine.check_capacity(temp.path()).unwrap();
        assert!(matches!(check, CapacityCheck::Proceed(_)));
    }

    #[test]
    fn test_all_performs_run_before_any_finish() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        engine.push(Box::new(Probe::new("a", &log)));
        engine.push(Box::new(Probe::new("b", &log)));

        let report = engine.run(|_| {}).unwrap();
        assert_eq!(report.actions, 2);
        assert_eq!(engine.phase(), EnginePhase::Done);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["perform a", "perform b", "finish a", "finish b"]
        );
    }

    #[test]
    fn test_perform_failure_skips_finish_sweep() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        engine.push(Box::new(Probe::new("a", &log)));
        let mut bad = Probe::new("b", &log);
        bad.fail_perform = true;
        engine.push(Box::new(bad));
        engine.push(Box::new(Probe::new("c", &log)));

        assert!(engine.run(|_| {}).is_err());
        assert_eq!(engine.phase(), EnginePhase::Failed);
        assert_eq!(*log.lock().unwrap(), vec!["perform a", "perform b"]);
    }

    #[test]
    fn test_finish_failure_stops_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = ActionEngine::new(SyncOptions::default());
        engine.push(Box::new(Probe::new("a", &log)));
        let mut bad = Probe::new("b", &log);
        bad.fail_finish = true;
        engine.push(Box::new(bad));
        engine.push(Box::new(Probe::new("c", &log)));

        assert!(engine.run(|_| {}).is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["perform a", "perform b", "perform c", "finish a", "finish b"]
        );
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("src.mp3");
        let old = temp.path().join("01 Old.mp3");
        fs::write(&from, b"abc").unwrap();
        fs::write(&old, b"old").unwrap();

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let mut engine = ActionEngine::new(options);
        engine.push(Box::new(DeleteAction::new(&old).unwrap()));
        engine.push(Box::new(
            CopyAction::new(&from, &temp.path().join("01 New.mp3"), "ID", true).unwrap(),
        ));
        engine.push(Box::new(RenameAction::new(&old, &temp.path().join("02 Old.mp3"))));

        let report = engine.run(|_| panic!("no progress in dry run")).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.actions, 3);
        assert!(old.exists());
        assert!(!temp.path().join("01 New.mp3").exists());
        assert!(!temp.path().join("ID.tmp").exists());
    }

    #[test]
    fn test_progress_reports_transfer_cost() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("src.mp3");
        fs::write(&from, vec![1u8; 300]).unwrap();

        let mut engine = ActionEngine::new(SyncOptions::default());
        engine.push(Box::new(
            CopyAction::new(&from, &temp.path().join("01 A.mp3"), "ID", false).unwrap(),
        ));
        assert_eq!(engine.transfer_cost(), 300);

        let mut seen = Vec::new();
        let report = engine.run(|p| seen.push((p.phase, p.processed_bytes, p.total_bytes))).unwrap();
        assert_eq!(report.bytes_transferred, 300);
        assert_eq!(seen.first(), Some(&(EnginePhase::Performing, 0, 300)));
        assert_eq!(seen.last(), Some(&(EnginePhase::Done, 300, 300)));
    }
}
