pub mod actions;
pub mod engine;
pub mod planner;
pub mod session;
pub mod types;

pub use actions::{CopyAction, DeleteAction, MutationAction, RenameAction, WriteMetadataAction};
pub use engine::ActionEngine;
pub use planner::Planner;
pub use session::SyncSession;
pub use types::{
    ActionKind, CapacityCheck, DiskProjection, EnginePhase, EngineProgress, EngineReport,
    PlaylistReport, RunOutcome, RunReport, SyncOptions,
};
