//! Mirror music-catalog playlists into a target directory.
//!
//! A run opens one [`sink::SinkDir`] per playlist, lets a
//! [`sync_engine::Planner`] diff it against the catalog into a shared
//! [`sync_engine::ActionEngine`] queue, checks the target volume has room,
//! and applies the queue in a perform sweep followed by a finish sweep.

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod sink;
pub mod sync_engine;
pub mod system_integration;

pub use error::{Result, SyncError};
