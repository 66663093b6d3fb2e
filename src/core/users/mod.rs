// Core users module - observed member state and its history.

pub mod snapshot_sweep;
pub mod user_models;
pub mod user_state_store;

pub use snapshot_sweep::{run_sweep, spawn_snapshot_sweep, MemberSource};
pub use user_models::*;
pub use user_state_store::{LoadedRecord, UserRecordStore, UserStateStore};
