// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "archive/mod.rs"]
pub mod archive;

#[path = "commands/mod.rs"]
pub mod commands;

#[path = "users/mod.rs"]
pub mod users;
