// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "users/mod.rs"]
pub mod users;

#[path = "media/mod.rs"]
pub mod media;
