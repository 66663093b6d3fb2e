// Discord layer - event handlers and the serenity-backed transport.
//
// Everything here is glue: pull primitives out of serenity types, call the
// core, translate the result back. No archive rules live in this layer.

use crate::core::archive::{ArchiveClock, ArchiveService};
use crate::core::users::UserStateStore;
use crate::infra::media::HttpAttachmentFetcher;
use crate::infra::users::JsonUserRecordStore;
use std::sync::Arc;

#[path = "archive/mod.rs"]
pub mod archive;

pub mod transport;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Shared state handed to every event handler.
pub struct Data {
    pub archive: Arc<ArchiveService<HttpAttachmentFetcher>>,
    pub users: Arc<UserStateStore<JsonUserRecordStore>>,
    pub clock: ArchiveClock,
}
