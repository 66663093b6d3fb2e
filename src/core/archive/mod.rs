// Core archive module - log rotation, path layout and media storage.
// Following the same pattern as the other core modules: no Discord types here.

pub mod archive_clock;
pub mod archive_models;
pub mod archive_service;
pub mod log_book;
pub mod log_sink;
pub mod media_archiver;
pub mod path_resolver;

pub use archive_clock::ArchiveClock;
pub use archive_models::*;
pub use archive_service::ArchiveService;
pub use log_book::LogBook;
pub use media_archiver::{AttachmentFetcher, MediaArchiver};
pub use path_resolver::{PathResolver, StorageRoots};
