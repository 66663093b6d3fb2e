use super::archive_models::{ArchiveError, ChatLocation, Rotation};
use super::log_sink::LogSink;
use super::path_resolver::PathResolver;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One LogSink per (scope, subscope), each behind its own lock so busy
/// channels never wait on each other.
pub struct LogBook {
    resolver: Arc<PathResolver>,
    rotation: Rotation,
    sinks: DashMap<(String, String), Arc<Mutex<LogSink>>>,
}

impl LogBook {
    pub fn new(resolver: Arc<PathResolver>, rotation: Rotation) -> Self {
        Self {
            resolver,
            rotation,
            sinks: DashMap::new(),
        }
    }

    fn sink_for(&self, location: &ChatLocation) -> Arc<Mutex<LogSink>> {
        let key = (location.scope.clone(), location.subscope.clone());
        // Clone the Arc out so the DashMap shard lock is released before we await.
        self.sinks
            .entry(key)
            .or_insert_with(|| {
                Arc::new(Mutex::new(LogSink::new(
                    Arc::clone(&self.resolver),
                    self.rotation,
                )))
            })
            .clone()
    }

    pub async fn append(
        &self,
        location: &ChatLocation,
        now: NaiveDateTime,
        line: &str,
    ) -> Result<(), ArchiveError> {
        let sink = self.sink_for(location);
        let mut sink = sink.lock().await;
        sink.write(&location.scope, &location.subscope, now, line)
    }

    /// The file currently open for this channel, if it exists on disk.
    pub async fn current_file(&self, location: &ChatLocation) -> Option<PathBuf> {
        let key = (location.scope.clone(), location.subscope.clone());
        let sink = self.sinks.get(&key).map(|s| Arc::clone(s.value()))?;
        let sink = sink.lock().await;
        sink.destination()
            .map(|d| d.path.clone())
            .filter(|p| p.exists())
    }

    pub fn open_sinks(&self) -> usize {
        self.sinks.len()
    }

    /// Flush and close every sink. Used at shutdown.
    pub async fn close_all(&self) {
        let sinks: Vec<Arc<Mutex<LogSink>>> =
            self.sinks.iter().map(|e| Arc::clone(e.value())).collect();
        for sink in sinks {
            sink.lock().await.close();
        }
        tracing::info!(count = self.open_sinks(), "Closed all log sinks");
    }
}
