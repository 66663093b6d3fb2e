// A LogSink owns at most one open log file.
//
// Rotation is path-identity based: every write re-derives the expected file
// path and, if it differs from the open one, the old handle is flushed and
// closed before the new file is opened in append mode. Restarting mid-bucket
// therefore reopens the same file instead of truncating it.

use super::archive_models::{ArchiveError, LogDestination, RootKind, Rotation};
use super::path_resolver::PathResolver;
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub enum SinkState {
    Closed,
    Open {
        destination: LogDestination,
        file: File,
    },
}

pub struct LogSink {
    resolver: Arc<PathResolver>,
    rotation: Rotation,
    state: SinkState,
}

impl LogSink {
    pub fn new(resolver: Arc<PathResolver>, rotation: Rotation) -> Self {
        Self {
            resolver,
            rotation,
            state: SinkState::Closed,
        }
    }

    pub fn destination(&self) -> Option<&LogDestination> {
        match &self.state {
            SinkState::Open { destination, .. } => Some(destination),
            SinkState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SinkState::Open { .. })
    }

    /// Make sure the open file is the one `now` belongs to, rotating if needed.
    pub fn ensure_destination(
        &mut self,
        scope: &str,
        subscope: &str,
        now: NaiveDateTime,
    ) -> Result<&LogDestination, ArchiveError> {
        let dir = self
            .resolver
            .directory_for(RootKind::Logs, scope, subscope, now);
        let path = dir.join(format!("{}.log", self.rotation.bucket_name(now)));

        let current = self.destination().map(|d| d.path.as_path());
        if current != Some(path.as_path()) {
            self.close();

            self.resolver.resolve(RootKind::Logs, scope, subscope, now)?;
            let file = open_append(&path)?;
            tracing::debug!(path = %path.display(), "Opened log destination");

            self.state = SinkState::Open {
                destination: LogDestination {
                    scope: scope.to_string(),
                    subscope: subscope.to_string(),
                    path,
                },
                file,
            };
        }

        self.destination().ok_or_else(|| ArchiveError::WriteFailure {
            path: dir,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "log sink is closed"),
        })
    }

    /// Write one line to the open file and flush it straight away.
    pub fn append(&mut self, line: &str) -> Result<(), ArchiveError> {
        match &mut self.state {
            SinkState::Open { destination, file } => {
                let result = file
                    .write_all(line.as_bytes())
                    .and_then(|_| file.write_all(b"\n"))
                    .and_then(|_| file.flush());

                result.map_err(|source| ArchiveError::WriteFailure {
                    path: destination.path.clone(),
                    source,
                })
            }
            SinkState::Closed => Err(ArchiveError::WriteFailure {
                path: self.resolver.roots().logs.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "log sink is closed"),
            }),
        }
    }

    /// Rotate if needed and append. A failed append gets one retry after the
    /// handle is dropped and the destination re-resolved.
    pub fn write(
        &mut self,
        scope: &str,
        subscope: &str,
        now: NaiveDateTime,
        line: &str,
    ) -> Result<(), ArchiveError> {
        self.ensure_destination(scope, subscope, now)?;

        match self.append(line) {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!("Log append failed, retrying once: {}", first);
                self.close();
                self.ensure_destination(scope, subscope, now)?;
                self.append(line)
            }
        }
    }

    /// Flush and drop the current handle, if any.
    pub fn close(&mut self) {
        if let SinkState::Open {
            destination,
            mut file,
        } = std::mem::replace(&mut self.state, SinkState::Closed)
        {
            if let Err(e) = file.flush() {
                tracing::warn!(
                    path = %destination.path.display(),
                    "Failed to flush log file on close: {}",
                    e
                );
            }
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_append(path: &Path) -> Result<File, ArchiveError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ArchiveError::StorageUnavailable {
            path: path.to_path_buf(),
            source,
        })
}
