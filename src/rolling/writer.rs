use std::io;
use std::mem;
use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDateTime};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::directory::{DirectoryLister, FsLister};
use crate::config::Config;
use crate::error::WriteError;
use crate::matcher;
use crate::name;

/// The rotation engine: writes records sequentially into a directory of
/// files, rolling to a new file when the byte limit is reached or the
/// interval bucket expires.
///
/// Single owner, no internal locking: all calls go through `&mut self`.
/// Shared, callback-ordered access goes through
/// [`RollingFile`](crate::RollingFile) instead.
pub struct RollingWriter {
    dir: PathBuf,
    config: Config,
    lister: Box<dyn DirectoryLister>,
    clock: fn() -> NaiveDateTime,
    state: StreamState,
}

enum StreamState {
    /// No active file. The next write resolves a target name against the
    /// directory listing.
    Closed,
    Open(ActiveFile),
    /// Ended, or poisoned by a fatal resolution error. Permanent.
    Terminal,
}

struct ActiveFile {
    file: File,
    name: String,
    /// Record bytes written to this file; delimiters are not counted.
    written: u64,
    expires_at: Option<NaiveDateTime>,
}

fn default_clock() -> NaiveDateTime {
    Local::now().naive_local()
}

impl RollingWriter {
    /// Creates a writer over `dir`. No I/O happens until the first write.
    ///
    /// `dir` must already exist: a failing directory scan on first write
    /// makes the writer terminal.
    pub fn create(dir: impl Into<PathBuf>, config: Config) -> RollingWriter {
        Self::with_lister(dir, config, Box::new(FsLister))
    }

    pub fn with_lister(
        dir: impl Into<PathBuf>,
        config: Config,
        lister: Box<dyn DirectoryLister>,
    ) -> RollingWriter {
        RollingWriter {
            dir: dir.into(),
            config,
            lister,
            clock: default_clock,
            state: StreamState::Closed,
        }
    }

    /// Appends one record, rotating first if the record would overflow the
    /// current file or its interval bucket has expired.
    pub async fn write(&mut self, record: &str) -> Result<(), WriteError> {
        if matches!(self.state, StreamState::Terminal) {
            return Err(WriteError::Terminal);
        }
        let payload = self.config.encoding.encode(record);
        let payload_len = payload.len() as u64;
        // checked before any resolution: a record that can never fit must
        // not create or rotate a file
        if payload_len > self.config.byte_limit {
            return Err(WriteError::Overflow {
                len: payload_len,
                limit: self.config.byte_limit,
            });
        }
        let now = (self.clock)();
        if let StreamState::Open(active) = &self.state {
            let interval_expired = active.expires_at.is_some_and(|expires_at| expires_at <= now);
            let would_overflow = active.written + payload_len > self.config.byte_limit;
            if interval_expired || would_overflow {
                self.rotate(now, interval_expired).await?;
            }
        }
        if matches!(self.state, StreamState::Closed) {
            self.resolve_and_open(now, None).await?;
        }
        let StreamState::Open(active) = &mut self.state else {
            // resolve_and_open either opened a stream or returned the error
            unreachable!("stream is open after resolution");
        };
        if active.written > 0 && !self.config.delimiter.is_empty() {
            let delimiter = self.config.encoding.encode(&self.config.delimiter);
            active.file.write_all(&delimiter).await?;
        }
        active.file.write_all(&payload).await?;
        active.written += payload_len;
        Ok(())
    }

    /// Writes an optional final record, then closes the stream. The writer
    /// is terminal afterwards: every further call fails with
    /// [`WriteError::Terminal`] without touching the filesystem.
    pub async fn end(&mut self, record: Option<&str>) -> Result<(), WriteError> {
        if matches!(self.state, StreamState::Terminal) {
            return Err(WriteError::Terminal);
        }
        let mut result = match record {
            Some(record) => self.write(record).await,
            None => Ok(()),
        };
        if let StreamState::Open(mut active) = mem::replace(&mut self.state, StreamState::Terminal)
        {
            if let Err(io_err) = active.file.flush().await {
                result = result.and(Err(WriteError::Io(io_err)));
            }
        }
        result
    }

    /// The base name of the currently open file, if any.
    pub fn current_file(&self) -> Option<&str> {
        match &self.state {
            StreamState::Open(active) => Some(&active.name),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, StreamState::Terminal)
    }

    #[cfg(test)]
    pub(crate) fn set_clock(&mut self, clock: fn() -> NaiveDateTime) {
        self.clock = clock;
    }

    async fn rotate(&mut self, now: NaiveDateTime, interval_expired: bool) -> Result<(), WriteError> {
        let StreamState::Open(mut active) = mem::replace(&mut self.state, StreamState::Closed)
        else {
            return Ok(());
        };
        active.file.flush().await?;
        debug!(file = %active.name, "roll file");
        if interval_expired {
            // the bucket is over: mint a fresh timestamp
            self.resolve_and_open(now, None).await
        } else {
            // size rotation keeps the timestamp and bumps the index
            let seed = name::increment(&active.name);
            self.resolve_and_open(now, Some(seed)).await
        }
    }

    async fn resolve_and_open(
        &mut self,
        now: NaiveDateTime,
        seed: Option<String>,
    ) -> Result<(), WriteError> {
        match self.try_open(now, seed).await {
            Ok(active) => {
                self.state = StreamState::Open(active);
                Ok(())
            }
            Err(io_err) => {
                // failing to resolve or open a target file poisons the writer
                self.state = StreamState::Terminal;
                Err(WriteError::Io(io_err))
            }
        }
    }

    async fn try_open(&self, now: NaiveDateTime, seed: Option<String>) -> io::Result<ActiveFile> {
        let names = self.lister.list(&self.dir).await?;
        let mut name = seed.unwrap_or_else(|| matcher::select(&names, &self.config, now));
        while names.iter().any(|existing| existing == &name) {
            let bumped = name::increment(&name);
            // family names always carry an index, so increment makes progress
            debug_assert_ne!(bumped, name);
            name = bumped;
        }
        let path = self.dir.join(&name);
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        let expires_at = if self.config.interval_ms > 0 {
            name::parse(&name)
                .map(|parts| parts.date + Duration::milliseconds(self.config.interval_ms))
        } else {
            None
        };
        debug!(file = %path.display(), "open rolling file");
        Ok(ActiveFile {
            file,
            name,
            written: 0,
            expires_at,
        })
    }
}
