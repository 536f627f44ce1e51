use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::{Config, RawConfig};
use crate::error::{ConfigError, WriteError};
use crate::rolling::RollingWriter;

enum Op {
    Write {
        record: String,
        ack: oneshot::Sender<Result<(), WriteError>>,
    },
    End {
        record: Option<String>,
        ack: oneshot::Sender<Result<(), WriteError>>,
    },
}

/// A cloneable handle to one rolling writer.
///
/// All clones feed a single writer task through one FIFO channel, so records
/// are applied to files in the exact order they were submitted, across
/// rotations included. Each call resolves once its own record has been
/// handled.
#[derive(Clone)]
pub struct RollingFile {
    ops: mpsc::UnboundedSender<Op>,
}

impl RollingFile {
    /// Spawns the writer task on the current tokio runtime.
    pub(crate) fn spawn(dir: PathBuf, config: Config) -> RollingFile {
        let (ops, mut queue) = mpsc::unbounded_channel::<Op>();
        tokio::spawn(async move {
            let mut writer = RollingWriter::create(dir, config);
            while let Some(op) = queue.recv().await {
                match op {
                    Op::Write { record, ack } => {
                        let _ = ack.send(writer.write(&record).await);
                    }
                    Op::End { record, ack } => {
                        let _ = ack.send(writer.end(record.as_deref()).await);
                    }
                }
            }
        });
        RollingFile { ops }
    }

    /// Appends one record, completing once the record reached a file (or
    /// failed with an overflow, terminal, or I/O error).
    pub async fn write(&self, record: impl Into<String>) -> Result<(), WriteError> {
        self.submit(|ack| Op::Write {
            record: record.into(),
            ack,
        })
        .await
    }

    /// Writes an optional final record and closes the writer. Further writes
    /// through any clone of this handle fail with [`WriteError::Terminal`].
    pub async fn end(&self, record: Option<String>) -> Result<(), WriteError> {
        self.submit(|ack| Op::End { record, ack }).await
    }

    async fn submit<F>(&self, op: F) -> Result<(), WriteError>
    where
        F: FnOnce(oneshot::Sender<Result<(), WriteError>>) -> Op,
    {
        let (ack, completion) = oneshot::channel();
        self.ops
            .send(op(ack))
            .map_err(|_| WriteError::Terminal)?;
        completion.await.map_err(|_| WriteError::Terminal)?
    }
}

/// Process-wide registry mapping `(directory, normalized config)` to its
/// writer handle.
///
/// Entries are created lazily on first use and never removed; looking up and
/// inserting are atomic, so two concurrent first users of one key always get
/// the same writer.
pub struct RollingFileRegistry {
    entries: Mutex<HashMap<(PathBuf, String), RollingFile>>,
}

impl Default for RollingFileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingFileRegistry {
    pub fn new() -> RollingFileRegistry {
        RollingFileRegistry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Normalizes `raw` and returns the writer handle for
    /// `(dir, normalized config)`, creating it on first use.
    ///
    /// Must be called from within a tokio runtime: the writer task is
    /// spawned on it.
    pub fn get(
        &self,
        dir: impl AsRef<Path>,
        raw: &RawConfig,
    ) -> Result<RollingFile, ConfigError> {
        let config = raw.normalize()?;
        let dir = dir.as_ref().to_path_buf();
        let key = (dir.clone(), canonical_config_key(&config));
        let mut entries = self.entries.lock().unwrap();
        let handle = entries
            .entry(key)
            .or_insert_with(|| {
                debug!(dir = %dir.display(), "spawn rolling writer");
                RollingFile::spawn(dir.clone(), config)
            })
            .clone();
        Ok(handle)
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

fn canonical_config_key(config: &Config) -> String {
    serde_json::to_string(config).expect("config serializes to json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ByteLimit;

    fn raw_config(file_name: &str) -> RawConfig {
        RawConfig {
            file_name: Some(file_name.to_string()),
            byte_limit: Some(ByteLimit::Bytes(1_000)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_registry_caches_per_key() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let registry = RollingFileRegistry::new();
        let _a = registry.get(tmp_dir.path(), &raw_config("a")).unwrap();
        let _a_again = registry.get(tmp_dir.path(), &raw_config("a")).unwrap();
        assert_eq!(registry.count(), 1);
        let _b = registry.get(tmp_dir.path(), &raw_config("b")).unwrap();
        assert_eq!(registry.count(), 2);
        // a different directory is a different key
        let other_dir = tempfile::tempdir().unwrap();
        let _c = registry.get(other_dir.path(), &raw_config("a")).unwrap();
        assert_eq!(registry.count(), 3);
    }

    #[tokio::test]
    async fn test_registry_rejects_invalid_config() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let registry = RollingFileRegistry::new();
        let raw = RawConfig {
            byte_limit: Some(ByteLimit::Human("huge".to_string())),
            ..Default::default()
        };
        assert!(matches!(
            registry.get(tmp_dir.path(), &raw),
            Err(ConfigError::InvalidByteLimit(_))
        ));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn test_handle_clones_share_one_writer() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let registry = RollingFileRegistry::new();
        let handle = registry.get(tmp_dir.path(), &raw_config("shared")).unwrap();
        let clone = handle.clone();

        handle.write("one").await.unwrap();
        clone.write("two").await.unwrap();
        handle.end(None).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        let content = std::fs::read_to_string(entries[0].path()).unwrap();
        assert_eq!(content, "one\ntwo");
    }

    #[tokio::test]
    async fn test_write_after_end_through_any_clone_is_terminal() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let registry = RollingFileRegistry::new();
        let handle = registry.get(tmp_dir.path(), &raw_config("ending")).unwrap();
        let clone = handle.clone();

        handle.write("only record").await.unwrap();
        handle.end(None).await.unwrap();
        let err = clone.write("too late").await.unwrap_err();
        assert!(err.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_all_land() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let registry = RollingFileRegistry::new();
        let handle = registry.get(tmp_dir.path(), &raw_config("many")).unwrap();

        let writes = (0..32).map(|record_id| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.write(format!("record-{record_id}")).await })
        });
        for join_handle in futures::future::join_all(writes).await {
            join_handle.unwrap().unwrap();
        }
        handle.end(None).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        let content = std::fs::read_to_string(entries[0].path()).unwrap();
        let mut records: Vec<&str> = content.lines().collect();
        records.sort();
        assert_eq!(records.len(), 32);
        for record_id in 0..32 {
            assert!(records.contains(&format!("record-{record_id}").as_str()));
        }
    }
}
