use std::io;
use std::path::Path;

use async_trait::async_trait;

/// Supplies the set of existing base file names for a directory.
///
/// The rotation engine consumes this interface to recover the current file
/// after a restart; tests substitute their own listings or failures.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Base names of the plain files in `dir`, directories excluded.
    async fn list(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// One-shot directory scan over the real filesystem.
pub struct FsLister;

#[async_trait]
impl DirectoryLister for FsLister {
    async fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(dir_entry) = read_dir.next_entry().await? {
            if !dir_entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = if let Some(file_name) = dir_entry.file_name().to_str() {
                file_name.to_string()
            } else {
                continue;
            };
            names.push(file_name);
        }
        names.sort();
        Ok(names)
    }
}
