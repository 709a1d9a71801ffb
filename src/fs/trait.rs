//! FileSystem trait definition

use anyhow::Result;
use std::path::Path;

/// Abstraction over the checked-out project tree.
///
/// Activation predicates and descriptor detection read the workspace only
/// through this trait, so they stay pure over a given snapshot and can be
/// tested against [`MockFileSystem`](super::MockFileSystem) without touching
/// the disk.
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a regular file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;
}
