use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursive discovery of archive files under a directory.
#[derive(Clone, Debug)]
pub struct ArchiveWalker {
    root: PathBuf,
    extension: String,
}

impl ArchiveWalker {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Lazily yields every matching file in traversal order.
    ///
    /// Unreadable directories are logged and skipped.
    pub fn archives(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(root = %self.root.display(), error = %err, "skipping unreadable path");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.matches(entry.path()))
            .map(|entry| entry.into_path())
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
    }
}
