use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Result of sanitizing an archive entry path.
#[derive(Clone, Debug)]
pub struct SanitizedPath {
    pub original: PathBuf,
    pub resolved: PathBuf,
}

/// Filename cleanup rules applied to the last component of every entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileNameRules {
    pub max_len: usize,
    pub keep_segments: usize,
}

impl Default for FileNameRules {
    fn default() -> Self {
        Self {
            max_len: 100,
            keep_segments: 3,
        }
    }
}

impl FileNameRules {
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn keep_segments(mut self, keep_segments: usize) -> Self {
        self.keep_segments = keep_segments;
        self
    }

    /// Strip illegal characters and shorten overlong names.
    ///
    /// Shortening first drops `_`-separated segments past `keep_segments`,
    /// then cuts the stem. The extension always survives.
    pub fn clean_file_name(&self, name: &str) -> String {
        let cleaned: String = name
            .chars()
            .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
            .collect();

        if cleaned.chars().count() <= self.max_len {
            return cleaned;
        }

        let extension = Path::new(&cleaned)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let parts: Vec<&str> = cleaned.split('_').collect();
        let shortened = if parts.len() > self.keep_segments && self.keep_segments > 0 {
            let head = parts[..self.keep_segments].join("_");
            let head = head.strip_suffix(&extension).unwrap_or(&head);
            format!("{head}{extension}")
        } else {
            cleaned
        };

        if shortened.chars().count() <= self.max_len {
            return shortened;
        }

        let ext_len = extension.chars().count();
        if ext_len >= self.max_len {
            return shortened.chars().take(self.max_len).collect();
        }
        let stem_len = shortened.chars().count() - ext_len;
        let stem: String = shortened
            .chars()
            .take(stem_len.min(self.max_len - ext_len))
            .collect();
        format!("{stem}{extension}")
    }

    /// Sanitize an entry path for extraction under `base`.
    ///
    /// Directory components are kept, the file name is cleaned, and the
    /// resolved path must stay inside `base`.
    pub fn sanitize_path<P: AsRef<Path>, B: AsRef<Path>>(
        &self,
        entry_path: P,
        base: B,
    ) -> Result<SanitizedPath> {
        let entry_path = entry_path.as_ref();
        let base = normalize_path(&std::path::absolute(base.as_ref())?);

        // Reject absolute paths (zip-slip protection)
        if entry_path.has_root() || entry_path.is_absolute() {
            return Err(Error::ZipSlip {
                entry: entry_path.to_path_buf(),
                resolved: normalize_path(entry_path),
            });
        }

        let file_name = entry_path
            .file_name()
            .map(|name| self.clean_file_name(&name.to_string_lossy()))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::InvalidPath {
                entry: entry_path.to_path_buf(),
            })?;

        let relative = match entry_path.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        };

        let resolved = normalize_path(&base.join(relative));

        // Ensure result doesn't escape base directory
        if !resolved.starts_with(&base) || resolved == base {
            return Err(Error::ZipSlip {
                entry: entry_path.to_path_buf(),
                resolved,
            });
        }

        Ok(SanitizedPath {
            original: entry_path.to_path_buf(),
            resolved,
        })
    }
}

/// Normalize path separators and resolve relative components.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}

/// Prefix long absolute paths with `\\?\` so Windows accepts them.
#[cfg(windows)]
pub fn long_path(path: &Path) -> PathBuf {
    use std::ffi::OsString;

    const LIMIT: usize = 240;
    let raw = path.as_os_str();
    if !path.is_absolute() || raw.len() <= LIMIT || raw.to_string_lossy().starts_with(r"\\?\") {
        return path.to_path_buf();
    }
    let mut prefixed = OsString::from(r"\\?\");
    prefixed.push(raw);
    PathBuf::from(prefixed)
}

#[cfg(not(windows))]
pub fn long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}
