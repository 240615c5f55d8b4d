use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::collision::DEFAULT_DIGEST_LEN;
use crate::error::{Error, Result};
use crate::identifier::{DEFAULT_PREFIX, IdentifierPattern};
use crate::sanitize::FileNameRules;

/// Everything a normalization run needs. Built once and handed to the
/// [`Normalizer`](crate::Normalizer).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    /// Directory of archives, or a single outer archive.
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Where an outer archive is unpacked. A temporary directory when unset.
    pub staging_dir: Option<PathBuf>,
    pub id_prefix: String,
    pub archive_extension: String,
    pub max_filename_len: usize,
    pub keep_segments: usize,
    pub digest_len: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        let rules = FileNameRules::default();
        Self {
            source: PathBuf::from("."),
            output_dir: PathBuf::from("nacc_cleaned_output"),
            staging_dir: None,
            id_prefix: DEFAULT_PREFIX.to_string(),
            archive_extension: "zip".to_string(),
            max_filename_len: rules.max_len,
            keep_segments: rules.keep_segments,
            digest_len: DEFAULT_DIGEST_LEN,
        }
    }
}

impl NormalizeOptions {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::Config {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, path)
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn staging_dir(mut self, staging_dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(staging_dir.into());
        self
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn archive_extension(mut self, extension: impl Into<String>) -> Self {
        self.archive_extension = extension.into();
        self
    }

    pub fn max_filename_len(mut self, len: usize) -> Self {
        self.max_filename_len = len;
        self
    }

    pub fn keep_segments(mut self, count: usize) -> Self {
        self.keep_segments = count;
        self
    }

    pub fn digest_len(mut self, len: usize) -> Self {
        self.digest_len = len;
        self
    }

    pub fn identifier_pattern(&self) -> Result<IdentifierPattern> {
        IdentifierPattern::new(&self.id_prefix)
    }

    pub fn file_name_rules(&self) -> FileNameRules {
        FileNameRules::default()
            .max_len(self.max_filename_len)
            .keep_segments(self.keep_segments)
    }
}
