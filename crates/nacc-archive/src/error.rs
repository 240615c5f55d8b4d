use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open archive '{path}': {source}")]
    ArchiveOpen {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("archive member #{index} is corrupted: {source}")]
    Corrupted {
        index: usize,
        source: zip::result::ZipError,
    },

    #[error("failed to decode archive member '{member}': {source}")]
    MemberDecode { member: String, source: io::Error },

    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    ZipSlip { entry: PathBuf, resolved: PathBuf },

    #[error("entry path '{entry}' has no usable file name")]
    InvalidPath { entry: PathBuf },

    #[error("no subject identifier found in '{name}'")]
    IdentifierNotFound { name: String },

    #[error("every collision candidate for '{desired}' is already taken")]
    CollisionUnresolved { desired: PathBuf },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("identifier prefix '{prefix}' must be exactly 4 ASCII letters")]
    InvalidPrefix { prefix: String },

    #[error("source '{path}' does not exist")]
    SourceMissing { path: PathBuf },

    #[error("invalid configuration in '{path}': {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Short machine-friendly label used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArchiveOpen { .. } => "archive-open",
            Self::Corrupted { .. } | Self::MemberDecode { .. } => "member-decode",
            Self::ZipSlip { .. } => "path-rejected",
            Self::InvalidPath { .. } => "invalid-path",
            Self::IdentifierNotFound { .. } => "identifier-not-found",
            Self::CollisionUnresolved { .. } => "collision",
            Self::ExtractionFailed { .. } | Self::Io(_) => "io",
            Self::DirectoryCreationFailed { .. } => "directory",
            Self::InvalidPrefix { .. } | Self::Config { .. } => "config",
            Self::SourceMissing { .. } => "source-missing",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
