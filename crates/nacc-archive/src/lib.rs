//! Normalization of NACC imaging exports: nested zip archives are unpacked
//! into one directory per subject identifier.
//!
//! # Architecture
//!
//! - `identifier.rs` - Subject identifier matching
//! - `sanitize.rs` - Path sanitization (zip-slip prevention, filename cleanup)
//! - `collision.rs` - Digest-suffixed alternate names
//! - `walk.rs` - Archive discovery
//! - `extract/` - Outer unpacking and identifier-keyed extraction
//! - `data/` - Options and run reports

pub use collision::{
    DEFAULT_DIGEST_LEN, MAX_DIGEST_LEN, collision_candidates, collision_suffix, resolve_collision,
};
pub use data::options::NormalizeOptions;
pub use data::report::{
    ArchiveOutcome, ArchiveReport, MemberOutcome, RunSummary, RunTotals, UnpackReport,
};
pub use error::{Error, Result};
pub use extract::{Normalizer, unpack_archive};
pub use identifier::{Identifier, IdentifierPattern, extract_identifier};
pub use sanitize::{FileNameRules, SanitizedPath, long_path};
pub use walk::ArchiveWalker;

pub mod data;
pub mod extract;
mod collision;
mod error;
mod identifier;
mod sanitize;
mod walk;
