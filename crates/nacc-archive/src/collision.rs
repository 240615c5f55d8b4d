use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Suffix width tried first.
pub const DEFAULT_DIGEST_LEN: usize = 6;

/// Widest digest tried before giving up on a collision.
pub const MAX_DIGEST_LEN: usize = 16;

/// First `len` hex characters of the SHA-256 of the member path.
pub fn collision_suffix(member_path: &str, len: usize) -> String {
    let mut digest = hex::encode(Sha256::digest(member_path.as_bytes()));
    digest.truncate(len);
    digest
}

/// `desired` followed by its digest-suffixed alternates, narrowest first.
///
/// Suffixes start at `digest_len` hex characters and widen two at a time up
/// to [`MAX_DIGEST_LEN`].
pub fn collision_candidates(
    desired: &Path,
    member_path: &str,
    digest_len: usize,
) -> impl Iterator<Item = PathBuf> + use<> {
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = desired
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let start = digest_len.clamp(1, MAX_DIGEST_LEN);
    let widths = (start..MAX_DIGEST_LEN)
        .step_by(2)
        .chain(std::iter::once(MAX_DIGEST_LEN));

    let suffixed = {
        let desired = desired.to_path_buf();
        let member_path = member_path.to_string();
        widths.map(move |len| {
            let suffix = collision_suffix(&member_path, len);
            desired.with_file_name(format!("{stem}_{suffix}{extension}"))
        })
    };
    std::iter::once(desired.to_path_buf()).chain(suffixed)
}

/// The first candidate from [`collision_candidates`] that does not exist yet.
pub fn resolve_collision(desired: &Path, member_path: &str, digest_len: usize) -> Result<PathBuf> {
    collision_candidates(desired, member_path, digest_len)
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| Error::CollisionUnresolved {
            desired: desired.to_path_buf(),
        })
}
