//! Identifier-keyed extraction of zip archives.
//!
//! Archives are processed one at a time and members one at a time. A member
//! failure never stops the archive; an archive failure never stops the run.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::collision::{DEFAULT_DIGEST_LEN, collision_candidates};
use crate::data::options::NormalizeOptions;
use crate::data::report::{ArchiveOutcome, ArchiveReport, MemberOutcome, RunSummary, UnpackReport};
use crate::error::{Error, Result};
use crate::identifier::{Identifier, IdentifierPattern};
use crate::sanitize::{FileNameRules, long_path};
use crate::walk::ArchiveWalker;

mod zip;

pub use self::zip::{PendingMember, ZipSource};

/// Where a member ended up in the output tree.
enum Placement {
    Written { target: PathBuf, renamed: bool },
    /// An earlier run already wrote these exact bytes here.
    Present { target: PathBuf },
}

pub struct Normalizer {
    options: NormalizeOptions,
    pattern: IdentifierPattern,
    rules: FileNameRules,
    output_root: PathBuf,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Result<Self> {
        let pattern = options.identifier_pattern()?;
        let rules = options.file_name_rules();
        let output_root = std::path::absolute(&options.output_dir)?;
        Ok(Self {
            options,
            pattern,
            rules,
            output_root,
        })
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Normalize every archive reachable from the configured source.
    ///
    /// A source file is treated as an outer archive and unpacked into the
    /// staging directory first. Only setup problems are returned as `Err`.
    pub fn run(&self) -> Result<RunSummary> {
        let source = &self.options.source;
        if !source.exists() {
            return Err(Error::SourceMissing {
                path: source.clone(),
            });
        }
        create_dir(&self.output_root)?;

        let mut summary = RunSummary::default();
        if source.is_dir() {
            self.normalize_tree(source, &mut summary);
            return Ok(summary);
        }

        let temp_dir;
        let staging = match &self.options.staging_dir {
            Some(dir) => dir.clone(),
            None => {
                temp_dir = tempfile::Builder::new().prefix("nacc-staging-").tempdir()?;
                temp_dir.path().to_path_buf()
            }
        };
        create_dir(&staging)?;

        match unpack_archive(source, &staging, &self.rules) {
            Ok(report) => summary.outer = Some(report),
            Err(error) => {
                tracing::error!(archive = %source.display(), %error, "failed to unpack outer archive");
                summary.push(ArchiveOutcome::Failed {
                    archive: source.clone(),
                    error,
                });
            }
        }

        self.normalize_tree(&staging, &mut summary);
        Ok(summary)
    }

    /// Normalize every archive found under `root`.
    pub fn normalize_tree(&self, root: &Path, summary: &mut RunSummary) {
        let walker = ArchiveWalker::new(root, self.options.archive_extension.as_str());
        for archive in walker.archives() {
            summary.push(self.normalize_archive(&archive));
        }
    }

    /// Extract one archive into `<output>/<identifier>/`.
    pub fn normalize_archive(&self, archive: &Path) -> ArchiveOutcome {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(fallback) = self.pattern.find(&name) else {
            tracing::warn!(archive = %archive.display(), "skipped: no identifier in archive name");
            return ArchiveOutcome::Skipped {
                archive: archive.to_path_buf(),
                error: Error::IdentifierNotFound { name },
            };
        };

        let mut source = match ZipSource::open(archive) {
            Ok(source) => source,
            Err(error) => {
                tracing::error!(archive = %archive.display(), %error, "failed to open archive");
                return ArchiveOutcome::Failed {
                    archive: archive.to_path_buf(),
                    error,
                };
            }
        };

        let mut members = Vec::with_capacity(source.len());
        source.visit(|index, member| match member {
            Ok(member) if member.is_dir => {}
            Ok(member) => members.push(self.normalize_member(member, &fallback)),
            Err(error) => members.push(skip_member(archive, format!("#{index}"), error)),
        });

        let report = ArchiveReport {
            archive: archive.to_path_buf(),
            identifier: fallback,
            members,
        };
        tracing::info!(
            archive = %archive.display(),
            identifier = %report.identifier,
            written = report.written_count(),
            renamed = report.renamed_count(),
            skipped = report.skipped_count(),
            "clean-extracted archive"
        );
        ArchiveOutcome::Normalized(report)
    }

    fn normalize_member(&self, member: PendingMember<'_>, fallback: &Identifier) -> MemberOutcome {
        let identifier = self
            .pattern
            .find(&member.name)
            .unwrap_or_else(|| fallback.clone());
        let extension = Path::new(&member.name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let relative = Path::new(identifier.as_str()).join(format!("{identifier}{extension}"));

        match self.place_member(&relative, &member.name, member.reader) {
            Ok((Placement::Written { target, renamed }, size)) => {
                tracing::debug!(member = %member.name, target = %target.display(), renamed, "extracted member");
                MemberOutcome::Written {
                    original_path: member.name,
                    target_path: target,
                    size,
                    renamed,
                }
            }
            Ok((Placement::Present { target }, size)) => {
                tracing::debug!(member = %member.name, target = %target.display(), "member already present");
                MemberOutcome::Present {
                    original_path: member.name,
                    target_path: target,
                    size,
                }
            }
            Err(error) => {
                tracing::warn!(member = %member.name, destination = %relative.display(), %error, "skipped member");
                MemberOutcome::Skipped {
                    original_path: member.name,
                    error,
                }
            }
        }
    }

    /// Stage the member next to its destination, then claim the first free
    /// collision candidate.
    ///
    /// A candidate already holding the same bytes means this member was
    /// placed by an earlier run, so the staged copy is dropped. Existing
    /// files are never replaced.
    fn place_member(
        &self,
        relative: &Path,
        member_path: &str,
        reader: &mut dyn Read,
    ) -> Result<(Placement, u64)> {
        let desired = self.rules.sanitize_path(relative, &self.output_root)?.resolved;
        create_parent(&desired)?;
        let parent = desired.parent().unwrap_or(self.output_root.as_path());

        let mut staged = tempfile::Builder::new()
            .prefix(".nacc-")
            .tempfile_in(long_path(parent))
            .map_err(|e| Error::ExtractionFailed {
                path: desired.clone(),
                source: e,
            })?;
        let size = io::copy(reader, staged.as_file_mut())
            .map_err(|e| copy_error(member_path, &desired, e))?;
        let digest = file_digest(staged.path()).map_err(|e| Error::ExtractionFailed {
            path: desired.clone(),
            source: e,
        })?;

        for candidate in collision_candidates(&desired, member_path, self.options.digest_len) {
            let io_path = long_path(&candidate);
            match fs::metadata(&io_path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    staged
                        .persist_noclobber(&io_path)
                        .map_err(|e| Error::ExtractionFailed {
                            path: candidate.clone(),
                            source: e.error,
                        })?;
                    let renamed = candidate != desired;
                    return Ok((
                        Placement::Written {
                            target: candidate,
                            renamed,
                        },
                        size,
                    ));
                }
                Err(e) => {
                    return Err(Error::ExtractionFailed {
                        path: candidate,
                        source: e,
                    });
                }
                Ok(meta) if meta.is_file() && meta.len() == size => {
                    let same = file_digest(&io_path).map_err(|e| Error::ExtractionFailed {
                        path: candidate.clone(),
                        source: e,
                    })? == digest;
                    if same {
                        return Ok((Placement::Present { target: candidate }, size));
                    }
                }
                Ok(_) => {}
            }
        }
        Err(Error::CollisionUnresolved { desired })
    }
}

/// Unpack an outer archive into `destination`, keeping member directories.
///
/// Every member path goes through the sanitizer; rejected members are
/// reported and skipped. Files left in `destination` by an earlier unpack
/// are replaced, but two members that clean to the same path within this
/// unpack get digest-suffixed names instead.
pub fn unpack_archive(
    archive: &Path,
    destination: &Path,
    rules: &FileNameRules,
) -> Result<UnpackReport> {
    let mut source = ZipSource::open(archive)?;

    let mut members = Vec::with_capacity(source.len());
    let mut written: HashSet<PathBuf> = HashSet::new();
    source.visit(|index, member| match member {
        Ok(member) if member.is_dir => {}
        Ok(member) => {
            let outcome = rules
                .sanitize_path(&member.name, destination)
                .and_then(|sanitized| {
                    let desired = sanitized.resolved;
                    let target = collision_candidates(&desired, &member.name, DEFAULT_DIGEST_LEN)
                        .find(|candidate| !written.contains(candidate))
                        .ok_or_else(|| Error::CollisionUnresolved {
                            desired: desired.clone(),
                        })?;
                    let size = write_file(member.reader, &target, &member.name)?;
                    let renamed = target != desired;
                    Ok((target, size, renamed))
                });
            members.push(match outcome {
                Ok((target_path, size, renamed)) => {
                    written.insert(target_path.clone());
                    MemberOutcome::Written {
                        original_path: member.name,
                        target_path,
                        size,
                        renamed,
                    }
                }
                Err(error) => skip_member(archive, member.name, error),
            });
        }
        Err(error) => members.push(skip_member(archive, format!("#{index}"), error)),
    });

    let report = UnpackReport {
        archive: archive.to_path_buf(),
        destination: destination.to_path_buf(),
        members,
    };
    tracing::info!(
        archive = %archive.display(),
        destination = %destination.display(),
        written = report.written_count(),
        skipped = report.skipped_count(),
        "unzipped outer archive"
    );
    Ok(report)
}

fn skip_member(archive: &Path, original_path: String, error: Error) -> MemberOutcome {
    tracing::warn!(archive = %archive.display(), member = %original_path, %error, "skipped member");
    MemberOutcome::Skipped {
        original_path,
        error,
    }
}

fn create_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(long_path(path)).map_err(|e| Error::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn create_parent(target_path: &Path) -> Result<()> {
    match target_path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// A failed copy leaves no file behind.
fn write_file(reader: &mut dyn Read, target_path: &Path, member: &str) -> Result<u64> {
    create_parent(target_path)?;
    let io_path = long_path(target_path);
    let mut file = fs::File::create(&io_path).map_err(|e| Error::ExtractionFailed {
        path: target_path.to_path_buf(),
        source: e,
    })?;
    match io::copy(reader, &mut file) {
        Ok(size) => Ok(size),
        Err(source) => {
            drop(file);
            let _ = fs::remove_file(&io_path);
            Err(copy_error(member, target_path, source))
        }
    }
}

/// Bad checksums and broken compressed streams surface as `InvalidData`.
fn copy_error(member: &str, target_path: &Path, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::InvalidData {
        Error::MemberDecode {
            member: member.to_string(),
            source,
        }
    } else {
        Error::ExtractionFailed {
            path: target_path.to_path_buf(),
            source,
        }
    }
}

fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use ::zip::write::SimpleFileOptions;

    use super::*;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ::zip::ZipWriter::new(fs::File::create(path).unwrap());
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    fn normalizer(output: &Path) -> Normalizer {
        Normalizer::new(NormalizeOptions::new(".", output)).unwrap()
    }

    #[test]
    fn member_identifier_wins_over_archive_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("NACC000001.zip");
        write_zip(&archive, &[("NACC000002_T1/scan.dcm", b"scan")]);

        let output = dir.path().join("out");
        let outcome = normalizer(&output).normalize_archive(&archive);

        let report = outcome.report().unwrap();
        assert_eq!(report.written_count(), 1);
        assert!(output.join("NACC000002/NACC000002.dcm").exists());
        assert!(!output.join("NACC000001").exists());
    }

    #[test]
    fn member_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("NACC000003.zip");
        write_zip(&archive, &[("DICOMDIR", b"index")]);

        let output = dir.path().join("out");
        normalizer(&output).normalize_archive(&archive);

        assert_eq!(fs::read(output.join("NACC000003/NACC000003")).unwrap(), b"index");
    }

    #[test]
    fn corrupt_archive_fails_only_itself() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("NACC000004.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let output = dir.path().join("out");
        let outcome = normalizer(&output).normalize_archive(&archive);

        assert!(matches!(outcome, ArchiveOutcome::Failed { error: Error::ArchiveOpen { .. }, .. }));
        assert!(!output.join("NACC000004").exists());
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::InvalidData, "bad crc"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("batch/NACC000001.zip");
        let result = write_file(&mut Broken, &target, "batch/NACC000001.zip");

        assert!(matches!(result, Err(Error::MemberDecode { .. })));
        assert!(!target.exists());
    }

    #[test]
    fn identical_member_is_not_written_twice() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        let normalizer = normalizer(&output);
        let relative = Path::new("NACC000001/NACC000001.dcm");

        let mut reader = Cursor::new(b"scan".to_vec());
        let (first, _) = normalizer.place_member(relative, "s1/scan.dcm", &mut reader).unwrap();
        assert!(matches!(first, Placement::Written { renamed: false, .. }));

        let mut reader = Cursor::new(b"scan".to_vec());
        let (second, size) = normalizer.place_member(relative, "s1/scan.dcm", &mut reader).unwrap();
        assert!(matches!(second, Placement::Present { .. }));
        assert_eq!(size, 4);

        let mut reader = Cursor::new(b"other".to_vec());
        let (third, _) = normalizer.place_member(relative, "s2/scan.dcm", &mut reader).unwrap();
        assert!(matches!(third, Placement::Written { renamed: true, .. }));

        let mut names: Vec<_> = fs::read_dir(output.join("NACC000001"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn unpack_preserves_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("DICOM_0417.zip");
        write_zip(
            &archive,
            &[("batch1/NACC000001.zip", b"inner"), ("readme.txt", b"hi")],
        );

        let staging = dir.path().join("staging");
        let report = unpack_archive(&archive, &staging, &FileNameRules::default()).unwrap();

        assert_eq!(report.written_count(), 2);
        assert_eq!(fs::read(staging.join("batch1/NACC000001.zip")).unwrap(), b"inner");
        assert!(staging.join("readme.txt").exists());
    }

    #[test]
    fn unpack_keeps_members_that_clean_to_one_name() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("DICOM_0417.zip");
        write_zip(
            &archive,
            &[("batch/NACC000001?.zip", b"first"), ("batch/NACC000001.zip", b"second")],
        );

        let staging = dir.path().join("staging");
        let report = unpack_archive(&archive, &staging, &FileNameRules::default()).unwrap();

        assert_eq!(report.written_count(), 2);
        assert!(matches!(
            &report.members[1],
            MemberOutcome::Written { renamed: true, .. }
        ));
        let renamed = format!(
            "batch/NACC000001_{}.zip",
            crate::collision_suffix("batch/NACC000001.zip", DEFAULT_DIGEST_LEN)
        );
        assert_eq!(fs::read(staging.join("batch/NACC000001.zip")).unwrap(), b"first");
        assert_eq!(fs::read(staging.join(renamed)).unwrap(), b"second");
    }

    #[test]
    fn unpack_replaces_leftovers_from_earlier_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("DICOM_0417.zip");
        write_zip(&archive, &[("batch/NACC000001.zip", b"fresh")]);

        let staging = dir.path().join("staging");
        fs::create_dir_all(staging.join("batch")).unwrap();
        fs::write(staging.join("batch/NACC000001.zip"), b"stale").unwrap();

        let report = unpack_archive(&archive, &staging, &FileNameRules::default()).unwrap();
        assert!(matches!(
            &report.members[0],
            MemberOutcome::Written { renamed: false, .. }
        ));
        assert_eq!(fs::read(staging.join("batch/NACC000001.zip")).unwrap(), b"fresh");
    }
}
