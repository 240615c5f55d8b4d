use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::identifier::Identifier;

fn serialize_error<S: Serializer>(error: &Error, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Repr<'a> {
        kind: &'a str,
        message: String,
    }

    Repr {
        kind: error.kind(),
        message: error.to_string(),
    }
    .serialize(serializer)
}

/// What happened to one archive member.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemberOutcome {
    Written {
        original_path: String,
        target_path: PathBuf,
        size: u64,
        /// A collision suffix was added to the natural name.
        renamed: bool,
    },
    /// The output already held this member's exact bytes; nothing was written.
    Present {
        original_path: String,
        target_path: PathBuf,
        size: u64,
    },
    Skipped {
        original_path: String,
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
}

impl MemberOutcome {
    pub fn original_path(&self) -> &str {
        match self {
            Self::Written { original_path, .. }
            | Self::Present { original_path, .. }
            | Self::Skipped { original_path, .. } => original_path,
        }
    }

    pub fn target_path(&self) -> Option<&Path> {
        match self {
            Self::Written { target_path, .. } | Self::Present { target_path, .. } => {
                Some(target_path)
            }
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Per-member results for one archive that could be opened.
#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    pub archive: PathBuf,
    pub identifier: Identifier,
    pub members: Vec<MemberOutcome>,
}

impl ArchiveReport {
    pub fn written_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_written()).count()
    }

    pub fn renamed_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| matches!(m, MemberOutcome::Written { renamed: true, .. }))
            .count()
    }

    pub fn present_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| matches!(m, MemberOutcome::Present { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_skipped()).count()
    }

    /// Bytes written in this run; members already present count nothing.
    pub fn total_bytes(&self) -> u64 {
        self.members
            .iter()
            .map(|m| match m {
                MemberOutcome::Written { size, .. } => *size,
                MemberOutcome::Present { .. } | MemberOutcome::Skipped { .. } => 0,
            })
            .sum()
    }
}

/// What happened to one archive.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Normalized(ArchiveReport),
    /// No identifier in the archive name; nothing was written.
    Skipped {
        archive: PathBuf,
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
    /// The archive could not be opened.
    Failed {
        archive: PathBuf,
        #[serde(serialize_with = "serialize_error")]
        error: Error,
    },
}

impl ArchiveOutcome {
    pub fn archive(&self) -> &Path {
        match self {
            Self::Normalized(report) => &report.archive,
            Self::Skipped { archive, .. } | Self::Failed { archive, .. } => archive,
        }
    }

    pub fn report(&self) -> Option<&ArchiveReport> {
        match self {
            Self::Normalized(report) => Some(report),
            _ => None,
        }
    }
}

/// Result of unpacking an outer archive into the staging directory.
#[derive(Debug, Serialize)]
pub struct UnpackReport {
    pub archive: PathBuf,
    pub destination: PathBuf,
    pub members: Vec<MemberOutcome>,
}

impl UnpackReport {
    pub fn written_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_written()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_skipped()).count()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub archives_normalized: usize,
    pub archives_skipped: usize,
    pub archives_failed: usize,
    pub files_written: usize,
    pub files_renamed: usize,
    pub files_present: usize,
    pub members_skipped: usize,
    pub bytes_written: u64,
}

/// Aggregate of every archive processed in one run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Set when the source was an outer archive.
    pub outer: Option<UnpackReport>,
    pub archives: Vec<ArchiveOutcome>,
}

impl RunSummary {
    pub fn push(&mut self, outcome: ArchiveOutcome) {
        self.archives.push(outcome);
    }

    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals::default();
        if let Some(outer) = &self.outer {
            totals.members_skipped += outer.skipped_count();
        }
        for outcome in &self.archives {
            match outcome {
                ArchiveOutcome::Normalized(report) => {
                    totals.archives_normalized += 1;
                    totals.files_written += report.written_count();
                    totals.files_renamed += report.renamed_count();
                    totals.files_present += report.present_count();
                    totals.members_skipped += report.skipped_count();
                    totals.bytes_written += report.total_bytes();
                }
                ArchiveOutcome::Skipped { .. } => totals.archives_skipped += 1,
                ArchiveOutcome::Failed { .. } => totals.archives_failed += 1,
            }
        }
        totals
    }

    pub fn is_clean(&self) -> bool {
        let totals = self.totals();
        totals.archives_failed == 0 && totals.members_skipped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::extract_identifier;

    fn report() -> ArchiveReport {
        ArchiveReport {
            archive: PathBuf::from("/in/NACC000001.zip"),
            identifier: extract_identifier("NACC000001").unwrap(),
            members: vec![
                MemberOutcome::Written {
                    original_path: "scan1.dcm".to_string(),
                    target_path: PathBuf::from("/out/NACC000001/NACC000001.dcm"),
                    size: 100,
                    renamed: false,
                },
                MemberOutcome::Written {
                    original_path: "scan2.dcm".to_string(),
                    target_path: PathBuf::from("/out/NACC000001/NACC000001_abcdef.dcm"),
                    size: 50,
                    renamed: true,
                },
                MemberOutcome::Present {
                    original_path: "scan3.dcm".to_string(),
                    target_path: PathBuf::from("/out/NACC000001/NACC000001_123456.dcm"),
                    size: 70,
                },
                MemberOutcome::Skipped {
                    original_path: "../evil.dcm".to_string(),
                    error: Error::ZipSlip {
                        entry: PathBuf::from("../evil.dcm"),
                        resolved: PathBuf::from("/evil.dcm"),
                    },
                },
            ],
        }
    }

    #[test]
    fn archive_report_counts() {
        let report = report();
        assert_eq!(report.written_count(), 2);
        assert_eq!(report.renamed_count(), 1);
        assert_eq!(report.present_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.total_bytes(), 150);
    }

    #[test]
    fn run_totals_aggregate_outcomes() {
        let mut summary = RunSummary::default();
        summary.push(ArchiveOutcome::Normalized(report()));
        summary.push(ArchiveOutcome::Skipped {
            archive: PathBuf::from("/in/export.zip"),
            error: Error::IdentifierNotFound {
                name: "export.zip".to_string(),
            },
        });

        let totals = summary.totals();
        assert_eq!(totals.archives_normalized, 1);
        assert_eq!(totals.archives_skipped, 1);
        assert_eq!(totals.archives_failed, 0);
        assert_eq!(totals.files_written, 2);
        assert_eq!(totals.files_present, 1);
        assert_eq!(totals.bytes_written, 150);
        assert!(!summary.is_clean());
    }

    #[test]
    fn member_outcome_accessors() {
        let report = report();
        assert_eq!(report.members[0].original_path(), "scan1.dcm");
        assert!(report.members[0].target_path().is_some());
        assert!(report.members[2].target_path().is_some());
        assert!(report.members[3].target_path().is_none());
    }
}
