use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use zip::result::ZipError;

use crate::error::{Error, Result};

/// A member read from the archive but not yet written.
///
/// `reader` streams the decompressed bytes; decode errors surface while reading.
pub struct PendingMember<'a> {
    pub name: String,
    pub is_dir: bool,
    pub reader: &'a mut dyn Read,
}

pub struct ZipSource<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl ZipSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::ArchiveOpen {
            path: path.to_path_buf(),
            source: ZipError::from(e),
        })?;
        Self::new(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R, origin: &Path) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader).map_err(|source| Error::ArchiveOpen {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(Self { archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Hand every member to `f` in central-directory order.
    ///
    /// A member whose header cannot be read is passed as `Err` and the walk
    /// continues with the next index.
    pub fn visit<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, Result<PendingMember<'_>>),
    {
        for index in 0..self.archive.len() {
            match self.archive.by_index(index) {
                Ok(mut file) => {
                    let name = file.name().to_string();
                    let is_dir = file.is_dir();
                    f(
                        index,
                        Ok(PendingMember {
                            name,
                            is_dir,
                            reader: &mut file,
                        }),
                    );
                }
                Err(source) => f(index, Err(Error::Corrupted { index, source })),
            }
        }
    }
}
