//! Snapshot directory with all-or-nothing file writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

const STAGING_PREFIX: &str = ".clockify-";
const STAGING_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{0:?} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot write into {dir:?}: {source}")]
    Unwritable {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Creates `dir` when missing and checks that a staging file can be opened in it.
pub fn prepare_dir(dir: &Path) -> Result<(), PersistError> {
    let unwritable = |source| PersistError::Unwritable {
        dir: dir.to_path_buf(),
        source,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(PersistError::NotADirectory(dir.to_path_buf())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(unwritable)?
        }
        Err(err) => return Err(unwritable(err)),
    }
    staging_file(dir).map(drop)
}

fn staging_file(dir: &Path) -> Result<NamedTempFile, PersistError> {
    Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)
        .map_err(|source| PersistError::Unwritable {
            dir: dir.to_path_buf(),
            source,
        })
}

/// Directory that export and template files land in. Each file is staged next
/// to its target and renamed into place, so a reader sees the old file or the
/// new one.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let mut written = self.write_group(&[(filename, content)])?;
        written.pop().ok_or_else(|| PersistError::Io {
            path: self.dir.join(filename),
            source: io::Error::other("nothing written"),
        })
    }

    /// Stages every file before renaming any, so a failed stage leaves the
    /// directory untouched. Returns the final paths in input order.
    pub fn write_group(&self, files: &[(&str, &[u8])]) -> Result<Vec<PathBuf>, PersistError> {
        prepare_dir(&self.dir)?;

        let mut staged = Vec::with_capacity(files.len());
        for (filename, content) in files {
            let target = self.dir.join(filename);
            let mut tmp = staging_file(&self.dir)?;
            let io_err = |source| PersistError::Io {
                path: target.clone(),
                source,
            };
            tmp.write_all(content).map_err(io_err)?;
            tmp.as_file_mut().sync_all().map_err(io_err)?;
            staged.push((tmp, target));
        }

        staged
            .into_iter()
            .map(|(tmp, target)| {
                tmp.persist(&target).map_err(|err| PersistError::Io {
                    path: target.clone(),
                    source: err.error,
                })?;
                Ok(target)
            })
            .collect()
    }
}
