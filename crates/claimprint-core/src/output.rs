//! Output documents and all-or-nothing writes.
//!
//! Every document is rendered to bytes before the first file is touched. Each
//! is then staged in a temporary file inside the output directory and renamed
//! into place only once all staging writes succeeded. Documents being replaced
//! or retired are set aside first and put back if any rename fails, so the
//! directory holds either the previous set or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};

use crate::calibration::CalibrationRecord;
use crate::config::OutputPaths;
use crate::error::{Error, Result};
use crate::run::RunOutput;

/// A rendered document and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn json<T: Serialize>(path: PathBuf, value: &T) -> Result<Self> {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        Ok(Self { path, bytes })
    }
}

/// Render the documents a run publishes, in write order.
pub fn render_run(output: &RunOutput, paths: &OutputPaths) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::with_capacity(3);
    if let Some(calibration) = &output.calibration {
        artifacts.push(Artifact::json(paths.calibration(), calibration)?);
    }
    artifacts.push(Artifact::json(paths.score(), &output.score)?);
    if let Some(by_state) = &output.by_state {
        artifacts.push(Artifact::json(paths.score_by_state(), by_state)?);
    }
    Ok(artifacts)
}

pub fn render_calibration(record: &CalibrationRecord, paths: &OutputPaths) -> Result<Vec<Artifact>> {
    Ok(vec![Artifact::json(paths.calibration(), record)?])
}

/// Documents a previous run may have left that `output` does not publish.
///
/// Single-report mode writes no calibration or all-partitions document, so
/// older copies of both would no longer match the new score.
pub fn superseded_documents(output: &RunOutput, paths: &OutputPaths) -> Vec<PathBuf> {
    let mut stale = Vec::new();
    if output.calibration.is_none() {
        stale.push(paths.calibration());
    }
    if output.by_state.is_none() {
        stale.push(paths.score_by_state());
    }
    stale
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn reject_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(Error::io(
            path,
            std::io::Error::new(std::io::ErrorKind::IsADirectory, "output path is a directory"),
        ));
    }
    Ok(())
}

fn stage(dir: &Path, artifact: &Artifact) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(&artifact.bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::io(tmp.path(), e))?;
    Ok(tmp)
}

/// Move an existing file at `path` to a temporary name in `dir`.
///
/// The returned path deletes the old contents when dropped.
fn set_aside(dir: &Path, path: &Path) -> Result<Option<TempPath>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = NamedTempFile::new_in(dir)
        .map_err(|e| Error::io(dir, e))?
        .into_temp_path();
    std::fs::rename(path, &backup).map_err(|e| Error::io(path, e))?;
    Ok(Some(backup))
}

/// A destination touched during the commit.
struct Touched<'a> {
    path: &'a Path,
    backup: Option<TempPath>,
    /// Whether a new document now sits at `path`.
    replaced: bool,
}

fn roll_back(touched: Vec<Touched<'_>>) {
    for t in touched.into_iter().rev() {
        if t.replaced {
            if let Err(e) = std::fs::remove_file(t.path) {
                log::error!("rollback: could not remove {}: {e}", t.path.display());
            }
        }
        if let Some(backup) = t.backup {
            if let Err(e) = backup.persist(t.path) {
                log::error!("rollback: could not restore {}: {}", t.path.display(), e.error);
            }
        }
    }
}

/// Write every artifact or none of them. Returns the written paths.
pub fn write_all(artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    publish(artifacts, &[])
}

/// Write every artifact and remove every `retire` path, or change nothing.
///
/// Artifacts are staged next to their destination, so a rename never crosses
/// filesystems. A failure while staging leaves no file behind; a failure while
/// committing restores every document already replaced or removed.
pub fn publish(artifacts: &[Artifact], retire: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let destinations = artifacts.iter().map(|a| a.path.as_path());
    for path in destinations.chain(retire.iter().map(PathBuf::as_path)) {
        reject_directory(path)?;
    }

    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let dir = parent_dir(&artifact.path);
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        staged.push((stage(&dir, artifact)?, dir, artifact.path.as_path()));
    }

    let mut touched: Vec<Touched<'_>> = Vec::with_capacity(staged.len() + retire.len());
    for (tmp, dir, path) in staged {
        let backup = match set_aside(&dir, path) {
            Ok(backup) => backup,
            Err(e) => {
                roll_back(touched);
                return Err(e);
            }
        };
        if let Err(e) = tmp.persist(path) {
            touched.push(Touched {
                path,
                backup,
                replaced: false,
            });
            roll_back(touched);
            return Err(Error::io(path, e.error));
        }
        touched.push(Touched {
            path,
            backup,
            replaced: true,
        });
    }

    let mut removed = Vec::new();
    for path in retire {
        match set_aside(&parent_dir(path), path) {
            Ok(Some(backup)) => {
                removed.push(path);
                touched.push(Touched {
                    path,
                    backup: Some(backup),
                    replaced: false,
                });
            }
            Ok(None) => {}
            Err(e) => {
                roll_back(touched);
                return Err(e);
            }
        }
    }

    // Dropping the backups deletes the replaced and retired contents.
    let mut written = Vec::with_capacity(artifacts.len());
    for t in touched {
        if t.replaced {
            log::info!("wrote {}", t.path.display());
            written.push(t.path.to_path_buf());
        }
    }
    for path in removed {
        log::info!("removed stale {}", path.display());
    }
    Ok(written)
}
