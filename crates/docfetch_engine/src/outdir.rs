use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputDirError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), OutputDirError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| OutputDirError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(OutputDirError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| OutputDirError::OutputDir(e.to_string()))?;
    }
    // The fetch program writes here and the reaper deletes here.
    NamedTempFile::new_in(dir).map_err(|e| OutputDirError::OutputDir(e.to_string()))?;
    Ok(())
}

/// A file in the output directory that might be the artifact of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created: SystemTime,
}

/// Lists regular files in `dir` whose extension matches `extension`
/// (case-insensitive). A missing directory has no candidates.
///
/// Filesystems without birth times fall back to the modification time.
pub fn list_candidates(dir: &Path, extension: &str) -> io::Result<Vec<Candidate>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches_extension {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .unwrap_or(UNIX_EPOCH);
        candidates.push(Candidate {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
            size: meta.len(),
            created,
        });
    }
    Ok(candidates)
}
