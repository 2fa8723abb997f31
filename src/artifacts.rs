//! Output CSV files handed to the downstream load service.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid output path: {0}")]
    InvalidPath(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub rows: u64,
    pub sha256: String,
}

/// Writes `headers` followed by every row, replacing `path` atomically.
pub fn write_csv_atomic<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<OutputArtifact, ArtifactError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ArtifactError::Io(err.into_error()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    write_atomic(path, &bytes)?;

    let artifact = OutputArtifact {
        path: path.to_path_buf(),
        rows: rows.len() as u64,
        sha256: sha256_hex(&bytes),
    };
    info!(
        component = "artifacts",
        event = "artifact.written",
        path = %artifact.path.display(),
        rows = artifact.rows,
        bytes = bytes.len(),
        sha256 = %artifact.sha256
    );
    Ok(artifact)
}

pub fn file_sha256_hex(path: &Path) -> Result<String, ArtifactError> {
    Ok(sha256_hex(&fs::read(path)?))
}

pub(crate) fn serialize_date_time<S: Serializer>(
    value: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(DATE_TIME_FORMAT))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ArtifactError::InvalidPath(path.to_path_buf()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}
