use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::Tables;
use crate::error::StoreError;

/// Reads a snapshot. A missing file yields empty tables, anything that does
/// not parse is an error.
#[instrument]
pub(super) async fn load(path: &Path) -> Result<Tables, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No snapshot found, starting with an empty store");
            return Ok(Tables::default());
        }
        Err(e) => {
            return Err(StoreError::Persistence(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        StoreError::Persistence(format!("malformed snapshot {}: {e}", path.display()))
    })
}

#[instrument(skip(tables))]
pub(super) async fn save(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(tables)
        .map_err(|e| StoreError::Persistence(format!("failed to encode snapshot: {e}")))?;

    write_atomic(path, &bytes).await.map_err(|e| {
        StoreError::Persistence(format!("failed to write {}: {e}", path.display()))
    })?;

    debug!(bytes = bytes.len(), "Snapshot written");
    Ok(())
}

/// Writes `bytes` next to `path` and renames the result over it, so readers
/// only ever see a complete file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_path(path);
    tokio::fs::write(&tmp_path, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
