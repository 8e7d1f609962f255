//! Bulk import of tweet statuses from a directory of JSON files.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::client::DocumentClient;
use crate::error::{ConfigError, Error, Result};
use crate::models::TweeterStatus;
use crate::session::PartitionedSession;

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Statuses written to the store.
    pub imported: usize,
    /// Files that could not be read, parsed or stored.
    pub failed: Vec<PathBuf>,
}

/// Imports every `*.json` file in `dir` as one status into `scope_id`.
///
/// Files are processed in name order. A file that fails is logged and
/// recorded in the report; the run continues with the next one. Only
/// failing to list the directory aborts the import.
pub async fn import_directory<C: DocumentClient + 'static>(
    session: &PartitionedSession<C>,
    scope_id: &str,
    dir: impl AsRef<Path>,
) -> Result<ImportReport> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.as_ref())
        .await
        .map_err(ConfigError::Io)?;
    while let Some(entry) = entries.next_entry().await.map_err(ConfigError::Io)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut report = ImportReport::default();
    for path in paths {
        match import_file(session, scope_id, &path).await {
            Ok(status_id) => {
                info!(status_id, file = %path.display(), "imported status");
                report.imported += 1;
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "failed to import status");
                report.failed.push(path);
            }
        }
    }

    info!(
        imported = report.imported,
        failed = report.failed.len(),
        "import finished"
    );
    Ok(report)
}

async fn import_file<C: DocumentClient + 'static>(
    session: &PartitionedSession<C>,
    scope_id: &str,
    path: &Path,
) -> Result<i64> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(ConfigError::Io)?;
    let status: TweeterStatus =
        serde_json::from_str(&text).map_err(|e| Error::InvalidInput(e.to_string()))?;

    session.create_document(scope_id, status.to_document()?).await?;
    Ok(status.status_id)
}
