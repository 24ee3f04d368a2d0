//! Static asset collection and API documentation export.
//!
//! Both steps write into shared volumes that the gateway serves directly:
//! collected static files under `STATIC_ROOT`, the OpenAPI document and
//! its two viewer pages under `DOCS_ROOT`.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::api::openapi;
use crate::error::{AppError, Result};

/// Recursively copy every file below `source` into `dest`.
///
/// Directories are created as needed and existing files are overwritten,
/// so re-running after a restart converges on the same tree. Returns the
/// number of files copied.
pub async fn collect_static(source: &Path, dest: &Path) -> Result<usize> {
    let meta = fs::metadata(source).await.map_err(|e| {
        AppError::Startup(format!(
            "static source {} unavailable: {}",
            source.display(),
            e
        ))
    })?;
    if !meta.is_dir() {
        return Err(AppError::Startup(format!(
            "static source {} is not a directory",
            source.display()
        )));
    }

    fs::create_dir_all(dest).await?;

    let mut copied = 0usize;
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((from_dir, to_dir)) = pending.pop() {
        let mut entries = fs::read_dir(&from_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = to_dir.join(entry.file_name());
            if file_type.is_dir() {
                fs::create_dir_all(&target).await?;
                pending.push((entry.path(), target));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &target).await?;
                copied += 1;
            } else {
                tracing::debug!(path = %entry.path().display(), "Skipping non-regular file");
            }
        }
    }

    tracing::info!(
        source = %source.display(),
        dest = %dest.display(),
        files = copied,
        "Static files collected"
    );
    Ok(copied)
}

/// Public URL of the exported document. The viewer pages are served at
/// `/api/docs/`, `/api/docs/redoc/` and `/api/docs/swagger/`, so they
/// reference it absolutely.
pub const EXPORTED_SCHEMA_URL: &str = "/api/docs/openapi.json";

/// Write `openapi.json`, `swagger.html` and `redoc.html` into `docs_root`.
pub async fn export_docs(docs_root: &Path) -> Result<()> {
    fs::create_dir_all(docs_root).await?;

    let spec = openapi::build_openapi()
        .to_pretty_json()
        .map_err(|e| AppError::Internal(format!("Failed to render OpenAPI document: {}", e)))?;

    fs::write(docs_root.join("openapi.json"), spec).await?;
    let swagger = openapi::swagger_page(EXPORTED_SCHEMA_URL);
    let redoc = openapi::redoc_page(EXPORTED_SCHEMA_URL);
    fs::write(docs_root.join("swagger.html"), swagger).await?;
    fs::write(docs_root.join("redoc.html"), redoc).await?;

    tracing::info!(docs_root = %docs_root.display(), "API documentation exported");
    Ok(())
}
