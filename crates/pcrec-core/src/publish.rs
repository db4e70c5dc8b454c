//! Mirroring synced payloads to a directory for static consumers.

use crate::error::AppError;
use crate::models::{ConfigKey, Payload, SourcePayloads};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Writes `components.json` and `rules.json` to an optional directory.
///
/// A publisher without a location is disabled and never touches the
/// filesystem.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    location: Option<PathBuf>,
}

impl Publisher {
    pub fn new(location: Option<PathBuf>) -> Self {
        Self { location }
    }

    pub fn disabled() -> Self {
        Self { location: None }
    }

    /// Writes both payloads. Returns the directory written, or `None` when
    /// publishing is disabled.
    pub fn publish(&self, payloads: &SourcePayloads) -> Result<Option<PathBuf>, AppError> {
        let Some(dir) = &self.location else {
            return Ok(None);
        };

        std::fs::create_dir_all(dir).map_err(|e| AppError::PublishFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        for key in ConfigKey::ALL {
            write_artifact(&dir.join(key.file_name()), payloads.get(key))?;
        }

        info!(dir = %dir.display(), "Published configuration artifacts");
        Ok(Some(dir.clone()))
    }
}

/// Renders a payload the way static readers receive it: two-space indented,
/// UTF-8 left unescaped.
pub fn render_artifact(payload: &Payload) -> Result<Vec<u8>, AppError> {
    Ok(serde_json::to_vec_pretty(payload)?)
}

/// Writes to a uniquely named temporary sibling and renames it into place,
/// so readers see either the previous artifact or the new one. Concurrent
/// publishes never share a temporary file.
fn write_artifact(path: &Path, payload: &Payload) -> Result<(), AppError> {
    let failed = |e: std::io::Error| AppError::PublishFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let bytes = render_artifact(payload)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(failed)?;
    tmp.write_all(&bytes).map_err(failed)?;
    // Temp files are created owner-only; published artifacts must stay
    // readable by the static file server.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(failed)?;
    }
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}
