//! Utility functions for output naming, file cleanup and binary discovery

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Normalize a user-supplied output name
///
/// Appends `.{extension}` unless the name already ends with it. Names that are
/// empty or contain path separators are rejected so every job stays inside the
/// output directory.
///
/// # Examples
///
/// ```
/// use remux_dl::utils::normalize_output_name;
///
/// assert_eq!(normalize_output_name("lecture", "mp4").unwrap(), "lecture.mp4");
/// assert_eq!(normalize_output_name("lecture.mp4", "mp4").unwrap(), "lecture.mp4");
/// assert!(normalize_output_name("../lecture", "mp4").is_err());
/// ```
pub fn normalize_output_name(name: &str, extension: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0')
    {
        return Err(Error::InvalidName(name.to_string()));
    }

    let extension = extension.trim_start_matches('.');
    let suffix = format!(".{extension}");
    if name.ends_with(&suffix) {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}{suffix}"))
    }
}

/// Delete a partially written output file, absorbing every error
///
/// A missing file is not an error. Other failures are logged and swallowed.
/// Returns true if a file was removed.
pub async fn remove_partial_output(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed partial output");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove partial output"
            );
            false
        }
    }
}

/// Resolve the ffmpeg binary from configuration
///
/// An explicit `ffmpeg_path` wins. Otherwise PATH is searched with the `which`
/// crate when `search_path` is enabled.
pub fn find_ffmpeg(tools: &ToolsConfig) -> Result<PathBuf> {
    if let Some(path) = &tools.ffmpeg_path {
        return Ok(path.clone());
    }

    if tools.search_path {
        return which::which("ffmpeg")
            .map_err(|e| Error::ToolNotFound(format!("ffmpeg not found in PATH: {e}")));
    }

    Err(Error::ToolNotFound(
        "ffmpeg_path is not set and PATH search is disabled".to_string(),
    ))
}
