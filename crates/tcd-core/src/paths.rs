//! Media-root path confinement.
//!
//! Every path accepted from a client is resolved against the configured
//! media root and rejected if it escapes it. Resolution is lexical (no
//! symlink traversal): `..` components are collapsed before the prefix
//! check so `root/../etc` cannot slip through.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// File extensions treated as video sources in the browser listing.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// Lexically normalize a path: collapse `.` and `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Leading `..` on a relative path; keep it so the
                    // prefix check below fails.
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `candidate` within `root`.
///
/// Relative candidates are joined onto the root; absolute candidates must
/// already lie under it. Returns the normalized absolute path, or
/// [`Error::PathDenied`] if the result escapes the root.
pub fn resolve_within_root(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let resolved = normalize(&joined);
    let root = normalize(root);

    if resolved == root || resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(Error::PathDenied(format!(
            "{} is outside the media directory",
            candidate.display()
        )))
    }
}

/// Check if a path has a video file extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
