//! File-browser operations over the media root.
//!
//! Plain filesystem calls with every client-supplied path resolved through
//! [`tcd_core::paths::resolve_within_root`] first. Listing enriches video
//! files with ffprobe metadata where available.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tcd_av::probe::{probe_metadata, MediaMetadata};
use tcd_av::tools::ToolRegistry;
use tcd_core::paths::{is_video_file, resolve_within_root};
use tcd_core::{Error, Result};

/// One entry in a directory listing.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    /// Last modification time, RFC 3339, when the platform reports one.
    pub modified: Option<String>,
    pub metadata: Option<MediaMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// How [`paste_entry`] transfers the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteMode {
    Copy,
    Move,
}

/// List a directory, directories first, then files, both name-sorted.
pub async fn list_dir(root: &Path, tools: &ToolRegistry, path: &Path) -> Result<Vec<FileEntry>> {
    let dir = resolve_within_root(root, path)?;

    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let full_path = entry.path();
        let Ok(meta) = entry.metadata().await else {
            // Unreadable entries are skipped, not fatal.
            continue;
        };

        let modified = meta
            .modified()
            .ok()
            .map(chrono::DateTime::<chrono::Utc>::from)
            .map(|t| t.to_rfc3339());

        let is_dir = meta.is_dir();
        let metadata = if !is_dir && is_video_file(&full_path) {
            probe_metadata(tools, &full_path).await
        } else {
            None
        };

        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: full_path.to_string_lossy().into_owned(),
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: if is_dir { 0 } else { meta.len() },
            modified,
            metadata,
        });
    }

    entries.sort_by(|a, b| {
        (a.kind != EntryKind::Directory)
            .cmp(&(b.kind != EntryKind::Directory))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    Ok(entries)
}

/// Rename an entry in place. `new_name` must be a bare file name.
pub fn rename_entry(root: &Path, path: &Path, new_name: &str) -> Result<PathBuf> {
    if new_name.is_empty() || new_name.contains(['/', '\\']) {
        return Err(Error::Validation(format!(
            "invalid file name '{new_name}'"
        )));
    }

    let old = resolve_within_root(root, path)?;
    let parent = old
        .parent()
        .ok_or_else(|| Error::Validation("cannot rename the media root".into()))?;
    let new = resolve_within_root(root, &parent.join(new_name))?;

    std::fs::rename(&old, &new)?;
    Ok(new)
}

/// Copy or move an entry into a target directory, keeping its file name.
pub async fn paste_entry(
    root: &Path,
    source: &Path,
    target_dir: &Path,
    mode: PasteMode,
) -> Result<PathBuf> {
    let source = resolve_within_root(root, source)?;
    let target_dir = resolve_within_root(root, target_dir)?;

    let file_name = source
        .file_name()
        .ok_or_else(|| Error::Validation("source has no file name".into()))?;
    let target = resolve_within_root(root, &target_dir.join(file_name))?;

    if target == source {
        return Err(Error::Conflict("source and target are the same file".into()));
    }

    match mode {
        PasteMode::Copy => {
            tokio::fs::copy(&source, &target).await?;
        }
        PasteMode::Move => {
            tokio::fs::rename(&source, &target).await?;
        }
    }

    Ok(target)
}

/// Delete a file or directory (recursively).
pub fn delete_entry(root: &Path, path: &Path) -> Result<()> {
    let resolved = resolve_within_root(root, path)?;

    let meta = std::fs::metadata(&resolved)?;
    if meta.is_dir() {
        std::fs::remove_dir_all(&resolved)?;
    } else {
        std::fs::remove_file(&resolved)?;
    }

    Ok(())
}
