//! Markdown file writer
//!
//! Each bookmark becomes one markdown file inside a directory tree mirroring
//! its folder path. Folder and file names are sanitized for cross-platform
//! filesystems before use.

use crate::output::{OutputError, OutputResult, ProcessedPage, Writer};
use crate::tree::{BookmarkEntry, BookmarkFolder, WorkItem};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Characters rejected by at least one common filesystem
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest filename stem we will emit, leaving room for the `.md` extension
const MAX_STEM_BYTES: usize = 120;

/// Converts an arbitrary title into a safe file or directory name
///
/// Whitespace runs collapse to a single space, forbidden characters become
/// underscores, and the result is length-capped on a char boundary. An empty
/// or all-underscore result becomes `unnamed`.
pub fn sanitize_filename(name: &str) -> String {
    // Whitespace (including tabs and newlines) collapses before character
    // replacement, so control-class whitespace never turns into underscores
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");

    let replaced: String = collapsed
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == ' ');

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        return "unnamed".to_string();
    }

    if trimmed.len() <= MAX_STEM_BYTES {
        return trimmed.to_string();
    }
    let mut end = MAX_STEM_BYTES;
    while end > 0 && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_end().to_string()
}

/// [`Writer`] that produces a markdown hierarchy on the local filesystem
pub struct FileSystemWriter {
    output_dir: PathBuf,
    include_metadata: bool,
}

impl FileSystemWriter {
    pub fn new(output_dir: impl Into<PathBuf>, include_metadata: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            include_metadata,
        }
    }

    /// Pre-creates the directory tree for every folder in `root`
    ///
    /// Doing this up front means concurrent writers never race on
    /// `create_dir_all` for a shared ancestor.
    pub fn create_folder_structure(&self, root: &BookmarkFolder) -> OutputResult<()> {
        let base = self.output_dir.join(sanitize_filename(&root.name));
        std::fs::create_dir_all(&base)?;
        Self::create_subfolders(&base, root)?;
        tracing::debug!("Created folder structure under {}", base.display());
        Ok(())
    }

    fn create_subfolders(dir: &Path, folder: &BookmarkFolder) -> OutputResult<()> {
        for entry in &folder.entries {
            if let BookmarkEntry::Folder(child) = entry {
                let child_dir = dir.join(sanitize_filename(&child.name));
                std::fs::create_dir_all(&child_dir)?;
                Self::create_subfolders(&child_dir, child)?;
            }
        }
        Ok(())
    }

    /// Directory for an item's folder path, relative to the output root
    fn folder_dir(&self, folder_path: &[String]) -> PathBuf {
        let mut dir = self.output_dir.clone();
        for segment in folder_path {
            dir.push(sanitize_filename(segment));
        }
        dir
    }

    fn render(&self, page: &ProcessedPage) -> String {
        let mut md = String::new();

        if self.include_metadata {
            md.push_str("---\n");
            md.push_str(&format!("url: {}\n", page.url));
            md.push_str(&format!("title: \"{}\"\n", page.title.replace('"', "\\\"")));
            md.push_str(&format!(
                "date_processed: {}\n",
                page.fetched_at.to_rfc3339()
            ));
            md.push_str("status: success\n");
            md.push_str("---\n\n");
        }

        md.push_str(&format!("# {}\n\n", page.title));
        md.push_str(&page.summary);
        md.push_str("\n\n---\n\n");
        md.push_str(&format!("*Source: <{}>*\n", page.url));

        md
    }
}

#[async_trait]
impl Writer for FileSystemWriter {
    async fn write(&self, item: &WorkItem, page: &ProcessedPage) -> OutputResult<String> {
        let dir = self.folder_dir(&item.folder_path);
        let filename = format!("{}.md", sanitize_filename(&page.title));
        let path = dir.join(&filename);

        let content = self.render(page);

        // Folder pre-creation can miss folders added between parse and write
        let dir_clone = dir.clone();
        let path_clone = path.clone();
        tokio::task::spawn_blocking(move || -> OutputResult<()> {
            std::fs::create_dir_all(&dir_clone)?;
            std::fs::write(&path_clone, content)?;
            Ok(())
        })
        .await
        .map_err(|e| OutputError::InvalidPath(format!("Write task failed: {e}")))??;

        let relative = path
            .strip_prefix(&self.output_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        tracing::debug!("Wrote {}", relative);
        Ok(relative)
    }
}
