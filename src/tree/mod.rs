//! Bookmark tree model and Chrome JSON parsing
//!
//! The tree is the immutable input to the processing engine: folders contain
//! an ordered list of entries, each either a bookmark or a nested folder, in
//! the order they appear in the source file. That stored order is what makes
//! traversal deterministic across runs.

mod parser;

pub use parser::{load_bookmarks, parse_bookmarks, ParseError};

use chrono::{DateTime, Utc};

/// A single bookmark: one URL with its display title
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub title: String,
    pub url: String,
    pub date_added: Option<DateTime<Utc>>,
}

/// One ordered child of a folder
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkEntry {
    Folder(BookmarkFolder),
    Bookmark(Bookmark),
}

/// A folder of bookmarks, possibly containing nested folders
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookmarkFolder {
    pub name: String,
    pub entries: Vec<BookmarkEntry>,
}

impl BookmarkFolder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Returns the direct sub-folders, in stored order
    pub fn folders(&self) -> impl Iterator<Item = &BookmarkFolder> {
        self.entries.iter().filter_map(|e| match e {
            BookmarkEntry::Folder(f) => Some(f),
            BookmarkEntry::Bookmark(_) => None,
        })
    }

    /// Returns the direct bookmarks, in stored order
    pub fn bookmarks(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter().filter_map(|e| match e {
            BookmarkEntry::Bookmark(b) => Some(b),
            BookmarkEntry::Folder(_) => None,
        })
    }

    /// Recursively counts bookmarks in this folder and all sub-folders
    pub fn count_bookmarks(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e {
                BookmarkEntry::Bookmark(_) => 1,
                BookmarkEntry::Folder(f) => f.count_bookmarks(),
            })
            .sum()
    }
}

/// One unit of work for the processing engine: a bookmark plus its position
/// in the tree. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub bookmark: Bookmark,

    /// Names of the ancestor folders, root first
    pub folder_path: Vec<String>,

    /// Index of this entry within its folder's entry list
    pub index: usize,

    /// Number of entries in the containing folder
    pub total_in_folder: usize,
}

impl WorkItem {
    /// Stable identity of the item; the URL is the dedup key everywhere
    pub fn url(&self) -> &str {
        &self.bookmark.url
    }

    pub fn title(&self) -> &str {
        &self.bookmark.title
    }
}
