//! Resumable depth-first traversal over the bookmark tree
//!
//! The cursor yields every bookmark exactly once, in a fixed order: entries
//! of a folder in stored order, descending into a sub-folder before moving to
//! the next sibling. The order is a pure function of the tree, which is what
//! makes checkpoint positions meaningful across runs.
//!
//! Resume works by rebuilding the frame stack for a saved position. If the
//! saved position no longer matches the tree shape (folder renamed or
//! removed, sibling count changed), the cursor falls back to a full
//! enumeration and lets the processed/failed sets handle de-duplication.

use crate::checkpoint::CurrentPosition;
use crate::tree::{BookmarkEntry, BookmarkFolder, WorkItem};

/// One level of the depth-first walk: a folder and the index of the next
/// entry to visit within it.
struct Frame<'a> {
    folder: &'a BookmarkFolder,
    next: usize,
}

/// Lazy, deterministic, restartable enumeration of [`WorkItem`]s
pub struct TraversalCursor<'a> {
    stack: Vec<Frame<'a>>,

    /// Folder names for the frames currently on the stack, root first
    path: Vec<String>,
}

impl<'a> TraversalCursor<'a> {
    /// Starts a full traversal from the root
    pub fn new(root: &'a BookmarkFolder) -> Self {
        Self {
            stack: vec![Frame {
                folder: root,
                next: 0,
            }],
            path: vec![root.name.clone()],
        }
    }

    /// Starts a traversal at a saved position
    ///
    /// The position's item is re-emitted (it may or may not have completed
    /// before the save); the caller's processed set absorbs the duplicate.
    /// Falls back to a full traversal when the position cannot be mapped
    /// onto the current tree.
    pub fn resume(root: &'a BookmarkFolder, position: &CurrentPosition) -> Self {
        match Self::try_resume(root, position) {
            Some(cursor) => cursor,
            None => {
                tracing::warn!(
                    "Saved position {:?} no longer matches the tree, re-enumerating from the root",
                    position.folder_path
                );
                Self::new(root)
            }
        }
    }

    fn try_resume(root: &'a BookmarkFolder, position: &CurrentPosition) -> Option<Self> {
        if position.folder_path.first() != Some(&root.name) {
            return None;
        }

        let mut cursor = Self {
            stack: vec![Frame {
                folder: root,
                next: 0,
            }],
            path: vec![root.name.clone()],
        };

        // Descend along the saved path, leaving each ancestor frame pointing
        // just past the child we descended into so its remaining siblings
        // are still visited after the subtree finishes.
        for name in &position.folder_path[1..] {
            let frame = cursor.stack.last_mut()?;
            let child_index = frame.folder.entries.iter().position(
                |entry| matches!(entry, BookmarkEntry::Folder(f) if &f.name == name),
            )?;

            frame.next = child_index + 1;

            let child = match &frame.folder.entries[child_index] {
                BookmarkEntry::Folder(f) => f,
                BookmarkEntry::Bookmark(_) => return None,
            };

            cursor.stack.push(Frame {
                folder: child,
                next: 0,
            });
            cursor.path.push(child.name.clone());
        }

        // The folder must still have the shape recorded in the position
        let target = cursor.stack.last_mut()?;
        if target.folder.entries.len() != position.total_in_folder
            || position.index >= target.folder.entries.len()
        {
            return None;
        }
        target.next = position.index;

        Some(cursor)
    }
}

impl Iterator for TraversalCursor<'_> {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        loop {
            let frame = self.stack.last_mut()?;

            if frame.next >= frame.folder.entries.len() {
                self.stack.pop();
                self.path.pop();
                continue;
            }

            let index = frame.next;
            frame.next += 1;
            let total_in_folder = frame.folder.entries.len();

            match &frame.folder.entries[index] {
                BookmarkEntry::Bookmark(bookmark) => {
                    return Some(WorkItem {
                        bookmark: bookmark.clone(),
                        folder_path: self.path.clone(),
                        index,
                        total_in_folder,
                    });
                }
                BookmarkEntry::Folder(folder) => {
                    self.stack.push(Frame {
                        folder,
                        next: 0,
                    });
                    self.path.push(folder.name.clone());
                }
            }
        }
    }
}
