//! Mermaid diagram generation
//!
//! Renders the bookmark tree as a Mermaid flowchart so the export ships with
//! a visual map of its structure. Large trees are cut off at a node budget
//! with an explicit truncation marker, since Mermaid renderers choke on
//! thousands of nodes.

use crate::tree::{BookmarkEntry, BookmarkFolder};

/// Upper bound on rendered nodes, folders and bookmarks combined
const MAX_NODES: usize = 200;

/// Longest label before truncation with an ellipsis
const MAX_LABEL_CHARS: usize = 40;

/// Renders `root` as a Mermaid `flowchart TD` document
pub fn generate_diagram(root: &BookmarkFolder) -> String {
    let mut out = String::from("```mermaid\nflowchart TD\n");
    let mut counter = 0usize;

    let root_id = next_id(&mut counter);
    out.push_str(&format!(
        "    {root_id}[\"{}\"]\n",
        escape_label(&root.name)
    ));

    let mut truncated = false;
    render_children(root, &root_id, &mut out, &mut counter, &mut truncated);

    if truncated {
        let marker = next_id(&mut counter);
        out.push_str(&format!("    {marker}[\"... truncated\"]\n"));
        out.push_str(&format!("    {root_id} --> {marker}\n"));
    }

    out.push_str("```\n");
    out
}

fn render_children(
    folder: &BookmarkFolder,
    parent_id: &str,
    out: &mut String,
    counter: &mut usize,
    truncated: &mut bool,
) {
    for entry in &folder.entries {
        if *counter >= MAX_NODES {
            *truncated = true;
            return;
        }

        match entry {
            BookmarkEntry::Folder(child) => {
                let id = next_id(counter);
                out.push_str(&format!("    {id}[\"{}\"]\n", escape_label(&child.name)));
                out.push_str(&format!("    {parent_id} --> {id}\n"));
                render_children(child, &id, out, counter, truncated);
            }
            BookmarkEntry::Bookmark(bookmark) => {
                let id = next_id(counter);
                out.push_str(&format!(
                    "    {id}([\"{}\"])\n",
                    escape_label(&bookmark.title)
                ));
                out.push_str(&format!("    {parent_id} --> {id}\n"));
            }
        }
    }
}

fn next_id(counter: &mut usize) -> String {
    let id = format!("n{counter}");
    *counter += 1;
    id
}

/// Strips characters Mermaid treats as syntax and caps label length
fn escape_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|c| !matches!(c, '"' | '[' | ']' | '(' | ')' | '{' | '}' | '<' | '>' | '`'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return "untitled".to_string();
    }

    if cleaned.chars().count() <= MAX_LABEL_CHARS {
        cleaned.to_string()
    } else {
        let prefix: String = cleaned.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}...", prefix.trim_end())
    }
}
