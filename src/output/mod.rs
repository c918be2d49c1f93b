//! Aggregated JSON output.
//!
//! The document mirrors the entity hierarchy: one page per entity that has
//! children, leaf entities inlined into their parent page. Every bucketed
//! child carries a relative link address computed against the page it is
//! rendered on, so a downstream renderer never touches the tree itself.

use std::collections::BTreeMap;
use std::fs;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::OutputConfig;
use crate::entity::{EntityId, FinalView};
use crate::error::Result;
use crate::tree::Tree;

#[derive(Debug, Serialize)]
pub struct Document {
    pub generated_at: String,
    pub generator: String,
    pub stats: Stats,
    pub pages: Vec<Page>,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub entities: usize,
    pub pages: usize,
}

#[derive(Debug, Serialize)]
pub struct Page {
    #[serde(flatten)]
    pub view: FinalView,
    /// Relative address for every child listed in the view's buckets, keyed
    /// by the child's canonical path.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<Page>,
}

/// Project the finalized tree into an output document.
pub fn build_document(tree: &Tree) -> Document {
    let mut pages = Vec::new();
    for id in tree.entity(Tree::ROOT).child_ids() {
        if let Some(page) = build_page(tree, id) {
            pages.push(page);
        }
    }
    pages.sort_by_key(|p| p.view.name.to_lowercase());
    let page_count = pages.iter().map(count_pages).sum();

    Document {
        generated_at: Utc::now().to_rfc3339(),
        generator: format!("tagtree {}", crate::VERSION),
        stats: Stats {
            entities: tree.len().saturating_sub(1),
            pages: page_count,
        },
        pages,
    }
}

/// Serialize the document to the configured path. Write failures are fatal.
pub fn write_document(tree: &Tree, config: &OutputConfig) -> Result<()> {
    let document = build_document(tree);
    let json = if config.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&config.path, json)?;
    info!(path = %config.path.display(), pages = document.stats.pages, "output written");
    Ok(())
}

fn build_page(tree: &Tree, id: EntityId) -> Option<Page> {
    let entity = tree.entity(id);
    let view = entity.finalized.clone()?;

    let mut links = BTreeMap::new();
    for child in [
        &view.children.modules,
        &view.children.static_properties,
        &view.children.static_methods,
        &view.children.members,
        &view.children.methods,
        &view.children.member_symbols,
        &view.children.events,
        &view.children.spares,
        &view.children.arguments,
        &view.children.returns,
        &view.children.throws,
    ]
    .into_iter()
    .flatten()
    {
        links.insert(
            child.path.to_string(),
            tree.relative_link_address(&view.path, &child.path),
        );
    }

    let mut pages = Vec::new();
    for child_id in entity.child_ids() {
        if tree.entity(child_id).has_page_children() {
            if let Some(page) = build_page(tree, child_id) {
                pages.push(page);
            }
        }
    }
    pages.sort_by_key(|p| p.view.name.to_lowercase());

    Some(Page { view, links, pages })
}

fn count_pages(page: &Page) -> usize {
    1 + page.pages.iter().map(count_pages).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::DisplayOptions;
    use crate::parse::parse_file;
    use crate::path::DocPath;
    use crate::report::Diagnostics;

    fn tree_from(src: &str) -> Tree {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let outcome = parse_file(src, &DocPath::root()).unwrap();
        for (path, sub) in outcome.submissions {
            tree.submit(&path, sub, &mut diag).unwrap();
        }
        tree.finalize(&DisplayOptions::default(), &mut diag).unwrap();
        assert!(!diag.has_errors());
        tree
    }

    #[test]
    fn document_nests_pages_by_hierarchy() {
        let tree = tree_from(
            "/** @module App\nTop.\n*/\n/** @class Widget\nDoc.\n@member/String Widget#label\nLabel.\n*/",
        );
        let doc = build_document(&tree);
        assert_eq!(doc.pages.len(), 1);
        let app = &doc.pages[0];
        assert_eq!(app.view.name, "App");
        // Widget has children, so it gets its own nested page.
        assert_eq!(app.pages.len(), 1);
        assert_eq!(app.pages[0].view.path.to_string(), "App.Widget");
    }

    #[test]
    fn links_are_relative_to_the_page() {
        let tree = tree_from(
            "/** @class Widget\nDoc.\n@member/String Widget#label\nLabel.\n*/",
        );
        let doc = build_document(&tree);
        let widget = &doc.pages[0];
        let addr = widget.links.get("Widget#label").unwrap();
        // A childless member is an anchor on its parent's page.
        assert_eq!(addr, "#label");
    }

    #[test]
    fn write_creates_missing_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let tree = tree_from("/** @class Solo\nDoc.\n*/");
        let config = Config {
            output: crate::config::OutputConfig {
                path: dir.path().join("nested/out/doc.json"),
                pretty: false,
            },
            ..Config::default()
        };
        write_document(&tree, &config.output).unwrap();
        let written = fs::read_to_string(dir.path().join("nested/out/doc.json")).unwrap();
        assert!(written.contains("\"Solo\""));
    }
}
