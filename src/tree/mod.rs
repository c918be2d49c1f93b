//! The entity tree (cache).
//!
//! A persistent arena mapping hierarchical paths to entities. All creation
//! goes through [`Tree::get_component`] (get-or-create); [`Tree::resolve`] is
//! the strict read-only lookup; [`Tree::submit`] merges parsed submissions;
//! [`Tree::relative_link_address`] computes best-effort relative addresses
//! between two tree addresses for link generation.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::entity::{Entity, EntityId, Flags, Submission};
use crate::error::{Result, TagError};
use crate::path::{Delimiter, DocPath};
use crate::report::Diagnostics;

/// Sentinel address returned when link resolution fails at any step.
pub const DEAD_LINK: &str = "#dead-link";

/// The documentation tree. The sole shared mutable structure of a run;
/// threaded explicitly through parsing and rendering.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Entity>,
    /// (from, to) pairs already reported as dead links, to keep the log to
    /// one warning per distinct pair.
    warned_links: RefCell<HashSet<(String, String)>>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    pub const ROOT: EntityId = EntityId(0);

    pub fn new() -> Self {
        let root = Entity::new(Self::ROOT, None, None, String::new(), DocPath::root(), false);
        Tree {
            nodes: vec![root],
            warned_links: RefCell::new(HashSet::new()),
        }
    }

    pub(crate) fn node(&self, id: EntityId) -> &Entity {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.nodes[id.0]
    }

    /// Read access to an entity.
    pub fn entity(&self, id: EntityId) -> &Entity {
        self.node(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        self.nodes.len() <= 1
    }

    /// Get-or-create the entity at `path`. The only sanctioned creation path.
    pub fn get_component(&mut self, path: &DocPath) -> Result<EntityId> {
        let mut current = Self::ROOT;
        let mut prefix = DocPath::root();
        for seg in path.segments() {
            if let Some(existing) = self.node(current).child_compat(seg.delim, &seg.name) {
                prefix.push(
                    self.node(existing)
                        .path
                        .last()
                        .cloned()
                        .unwrap_or_else(|| seg.clone()),
                );
                current = existing;
                continue;
            }
            let delim = seg.delim.unwrap_or(Delimiter::Property);
            let mut created_seg = seg.clone();
            created_seg.delim = Some(delim);
            prefix.push(created_seg);
            let id = EntityId(self.nodes.len());
            let entity = Entity::new(
                id,
                Some(current),
                Some(delim),
                seg.name.clone(),
                prefix.clone(),
                seg.symbol.is_some(),
            );
            self.nodes.push(entity);
            self.node_mut(current).children[delim.index()].insert(seg.name.clone(), id);
            current = id;
        }
        Ok(current)
    }

    /// Strict read-only lookup. Fails with `InvalidPath` for an empty path or
    /// a nameless first segment, and `NotFound` when any segment is absent.
    pub fn resolve(&self, path: &DocPath) -> Result<EntityId> {
        if path.is_root() {
            return Err(TagError::InvalidPath("empty path".to_string()));
        }
        if path.first().map(|s| s.name.is_empty()).unwrap_or(true) {
            return Err(TagError::InvalidPath(format!(
                "first segment of `{}` has no name",
                path
            )));
        }
        let mut current = Self::ROOT;
        for seg in path.segments() {
            current = self
                .node(current)
                .child_compat(seg.delim, &seg.name)
                .ok_or_else(|| TagError::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Get-or-create then merge.
    pub fn submit(
        &mut self,
        path: &DocPath,
        submission: Submission,
        diag: &mut Diagnostics,
    ) -> Result<EntityId> {
        let id = self.get_component(path)?;
        self.merge_submission(id, submission, diag);
        Ok(id)
    }

    /// Ids from the root (exclusive) down to `id`, one per path segment.
    pub(crate) fn ancestor_chain(&self, id: EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            if cur == Self::ROOT {
                break;
            }
            chain.push(cur);
            cursor = self.node(cur).parent;
        }
        chain.reverse();
        chain
    }

    /// Best-effort relative address from one tree address to another.
    ///
    /// Never fails: any resolution error yields the [`DEAD_LINK`] sentinel,
    /// logged once per distinct (from, to) pair.
    pub fn relative_link_address(&self, from: &DocPath, to: &DocPath) -> String {
        match self.link_address(from, to) {
            Ok(addr) => addr,
            Err(err) => {
                let key = (from.to_string(), to.to_string());
                if self.warned_links.borrow_mut().insert(key) {
                    tracing::warn!(
                        from = %from,
                        to = %to,
                        "dead link: {}",
                        err
                    );
                }
                DEAD_LINK.to_string()
            }
        }
    }

    fn link_address(&self, from: &DocPath, to: &DocPath) -> Result<String> {
        // Follow alias chains (cycle-guarded) and honor remote redirects.
        let mut target_path = to.clone();
        let mut seen: HashSet<EntityId> = HashSet::new();
        let target = loop {
            let id = self.resolve(&target_path)?;
            if !seen.insert(id) {
                // Alias cycle: stop following and address the current node.
                break id;
            }
            let flags = Flags::from_modifiers(&self.node(id).modifiers);
            if let Some(remote) = flags.remote {
                return Ok(remote);
            }
            if let Some(alias) = flags.alias_of {
                target_path = alias;
                continue;
            }
            break id;
        };

        let resolved_path = self.node(target).path.clone();
        let chain = self.ancestor_chain(target);
        let common = from.common_prefix(&resolved_path);
        let ups = from.len().saturating_sub(common);
        let mut downs: Vec<String> = chain[common.min(chain.len())..]
            .iter()
            .map(|id| sanitize_name(&self.node(*id).name))
            .collect();

        // An entity without structural children has no page of its own;
        // address the parent's page with a same-page anchor.
        if !self.node(target).has_page_children() {
            let anchor = downs
                .pop()
                .unwrap_or_else(|| sanitize_name(&self.node(target).name));
            let mut base = "../".repeat(ups);
            base.push_str(&downs.join("/"));
            return Ok(if base.is_empty() {
                format!("#{}", anchor)
            } else {
                format!("{}#{}", base, anchor)
            });
        }

        let mut addr = "../".repeat(ups);
        addr.push_str(&downs.join("/"));
        if addr.is_empty() {
            addr = ".".to_string();
        }
        Ok(addr)
    }
}

/// Display name sanitized for use as a link address token.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "-".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Ctype, DocFragment, Modifier, Submission};
    use crate::path::parse_path;
    use crate::tag::ModifierKind;
    use pretty_assertions::assert_eq;

    fn p(s: &str) -> DocPath {
        parse_path(s, &DocPath::root(), Some(Delimiter::Property)).unwrap()
    }

    fn doc_sub(ctype: Ctype, text: &str) -> Submission {
        let mut s = Submission::new(ctype);
        s.docs.push(DocFragment {
            text: text.to_string(),
            link_context: DocPath::root(),
        });
        s
    }

    #[test]
    fn get_component_is_idempotent() {
        let mut tree = Tree::new();
        let a = tree.get_component(&p("Foo.Bar#baz")).unwrap();
        let b = tree.get_component(&p("Foo.Bar#baz")).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.len(), 4); // root + 3 created
    }

    #[test]
    fn resolve_unsubmitted_path_is_not_found() {
        let tree = Tree::new();
        match tree.resolve(&p("Ghost")) {
            Err(TagError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn resolve_empty_path_is_invalid() {
        let tree = Tree::new();
        match tree.resolve(&DocPath::root()) {
            Err(TagError::InvalidPath(_)) => {}
            other => panic!("expected InvalidPath, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn resolved_entity_path_matches() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        tree.submit(&p("Mod.Klass"), Submission::new(Ctype::Class), &mut diag)
            .unwrap();
        let id = tree.resolve(&p("Mod.Klass")).unwrap();
        assert_eq!(tree.entity(id).path.to_string(), "Mod.Klass");
    }

    #[test]
    fn doc_text_dedup_is_idempotent() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let path = p("Foo");
        tree.submit(&path, doc_sub(Ctype::Property, "Same text."), &mut diag)
            .unwrap();
        let id = tree
            .submit(&path, doc_sub(Ctype::Property, "Same text."), &mut diag)
            .unwrap();
        assert_eq!(tree.entity(id).docs.len(), 1);
    }

    #[test]
    fn incompatible_ctype_resubmission_keeps_first_and_reports_once() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let path = p("Thing");
        tree.submit(&path, Submission::new(Ctype::Class), &mut diag)
            .unwrap();
        let id = tree
            .submit(&path, Submission::new(Ctype::Module), &mut diag)
            .unwrap();
        assert_eq!(tree.entity(id).ctype, Some(Ctype::Class));
        assert_eq!(diag.errors().len(), 1);
    }

    #[test]
    fn compatible_ctype_reguess_takes_newer_value() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let path = p("Thing");
        tree.submit(&path, Submission::new(Ctype::Class), &mut diag)
            .unwrap();
        let id = tree
            .submit(&path, Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        assert_eq!(tree.entity(id).ctype, Some(Ctype::Property));
        assert!(!diag.has_errors());
    }

    #[test]
    fn api_marker_propagates_to_ancestors() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let mut sub = Submission::new(Ctype::Member);
        sub.modifiers.push(Modifier {
            kind: ModifierKind::Api,
            path: None,
            value: None,
        });
        tree.submit(&p("A.B#c"), sub, &mut diag).unwrap();
        let a = tree.resolve(&p("A")).unwrap();
        let b = tree.resolve(&p("A.B")).unwrap();
        assert!(tree.entity(a).is_api);
        assert!(tree.entity(b).is_api);
    }

    #[test]
    fn patches_modifier_eagerly_creates_target() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let mut sub = Submission::new(Ctype::Class);
        sub.modifiers.push(Modifier {
            kind: ModifierKind::Patches,
            path: Some(p("Elsewhere.Target")),
            value: None,
        });
        tree.submit(&p("Patcher"), sub, &mut diag).unwrap();
        assert!(tree.resolve(&p("Elsewhere.Target")).is_ok());
    }

    #[test]
    fn dead_link_sentinel_for_unresolvable_target() {
        let tree = Tree::new();
        let addr = tree.relative_link_address(&p("From"), &p("Missing.Target"));
        assert_eq!(addr, DEAD_LINK);
    }

    #[test]
    fn sibling_link_uses_anchor_on_shared_parent_page() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        tree.submit(&p("Mod.a"), Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        tree.submit(&p("Mod.b"), Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        // `b` has no children, so it is addressed as an anchor on Mod's page.
        let addr = tree.relative_link_address(&p("Mod"), &p("Mod.b"));
        assert_eq!(addr, "#b");
        // From a sibling leaf one level down, one up-step precedes the anchor.
        let addr = tree.relative_link_address(&p("Mod.a"), &p("Mod.b"));
        assert_eq!(addr, "../#b");
    }

    #[test]
    fn link_descends_into_child_pages() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        tree.submit(&p("Top.Klass#member"), Submission::new(Ctype::Member), &mut diag)
            .unwrap();
        // Klass has children and gets its own page.
        let addr = tree.relative_link_address(&p("Top"), &p("Top.Klass"));
        assert_eq!(addr, "Klass");
        // The member is an anchor on Klass's page.
        let addr = tree.relative_link_address(&p("Top"), &p("Top.Klass#member"));
        assert_eq!(addr, "Klass#member");
    }

    #[test]
    fn link_climbs_out_of_unrelated_subtrees() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        tree.submit(&p("A.B.c"), Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        tree.submit(&p("X.Y"), Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        let addr = tree.relative_link_address(&p("A.B.c"), &p("X.Y"));
        assert_eq!(addr, "../../../X#Y");
    }

    #[test]
    fn alias_links_resolve_to_alias_target_address() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        tree.submit(&p("Real.thing"), Submission::new(Ctype::Property), &mut diag)
            .unwrap();
        let mut alias = Submission::new(Ctype::Property);
        alias.modifiers.push(Modifier {
            kind: ModifierKind::Alias,
            path: Some(p("Real")),
            value: None,
        });
        tree.submit(&p("Shortcut"), alias, &mut diag).unwrap();

        let direct = tree.relative_link_address(&p("From"), &p("Real"));
        let via_alias = tree.relative_link_address(&p("From"), &p("Shortcut"));
        assert_eq!(direct, via_alias);
    }

    #[test]
    fn remote_redirect_short_circuits() {
        let mut tree = Tree::new();
        let mut diag = Diagnostics::new();
        let mut sub = Submission::new(Ctype::Class);
        sub.modifiers.push(Modifier {
            kind: ModifierKind::Remote,
            path: None,
            value: Some("https://elsewhere.example/doc".to_string()),
        });
        tree.submit(&p("External"), sub, &mut diag).unwrap();
        let addr = tree.relative_link_address(&p("From"), &p("External"));
        assert_eq!(addr, "https://elsewhere.example/doc");
    }
}
