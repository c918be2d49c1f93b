//! Superclass resolution and the inherited member view.
//!
//! The view for an entity merges superclass views in declaration order,
//! so a later-declared superclass wins a name clash, and local children are
//! applied last. Unresolvable superclasses and inheritance cycles are logged
//! as warnings and skipped; they never abort a run.

use std::collections::{BTreeMap, HashSet};

use crate::entity::{Ctype, EntityId, Flags, Signature};
use crate::path::{Delimiter, DocPath};
use crate::report::Diagnostics;
use crate::tree::Tree;

/// One named entry in a merged member map.
#[derive(Debug, Clone)]
pub struct InheritedEntry {
    /// The declaring entity, which may live under an ancestor.
    pub id: EntityId,
    /// Parent path of the entry this one shadowed, when it overwrote an
    /// earlier-merged entry.
    pub overrides: Option<DocPath>,
}

/// Everything an entity gains from its superclass chain, keyed maps for
/// named children and ordered lists for signature data.
#[derive(Debug, Clone, Default)]
pub struct InheritedView {
    pub members: BTreeMap<String, InheritedEntry>,
    pub member_symbols: BTreeMap<String, InheritedEntry>,
    pub events: BTreeMap<String, InheritedEntry>,
    /// Borrowed from the nearest superclass counterpart when no local
    /// arguments exist. Never marked inherited downstream.
    pub arguments: Vec<EntityId>,
    pub returns: Vec<EntityId>,
    pub throws: Vec<EntityId>,
    pub signatures: Vec<Signature>,
    /// Spare docs adopted wholesale by an entity with no local content.
    pub adopted_spares: Vec<EntityId>,
}

impl Tree {
    /// Compute (and memoize) the inherited view for one entity. `visited`
    /// carries the ids already on the resolution stack; re-entering one is
    /// a cycle and that superclass edge is skipped with a warning.
    pub(crate) fn inherited_view(
        &mut self,
        id: EntityId,
        visited: &mut HashSet<EntityId>,
        diag: &mut Diagnostics,
    ) -> InheritedView {
        if let Some(cached) = &self.node(id).inherited_cache {
            return cached.clone();
        }

        let flags = match &self.node(id).flags {
            Some(f) => f.clone(),
            None => Flags::from_modifiers(&self.node(id).modifiers),
        };
        let own_path = self.node(id).path.clone();

        let mut view = InheritedView::default();
        for super_path in &flags.supers {
            let super_id = match self.resolve(super_path) {
                Ok(sid) => sid,
                Err(err) => {
                    diag.warning(format!(
                        "skipping unresolvable superclass `{super_path}` of `{own_path}`: {err}"
                    ));
                    continue;
                }
            };
            if !visited.insert(super_id) {
                diag.warning(format!(
                    "inheritance cycle through `{}` reached from `{own_path}`, skipping",
                    self.node(super_id).path
                ));
                continue;
            }
            let super_view = self.inherited_view(super_id, visited, diag);
            visited.remove(&super_id);
            self.merge_member_maps(&mut view, &super_view);
        }

        // Locals last, shadowing anything merged from ancestors.
        let locals: Vec<(String, EntityId)> = self.node(id).children
            [Delimiter::Member.index()]
        .iter()
        .map(|(name, cid)| (name.clone(), *cid))
        .collect();
        for (name, cid) in locals {
            let child = self.node(cid);
            let map = if child.is_symbol {
                &mut view.member_symbols
            } else if child.ctype == Some(Ctype::Event) {
                &mut view.events
            } else {
                &mut view.members
            };
            insert_shadowing(self, map, name, cid);
        }

        // Signature data borrows from the nearest structural sibling when
        // nothing is declared locally.
        let has_local_signature = !self.node(id).signatures.is_empty()
            || !self.node(id).children[Delimiter::Argument.index()].is_empty()
            || !self.node(id).children[Delimiter::Return.index()].is_empty();
        if !has_local_signature {
            if let Some(sib) = self.structural_sibling(id) {
                if self.is_callable(sib) {
                    view.arguments = self.node(sib).children[Delimiter::Argument.index()]
                        .values()
                        .copied()
                        .collect();
                    view.returns = self.node(sib).children[Delimiter::Return.index()]
                        .values()
                        .copied()
                        .collect();
                    view.throws = self.node(sib).children[Delimiter::Spare.index()]
                        .values()
                        .copied()
                        .filter(|c| self.node(*c).ctype == Some(Ctype::Throws))
                        .collect();
                    view.signatures = self.node(sib).signatures.clone();
                }
            }
        }

        // A completely empty override adopts its counterpart's spare docs.
        if self.node(id).is_locally_empty() {
            if let Some(sib) = self.structural_sibling(id) {
                // The counterpart may not have been finalized yet; make sure
                // its summary/details spares exist before adopting them.
                self.synthesize_spares(sib);
                view.adopted_spares = self.node(sib).children[Delimiter::Spare.index()]
                    .values()
                    .copied()
                    .filter(|c| self.node(*c).ctype != Some(Ctype::Throws))
                    .collect();
            }
        }

        // Only a view computed from this entity's own perspective is worth
        // keeping. Under a deeper walk a cycle cut may have truncated it,
        // and that truncation belongs to the walk, not to the entity.
        if visited.len() == 1 {
            self.node_mut(id).inherited_cache = Some(view.clone());
        }
        view
    }

    fn merge_member_maps(&self, view: &mut InheritedView, incoming: &InheritedView) {
        for (map, from) in [
            (&mut view.members, &incoming.members),
            (&mut view.member_symbols, &incoming.member_symbols),
            (&mut view.events, &incoming.events),
        ] {
            for (name, entry) in from {
                insert_shadowing(self, map, name.clone(), entry.id);
            }
        }
    }

    /// The same-named, same-delimiter child of the nearest superclass of this
    /// entity's parent. "Nearest" walks the parent's superclass list in
    /// reverse declaration order, depth-first.
    pub(crate) fn structural_sibling(&self, id: EntityId) -> Option<EntityId> {
        let entity = self.node(id);
        let parent = entity.parent?;
        if parent == Self::ROOT {
            return None;
        }
        let delim = entity.delim?;
        let name = entity.name.clone();
        let mut seen = HashSet::new();
        seen.insert(parent);
        self.sibling_in_chain(parent, delim, &name, &mut seen)
    }

    fn sibling_in_chain(
        &self,
        class_id: EntityId,
        delim: Delimiter,
        name: &str,
        seen: &mut HashSet<EntityId>,
    ) -> Option<EntityId> {
        let flags = match &self.node(class_id).flags {
            Some(f) => f.clone(),
            None => Flags::from_modifiers(&self.node(class_id).modifiers),
        };
        for super_path in flags.supers.iter().rev() {
            let Ok(super_id) = self.resolve(super_path) else {
                continue;
            };
            if !seen.insert(super_id) {
                continue;
            }
            if let Some(found) = self.node(super_id).child(delim, name) {
                return Some(found);
            }
            if let Some(found) = self.sibling_in_chain(super_id, delim, name, seen) {
                return Some(found);
            }
        }
        None
    }
}

/// Insert an entry, recording the parent path of whatever it shadowed.
fn insert_shadowing(
    tree: &Tree,
    map: &mut BTreeMap<String, InheritedEntry>,
    name: String,
    id: EntityId,
) {
    let overrides = match map.get(&name) {
        // The same entity arriving again keeps its earlier back-reference.
        Some(old) if old.id == id => return,
        Some(old) => Some(tree.node(old.id).path.parent()),
        None => None,
    };
    map.insert(name, InheritedEntry { id, overrides });
}
