//! Two-phase entity finalize.
//!
//! Phase 1 runs leaves-first: summary/details spare children are synthesized
//! from raw doc text, every child finalizes before its parent proceeds, and
//! empty module chains are pruned from navigation. Phase 2 is the top-down
//! projection into an immutable [`FinalView`]: modifier flags, resolved value
//! types, callable classification, the inherited member view, and the sorted,
//! visibility-filtered child buckets.
//!
//! Scalar flag interpretation happens at finalize entry, before any child
//! work is dispatched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entity::{Ctype, EntityId, Flags, Signature};
use crate::error::Result;
use crate::path::{Delimiter, DocPath, Generic};
use crate::report::Diagnostics;
use crate::tree::Tree;

/// Visibility switches for a run, passed to [`Tree::finalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// Include `@private` entities.
    #[serde(default)]
    pub show_private: bool,
    /// Include `@internal` entities.
    #[serde(default)]
    pub show_internal: bool,
    /// Drop everything outside the `@api` surface.
    #[serde(default)]
    pub api_only: bool,
}

/// Callable classification of a finalized entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Plain,
    Function,
    Class,
}

/// A value type with its reference resolved against the tree where possible.
/// Resolution failure is silent; the raw path is kept as a fallback.
#[derive(Debug, Clone, Serialize)]
pub struct FinalValtype {
    pub name: String,
    pub path: DocPath,
    /// Canonical path of the resolved target entity, when resolution worked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<DocPath>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_pointer: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_array: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<Generic>,
}

/// One child as it appears in a rendering bucket.
#[derive(Debug, Clone, Serialize)]
pub struct FinalChild {
    pub name: String,
    /// True path of the child entity (an ancestor's path for inherited
    /// copies).
    pub path: DocPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctype: Option<Ctype>,
    /// The declaring ancestor, for copies not locally owned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<DocPath>,
    /// The shadowed ancestor, when this entry overwrote an inherited one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<DocPath>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_callable: bool,
}

/// Child collections split into rendering buckets. Callable and non-callable
/// children of the same containment kind land in separate buckets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChildBuckets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_properties: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub static_methods: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_symbols: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spares: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<FinalChild>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub throws: Vec<FinalChild>,
}

impl ChildBuckets {
    fn sort(&mut self) {
        for bucket in [
            &mut self.modules,
            &mut self.static_properties,
            &mut self.static_methods,
            &mut self.members,
            &mut self.methods,
            &mut self.member_symbols,
            &mut self.events,
            &mut self.spares,
            &mut self.arguments,
            &mut self.returns,
            &mut self.throws,
        ] {
            bucket.sort_by_key(|c| c.name.to_lowercase());
        }
    }
}

/// Immutable rendering-ready snapshot of one entity.
#[derive(Debug, Clone, Serialize)]
pub struct FinalView {
    pub name: String,
    pub path: DocPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctype: Option<Ctype>,
    pub classification: Classification,
    pub flags: Flags,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_api: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valtypes: Vec<FinalValtype>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Signature>,
    pub children: ChildBuckets,
    pub has_renderable_children: bool,
}

impl Tree {
    /// Finalize the whole tree: strictly leaves-first, then per-entity
    /// projection. Runs exactly once per entity; repeated calls are no-ops.
    pub fn finalize(&mut self, opts: &DisplayOptions, diag: &mut Diagnostics) -> Result<()> {
        let roots = self.node(Self::ROOT).child_ids();
        for id in roots {
            self.finalize_entity(id, opts, diag);
        }
        Ok(())
    }

    fn finalize_entity(&mut self, id: EntityId, opts: &DisplayOptions, diag: &mut Diagnostics) {
        if self.node(id).finalized.is_some() {
            return;
        }

        // Flags are interpreted at call time, before child dispatch.
        let flags = Flags::from_modifiers(&self.node(id).modifiers);
        self.node_mut(id).flags = Some(flags);

        // Phase 1.
        self.synthesize_spares(id);
        let children = self.node(id).child_ids();
        for child in &children {
            self.finalize_entity(*child, opts, diag);
        }
        self.prune_empty_modules(id);

        // Phase 2.
        let view = self.project(id, opts, diag);
        self.node_mut(id).finalized = Some(view);
    }

    /// Split raw doc text into `summary` and `details` spare children,
    /// reusing explicitly declared ones. Spare nodes never do this to their
    /// own text.
    pub(crate) fn synthesize_spares(&mut self, id: EntityId) {
        let entity = self.node(id);
        if matches!(entity.ctype, Some(Ctype::Spare) | Some(Ctype::Throws)) {
            return;
        }
        if entity.docs.is_empty() {
            return;
        }
        let link_context = entity.docs[0].link_context.clone();
        let full: String = entity
            .docs
            .iter()
            .map(|d| d.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let (summary, details) = split_summary(&full);

        self.ensure_spare(id, "summary", summary, &link_context);
        if let Some(details) = details {
            self.ensure_spare(id, "details", details, &link_context);
        }
    }

    fn ensure_spare(&mut self, id: EntityId, name: &str, text: String, link_context: &DocPath) {
        if self.node(id).child(Delimiter::Spare, name).is_some() {
            // Declared explicitly; the author's text wins.
            return;
        }
        let mut path = self.node(id).path.clone();
        path.push(crate::path::Segment::new(Some(Delimiter::Spare), name));
        let spare_id = match self.get_component(&path) {
            Ok(sid) => sid,
            Err(_) => return,
        };
        let spare = self.node_mut(spare_id);
        spare.ctype = Some(Ctype::Spare);
        spare.docs.push(crate::entity::DocFragment {
            text,
            link_context: link_context.clone(),
        });
    }

    /// A module whose only descendants are other empty modules renders
    /// nothing; mark it so navigation can skip the whole chain.
    fn prune_empty_modules(&mut self, id: EntityId) {
        if self.node(id).ctype != Some(Ctype::Module) {
            return;
        }
        let renderable = self.node(id).child_ids().iter().any(|c| {
            let child = self.node(*c);
            !(child.ctype == Some(Ctype::Module) && !child.renderable_children)
        });
        self.node_mut(id).renderable_children = renderable;
    }

    /// Whether an entity reads as callable: an explicit callback, or anything
    /// with declared arguments, returns, throws, or signature variants.
    pub(crate) fn is_callable(&self, id: EntityId) -> bool {
        let e = self.node(id);
        if matches!(e.ctype, Some(Ctype::Callback)) {
            return true;
        }
        if !e.signatures.is_empty() {
            return true;
        }
        if !e.children[Delimiter::Argument.index()].is_empty()
            || !e.children[Delimiter::Return.index()].is_empty()
        {
            return true;
        }
        e.children[Delimiter::Spare.index()]
            .values()
            .any(|c| self.node(*c).ctype == Some(Ctype::Throws))
    }

    fn visible(&self, id: EntityId, opts: &DisplayOptions) -> bool {
        let e = self.node(id);
        let flags = match &e.flags {
            Some(f) => f.clone(),
            None => Flags::from_modifiers(&e.modifiers),
        };
        if flags.is_private && !opts.show_private {
            return false;
        }
        if flags.is_internal && !opts.show_internal {
            return false;
        }
        if opts.api_only && !e.is_api {
            return false;
        }
        true
    }

    fn final_child(
        &self,
        owner: EntityId,
        child: EntityId,
        overrides: Option<DocPath>,
        markable: bool,
    ) -> FinalChild {
        let c = self.node(child);
        let local = c.parent == Some(owner);
        let inherited_from = if !local && markable {
            Some(c.path.parent())
        } else {
            None
        };
        FinalChild {
            name: c.name.clone(),
            path: c.path.clone(),
            ctype: c.ctype,
            inherited_from,
            overrides,
            is_callable: self.is_callable(child),
        }
    }

    fn project(&mut self, id: EntityId, opts: &DisplayOptions, diag: &mut Diagnostics) -> FinalView {
        let flags = self
            .node(id)
            .flags
            .clone()
            .unwrap_or_default();

        // Resolve value-type references best-effort; failure falls back to
        // the raw path and must not abort finalize.
        let valtypes: Vec<FinalValtype> = self
            .node(id)
            .valtypes
            .clone()
            .into_iter()
            .map(|vt| {
                let link = self
                    .resolve(&vt.path)
                    .ok()
                    .map(|rid| self.node(rid).path.clone());
                FinalValtype {
                    name: vt.name,
                    path: vt.path,
                    link,
                    is_pointer: vt.is_pointer,
                    is_array: vt.is_array,
                    generics: vt.generics,
                }
            })
            .collect();

        let mut visited = HashSet::new();
        visited.insert(id);
        let inherited = self.inherited_view(id, &mut visited, diag);

        let mut buckets = ChildBuckets::default();

        // Static (`.`) children are local-only: modules split out by ctype,
        // the rest by callability.
        let statics: Vec<EntityId> = self.node(id).children[Delimiter::Property.index()]
            .values()
            .copied()
            .collect();
        for cid in statics {
            if !self.visible(cid, opts) {
                continue;
            }
            let fc = self.final_child(id, cid, None, true);
            if self.node(cid).ctype == Some(Ctype::Module) {
                buckets.modules.push(fc);
            } else if fc.is_callable {
                buckets.static_methods.push(fc);
            } else {
                buckets.static_properties.push(fc);
            }
        }

        // Instance members, symbols, and events come from the inherited view
        // (ancestors merged, locals last).
        for entry in inherited.members.values() {
            if !self.visible(entry.id, opts) {
                continue;
            }
            let fc = self.final_child(id, entry.id, entry.overrides.clone(), true);
            if fc.is_callable {
                buckets.methods.push(fc);
            } else {
                buckets.members.push(fc);
            }
        }
        for entry in inherited.member_symbols.values() {
            if self.visible(entry.id, opts) {
                let fc = self.final_child(id, entry.id, entry.overrides.clone(), true);
                buckets.member_symbols.push(fc);
            }
        }
        for entry in inherited.events.values() {
            if self.visible(entry.id, opts) {
                let fc = self.final_child(id, entry.id, entry.overrides.clone(), true);
                buckets.events.push(fc);
            }
        }

        // Spares and throws: local children, plus wholesale-adopted spares
        // for entities with no local content.
        let spares: Vec<EntityId> = self.node(id).children[Delimiter::Spare.index()]
            .values()
            .copied()
            .collect();
        for cid in spares {
            if !self.visible(cid, opts) {
                continue;
            }
            let fc = self.final_child(id, cid, None, true);
            if self.node(cid).ctype == Some(Ctype::Throws) {
                buckets.throws.push(fc);
            } else {
                buckets.spares.push(fc);
            }
        }
        for cid in &inherited.adopted_spares {
            if self.visible(*cid, opts) {
                buckets
                    .spares
                    .push(self.final_child(id, *cid, None, true));
            }
        }

        // Arguments and returns are never marked inherited, even when they
        // were borrowed from a structural sibling.
        let local_args: Vec<EntityId> = self.node(id).children[Delimiter::Argument.index()]
            .values()
            .copied()
            .collect();
        let local_rets: Vec<EntityId> = self.node(id).children[Delimiter::Return.index()]
            .values()
            .copied()
            .collect();
        let args = if local_args.is_empty() {
            inherited.arguments.clone()
        } else {
            local_args
        };
        let rets = if local_rets.is_empty() {
            inherited.returns.clone()
        } else {
            local_rets
        };
        for cid in args {
            if self.visible(cid, opts) {
                buckets.arguments.push(self.final_child(id, cid, None, false));
            }
        }
        for cid in rets {
            if self.visible(cid, opts) {
                buckets.returns.push(self.final_child(id, cid, None, false));
            }
        }
        if buckets.throws.is_empty() {
            for cid in &inherited.throws {
                if self.visible(*cid, opts) {
                    buckets.throws.push(self.final_child(id, *cid, None, false));
                }
            }
        }

        buckets.sort();

        let signatures = if self.node(id).signatures.is_empty() {
            inherited.signatures.clone()
        } else {
            self.node(id).signatures.clone()
        };

        let callable = matches!(self.node(id).ctype, Some(Ctype::Callback))
            || !signatures.is_empty()
            || !buckets.arguments.is_empty()
            || !buckets.returns.is_empty()
            || !buckets.throws.is_empty();
        let has_members = !buckets.members.is_empty()
            || !buckets.methods.is_empty()
            || !buckets.member_symbols.is_empty();
        let classlike = matches!(self.node(id).ctype, Some(Ctype::Class))
            || (self.node(id).ctype != Some(Ctype::Module)
                && (!flags.supers.is_empty() || !flags.interfaces.is_empty() || has_members));
        let classification = if classlike {
            Classification::Class
        } else if callable {
            Classification::Function
        } else {
            Classification::Plain
        };

        let summary = self.spare_text(id, "summary");
        let details = self.spare_text(id, "details");
        let entity = self.node(id);

        FinalView {
            name: entity.name.clone(),
            path: entity.path.clone(),
            ctype: entity.ctype,
            classification,
            flags,
            is_api: entity.is_api,
            summary,
            details,
            valtypes,
            signatures,
            children: buckets,
            has_renderable_children: entity.renderable_children && entity.has_children(),
        }
    }

    fn spare_text(&self, id: EntityId, name: &str) -> Option<String> {
        let sid = self.node(id).child(Delimiter::Spare, name)?;
        let spare = self.node(sid);
        if spare.docs.is_empty() {
            return None;
        }
        Some(
            spare
                .docs
                .iter()
                .map(|d| d.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        )
    }
}

/// First paragraph becomes the summary; the rest, if any, the details.
fn split_summary(text: &str) -> (String, Option<String>) {
    let trimmed = text.trim();
    match find_paragraph_break(trimmed) {
        Some(idx) => {
            let summary = trimmed[..idx].trim().to_string();
            let details = trimmed[idx..].trim().to_string();
            let details = if details.is_empty() {
                None
            } else {
                Some(details)
            };
            (summary, details)
        }
        None => (trimmed.to_string(), None),
    }
}

fn find_paragraph_break(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() && offset > 0 {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
