//! Entity nodes and submission merging.
//!
//! An entity is one documented unit in the tree. It accumulates doc
//! fragments, value types, modifiers, and children across any number of
//! submissions, then produces an immutable [`FinalView`] snapshot during
//! finalize.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::TagError;
use crate::path::{Delimiter, DocPath, Valtype};
use crate::report::Diagnostics;
use crate::tag::ModifierKind;
use crate::tree::Tree;

pub mod finalize;
pub mod inherit;

pub use finalize::{
    ChildBuckets, Classification, DisplayOptions, FinalChild, FinalValtype, FinalView,
};
pub use inherit::{InheritedEntry, InheritedView};

/// Arena handle for an entity. `get_component` idempotence means: the same
/// path always yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

/// Entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ctype {
    Property,
    Member,
    Spare,
    Module,
    Class,
    Argument,
    Return,
    Callback,
    Event,
    Throws,
    Args,
    Kwargs,
    Kwarg,
}

/// Delimiter class used for merge compatibility. Two ctypes may re-guess each
/// other only within one class; modules are their own class even though they
/// share the `.` path delimiter with properties and classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatClass {
    PropertyLike,
    ModuleLike,
    MemberLike,
    SpareLike,
    ArgumentLike,
    ReturnLike,
}

impl Ctype {
    /// Path delimiter a declaration of this kind defaults to.
    pub fn default_delimiter(self) -> Delimiter {
        match self {
            Ctype::Property | Ctype::Module | Ctype::Class => Delimiter::Property,
            Ctype::Member | Ctype::Event => Delimiter::Member,
            Ctype::Spare | Ctype::Throws => Delimiter::Spare,
            Ctype::Argument | Ctype::Callback | Ctype::Args | Ctype::Kwargs | Ctype::Kwarg => {
                Delimiter::Argument
            }
            Ctype::Return => Delimiter::Return,
        }
    }

    pub fn compat_class(self) -> CompatClass {
        match self {
            Ctype::Property | Ctype::Class => CompatClass::PropertyLike,
            Ctype::Module => CompatClass::ModuleLike,
            Ctype::Member | Ctype::Event => CompatClass::MemberLike,
            Ctype::Spare | Ctype::Throws => CompatClass::SpareLike,
            Ctype::Argument | Ctype::Callback | Ctype::Args | Ctype::Kwargs | Ctype::Kwarg => {
                CompatClass::ArgumentLike
            }
            Ctype::Return => CompatClass::ReturnLike,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Ctype::Property => "property",
            Ctype::Member => "member",
            Ctype::Spare => "spare",
            Ctype::Module => "module",
            Ctype::Class => "class",
            Ctype::Argument => "argument",
            Ctype::Return => "return",
            Ctype::Callback => "callback",
            Ctype::Event => "event",
            Ctype::Throws => "throws",
            Ctype::Args => "args",
            Ctype::Kwargs => "kwargs",
            Ctype::Kwarg => "kwarg",
        }
    }
}

/// A parsed modifier attached to a declaration.
#[derive(Debug, Clone, Serialize)]
pub struct Modifier {
    pub kind: ModifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<DocPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One accumulated doc text fragment, with the file scope that was active
/// when it was parsed (used later to resolve relative links in the text).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocFragment {
    pub text: String,
    pub link_context: DocPath,
}

/// One `(type, name)` pair from an inline `@signature (...)` list.
#[derive(Debug, Clone, Serialize)]
pub struct SigArg {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valtype: Option<Valtype>,
}

/// A declared signature variant, distinct from nested argument declarations.
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    pub args: Vec<SigArg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// A parsed fragment of input destined for one entity.
#[derive(Debug, Clone)]
pub struct Submission {
    pub ctype: Ctype,
    pub valtypes: Vec<Valtype>,
    pub docs: Vec<DocFragment>,
    pub modifiers: Vec<Modifier>,
    pub sig_args: Option<Vec<SigArg>>,
}

impl Submission {
    pub fn new(ctype: Ctype) -> Self {
        Submission {
            ctype,
            valtypes: Vec::new(),
            docs: Vec::new(),
            modifiers: Vec::new(),
            sig_args: None,
        }
    }
}

/// Scalar flags interpreted from accumulated modifiers at finalize time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Flags {
    pub is_private: bool,
    pub is_internal: bool,
    pub is_abstract: bool,
    pub is_chainable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supers: Vec<DocPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<DocPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<DocPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<DocPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Flags {
    /// Pure projection of modifiers into flags; callable before finalize for
    /// entities that are only reached through inheritance.
    pub fn from_modifiers(modifiers: &[Modifier]) -> Flags {
        let mut flags = Flags::default();
        for m in modifiers {
            match m.kind {
                ModifierKind::Private => flags.is_private = true,
                ModifierKind::Internal => flags.is_internal = true,
                ModifierKind::Abstract => flags.is_abstract = true,
                ModifierKind::Chainable => flags.is_chainable = true,
                ModifierKind::Super => flags.supers.extend(m.path.clone()),
                ModifierKind::Implements => flags.interfaces.extend(m.path.clone()),
                ModifierKind::Alias => flags.alias_of = m.path.clone(),
                ModifierKind::Patches => flags.patches.extend(m.path.clone()),
                ModifierKind::Remote => flags.remote = m.value.clone(),
                ModifierKind::DefaultValue => flags.default_value = m.value.clone(),
                // Api is handled eagerly at submit time; Requires/Load/Root
                // never reach the entity.
                ModifierKind::Api
                | ModifierKind::Requires
                | ModifierKind::Load
                | ModifierKind::Root => {}
            }
        }
        flags
    }
}

/// One node of the entity tree.
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    /// Containment kind under the parent; `None` only for the root.
    pub delim: Option<Delimiter>,
    pub name: String,
    pub path: DocPath,
    /// True when this entity was addressed through a bracketed symbolic
    /// segment.
    pub is_symbol: bool,
    pub ctype: Option<Ctype>,
    pub docs: Vec<DocFragment>,
    pub valtypes: Vec<Valtype>,
    pub modifiers: Vec<Modifier>,
    pub signatures: Vec<Signature>,
    pub is_api: bool,
    /// Children per containment delimiter, keyed by name.
    pub children: [BTreeMap<String, EntityId>; Delimiter::COUNT],
    /// Interpreted modifier flags; set at finalize entry.
    pub flags: Option<Flags>,
    /// Cleared for module chains with nothing to render.
    pub renderable_children: bool,
    /// Immutable rendering snapshot; present once finalize completes.
    pub finalized: Option<FinalView>,
    pub(crate) inherited_cache: Option<InheritedView>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        parent: Option<EntityId>,
        delim: Option<Delimiter>,
        name: String,
        path: DocPath,
        is_symbol: bool,
    ) -> Self {
        Entity {
            id,
            parent,
            delim,
            name,
            path,
            is_symbol,
            ctype: None,
            docs: Vec::new(),
            valtypes: Vec::new(),
            modifiers: Vec::new(),
            signatures: Vec::new(),
            is_api: false,
            children: Default::default(),
            flags: None,
            renderable_children: true,
            finalized: None,
            inherited_cache: None,
        }
    }

    pub fn child(&self, delim: Delimiter, name: &str) -> Option<EntityId> {
        self.children[delim.index()].get(name).copied()
    }

    /// Look up a child by name across all containment kinds (wildcard
    /// delimiter), preferring an exact-delimiter hit when one is given.
    pub fn child_compat(&self, delim: Option<Delimiter>, name: &str) -> Option<EntityId> {
        if let Some(d) = delim {
            if let Some(id) = self.child(d, name) {
                return Some(id);
            }
            return None;
        }
        Delimiter::all()
            .iter()
            .find_map(|d| self.children[d.index()].get(name).copied())
    }

    pub fn child_ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::new();
        for d in Delimiter::all() {
            ids.extend(self.children[d.index()].values().copied());
        }
        ids
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(|m| !m.is_empty())
    }

    /// Whether the entity earns its own output page. Spare, argument, and
    /// return children are detail on the parent's page, not navigable
    /// structure, so only static and member children count.
    pub fn has_page_children(&self) -> bool {
        !self.children[Delimiter::Property.index()].is_empty()
            || !self.children[Delimiter::Member.index()].is_empty()
    }

    /// "No local content at all" in the inheritance sense: nothing written,
    /// nothing typed, nothing declared beneath.
    pub fn is_locally_empty(&self) -> bool {
        self.docs.is_empty()
            && self.valtypes.is_empty()
            && self.signatures.is_empty()
            && !self.has_children()
    }
}

impl Tree {
    /// Merge a submission into an existing entity.
    pub(crate) fn merge_submission(
        &mut self,
        id: EntityId,
        sub: Submission,
        diag: &mut Diagnostics,
    ) {
        // A signature submission annotates an existing declaration; its doc
        // belongs to the variant, and it carries no ctype claim of its own.
        if let Some(args) = sub.sig_args {
            let doc = sub
                .docs
                .iter()
                .map(|d| d.text.trim())
                .find(|t| !t.is_empty())
                .map(str::to_string);
            let entity = self.node_mut(id);
            entity.signatures.push(Signature { args, doc });
            entity.valtypes.extend(sub.valtypes);
            entity.modifiers.extend(sub.modifiers);
            return;
        }

        // Scalar ctype: set once; re-guessing is allowed only within one
        // delimiter class, where the newer declaration wins.
        let existing = self.node(id).ctype;
        match existing {
            None => self.node_mut(id).ctype = Some(sub.ctype),
            Some(cur) if cur == sub.ctype => {}
            Some(cur) if cur.compat_class() == sub.ctype.compat_class() => {
                self.node_mut(id).ctype = Some(sub.ctype);
            }
            Some(cur) => {
                let conflict = TagError::RedefinitionConflict {
                    path: self.node(id).path.to_string(),
                    field: "ctype",
                    existing: cur.as_str().to_string(),
                    incoming: sub.ctype.as_str().to_string(),
                };
                diag.error(conflict.to_string());
            }
        }

        // Modifier side effects run before the modifiers are stored: the api
        // flag climbs to every ancestor, and patch targets are eagerly
        // created so later resolution cannot fail just because the target was
        // never otherwise declared.
        let mut patch_targets = Vec::new();
        let mut saw_api = false;
        for m in &sub.modifiers {
            match m.kind {
                ModifierKind::Api => saw_api = true,
                ModifierKind::Patches => patch_targets.extend(m.path.clone()),
                _ => {}
            }
        }
        for target in patch_targets {
            if let Err(err) = self.get_component(&target) {
                diag.warning(format!(
                    "could not pre-create patch target `{}`: {}",
                    target, err
                ));
            }
        }
        if saw_api {
            self.propagate_api(id);
        }

        let entity = self.node_mut(id);
        for frag in sub.docs {
            let trimmed = frag.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Dedup verbatim: resubmitting identical text is a no-op.
            if entity.docs.iter().any(|d| d.text == frag.text) {
                continue;
            }
            entity.docs.push(frag);
        }
        entity.valtypes.extend(sub.valtypes);
        entity.modifiers.extend(sub.modifiers);
    }

    fn propagate_api(&mut self, id: EntityId) {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let entity = self.node_mut(cur);
            entity.is_api = true;
            cursor = entity.parent;
        }
    }
}
