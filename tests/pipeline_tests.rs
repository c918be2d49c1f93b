//! End-to-end pipeline tests: parse, submit, finalize, project.

use tagtree::entity::DisplayOptions;
use tagtree::path::parse_path;
use tagtree::{parse_file, Diagnostics, DocPath, Tree};

// =============================================================================
// Helpers
// =============================================================================

fn build_with(sources: &[&str], opts: &DisplayOptions) -> (Tree, Diagnostics) {
    let mut tree = Tree::new();
    let mut diag = Diagnostics::new();
    let mut scope = DocPath::root();
    for src in sources {
        let outcome = parse_file(src, &scope).unwrap();
        for (path, submission) in outcome.submissions {
            tree.submit(&path, submission, &mut diag).unwrap();
        }
        scope = outcome.file_scope;
    }
    tree.finalize(opts, &mut diag).unwrap();
    (tree, diag)
}

fn build(sources: &[&str]) -> (Tree, Diagnostics) {
    build_with(sources, &DisplayOptions::default())
}

fn p(s: &str) -> DocPath {
    parse_path(s, &DocPath::root(), None).unwrap()
}

// =============================================================================
// Cross-file merge
// =============================================================================

mod merge_tests {
    use super::*;

    #[test]
    fn two_files_contribute_members_to_one_class() {
        let (tree, diag) = build(&[
            "/** @class Foo\nFirst file.\n@member/String Foo#bar\nBar doc.\n*/",
            "/** @class Foo\nSecond file.\n@member/Number Foo#baz\nBaz doc.\n*/",
        ]);
        assert!(!diag.has_errors());

        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        let names: Vec<&str> = view
            .children
            .members
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["bar", "baz"]);

        let bar = tree.resolve(&p("Foo#bar")).unwrap();
        assert_eq!(tree.entity(bar).valtypes[0].name, "String");
        let baz = tree.resolve(&p("Foo#baz")).unwrap();
        assert_eq!(tree.entity(baz).valtypes[0].name, "Number");
    }

    #[test]
    fn conflicting_ctype_reports_one_error_and_keeps_first() {
        let (tree, diag) = build(&[
            "/** @class Foo\nA class.\n*/",
            "/** @module Foo\nNow a module?\n*/",
        ]);
        assert_eq!(diag.errors().len(), 1);

        let foo = tree.resolve(&p("Foo")).unwrap();
        assert_eq!(
            tree.entity(foo).ctype,
            Some(tagtree::entity::Ctype::Class)
        );
    }

    #[test]
    fn identical_doc_text_is_stored_once() {
        let (tree, diag) = build(&[
            "/** @class Foo\nShared doc.\n*/",
            "/** @class Foo\nShared doc.\n*/",
        ]);
        assert!(!diag.has_errors());
        let foo = tree.resolve(&p("Foo")).unwrap();
        assert_eq!(tree.entity(foo).docs.len(), 1);
    }

    #[test]
    fn module_scope_spans_files() {
        let (tree, _) = build(&[
            "/** @module App\nTop.\n*/",
            "/** @class Widget\nDoc.\n*/",
        ]);
        assert!(tree.resolve(&p("App.Widget")).is_ok());
    }
}

// =============================================================================
// Links
// =============================================================================

mod link_tests {
    use super::*;

    #[test]
    fn alias_resolves_to_the_same_address_as_its_target() {
        let (tree, _) = build(&[
            "/** @class Bar\nReal.\n@member/String Bar#x\nChild.\n*/\n/** @property Foo\n@alias Bar\nRedirect.\n*/",
        ]);
        let from = p("Bar#x");
        assert_eq!(
            tree.relative_link_address(&from, &p("Foo")),
            tree.relative_link_address(&from, &p("Bar")),
        );
    }

    #[test]
    fn unresolvable_target_yields_dead_link_sentinel() {
        let (tree, _) = build(&["/** @class Foo\nDoc.\n*/"]);
        assert_eq!(
            tree.relative_link_address(&p("Foo"), &p("Missing")),
            tagtree::DEAD_LINK
        );
    }
}

// =============================================================================
// Finalize projection
// =============================================================================

mod finalize_tests {
    use super::*;

    #[test]
    fn doc_text_splits_into_summary_and_details() {
        let (tree, _) = build(&[
            "/** @class Foo\nShort summary line.\n\nLonger details paragraph\nwith more text.\n*/",
        ]);
        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        assert_eq!(view.summary.as_deref(), Some("Short summary line."));
        assert!(view
            .details
            .as_deref()
            .unwrap()
            .starts_with("Longer details paragraph"));
    }

    #[test]
    fn explicit_summary_spare_is_reused() {
        let (tree, _) = build(&[
            "/** @class Foo\nRaw text.\n@spare Foo~summary\nHand-written summary.\n*/",
        ]);
        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        assert_eq!(view.summary.as_deref(), Some("Hand-written summary."));
    }

    #[test]
    fn empty_module_chain_has_no_renderable_children() {
        let (tree, _) = build(&["/** @module M\n*/\n/** @submodule e\n*/"]);
        let m = tree.resolve(&p("M")).unwrap();
        let entity = tree.entity(m);
        // The raw child list is non-empty, but nothing under it renders.
        assert!(entity.has_children());
        let view = entity.finalized.as_ref().unwrap();
        assert!(!view.has_renderable_children);
    }

    #[test]
    fn members_split_into_callable_and_plain_buckets() {
        let (tree, _) = build(&[
            "/** @class Foo\nDoc.\n@member/String Foo#name\nPlain.\n@member Foo#run\nCallable.\n@argument/Number n\nCount.\n*/",
        ]);
        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        let members: Vec<&str> = view.children.members.iter().map(|c| c.name.as_str()).collect();
        let methods: Vec<&str> = view.children.methods.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(members, vec!["name"]);
        assert_eq!(methods, vec!["run"]);
    }

    #[test]
    fn private_members_are_hidden_unless_requested() {
        let sources = [
            "/** @class Foo\nDoc.\n@member/String Foo#secret\n@private\nHidden.\n@member/String Foo#open\nShown.\n*/",
        ];
        let (tree, _) = build(&sources);
        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        let names: Vec<&str> = view.children.members.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["open"]);

        let opts = DisplayOptions {
            show_private: true,
            ..DisplayOptions::default()
        };
        let (tree, _) = build_with(&sources, &opts);
        let foo = tree.resolve(&p("Foo")).unwrap();
        let view = tree.entity(foo).finalized.as_ref().unwrap();
        let names: Vec<&str> = view.children.members.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["open", "secret"]);
    }

    #[test]
    fn api_flag_reaches_ancestors() {
        let (tree, _) = build(&[
            "/** @class Outer\nDoc.\n@member/String Outer#inner\n@api\nSurface.\n*/",
        ]);
        let outer = tree.resolve(&p("Outer")).unwrap();
        assert!(tree.entity(outer).is_api);
    }

    #[test]
    fn valtype_resolution_links_known_types() {
        let (tree, _) = build(&[
            "/** @class Item\nA type.\n@member/String Item#id\nId.\n*/\n/** @property/Item current\nThe active item.\n*/",
        ]);
        let current = tree.resolve(&p("current")).unwrap();
        let view = tree.entity(current).finalized.as_ref().unwrap();
        assert_eq!(view.valtypes.len(), 1);
        assert_eq!(
            view.valtypes[0].link.as_ref().unwrap().to_string(),
            "Item"
        );
    }

    #[test]
    fn unresolved_valtype_keeps_raw_path_without_error() {
        let (tree, diag) = build(&["/** @property/Mystery current\nDoc.\n*/"]);
        assert!(!diag.has_errors());
        let current = tree.resolve(&p("current")).unwrap();
        let view = tree.entity(current).finalized.as_ref().unwrap();
        assert!(view.valtypes[0].link.is_none());
        assert_eq!(view.valtypes[0].name, "Mystery");
    }
}
