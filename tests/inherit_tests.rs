//! Inheritance resolver tests: member merging, override marking, and
//! structural-sibling signature borrowing.

use tagtree::entity::DisplayOptions;
use tagtree::path::parse_path;
use tagtree::{parse_file, Diagnostics, DocPath, Tree};

fn build(sources: &[&str]) -> (Tree, Diagnostics) {
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
    tree.finalize(&DisplayOptions::default(), &mut diag).unwrap();
    (tree, diag)
}

fn p(s: &str) -> DocPath {
    parse_path(s, &DocPath::root(), None).unwrap()
}

// =============================================================================
// Member inheritance
// =============================================================================

mod member_tests {
    use super::*;

    #[test]
    fn superclass_member_appears_marked_inherited() {
        let (tree, diag) = build(&[
            "/** @class P\nBase.\n@member/String P#m\nFrom P.\n*/\n/** @class C\n@super P\nChild.\n*/",
        ]);
        assert!(!diag.has_errors());

        let c = tree.resolve(&p("C")).unwrap();
        let view = tree.entity(c).finalized.as_ref().unwrap();
        assert_eq!(view.children.members.len(), 1);
        let m = &view.children.members[0];
        assert_eq!(m.name, "m");
        // The copy keeps its true source path and points back at P.
        assert_eq!(m.path.to_string(), "P#m");
        assert_eq!(m.inherited_from.as_ref().unwrap().to_string(), "P");
        assert!(m.overrides.is_none());
    }

    #[test]
    fn local_override_is_not_marked_inherited() {
        let (tree, _) = build(&[
            "/** @class P\nBase.\n@member/String P#m\nFrom P.\n*/\n/** @class C\n@super P\nChild.\n@member/String C#m\nLocal.\n*/",
        ]);

        let c = tree.resolve(&p("C")).unwrap();
        let view = tree.entity(c).finalized.as_ref().unwrap();
        let m = &view.children.members[0];
        assert_eq!(m.path.to_string(), "C#m");
        assert!(m.inherited_from.is_none());
        assert_eq!(m.overrides.as_ref().unwrap().to_string(), "P");

        // P's own finalized view is untouched by the shadowing.
        let parent = tree.resolve(&p("P")).unwrap();
        let parent_view = tree.entity(parent).finalized.as_ref().unwrap();
        let pm = &parent_view.children.members[0];
        assert!(pm.inherited_from.is_none());
        assert!(pm.overrides.is_none());
    }

    #[test]
    fn later_declared_superclass_wins_name_clashes() {
        let (tree, _) = build(&[
            "/** @class A\nFirst.\n@member/String A#m\nFrom A.\n*/\n/** @class B\nSecond.\n@member/Number B#m\nFrom B.\n*/\n/** @class C\n@super A\n@super B\nChild.\n*/",
        ]);

        let c = tree.resolve(&p("C")).unwrap();
        let view = tree.entity(c).finalized.as_ref().unwrap();
        let m = &view.children.members[0];
        assert_eq!(m.path.to_string(), "B#m");
        assert_eq!(m.overrides.as_ref().unwrap().to_string(), "A");
    }

    #[test]
    fn inheritance_spans_a_grandparent() {
        let (tree, _) = build(&[
            "/** @class G\nRoot.\n@member/String G#deep\nDeep.\n*/\n/** @class P\n@super G\nMid.\n*/\n/** @class C\n@super P\nChild.\n*/",
        ]);
        let c = tree.resolve(&p("C")).unwrap();
        let view = tree.entity(c).finalized.as_ref().unwrap();
        let deep = &view.children.members[0];
        assert_eq!(deep.path.to_string(), "G#deep");
        assert_eq!(deep.inherited_from.as_ref().unwrap().to_string(), "G");
    }

    #[test]
    fn events_inherit_through_a_superclass() {
        let (tree, _) = build(&[
            "/** @class P\nBase.\n@event changed\nFires on change.\n*/\n/** @class C\n@super P\nChild.\n*/",
        ]);
        let c = tree.resolve(&p("C")).unwrap();
        let view = tree.entity(c).finalized.as_ref().unwrap();
        assert_eq!(view.children.events.len(), 1);
        let ev = &view.children.events[0];
        assert_eq!(ev.name, "changed");
        assert_eq!(ev.path.to_string(), "P#changed");
        assert_eq!(ev.inherited_from.as_ref().unwrap().to_string(), "P");
    }
}

// =============================================================================
// Failure tolerance
// =============================================================================

mod resilience_tests {
    use super::*;

    #[test]
    fn unresolvable_superclass_is_a_warning_not_an_error() {
        let (tree, diag) = build(&["/** @class C\n@super Ghost\nChild.\n*/"]);
        assert!(!diag.has_errors());
        assert!(!diag.warnings().is_empty());
        // C still finalizes.
        let c = tree.resolve(&p("C")).unwrap();
        assert!(tree.entity(c).finalized.is_some());
    }

    #[test]
    fn inheritance_cycle_is_skipped_with_a_warning() {
        let (tree, diag) = build(&[
            "/** @class A\n@super B\nOne.\n@member/String A#a\nFrom A.\n*/\n/** @class B\n@super A\nTwo.\n@member/String B#b\nFrom B.\n*/",
        ]);
        assert!(!diag.has_errors());
        assert!(!diag.warnings().is_empty());

        // Each side still sees the other's members once. The class that
        // finalizes second is the interesting one: its view was already
        // computed (truncated to locals) during the first class's walk, and
        // that cut must not leak into its own result.
        for (class, expected) in [("A", vec!["a", "b"]), ("B", vec!["a", "b"])] {
            let id = tree.resolve(&p(class)).unwrap();
            let view = tree.entity(id).finalized.as_ref().unwrap();
            let names: Vec<&str> =
                view.children.members.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, expected, "members of {class}");
        }
    }
}

// =============================================================================
// Signature borrowing
// =============================================================================

mod signature_tests {
    use super::*;

    #[test]
    fn override_without_signature_borrows_arguments() {
        let (tree, _) = build(&[
            "/** @class P\nBase.\n@member P#go\nGoes.\n@argument/Number n\nCount.\n*/\n/** @class C\n@super P\nChild.\n@member C#go\nOverride doc.\n*/",
        ]);

        let go = tree.resolve(&p("C#go")).unwrap();
        let view = tree.entity(go).finalized.as_ref().unwrap();
        assert_eq!(view.children.arguments.len(), 1);
        let n = &view.children.arguments[0];
        assert_eq!(n.name, "n");
        // Arguments are never marked inherited, even when borrowed.
        assert!(n.inherited_from.is_none());
    }

    #[test]
    fn local_arguments_suppress_borrowing() {
        let (tree, _) = build(&[
            "/** @class P\nBase.\n@member P#go\nGoes.\n@argument/Number n\nCount.\n*/\n/** @class C\n@super P\nChild.\n@member C#go\nOverride.\n@argument/String s\nLocal.\n*/",
        ]);

        let go = tree.resolve(&p("C#go")).unwrap();
        let view = tree.entity(go).finalized.as_ref().unwrap();
        let names: Vec<&str> = view.children.arguments.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["s"]);
    }

    #[test]
    fn empty_override_adopts_counterpart_spares() {
        let (tree, _) = build(&[
            "/** @class P\nBase.\n@member/String P#m\nExplained once.\n*/\n/** @class C\n@super P\nChild.\n@member C#m\n*/",
        ]);

        let m = tree.resolve(&p("C#m")).unwrap();
        let view = tree.entity(m).finalized.as_ref().unwrap();
        // The counterpart's synthesized summary spare carries over.
        assert!(view
            .children
            .spares
            .iter()
            .any(|s| s.name == "summary" && s.path.to_string() == "P#m~summary"));
    }
}
