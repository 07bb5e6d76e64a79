//! Node handle identity across edits

use treemorph::{InMemoryFileSystem, MorphError, NodeState, Project, TreeSitterOracle};

fn project() -> Project {
    Project::with_file_system(TreeSitterOracle::new(), InMemoryFileSystem::new())
}

const TWO_FUNCTIONS: &str = "function f() {\n  return 1;\n}\nfunction g() {}\n";

#[test]
fn handles_survive_unrelated_insertion() {
    let mut project = project();
    let doc = project.create_document("a.ts", TWO_FUNCTIONS).unwrap();
    let f = project.node_at(doc, 0..28, "function_declaration").unwrap();
    let ret = project.node_at(doc, 17..26, "return_statement").unwrap();
    let g = project.node_at(doc, 29..44, "function_declaration").unwrap();
    let g_name = project.node_at(doc, 38..39, "identifier").unwrap();

    let outcome = project.insert_text(doc, 26, "\n  log();").unwrap();
    assert_eq!(outcome.descriptor.delta, 9);

    // Enclosing the insertion.
    assert!(project.is_live(f));
    assert!(project.text(f).unwrap().contains("log();"));
    // Ends exactly at the insertion point.
    assert_eq!(project.text(ret).unwrap(), "return 1;");
    // After it.
    assert_eq!(project.text(g).unwrap(), "function g() {}");
    assert_eq!(project.range(g_name).unwrap(), 47..48);
    assert_eq!(project.node_at(doc, 47..48, "identifier").unwrap(), g_name);
}

#[test]
fn edit_cutting_through_nodes_forgets_them() {
    let mut project = project();
    let doc = project.create_document("a.ts", "foo(1, 2);\nbar(3);\n").unwrap();
    let root = project.root(doc).unwrap();
    let statements = project.named_children(root).unwrap();
    let args = project.node_at(doc, 3..9, "arguments").unwrap();
    let one = project.node_at(doc, 4..5, "number").unwrap();
    let three = project.node_at(doc, 15..16, "number").unwrap();

    project.replace_range(doc, 7..15, "2, ").unwrap();

    assert_eq!(project.document(doc).unwrap().text(), "foo(1, 2, 3);\n");
    assert_eq!(project.state(statements[0]), NodeState::Forgotten);
    assert_eq!(project.state(statements[1]), NodeState::Forgotten);
    assert_eq!(project.state(args), NodeState::Forgotten);
    assert!(project.is_live(root));
    assert_eq!(project.range(one).unwrap(), 4..5);
    assert_eq!(project.range(three).unwrap(), 10..11);
    assert_eq!(project.text(three).unwrap(), "3");
}

#[test]
fn forgotten_handle_is_never_revived() {
    let mut project = project();
    let doc = project.create_document("a.ts", "let a = 1;").unwrap();
    let literal = project.node_at(doc, 8..9, "number").unwrap();

    project.replace_range(doc, 8..9, "2").unwrap();
    let second = project.node_at(doc, 8..9, "number").unwrap();
    project.replace_range(doc, 8..9, "1").unwrap();
    let third = project.node_at(doc, 8..9, "number").unwrap();

    assert_eq!(project.document(doc).unwrap().text(), "let a = 1;");
    assert!(!project.is_live(literal));
    assert!(!project.is_live(second));
    assert_ne!(third, literal);
    assert_ne!(third, second);
    assert!(matches!(
        project.text(literal),
        Err(MorphError::ForgottenNode { node }) if node == literal
    ));
}

#[test]
fn one_handle_per_node() {
    let mut project = project();
    let doc = project.create_document("a.ts", "let a = 1;\n").unwrap();

    let root = project.root(doc).unwrap();
    let count = project.live_handle_count(doc);
    assert_eq!(project.root(doc).unwrap(), root);
    let decl = project.named_children(root).unwrap()[0];
    assert_eq!(project.parent(decl).unwrap(), Some(root));
    assert_eq!(project.live_handle_count(doc), count + 1);
}

#[test]
fn handles_stay_stable_over_many_appends() {
    let mut project = project();
    let doc = project.create_document("a.ts", "let a = 1;\n").unwrap();
    let root = project.root(doc).unwrap();
    let first = project.named_children(root).unwrap()[0];

    for i in 0..5 {
        let end = project.document(doc).unwrap().len();
        project
            .insert_text(doc, end, &format!("let v{i} = {i};\n"))
            .unwrap();
    }

    assert_eq!(project.text(first).unwrap(), "let a = 1;");
    assert_eq!(project.named_children(root).unwrap().len(), 6);
    assert_eq!(project.named_children(root).unwrap()[0], first);
}

#[test]
fn documents_do_not_share_handles() {
    let mut project = project();
    let a = project.create_document("a.ts", "let x = 1;").unwrap();
    let b = project.create_document("b.ts", "let x = 1;").unwrap();
    let in_a = project.node_at(a, 8..9, "number").unwrap();
    let in_b = project.node_at(b, 8..9, "number").unwrap();
    assert_ne!(in_a, in_b);
    assert_eq!(in_a.document(), a);

    project.replace_range(a, 8..9, "5").unwrap();

    assert!(!project.is_live(in_a));
    assert_eq!(project.text(in_b).unwrap(), "1");
}

#[test]
fn removing_a_document_retires_its_handles() {
    let mut project = project();
    let doc = project.create_document("a.ts", "let x = 1;").unwrap();
    let root = project.root(doc).unwrap();

    let removed = project.remove_document(doc).unwrap();

    assert_eq!(removed.text(), "let x = 1;");
    assert_eq!(project.state(root), NodeState::Forgotten);
    assert!(matches!(project.kind(root), Err(MorphError::ForgottenNode { .. })));
    assert!(project.document_by_path("a.ts").is_none());
}
