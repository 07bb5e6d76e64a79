//! Structural manipulation scenarios

use treemorph::{
    EditRequest, InMemoryFileSystem, MorphError, NewlineKind, NodeId, Project, SeparatorPolicy,
    Settings, SpecifierKind, TreeSitterOracle,
};

fn project() -> Project {
    Project::with_file_system(TreeSitterOracle::new(), InMemoryFileSystem::new())
}

fn first_of_kind(project: &mut Project, doc: treemorph::DocumentId, kind: &str) -> NodeId {
    let root = project.root(doc).unwrap();
    project.first_descendant_by_kind_or_err(root, kind).unwrap()
}

#[test]
fn removes_middle_list_element() {
    let mut project = project();
    let doc = project.create_document("a.ts", "f(a, b, c);").unwrap();

    project
        .apply_edit(
            doc,
            EditRequest::remove_list_element(5..6, SeparatorPolicy::comma().within(2..9)),
        )
        .unwrap();

    assert_eq!(project.document(doc).unwrap().text(), "f(a, c);");
}

#[test]
fn set_alias_on_plain_import() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import { x } from 'm';\nx();\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");
    assert_eq!(project.specifier_kind(spec).unwrap(), SpecifierKind::Import);
    assert!(project.specifier_alias(spec).unwrap().is_none());

    let spec = project.set_specifier_alias(spec, "y").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "import { x as y } from 'm';\ny();\n"
    );
    assert_eq!(project.text(spec).unwrap(), "x as y");
    let alias = project.specifier_alias(spec).unwrap().unwrap();
    assert_eq!(project.text(alias).unwrap(), "y");
}

#[test]
fn change_existing_import_alias() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import { x as y } from 'm';\ny + y;\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");

    project.set_specifier_alias(spec, "z").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "import { x as z } from 'm';\nz + z;\n"
    );
}

#[test]
fn set_alias_on_export_rewrites_only_the_specifier() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "const x = 1;\nexport { x };\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "export_specifier");

    project.set_specifier_alias(spec, "y").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "const x = 1;\nexport { x as y };\n"
    );
}

#[test]
fn set_alias_on_export_carries_importers_along() {
    let mut project = project();
    let a = project
        .create_document("a.ts", "let x = 1;\nexport { x };\n")
        .unwrap();
    let b = project
        .create_document("b.ts", "import { x } from './a';\nx;\n")
        .unwrap();
    let c = project
        .create_document("c.ts", "import { x as local } from './a';\nlocal;\n")
        .unwrap();
    let spec = first_of_kind(&mut project, a, "export_specifier");

    let spec = project.set_specifier_alias(spec, "y").unwrap();

    assert_eq!(project.text(spec).unwrap(), "x as y");
    assert_eq!(
        project.document(a).unwrap().text(),
        "let x = 1;\nexport { x as y };\n"
    );
    assert_eq!(
        project.document(b).unwrap().text(),
        "import { y } from './a';\ny;\n"
    );
    assert_eq!(
        project.document(c).unwrap().text(),
        "import { y as local } from './a';\nlocal;\n"
    );
}

#[test]
fn set_specifier_name_keeps_alias() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import { x as y } from 'm';\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");

    let spec = project.set_specifier_name(spec, "other").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "import { other as y } from 'm';\n"
    );
    assert_eq!(project.text(spec).unwrap(), "other as y");
}

#[test]
fn set_specifier_name_on_plain_specifier_returns_new_handle() {
    let mut project = project();
    let doc = project.create_document("a.ts", "import { x } from 'm';\n").unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");

    let renamed = project.set_specifier_name(spec, "abc").unwrap();

    // The old specifier spanned exactly the replaced name.
    assert!(!project.is_live(spec));
    assert_eq!(project.text(renamed).unwrap(), "abc");
}

#[test]
fn remove_one_of_several_specifiers() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import { a, b, c } from 'm';\n")
        .unwrap();
    let root = project.root(doc).unwrap();
    let specs = project.descendants_by_kind(root, "import_specifier").unwrap();

    project.remove_specifier(specs[1]).unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "import { a, c } from 'm';\n"
    );
    assert!(project.is_live(specs[0]));
    assert_eq!(project.text(specs[2]).unwrap(), "c");
}

#[test]
fn remove_last_specifier_removes_statement() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import { a } from 'm';\nlet b = 1;\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");

    project.remove_specifier(spec).unwrap();

    assert_eq!(project.document(doc).unwrap().text(), "let b = 1;\n");
}

#[test]
fn remove_last_specifier_keeps_default_import() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "import d, { a } from 'm';\n")
        .unwrap();
    let spec = first_of_kind(&mut project, doc, "import_specifier");

    project.remove_specifier(spec).unwrap();

    assert_eq!(project.document(doc).unwrap().text(), "import d from 'm';\n");
}

#[test]
fn remove_last_reexported_specifier_keeps_the_module() {
    let mut project = project();
    let doc = project
        .create_document("a.ts", "export { x } from 'm';\nexport { y };\n")
        .unwrap();
    let root = project.root(doc).unwrap();
    let specs = project.descendants_by_kind(root, "export_specifier").unwrap();

    project.remove_specifier(specs[0]).unwrap();
    assert_eq!(
        project.document(doc).unwrap().text(),
        "export * from 'm';\nexport { y };\n"
    );

    // Without a source the whole statement goes.
    let root = project.root(doc).unwrap();
    let spec = project.first_descendant_by_kind_or_err(root, "export_specifier").unwrap();
    project.remove_specifier(spec).unwrap();
    assert_eq!(project.document(doc).unwrap().text(), "export * from 'm';\n");
}

#[test]
fn non_specifier_is_rejected() {
    let mut project = project();
    let doc = project.create_document("a.ts", "let a = 1;").unwrap();
    let ident = first_of_kind(&mut project, doc, "identifier");

    let err = project.set_specifier_alias(ident, "b").unwrap_err();
    assert!(matches!(err, MorphError::InvalidOperation { .. }));
}

const SHAPE: &str = "interface Shape {\n    width: number;\n    height: number;\n}\n";

#[test]
fn member_lookup_by_name() {
    let mut project = project();
    let doc = project.create_document("a.ts", SHAPE).unwrap();
    let decl = first_of_kind(&mut project, doc, "interface_declaration");
    let body = project.child_by_field(decl, "body").unwrap().unwrap();

    assert_eq!(project.members(body).unwrap().len(), 2);
    let height = project.member_by_name(body, "height").unwrap().unwrap();
    assert_eq!(project.text(height).unwrap(), "height: number");
    assert!(project.member_by_name(body, "depth").unwrap().is_none());

    match project.member_by_name_or_err(body, "heigth") {
        Err(MorphError::NotFound { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some("height"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn insert_member_appends_with_indentation() {
    let mut project = project();
    let doc = project.create_document("a.ts", SHAPE).unwrap();
    let decl = first_of_kind(&mut project, doc, "interface_declaration");
    let body = project.child_by_field(decl, "body").unwrap().unwrap();

    let member = project.insert_member(body, 2, "depth: number;").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "interface Shape {\n    width: number;\n    height: number;\n    depth: number;\n}\n"
    );
    assert_eq!(project.text(member).unwrap(), "depth: number");
    // The interface enclosed the insertion and can be read back.
    assert!(project.is_live(decl));
    assert_eq!(project.members(body).unwrap().len(), 3);
}

#[test]
fn insert_member_at_front() {
    let mut project = project();
    let doc = project.create_document("a.ts", SHAPE).unwrap();
    let decl = first_of_kind(&mut project, doc, "interface_declaration");
    let body = project.child_by_field(decl, "body").unwrap().unwrap();

    let member = project.insert_member(body, 0, "id: string;").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "interface Shape {\n    id: string;\n    width: number;\n    height: number;\n}\n"
    );
    assert_eq!(project.text(member).unwrap(), "id: string");
}

#[test]
fn insert_member_into_empty_body_uses_settings() {
    let mut project = project();
    project
        .set_settings(Settings {
            indentation: "\t".to_string(),
            newline: NewlineKind::Crlf,
            ..Settings::default()
        })
        .unwrap();
    let doc = project.create_document("a.ts", "class A {}\n").unwrap();
    let class = first_of_kind(&mut project, doc, "class_declaration");
    let body = project.child_by_field(class, "body").unwrap().unwrap();

    project.insert_member(body, 0, "x = 1;").unwrap();

    assert_eq!(
        project.document(doc).unwrap().text(),
        "class A {\r\n\tx = 1;\r\n}\n"
    );
}
