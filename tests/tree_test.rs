//! Integration tests for the component tree and builder registry.

use simtree::component::variants;
use simtree::{BuilderRegistry, Component, Error, Uri};

fn registry() -> BuilderRegistry {
    let mut registry = BuilderRegistry::new();
    variants::register_core_builders(&mut registry);
    registry
}

/// Root with a few levels of groups.
fn model(registry: &BuilderRegistry) -> Component {
    let mut root = registry.create("Root", "Root").unwrap();
    for name in ["mesh", "solver", "post"] {
        let child = root.add_child(registry.create("Group", name).unwrap()).unwrap();
        for sub in ["a", "b"] {
            let grandchild = child.add_child(registry.create("Group", sub).unwrap()).unwrap();
            grandchild.add_child(registry.create("Group", "leaf").unwrap()).unwrap();
        }
    }
    root
}

fn collect_paths(component: &Component, out: &mut Vec<Uri>) {
    out.push(component.path().clone());
    for child in component.children() {
        collect_paths(child, out);
    }
}

#[test]
fn test_every_component_resolves_to_itself() {
    let registry = registry();
    let root = model(&registry);
    let mut paths = Vec::new();
    collect_paths(&root, &mut paths);
    assert_eq!(paths.len(), 1 + 3 + 6 + 6);

    for path in paths {
        let found = root.resolve(&path).unwrap();
        assert_eq!(found.path(), &path);
        let text = format!("cpath:{path}");
        assert_eq!(root.resolve(&Uri::parse(&text)).unwrap().path(), &path);
    }
}

#[test]
fn test_add_remove_round_trip() {
    let registry = registry();
    let mut root = model(&registry);
    let before: Vec<String> = root.children().map(|c| c.name().to_string()).collect();

    root.add_child(registry.create("Group", "extra").unwrap()).unwrap();
    assert_eq!(root.count_children(), 4);
    let removed = root.remove_child("extra").unwrap();
    assert!(!removed.is_attached());

    let after: Vec<String> = root.children().map(|c| c.name().to_string()).collect();
    assert_eq!(before, after);
}

#[test]
fn test_unknown_type_and_name_collision() {
    let registry = registry();
    assert_eq!(
        registry.create("UnknownType", "x").unwrap_err(),
        Error::TypeNotFound("UnknownType".into())
    );

    let mut root = registry.create("Root", "Root").unwrap();
    root.add_child(registry.create("Group", "x").unwrap()).unwrap();
    let err = root.add_child(registry.create("Group", "x").unwrap()).unwrap_err();
    assert_eq!(err, Error::NameCollision { parent: "/Root".into(), name: "x".into() });
    assert_eq!(err.kind(), simtree::ErrorKind::NameCollision);
}

#[test]
fn test_resolve_reports_first_missing_segment() {
    let registry = registry();
    let root = model(&registry);
    let err = root.resolve(&Uri::parse("/Root/mesh/zz/leaf")).unwrap_err();
    assert_eq!(err, Error::NotFound("/Root/mesh/zz".into()));

    let mesh = root.child("mesh").unwrap();
    assert_eq!(mesh.resolve(&Uri::parse("a/leaf")).unwrap().path().to_string(), "/Root/mesh/a/leaf");
    assert_eq!(mesh.resolve(&Uri::parse("a/../b/leaf")).unwrap().path().to_string(), "/Root/mesh/b/leaf");
    assert!(matches!(root.resolve(&Uri::parse("/Root/../..")), Err(Error::NotFound(_))));
}

#[test]
fn test_moved_subtree_gets_new_paths() {
    let registry = registry();
    let mut root = model(&registry);
    let a = root.child_mut("mesh").unwrap().remove_child("a").unwrap();
    root.child_mut("post").unwrap().rename_child("a", "a_post").unwrap();
    root.child_mut("post").unwrap().add_child(a).unwrap();

    let leaf = root.resolve(&Uri::parse("/Root/post/a/leaf")).unwrap();
    assert_eq!(leaf.parent_path().unwrap().to_string(), "/Root/post/a");
    assert!(root.resolve(&Uri::parse("/Root/mesh/a")).is_err());
}

#[test]
fn test_link_follows_current_tree() {
    let registry = registry();
    let mut root = model(&registry);
    let link = variants::link_to("to_solver", &Uri::parse("/Root/solver")).unwrap();
    root.add_child(link).unwrap();

    let link = root.child("to_solver").unwrap().clone();
    assert_eq!(variants::follow(&root, &link).unwrap().name(), "solver");

    root.remove_child("solver").unwrap();
    assert!(matches!(variants::follow(&root, &link), Err(Error::NotFound(_))));
}

#[test]
fn test_duplicate_builder_is_ignored() {
    let mut registry = registry();
    assert!(!registry.register_builder("Group", variants::link));
    assert_eq!(registry.create("Group", "g").unwrap().type_name(), "Group");
    assert!(registry.create("Group", "g").unwrap().options().is_empty());
}
