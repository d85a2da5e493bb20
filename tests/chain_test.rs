use uxdf::chain::{parse, ChainError, ChainPath};
use uxdf::definition::{Catalog, EventDefinition, NodeDefinition, Registry};

fn signifiers() -> Registry {
    let mut catalog = Catalog::new();
    catalog.put_node(NodeDefinition::new("Signifier"), false).unwrap();
    catalog
        .put_event(EventDefinition::new("AS_MEMBER", "Signifier", "Signifier"), false)
        .unwrap();
    Registry::new(catalog)
}

#[test]
fn test_label_map_of_concrete_chain() {
    let chain = parse("A-E1>B<E2-C", &Catalog::new()).unwrap().unwrap();
    let labels = chain.label_types();
    assert_eq!(labels.len(), 5);
    for name in ["A", "E1", "B", "E2", "C"] {
        assert_eq!(labels.get(name).map(String::as_str), Some(name));
    }
}

#[test]
fn test_self_relationship_resolves_both_ways() {
    let chain = parse("Signifier-AS_MEMBER-Signifier", &signifiers())
        .unwrap()
        .unwrap();
    assert_eq!(chain.len(), 2);

    let paths: Vec<ChainPath> = chain.iter().map(|items| items[0].path()).collect();
    assert_eq!(paths, vec![ChainPath::LeftAnchored, ChainPath::RightAnchored]);
    for items in &chain {
        assert_eq!(items.len(), 1);
        assert!(!items[0].has_next());
        assert_eq!(items[0].event(), "AS_MEMBER");
    }
}

#[test]
fn test_parse_against_registry_snapshot() {
    let registry = signifiers();
    let snapshot = registry.snapshot();
    registry
        .put_node(NodeDefinition::new("Group"), false)
        .unwrap();
    registry
        .put_event(EventDefinition::new("CONTAINS", "Group", "Signifier"), false)
        .unwrap();

    let old = parse("Signifier-*-*", &*snapshot).unwrap().unwrap();
    let new = parse("Signifier-*-*", &registry).unwrap().unwrap();
    assert_eq!(old.len(), 2);
    assert_eq!(new.len(), 3);
}

#[test]
fn test_reentrant_across_threads() {
    let registry = std::sync::Arc::new(signifiers());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = std::sync::Arc::clone(&registry);
            std::thread::spawn(move || {
                parse("Signifier-*>*", &*registry).unwrap().unwrap().len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}

#[test]
fn test_semantic_errors_surface() {
    let registry = signifiers();
    assert!(matches!(
        parse("x:Signifier-AS_MEMBER>x:Other", &registry),
        Err(ChainError::DuplicateLabel { .. })
    ));
    assert!(matches!(
        parse("Nowhere-*>*", &registry),
        Err(ChainError::UndefinedNode(_))
    ));
}
