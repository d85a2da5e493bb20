//! Associative unique properties
//!
//! A unique index may list one chain, e.g. `Account-HELD_BY>Person`. The
//! uniqueness value for that entry is then read from a property named after
//! the far node type of the chain's first hop: `uniquePersonId`.

use super::{parse, ChainError, ChainPath, ChainResult};
use crate::definition::{DefinitionSource, NodeDefinition};
use regex::Regex;
use std::sync::{Arc, LazyLock};

static PROPERTY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^unique(.+)Id$").expect("static pattern"));

/// Property name holding the associated value for `unique_index`
///
/// `Ok(None)` when no entry is a chain.
pub fn associate_property_name<D: DefinitionSource + ?Sized>(
    unique_index: &[String],
    defs: &D,
) -> ChainResult<Option<String>> {
    let mut chains = unique_index.iter().filter(|entry| super::has_relationship_syntax(entry));
    let Some(text) = chains.next() else {
        return Ok(None);
    };
    if let Some(extra) = chains.next() {
        return Err(ChainError::Associate(format!(
            "unique index lists more than one chain: [{}] and [{}]",
            text, extra
        )));
    }

    let Some(chain) = parse(text, defs)? else {
        return Ok(None);
    };
    let item = chain
        .alternatives()
        .first()
        .and_then(|items| items.first())
        .ok_or_else(|| ChainError::Associate(format!("chain [{}] resolves to nothing", text)))?;

    let node_name = match item.path() {
        ChainPath::LeftAnchored => item.right_node_name(),
        ChainPath::RightAnchored => item.left_node_name(),
        ChainPath::Both => None,
    }
    .ok_or_else(|| ChainError::Associate(format!("chain [{}] has no direction", text)))?;

    Ok(Some(format!("unique{}Id", node_name)))
}

/// Node type named by an associative property, if it is defined
pub fn associate_target_type<D: DefinitionSource + ?Sized>(
    property_name: &str,
    defs: &D,
) -> Option<Arc<NodeDefinition>> {
    let captures = PROPERTY_PATTERN.captures(property_name)?;
    defs.node_definition(captures.get(1)?.as_str())
}

pub fn is_associate_property_name<D: DefinitionSource + ?Sized>(property_name: &str, defs: &D) -> bool {
    associate_target_type(property_name, defs).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Catalog, EventDefinition};
    use crate::graph::{NodeEntity, SdEntity};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .put_node(
                NodeDefinition::new("Account").with_unique_index(["Account-HELD_BY>Person", "number"]),
                false,
            )
            .unwrap();
        catalog.put_node(NodeDefinition::new("Person"), false).unwrap();
        catalog
            .put_event(EventDefinition::new("HELD_BY", "Account", "Person"), false)
            .unwrap();
        catalog
    }

    fn index(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|entry| entry.to_string()).collect()
    }

    #[test]
    fn test_property_name_from_direction() {
        let defs = catalog();
        let left = associate_property_name(&index(&["Account-HELD_BY>Person"]), &defs).unwrap();
        assert_eq!(left.as_deref(), Some("uniquePersonId"));

        let right = associate_property_name(&index(&["Person<HELD_BY-Account"]), &defs).unwrap();
        assert_eq!(right.as_deref(), Some("uniqueAccountId"));

        let resolved = associate_property_name(&index(&["Account-HELD_BY-Person"]), &defs).unwrap();
        assert_eq!(resolved.as_deref(), Some("uniquePersonId"));
    }

    #[test]
    fn test_plain_index_has_no_association() {
        let none = associate_property_name(&index(&["number"]), &catalog()).unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_rejects_two_chains_and_empty_resolution() {
        let defs = catalog();
        let two = associate_property_name(&index(&["A-E>B", "C-F>D"]), &defs);
        assert!(matches!(two, Err(ChainError::Associate(_))));

        let empty = associate_property_name(&index(&["Person-*>*"]), &defs);
        assert!(matches!(empty, Err(ChainError::Associate(_))));
    }

    #[test]
    fn test_target_type() {
        let defs = catalog();
        assert!(is_associate_property_name("uniquePersonId", &defs));
        assert!(!is_associate_property_name("uniqueGhostId", &defs));
        assert!(!is_associate_property_name("personId", &defs));
        assert_eq!(
            associate_target_type("uniqueAccountId", &defs).map(|def| def.node_name.clone()),
            Some("Account".to_string())
        );
    }

    #[test]
    fn test_dotted_type_names() {
        let mut defs = Catalog::new();
        defs.put_node(NodeDefinition::new("bank.Account"), false).unwrap();
        defs.put_node(NodeDefinition::new("crm.Person"), false).unwrap();
        defs.put_event(EventDefinition::new("HELD_BY", "bank.Account", "crm.Person"), false)
            .unwrap();

        let name = associate_property_name(&index(&["bank.Account-HELD_BY>crm.Person"]), &defs)
            .unwrap();
        assert_eq!(name.as_deref(), Some("uniquecrm.PersonId"));
        assert!(is_associate_property_name("uniquecrm.PersonId", &defs));
    }

    #[test]
    fn test_uuid_through_associated_property() {
        let defs = catalog();
        let mut a = NodeEntity::new("Account", "1")
            .with_property("number", "42")
            .with_property("uniquePersonId", "p1");
        let mut b = NodeEntity::new("Account", "2")
            .with_property("number", "42")
            .with_property("uniquePersonId", "p2");
        let mut missing = NodeEntity::new("Account", "3").with_property("number", "42");

        assert_ne!(a.generate_uuid(&defs).unwrap(), b.generate_uuid(&defs).unwrap());
        assert!(a.uuid().is_some());
        assert_eq!(missing.generate_uuid(&defs).unwrap(), None);
    }
}
