//! Chain items: one Node-Event-Node hop

use std::fmt;

pub const WILDCARD: &str = "*";
pub const LABEL_DELIMITER: &str = ":";

/// Which endpoint of the event the item's first node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainPath {
    /// `A-E>B`: the first node is the event's left node
    LeftAnchored,
    /// `A<E-B`: the first node is the event's right node
    RightAnchored,
    /// `A-E-B`: either, resolved by expansion
    Both,
}

impl ChainPath {
    /// Path markers before and after the event token
    pub fn markers(&self) -> (&'static str, &'static str) {
        match self {
            ChainPath::LeftAnchored => ("-", ">"),
            ChainPath::RightAnchored => ("<", "-"),
            ChainPath::Both => ("-", "-"),
        }
    }
}

/// A type or event name with its optional alias
///
/// A plain name is its own label; an unlabeled wildcard has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    pub label: Option<String>,
    pub name: String,
}

impl Term {
    pub fn new(label: Option<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let label = match label {
            Some(label) => Some(label),
            None if name == WILDCARD => None,
            None => Some(name.clone()),
        };
        Term { label, name }
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    /// Same label, concrete name
    pub(crate) fn resolved(&self, name: &str) -> Self {
        Term {
            label: self.label.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) if *label != self.name => write!(f, "{}{}{}", label, LABEL_DELIMITER, self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// One hop of a chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainItem {
    pub(crate) first: Term,
    pub(crate) event: Term,
    pub(crate) last: Term,
    pub(crate) path: ChainPath,
    pub(crate) position: usize,
    pub(crate) len: usize,
}

impl ChainItem {
    pub(crate) fn new(first: Term, event: Term, last: Term, path: ChainPath) -> Self {
        ChainItem {
            first,
            event,
            last,
            path,
            position: 0,
            len: 1,
        }
    }

    pub fn first_node(&self) -> &str {
        &self.first.name
    }

    pub fn first_label(&self) -> Option<&str> {
        self.first.label.as_deref()
    }

    pub fn event(&self) -> &str {
        &self.event.name
    }

    pub fn event_label(&self) -> Option<&str> {
        self.event.label.as_deref()
    }

    pub fn last_node(&self) -> &str {
        &self.last.name
    }

    pub fn last_label(&self) -> Option<&str> {
        self.last.label.as_deref()
    }

    pub fn path(&self) -> ChainPath {
        self.path
    }

    /// Zero-based index of this item in its chain
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_next(&self) -> bool {
        self.position + 1 < self.len
    }

    /// Whether the registry must be consulted before the item is concrete
    pub fn needs_expansion(&self) -> bool {
        self.event.is_wildcard() || self.last.is_wildcard() || self.path == ChainPath::Both
    }

    fn left(&self) -> Option<&Term> {
        match self.path {
            ChainPath::LeftAnchored => Some(&self.first),
            ChainPath::RightAnchored => Some(&self.last),
            ChainPath::Both => None,
        }
    }

    fn right(&self) -> Option<&Term> {
        match self.path {
            ChainPath::LeftAnchored => Some(&self.last),
            ChainPath::RightAnchored => Some(&self.first),
            ChainPath::Both => None,
        }
    }

    /// Type at the event's left end, unknown while the direction is open
    pub fn left_node_name(&self) -> Option<&str> {
        self.left().map(|term| term.name.as_str())
    }

    pub fn left_node_label(&self) -> Option<&str> {
        self.left().and_then(|term| term.label.as_deref())
    }

    pub fn right_node_name(&self) -> Option<&str> {
        self.right().map(|term| term.name.as_str())
    }

    pub fn right_node_label(&self) -> Option<&str> {
        self.right().and_then(|term| term.label.as_deref())
    }

    pub(crate) fn labelled_terms(&self) -> [&Term; 3] {
        [&self.first, &self.event, &self.last]
    }
}

impl fmt::Display for ChainItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (before, after) = self.path.markers();
        write!(f, "{}{}{}{}{}", self.first, before, self.event, after, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: ChainPath) -> ChainItem {
        ChainItem::new(
            Term::new(Some("p".into()), "Person"),
            Term::new(None, "OWNS"),
            Term::new(None, "Car"),
            path,
        )
    }

    #[test]
    fn test_term_labels() {
        assert_eq!(Term::new(None, "Car").label.as_deref(), Some("Car"));
        assert_eq!(Term::new(None, WILDCARD).label, None);
        assert_eq!(Term::new(Some("x".into()), WILDCARD).to_string(), "x:*");
    }

    #[test]
    fn test_endpoint_names_follow_direction() {
        let left = item(ChainPath::LeftAnchored);
        assert_eq!(left.left_node_name(), Some("Person"));
        assert_eq!(left.right_node_name(), Some("Car"));
        assert_eq!(left.left_node_label(), Some("p"));

        let right = item(ChainPath::RightAnchored);
        assert_eq!(right.left_node_name(), Some("Car"));
        assert_eq!(right.right_node_label(), Some("p"));

        let both = item(ChainPath::Both);
        assert_eq!(both.left_node_name(), None);
        assert!(both.needs_expansion());
    }

    #[test]
    fn test_display() {
        assert_eq!(item(ChainPath::LeftAnchored).to_string(), "p:Person-OWNS>Car");
        assert_eq!(item(ChainPath::RightAnchored).to_string(), "p:Person<OWNS-Car");
    }
}
