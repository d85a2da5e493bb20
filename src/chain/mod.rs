//! Relationship chain expressions
//!
//! A chain such as `Person-OWNS>Car<MADE_BY-Company` describes a path of
//! Node-Event-Node hops. Tokens may carry a `label:` alias or be the wildcard
//! `*`. Path markers around an event fix its direction:
//!
//! - `A-E>B`: `A` is the left node
//! - `A<E-B`: `A` is the right node
//! - `A-E-B`: either way round
//!
//! Wildcards and open directions are expanded against the definition registry,
//! so one expression yields a set of alternative, fully concrete chains.

pub mod associate;
pub mod item;
pub mod parser;

pub use item::{ChainItem, ChainPath, Term, WILDCARD};
pub use parser::{parse, Rule};

use std::collections::BTreeMap;
use thiserror::Error;

/// Chain errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Chain syntax: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Chain [{chain}] has an invalid path around {event}: {reason}")]
    Path {
        chain: String,
        event: String,
        reason: &'static str,
    },

    #[error("Chain [{0}] is incomplete")]
    Incomplete(String),

    #[error("Label {label} is bound to both {existing} and {incoming}")]
    DuplicateLabel {
        label: String,
        existing: String,
        incoming: String,
    },

    #[error("Chain [{0}] cannot start with a wildcard")]
    WildcardStart(String),

    #[error("Node type {0} is not defined")]
    UndefinedNode(String),

    #[error("Associative unique property: {0}")]
    Associate(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Parsed chain: every concrete alternative plus the label bindings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    alternatives: Vec<Vec<ChainItem>>,
    labels: BTreeMap<String, String>,
}

impl Chain {
    pub(crate) fn new(alternatives: Vec<Vec<ChainItem>>, labels: BTreeMap<String, String>) -> Self {
        Chain {
            alternatives,
            labels,
        }
    }

    pub fn alternatives(&self) -> &[Vec<ChainItem>] {
        &self.alternatives
    }

    /// Label to resolved type name, across every alternative
    pub fn label_types(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vec<ChainItem>> {
        self.alternatives.iter()
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Vec<ChainItem>;
    type IntoIter = std::slice::Iter<'a, Vec<ChainItem>>;

    fn into_iter(self) -> Self::IntoIter {
        self.alternatives.iter()
    }
}

/// Whether `text` contains any path marker
pub fn has_relationship_syntax(text: &str) -> bool {
    text.contains(['-', '>', '<'])
}
