//! Chain parsing and wildcard expansion using Pest

use super::item::{ChainItem, ChainPath, Term};
use super::{Chain, ChainError, ChainResult};
use crate::definition::DefinitionSource;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

#[derive(Parser)]
#[grammar = "chain/chain.pest"]
struct ChainParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Line,
    Left,
    Right,
}

/// Event, far node and direction of one hop; the near node is wherever the
/// previous hop ended
#[derive(Debug)]
struct Hop {
    event: Term,
    last: Term,
    path: ChainPath,
}

/// Parse a chain expression, expanding wildcards against `defs`
///
/// Returns `Ok(None)` for empty or blank input. A hop whose expansion has no match
/// truncates its alternative at that point; if no alternative keeps a single
/// hop the chain is empty.
pub fn parse<D: DefinitionSource + ?Sized>(text: &str, defs: &D) -> ChainResult<Option<Chain>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let (start, hops) = tokenize(text)?;
    let alternatives = resolve(start, &hops, defs)?;
    let labels = bind_labels(&alternatives)?;
    Ok(Some(Chain::new(alternatives, labels)))
}

fn tokenize(text: &str) -> ChainResult<(Term, Vec<Hop>)> {
    let mut terms = Vec::new();
    let mut markers = Vec::new();
    for pair in ChainParser::parse(Rule::chain, text)? {
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::term => terms.push(parse_term(inner)),
                Rule::path_line => markers.push(Marker::Line),
                Rule::path_left => markers.push(Marker::Left),
                Rule::path_right => markers.push(Marker::Right),
                _ => {}
            }
        }
    }
    trace!(chain = text, terms = terms.len(), "tokenized chain");

    if terms.len() < 3 || terms.len() % 2 == 0 {
        return Err(ChainError::Incomplete(text.to_string()));
    }
    let start = terms.remove(0);
    if start.is_wildcard() {
        return Err(ChainError::WildcardStart(text.to_string()));
    }

    let mut hops = Vec::with_capacity(terms.len() / 2);
    for (pair, names) in markers.chunks_exact(2).zip(terms.chunks_exact(2)) {
        let (event, last) = (&names[0], &names[1]);
        let path = direction(pair[0], pair[1], text, event)?;
        trace!(event = %event, last = %last, ?path, "chain hop");
        hops.push(Hop {
            event: event.clone(),
            last: last.clone(),
            path,
        });
    }
    Ok((start, hops))
}

fn parse_term(pair: Pair<Rule>) -> Term {
    let mut label = None;
    let mut name = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::label => label = Some(inner.as_str().to_string()),
            Rule::name | Rule::wildcard => name = inner.as_str().to_string(),
            _ => {}
        }
    }
    Term::new(label, name)
}

fn direction(before: Marker, after: Marker, chain: &str, event: &Term) -> ChainResult<ChainPath> {
    let reason = match (before, after) {
        (Marker::Line, Marker::Line) => return Ok(ChainPath::Both),
        (Marker::Line, Marker::Left) => return Ok(ChainPath::LeftAnchored),
        (Marker::Right, Marker::Line) => return Ok(ChainPath::RightAnchored),
        (Marker::Left, _) => "a hop cannot open with '>'",
        (_, Marker::Right) => "a hop cannot close with '<'",
        (Marker::Right, Marker::Left) => "'<' and '>' point both ways",
    };
    Err(ChainError::Path {
        chain: chain.to_string(),
        event: event.to_string(),
        reason,
    })
}

/// Build every concrete alternative, hop by hop
fn resolve<D: DefinitionSource + ?Sized>(
    start: Term,
    hops: &[Hop],
    defs: &D,
) -> ChainResult<Vec<Vec<ChainItem>>> {
    let mut open: Vec<Vec<ChainItem>> = vec![Vec::new()];
    let mut truncated: Vec<Vec<ChainItem>> = Vec::new();

    for hop in hops {
        let mut next = Vec::with_capacity(open.len());
        for mut branch in open {
            let first = branch
                .last()
                .map(|item| item.last.clone())
                .unwrap_or_else(|| start.clone());
            let item = ChainItem::new(first, hop.event.clone(), hop.last.clone(), hop.path);

            if !item.needs_expansion() {
                branch.push(item);
                next.push(branch);
                continue;
            }

            let expanded = expand(&item, defs)?;
            if expanded.is_empty() {
                warn!(item = %item, "no definition matches chain item, truncating");
                truncated.push(branch);
                continue;
            }
            debug!(item = %item, alternatives = expanded.len(), "expanded chain item");
            for resolved in expanded {
                let mut alternative = branch.clone();
                alternative.push(resolved);
                next.push(alternative);
            }
        }
        open = next;
        if open.is_empty() {
            break;
        }
    }

    let mut alternatives: Vec<Vec<ChainItem>> = Vec::new();
    for mut branch in open.into_iter().chain(truncated) {
        if branch.is_empty() {
            continue;
        }
        let len = branch.len();
        for (position, item) in branch.iter_mut().enumerate() {
            item.position = position;
            item.len = len;
        }
        if !alternatives.contains(&branch) {
            alternatives.push(branch);
        }
    }
    Ok(alternatives)
}

/// Concrete, directed items for one open item
///
/// Left-anchored matches come before right-anchored ones.
fn expand<D: DefinitionSource + ?Sized>(item: &ChainItem, defs: &D) -> ChainResult<Vec<ChainItem>> {
    let anchor = item.first_node();
    if defs.node_definition(anchor).is_none() {
        return Err(ChainError::UndefinedNode(anchor.to_string()));
    }

    let incident = defs.events_incident_to(anchor);
    let event_matches = |name: &str| item.event.is_wildcard() || item.event() == name;
    let far_matches = |name: &str| item.last.is_wildcard() || item.last_node() == name;
    let mut expanded: Vec<ChainItem> = Vec::new();
    let mut push = |event: &str, far: &str, path: ChainPath| {
        let resolved = ChainItem::new(
            item.first.clone(),
            item.event.resolved(event),
            item.last.resolved(far),
            path,
        );
        if !expanded.contains(&resolved) {
            expanded.push(resolved);
        }
    };

    if item.path != ChainPath::RightAnchored {
        for def in &incident {
            if def.left_node_name == anchor
                && event_matches(&def.event_name)
                && far_matches(&def.right_node_name)
            {
                push(&def.event_name, &def.right_node_name, ChainPath::LeftAnchored);
            }
        }
    }
    if item.path != ChainPath::LeftAnchored {
        for def in &incident {
            if def.right_node_name == anchor
                && event_matches(&def.event_name)
                && far_matches(&def.left_node_name)
            {
                push(&def.event_name, &def.left_node_name, ChainPath::RightAnchored);
            }
        }
    }
    Ok(expanded)
}

/// One label may name only one type across the whole expression
fn bind_labels(alternatives: &[Vec<ChainItem>]) -> ChainResult<BTreeMap<String, String>> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for term in alternatives.iter().flatten().flat_map(ChainItem::labelled_terms) {
        let Some(label) = &term.label else {
            continue;
        };
        match labels.get(label) {
            Some(existing) if *existing != term.name => {
                return Err(ChainError::DuplicateLabel {
                    label: label.clone(),
                    existing: existing.clone(),
                    incoming: term.name.clone(),
                });
            }
            Some(_) => {}
            None => {
                labels.insert(label.clone(), term.name.clone());
            }
        }
    }
    Ok(labels)
}
