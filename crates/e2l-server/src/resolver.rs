//! Property path resolution for `set`
//!
//! A path looks like `entity[:component...]:property`. Every segment but the
//! last is a regular expression matched at the start of a name; the first
//! segment selects entity groups, each later one expands the candidates to
//! their matching direct sub-components. One path can therefore touch any
//! number of objects.

use crate::engine::{Engine, ObjectGraph, ObjectId, WorldId};
use e2l_core::{BridgeError, PropertyValue, Result, Setter};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Final segment of a path
#[derive(Debug, Clone)]
pub enum PropertyPattern {
    /// Plain identifier, compared verbatim
    Literal(String),
    /// Anything else, matched against the whole property name
    Pattern(Regex),
}

impl PropertyPattern {
    fn parse(segment: &str) -> Result<Self> {
        if is_identifier(segment) {
            return Ok(PropertyPattern::Literal(segment.to_string()));
        }
        compile(segment, true).map(PropertyPattern::Pattern)
    }

    /// Names of the properties on `object` selected by this pattern
    fn select<G: ObjectGraph + ?Sized>(&self, graph: &G, object: ObjectId) -> Vec<String> {
        match self {
            PropertyPattern::Literal(name) if graph.has_property(object, name) => vec![name.clone()],
            PropertyPattern::Literal(_) => Vec::new(),
            PropertyPattern::Pattern(re) => graph
                .property_names(object)
                .into_iter()
                .filter(|name| re.is_match(name))
                .collect(),
        }
    }
}

/// A parsed `entity[:component...]:property` expression
#[derive(Debug, Clone)]
pub struct PropertyPath {
    scopes: Vec<Regex>,
    property: PropertyPattern,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Result<Self> {
        let malformed = |detail: &str| {
            BridgeError::malformed(format!(
                "Malformatted actor[:comp]?:property specifier ({}): {}. Needs to be [actor-pattern[:comp-pattern(s)]*:property-pattern].",
                path, detail
            ))
        };

        let body = path.strip_prefix(':').unwrap_or(path);
        let mut segments: Vec<&str> = body.split(':').collect();
        if segments.len() < 2 {
            return Err(malformed("no property segment"));
        }
        let property = segments.pop().unwrap_or_default();
        if property.is_empty() {
            return Err(malformed("empty property segment"));
        }

        let scopes = segments
            .into_iter()
            .map(|segment| {
                if segment.is_empty() {
                    return Err(malformed("empty segment"));
                }
                compile(segment, false).map_err(|_| malformed(&format!("invalid pattern '{}'", segment)))
            })
            .collect::<Result<Vec<_>>>()?;
        let property = PropertyPattern::parse(property)
            .map_err(|_| malformed(&format!("invalid property pattern '{}'", property)))?;

        Ok(Self { scopes, property })
    }

    /// Number of entity/component segments
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Objects matched by the entity and component segments
    pub fn resolve_objects<G: ObjectGraph + ?Sized>(&self, graph: &G, world: WorldId) -> Vec<ObjectId> {
        let mut scopes = self.scopes.iter();
        let Some(first) = scopes.next() else {
            return Vec::new();
        };

        let mut candidates: Vec<ObjectId> = entity_groups(graph, world)
            .into_iter()
            .filter(|(base, _)| first.is_match(base))
            .flat_map(|(_, members)| members)
            .collect();

        for scope in scopes {
            if candidates.is_empty() {
                break;
            }
            candidates = candidates
                .iter()
                .flat_map(|object| graph.children(*object))
                .filter(|child| graph.name(*child).is_some_and(|name| scope.is_match(&name)))
                .collect();
        }
        candidates
    }

    /// `(object, property)` pairs the path addresses
    pub fn resolve<G: ObjectGraph + ?Sized>(&self, graph: &G, world: WorldId) -> Vec<(ObjectId, String)> {
        self.resolve_objects(graph, world)
            .into_iter()
            .flat_map(|object| {
                self.property
                    .select(graph, object)
                    .into_iter()
                    .map(move |name| (object, name))
            })
            .collect()
    }
}

/// Strip one trailing `_<digits>` disambiguation suffix
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((base, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

/// Entities of `world` grouped by base name
pub fn entity_groups<G: ObjectGraph + ?Sized>(graph: &G, world: WorldId) -> BTreeMap<String, Vec<ObjectId>> {
    let mut groups: BTreeMap<String, Vec<ObjectId>> = BTreeMap::new();
    for entity in graph.entities(world) {
        if let Some(name) = graph.name(entity) {
            groups.entry(base_name(&name).to_string()).or_default().push(entity);
        }
    }
    groups
}

/// Apply a batch of setters; returns the number of property writes
///
/// Every path is parsed before anything is written. Past that point writes
/// are applied in order and not rolled back if a later setter fails.
pub fn apply_setters<E: Engine + ?Sized>(engine: &mut E, world: WorldId, setters: &[Setter]) -> Result<usize> {
    let parsed = setters
        .iter()
        .map(|setter| PropertyPath::parse(&setter.path).map(|path| (setter, path)))
        .collect::<Result<Vec<_>>>()?;

    let mut writes = 0;
    for (setter, path) in parsed {
        let value = PropertyValue::from_wire(&setter.value)?;
        let targets = path.resolve(&*engine, world);
        debug!(
            path = %setter.path,
            relative = setter.relative,
            targets = targets.len(),
            "applying setter"
        );

        for (object, property) in targets {
            let Some(current) = engine.property(object, &property) else {
                continue;
            };
            let next = if setter.relative {
                current.add(&value)?
            } else {
                value.clone().coerce_like(&current)?
            };
            trace!(object, property = %property, value = %next, "property written");
            engine.set_property(object, &property, next)?;
            writes += 1;
        }
    }
    Ok(writes)
}

fn is_identifier(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn compile(pattern: &str, full: bool) -> Result<Regex> {
    let anchored = if full {
        format!("^(?:{})$", pattern)
    } else {
        format!("^(?:{})", pattern)
    };
    Regex::new(&anchored).map_err(|e| BridgeError::malformed(e.to_string()))
}
