//! Discovery query language
//!
//! A query is a JSON object. Keys are dotted paths into the manifest
//! document and are ANDed together. Values are predicates:
//!
//! | value              | meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | literal            | equality; contains when the target is an array   |
//! | `"!literal"`       | inequality; an absent field counts as unequal    |
//! | `"pre*"`           | anchored glob; any element when the target is an array |
//! | `"!pre*"`          | negated glob                                     |
//! | `[a, b]`           | any of, or all contained when the target is an array |
//! | `{...}`            | subquery against the object at that path         |
//!
//! Top-level paths that do not exist at the document root are looked up
//! under `element` and then `metadata`, so `{"type": "action"}` and
//! `{"tags": ["auth"]}` work without spelling out the section.

use regex::Regex;
use serde_json::Value;

use crate::error::QueryError;

const FALLBACK_SECTIONS: [&str; 2] = ["element", "metadata"];

/// An anchored `*` wildcard pattern
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, QueryError> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body)).map_err(|e| QueryError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn matches(&self, target: &Value) -> bool {
        match target {
            Value::String(s) => self.is_match(s),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|s| self.is_match(s)),
            _ => false,
        }
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Glob(Glob),
    NotGlob(Glob),
    OneOf(Vec<Value>),
    Path(Query),
}

impl Predicate {
    fn parse(value: &Value) -> Result<Self, QueryError> {
        let predicate = match value {
            Value::String(s) => match s.strip_prefix('!') {
                Some(rest) if rest.contains('*') => Predicate::NotGlob(Glob::new(rest)?),
                Some(rest) => Predicate::Ne(Value::String(rest.to_string())),
                None if s.contains('*') => Predicate::Glob(Glob::new(s)?),
                None => Predicate::Eq(value.clone()),
            },
            Value::Array(items) => Predicate::OneOf(items.clone()),
            Value::Object(_) => Predicate::Path(Query::parse(value)?),
            other => Predicate::Eq(other.clone()),
        };
        Ok(predicate)
    }

    fn matches(&self, target: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(expected) => target.is_some_and(|t| equals(t, expected)),
            Predicate::Ne(expected) => !target.is_some_and(|t| equals(t, expected)),
            Predicate::Glob(glob) => target.is_some_and(|t| glob.matches(t)),
            Predicate::NotGlob(glob) => !target.is_some_and(|t| glob.matches(t)),
            Predicate::OneOf(options) => match target {
                Some(Value::Array(items)) => options.iter().all(|o| items.contains(o)),
                Some(t) => options.contains(t),
                None => false,
            },
            Predicate::Path(query) => match target {
                Some(object @ Value::Object(_)) => query.matches_within(object),
                _ => false,
            },
        }
    }
}

fn equals(target: &Value, expected: &Value) -> bool {
    match target {
        Value::Array(items) if !expected.is_array() => items.contains(expected),
        _ => target == expected,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub path: Vec<String>,
    pub predicate: Predicate,
}

/// A parsed discovery query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Parse a query document
    pub fn parse(document: &Value) -> Result<Self, QueryError> {
        let Value::Object(map) = document else {
            return Err(QueryError::NotAnObject(kind_of(document)));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let path: Vec<String> = key.split('.').map(str::to_string).collect();
            if path.iter().any(String::is_empty) {
                return Err(QueryError::EmptyKey(key.clone()));
            }
            clauses.push(Clause {
                path,
                predicate: Predicate::parse(value)?,
            });
        }

        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True for `{}`
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Match a manifest document, with section fallback for top-level paths
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.predicate.matches(resolve(document, &clause.path)))
    }

    fn matches_within(&self, object: &Value) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.predicate.matches(lookup(object, &clause.path)))
    }
}

fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment.as_str()))
}

fn resolve<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    let first = path.first()?;
    if document.get(first.as_str()).is_some() {
        return lookup(document, path);
    }
    FALLBACK_SECTIONS
        .iter()
        .filter_map(|section| document.get(section))
        .find_map(|section| lookup(section, path))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
