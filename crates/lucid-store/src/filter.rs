//! Query filters and find options.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Declarative document filter.
///
/// Field paths may be dotted (`result.reason`). Comparisons are numeric for
/// numbers, chronological for RFC3339 strings, lexicographic otherwise.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Convenience equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Eq(field.into(), value.into())
    }

    /// True when `doc` satisfies this filter.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => lookup(doc, field) == Some(value),
            Filter::Ne(field, value) => lookup(doc, field) != Some(value),
            Filter::Gt(field, value) => cmp_field(doc, field, value) == Some(Ordering::Greater),
            Filter::Gte(field, value) => matches!(
                cmp_field(doc, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, value) => cmp_field(doc, field, value) == Some(Ordering::Less),
            Filter::Lte(field, value) => matches!(
                cmp_field(doc, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(field, values) => {
                lookup(doc, field).is_some_and(|actual| values.iter().any(|v| v == actual))
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Sort / pagination options for find operations.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Sort keys, applied in order.
    pub sort: Vec<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted_by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: vec![(field.into(), order)],
            ..Default::default()
        }
    }

    pub fn then_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

/// Resolves a dotted field path inside a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn cmp_field(doc: &Value, field: &str, value: &Value) -> Option<Ordering> {
    cmp_values(lookup(doc, field)?, value)
}

/// Total-ish ordering over JSON scalars.
pub fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            // RFC3339 strings compare chronologically regardless of
            // fractional-second precision.
            match (parse_rfc3339(x), parse_rfc3339(y)) {
                (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sorts documents in place by the given sort keys.
pub fn sort_documents(docs: &mut [Value], sort: &[(String, SortOrder)]) {
    docs.sort_by(|a, b| {
        for (field, order) in sort {
            let ord = match (lookup(a, field), lookup(b, field)) {
                (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
