//! Store-neutral query description.
//!
//! Field names are entity field names as they appear in the serialized
//! entity; nested fields use dotted paths (`meta.size`). Values are JSON.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of field conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: impl Into<String>, op: Op, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn id(id: Uuid) -> Self {
        Self::new().eq("id", id.to_string())
    }

    /// Equality on every entry of `fields`.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        fields
            .iter()
            .fold(Self::new(), |filter, (k, v)| filter.eq(k.as_str(), v.clone()))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Eq, value.into())
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Ne, value.into())
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Gt, value.into())
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Gte, value.into())
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Lt, value.into())
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Op::Lte, value.into())
    }

    pub fn is_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, Op::In, Value::Array(values))
    }

    /// `true` matches missing or null fields, `false` anything else.
    pub fn is_null(self, field: impl Into<String>, null: bool) -> Self {
        self.push(field, Op::IsNull, Value::Bool(null))
    }

    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a serialized entity.
    pub fn matches(&self, document: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

impl Condition {
    fn matches(&self, document: &Map<String, Value>) -> bool {
        let actual = lookup(document, &self.field).unwrap_or(&Value::Null);
        match self.op {
            Op::Eq => json_eq(actual, &self.value),
            Op::Ne => !json_eq(actual, &self.value),
            Op::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Op::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Op::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Op::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::In => self
                .value
                .as_array()
                .is_some_and(|options| options.iter().any(|v| json_eq(actual, v))),
            Op::IsNull => actual.is_null() == self.value.as_bool().unwrap_or(true),
        }
    }
}

/// Resolve a dotted path inside a JSON object.
pub fn lookup<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    parts.try_fold(document.get(first)?, |current, part| current.get(part))
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: null, bool, number, string, then the rest.
pub fn total_order(a: &Value, b: &Value) -> Ordering {
    compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    keys: Vec<(String, Direction)>,
}

impl Sort {
    /// Parse `"-created_at, name"`: `-` sorts descending, `+` or nothing
    /// ascending. Blank entries are ignored.
    pub fn parse(spec: &str) -> Self {
        let keys = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.strip_prefix('-') {
                Some(field) => (field.to_string(), Direction::Desc),
                None => (
                    part.strip_prefix('+').unwrap_or(part).to_string(),
                    Direction::Asc,
                ),
            })
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[(String, Direction)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for (field, direction) in &self.keys {
            let left = lookup(a, field).unwrap_or(&Value::Null);
            let right = lookup(b, field).unwrap_or(&Value::Null);
            let ordering = match direction {
                Direction::Asc => total_order(left, right),
                Direction::Desc => total_order(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Count annotation: the size of an array field or of an expanded relation,
/// exposed as `annotations.<name>` on the loaded entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Count {
    pub name: String,
    pub field: String,
}

impl Count {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
        }
    }
}

/// What a store is asked to load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Sort,
    pub skip: u64,
    pub limit: Option<u64>,
    pub expand: Vec<String>,
    pub annotations: Vec<Count>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}
