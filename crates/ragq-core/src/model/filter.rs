//! Typed equality filters applied at the vector-store boundary.
//!
//! A [`WhereFilter`] is a closed predicate: every entry is `field == value`
//! where the value is one of the scalar [`FilterValue`] variants. Untyped
//! input (CLI pairs, JSON objects) is validated when it is converted, so the
//! pipeline never forwards nested objects, arrays, nulls, or store operators.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::RetrievalError;
use crate::model::Metadata;

/// Cache key used when no filter (or an empty filter) applies.
pub const UNFILTERED_KEY: &str = "__ALL__";

/// Scalar value accepted on the right-hand side of a filter entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FilterValue {
    /// Interpret a CLI literal: `true`/`false`, integers, finite floats, and
    /// strings. Double-quoted literals are always strings.
    #[must_use]
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            return Self::Str(trimmed[1..trimmed.len() - 1].to_string());
        }
        match trimmed {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return Self::Int(int);
        }
        match trimmed.parse::<f64>() {
            Ok(float) if float.is_finite() => Self::Float(float),
            _ => Self::Str(trimmed.to_string()),
        }
    }

    /// Equality against a stored metadata value. Numbers compare numerically.
    #[must_use]
    pub fn matches(&self, stored: &Value) -> bool {
        match (self, stored) {
            (Self::Bool(want), Value::Bool(have)) => want == have,
            (Self::Str(want), Value::String(have)) => want == have,
            (Self::Int(want), Value::Number(have)) => have
                .as_i64()
                .map_or_else(|| have.as_f64() == Some(*want as f64), |n| n == *want),
            (Self::Float(want), Value::Number(have)) => have.as_f64() == Some(*want),
            _ => false,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

impl TryFrom<Value> for FilterValue {
    type Error = RetrievalError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Str(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                    Ok(Self::Float(f))
                } else {
                    Err(RetrievalError::InvalidFilter(format!(
                        "number {n} is not representable"
                    )))
                }
            }
            Value::Null => Err(RetrievalError::InvalidFilter(
                "null is not a filter value".into(),
            )),
            Value::Array(_) | Value::Object(_) => Err(RetrievalError::InvalidFilter(
                "filter values must be scalars".into(),
            )),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Conjunction of `field == value` predicates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct WhereFilter {
    entries: BTreeMap<String, FilterValue>,
}

impl WhereFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one predicate.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidFilter`] for empty field names, names
    /// starting with `$`, and non-finite floats.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: FilterValue,
    ) -> Result<(), RetrievalError> {
        let field = field.into();
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Err(RetrievalError::InvalidFilter(
                "field name must not be empty".into(),
            ));
        }
        if trimmed.starts_with('$') {
            return Err(RetrievalError::InvalidFilter(format!(
                "field name '{trimmed}' is reserved for store operators"
            )));
        }
        if matches!(value, FilterValue::Float(f) if !f.is_finite()) {
            return Err(RetrievalError::InvalidFilter(format!(
                "field '{trimmed}' has a non-finite value"
            )));
        }
        self.entries.insert(trimmed.to_string(), value);
        Ok(())
    }

    /// Builder form of [`WhereFilter::insert`].
    ///
    /// # Errors
    ///
    /// Same as [`WhereFilter::insert`].
    pub fn with(
        mut self,
        field: impl Into<String>,
        value: FilterValue,
    ) -> Result<Self, RetrievalError> {
        self.insert(field, value)?;
        Ok(self)
    }

    /// Parse `field=value` pairs as given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidFilter`] when a pair has no `=` or an
    /// invalid field name.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self, RetrievalError> {
        let mut filter = Self::new();
        for pair in pairs {
            let (field, raw) = pair.split_once('=').ok_or_else(|| {
                RetrievalError::InvalidFilter(format!("expected field=value, got '{pair}'"))
            })?;
            filter.insert(field, FilterValue::parse_literal(raw))?;
        }
        Ok(filter)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.entries.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when every predicate holds for `metadata`.
    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.entries
            .iter()
            .all(|(field, want)| metadata.get(field).is_some_and(|have| want.matches(have)))
    }

    /// Deterministic key identifying this predicate, for caches keyed by filter.
    #[must_use]
    pub fn cache_key(&self) -> String {
        if self.entries.is_empty() {
            return UNFILTERED_KEY.to_string();
        }
        serde_json::to_string(&self.entries).unwrap_or_else(|_| format!("{:?}", self.entries))
    }

    /// Cache key for an optional filter; `None` and empty share [`UNFILTERED_KEY`].
    #[must_use]
    pub fn cache_key_for(filter: Option<&Self>) -> String {
        filter.map_or_else(|| UNFILTERED_KEY.to_string(), Self::cache_key)
    }

    /// Store-side `where` clause. A single predicate is `{field: value}`;
    /// several are combined under `$and`. `None` for an empty filter.
    #[must_use]
    pub fn to_store_clause(&self) -> Option<Value> {
        let mut clauses: Vec<Value> = self
            .entries
            .iter()
            .map(|(field, value)| {
                let mut clause = serde_json::Map::new();
                clause.insert(field.clone(), value.to_json());
                Value::Object(clause)
            })
            .collect();

        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(serde_json::json!({ "$and": clauses })),
        }
    }
}

impl Serialize for WhereFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl TryFrom<BTreeMap<String, Value>> for WhereFilter {
    type Error = RetrievalError;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut filter = Self::new();
        for (field, value) in raw {
            filter.insert(field, FilterValue::try_from(value)?)?;
        }
        Ok(filter)
    }
}

impl fmt::Display for WhereFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("(none)");
        }
        let mut first = true;
        for (field, value) in &self.entries {
            if !first {
                f.write_str(" AND ")?;
            }
            write!(f, "{field} = {value}")?;
            first = false;
        }
        Ok(())
    }
}
