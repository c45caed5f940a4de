//! Filter chains and index keys
//!
//! A GraphQL filter argument is first flattened into [`FilterCondition`]s by
//! the resolver, then turned into a typed chain here. The chain is used two
//! ways: as a predicate over whole records ([`make_filter`]) and, when an
//! index covers its fields, as key bounds ([`make_filter_suffixes`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::jsonpath;
use crate::error::{Error, Result};
use crate::schema::{FieldType, IndexDefinition};

/// Separator between the components of a composite index key
pub const INDEX_KEY_FIELD_SEPARATOR: &str = ":";

/// Key in a filter expression carrying the field type
pub const FILTER_TYPE_KEY: &str = "_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
    StartsWith,
    In,
}

impl Op {
    /// Operator for a filter key; `after` and `before` are range aliases
    pub fn from_filter_key(key: &str) -> Option<Op> {
        match key {
            "eq" => Some(Op::Eq),
            "gt" | "after" => Some(Op::Gt),
            "lt" | "before" => Some(Op::Lt),
            "gte" => Some(Op::Gte),
            "lte" => Some(Op::Lte),
            "startsWith" => Some(Op::StartsWith),
            "in" => Some(Op::In),
            _ => None,
        }
    }

    fn is_lower_bound(&self) -> bool {
        matches!(self, Op::Gt | Op::Gte)
    }

    fn is_upper_bound(&self) -> bool {
        matches!(self, Op::Lt | Op::Lte)
    }
}

/// One field condition: a path and its operator map
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub filter_path: String,
    /// Operator keys plus `_type`, e.g. `{"eq": "x", "_type": "string"}`
    pub filter_expression: Map<String, Value>,
}

impl FilterCondition {
    pub fn new(filter_path: impl Into<String>, field_type: FieldType, operators: Map<String, Value>) -> Self {
        let mut filter_expression = operators;
        filter_expression.insert(FILTER_TYPE_KEY.to_string(), Value::String(field_type.as_str().to_string()));
        Self {
            filter_path: filter_path.into(),
            filter_expression,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFilter {
    pub path_expression: String,
    pub operator: Op,
    pub right_operand: Value,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TernaryFilter {
    pub path_expression: String,
    pub left_operator: Op,
    pub left_operand: Option<Value>,
    pub right_operator: Op,
    pub right_operand: Option<Value>,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Binary(BinaryFilter),
    Ternary(TernaryFilter),
}

impl Filter {
    pub fn path(&self) -> &str {
        match self {
            Filter::Binary(f) => &f.path_expression,
            Filter::Ternary(f) => &f.path_expression,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Filter::Binary(f) => f.field_type,
            Filter::Ternary(f) => f.field_type,
        }
    }

    /// True if any of `values` satisfies this filter
    fn matches_any(&self, values: &[&Value]) -> bool {
        let field_type = self.field_type();
        values.iter().filter_map(|v| coerce_value(field_type, v)).any(|v| match self {
            Filter::Binary(f) => f.matches(&v),
            Filter::Ternary(f) => f.matches(&v),
        })
    }
}

impl BinaryFilter {
    fn matches(&self, value: &Value) -> bool {
        let ft = self.field_type;
        match self.operator {
            Op::Eq => compare(ft, value, &self.right_operand) == Some(Ordering::Equal),
            Op::Gt => compare(ft, value, &self.right_operand) == Some(Ordering::Greater),
            Op::Gte => matches!(compare(ft, value, &self.right_operand), Some(Ordering::Greater | Ordering::Equal)),
            Op::Lt => compare(ft, value, &self.right_operand) == Some(Ordering::Less),
            Op::Lte => matches!(compare(ft, value, &self.right_operand), Some(Ordering::Less | Ordering::Equal)),
            Op::StartsWith => match (value, &self.right_operand) {
                (Value::String(v), Value::String(prefix)) => v.starts_with(prefix.as_str()),
                (v, Value::String(prefix)) => key_component(v).starts_with(prefix.as_str()),
                _ => false,
            },
            Op::In => match &self.right_operand {
                Value::Array(candidates) => candidates
                    .iter()
                    .any(|c| compare(ft, value, c) == Some(Ordering::Equal)),
                other => compare(ft, value, other) == Some(Ordering::Equal),
            },
        }
    }
}

impl TernaryFilter {
    fn matches(&self, value: &Value) -> bool {
        let ft = self.field_type;
        let lower = match &self.left_operand {
            None => true,
            Some(bound) => match (self.left_operator, compare(ft, value, bound)) {
                (Op::Gte, Some(Ordering::Greater | Ordering::Equal)) => true,
                (Op::Gt, Some(Ordering::Greater)) => true,
                _ => false,
            },
        };
        let upper = match &self.right_operand {
            None => true,
            Some(bound) => match (self.right_operator, compare(ft, value, bound)) {
                (Op::Lte, Some(Ordering::Less | Ordering::Equal)) => true,
                (Op::Lt, Some(Ordering::Less)) => true,
                _ => false,
            },
        };
        lower && upper
    }
}

fn compare(field_type: FieldType, left: &Value, right: &Value) -> Option<Ordering> {
    match field_type {
        FieldType::Number | FieldType::Datetime => left.as_f64()?.partial_cmp(&right.as_f64()?),
        FieldType::Boolean => Some(left.as_bool()?.cmp(&right.as_bool()?)),
        _ => Some(left.as_str()?.cmp(right.as_str()?)),
    }
}

// ============================================================================
// Chain construction
// ============================================================================

/// Build a typed filter chain from conditions
///
/// One operator key gives a binary filter. Two keys must be a lower bound
/// (`gt`, `gte`, `after`) and an upper bound (`lt`, `lte`, `before`) and give
/// a ternary filter. Anything else is rejected.
pub fn make_filter_chain(conditions: &[FilterCondition]) -> Result<Vec<Filter>> {
    let mut chain = Vec::new();

    for condition in conditions {
        let path = condition.filter_path.as_str();
        let field_type = condition
            .filter_expression
            .get(FILTER_TYPE_KEY)
            .and_then(Value::as_str)
            .and_then(FieldType::parse)
            .ok_or_else(|| Error::invalid_filter(format!("Filter on field '{}' is missing its type", path)))?;

        let keys: Vec<(&String, &Value)> = condition
            .filter_expression
            .iter()
            .filter(|(k, _)| k.as_str() != FILTER_TYPE_KEY)
            .collect();

        match keys.as_slice() {
            [] => {}
            [(key, value)] => {
                let operator = Op::from_filter_key(key).ok_or_else(|| {
                    Error::invalid_filter(format!("Unsupported operator '{}' in filter on field '{}'", key, path))
                })?;
                // A null operand means the condition was not given
                if value.is_null() {
                    continue;
                }
                chain.push(Filter::Binary(BinaryFilter {
                    path_expression: path.to_string(),
                    operator,
                    right_operand: (*value).clone(),
                    field_type,
                }));
            }
            [first, second] => {
                let ops = (Op::from_filter_key(first.0), Op::from_filter_key(second.0));
                let ((left_op, left), (right_op, right)) = match ops {
                    (Some(a), Some(b)) if a.is_lower_bound() && b.is_upper_bound() => ((a, first.1), (b, second.1)),
                    (Some(a), Some(b)) if b.is_lower_bound() && a.is_upper_bound() => ((b, second.1), (a, first.1)),
                    _ => {
                        return Err(Error::invalid_filter(format!(
                            "Filter on field '{}' has an invalid combination of conditions: {}, {}",
                            path, first.0, second.0
                        )))
                    }
                };
                let left_operand = Some(left.clone()).filter(|v| !v.is_null());
                let right_operand = Some(right.clone()).filter(|v| !v.is_null());
                if left_operand.is_none() && right_operand.is_none() {
                    return Err(Error::invalid_filter(format!(
                        "Filter on field '{}' has a range with neither bound",
                        path
                    )));
                }
                chain.push(Filter::Ternary(TernaryFilter {
                    path_expression: path.to_string(),
                    left_operator: left_op,
                    left_operand,
                    right_operator: right_op,
                    right_operand,
                    field_type,
                }));
            }
            _ => {
                let names: Vec<&str> = keys.iter().map(|(k, _)| k.as_str()).collect();
                return Err(Error::invalid_filter(format!(
                    "Unexpected keys in filter on field '{}': {}",
                    path,
                    names.join(", ")
                )));
            }
        }
    }

    Ok(chain)
}

/// Coerce operands to the representation stored in the index
///
/// Datetimes become epoch milliseconds, numbers and booleans given as
/// strings become their typed values.
pub fn coerce_filter_chain_operands(chain: Vec<Filter>) -> Result<Vec<Filter>> {
    chain
        .into_iter()
        .map(|filter| match filter {
            Filter::Binary(mut f) => {
                f.right_operand = coerce_operand(f.field_type, &f.path_expression, &f.right_operand)?;
                Ok(Filter::Binary(f))
            }
            Filter::Ternary(mut f) => {
                if let Some(v) = &f.left_operand {
                    f.left_operand = Some(coerce_operand(f.field_type, &f.path_expression, v)?);
                }
                if let Some(v) = &f.right_operand {
                    f.right_operand = Some(coerce_operand(f.field_type, &f.path_expression, v)?);
                }
                Ok(Filter::Ternary(f))
            }
        })
        .collect()
}

fn coerce_operand(field_type: FieldType, path: &str, operand: &Value) -> Result<Value> {
    if let Value::Array(items) = operand {
        return items
            .iter()
            .map(|item| coerce_operand(field_type, path, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }
    // Prefix matching stays textual
    if matches!(operand, Value::String(_)) && !matches!(field_type, FieldType::Datetime | FieldType::Number | FieldType::Boolean) {
        return Ok(operand.clone());
    }
    coerce_value(field_type, operand).ok_or_else(|| {
        Error::invalid_filter(format!(
            "Invalid {} value {} in filter on field '{}'",
            field_type.as_str(),
            operand,
            path
        ))
    })
}

/// Predicate over canonical records; every filter must match
pub fn make_filter(chain: Vec<Filter>) -> impl Fn(&Value) -> bool {
    move |record: &Value| {
        chain.iter().all(|filter| {
            let values = jsonpath::resolve(record, filter.path());
            filter.matches_any(&values)
        })
    }
}

// ============================================================================
// Index keys
// ============================================================================

/// Key bounds derived from a filter chain for one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSuffixes {
    /// Lower bound of the key range
    pub left: Option<String>,
    /// Upper bound of the key range
    pub right: Option<String>,
    /// Equality components shared by every matching key
    pub prefix: Option<String>,
    /// Type of the last constrained component
    pub trailing_type: Option<FieldType>,
}

/// Key bounds for `chain` on `index`, or `None` when the index cannot serve it
///
/// The filtered fields must be a leading run of the index fields. All but the
/// last must be equalities; the last may be any range operator.
pub fn make_filter_suffixes(chain: &[Filter], index: &IndexDefinition) -> Option<FilterSuffixes> {
    if chain.is_empty() {
        return Some(FilterSuffixes::default());
    }

    let mut ordered: Vec<Option<&Filter>> = vec![None; index.fields.len()];
    for filter in chain {
        if let Filter::Binary(BinaryFilter { operator: Op::In, .. }) = filter {
            return None;
        }
        let position = index.position(filter.path())?;
        if ordered[position].is_some() {
            return None;
        }
        ordered[position] = Some(filter);
    }

    let used: Vec<&Filter> = ordered.iter().take(chain.len()).map(|f| *f).collect::<Option<_>>()?;
    let (last, leading) = used.split_last()?;

    let mut base = Vec::with_capacity(leading.len());
    for filter in leading {
        match filter {
            Filter::Binary(BinaryFilter {
                operator: Op::Eq,
                right_operand,
                ..
            }) => base.push(key_component(right_operand)),
            _ => return None,
        }
    }

    let (left, right) = match last {
        Filter::Ternary(f) => (
            f.left_operand.as_ref().map(key_component),
            f.right_operand.as_ref().map(key_component),
        ),
        Filter::Binary(f) => {
            let value = key_component(&f.right_operand);
            match f.operator {
                Op::Lt | Op::Lte => (None, Some(value)),
                Op::Gt | Op::Gte => (Some(value), None),
                Op::Eq | Op::StartsWith => (Some(value.clone()), Some(value)),
                Op::In => return None,
            }
        }
    };

    let join = |tail: String| {
        let mut parts = base.clone();
        parts.push(tail);
        parts.join(INDEX_KEY_FIELD_SEPARATOR)
    };

    Some(FilterSuffixes {
        left: left.map(join),
        right: right.map(join),
        prefix: if base.is_empty() {
            None
        } else {
            Some(base.join(INDEX_KEY_FIELD_SEPARATOR))
        },
        trailing_type: Some(last.field_type()),
    })
}

/// Coerced values of the index fields of `data`, or `None` if one is missing
pub fn index_components(index: &IndexDefinition, data: &Map<String, Value>) -> Option<Map<String, Value>> {
    let mut components = Map::new();
    for field in &index.fields {
        let value = data.get(&field.name).filter(|v| !v.is_null())?;
        components.insert(field.name.clone(), coerce_value(field.kind, value)?);
    }
    Some(components)
}

/// Composite key of `data` for `index`, or `None` if a field is missing
pub fn make_key_for_field(index: &IndexDefinition, data: &Map<String, Value>) -> Option<String> {
    let components = index_components(index, data)?;
    let parts: Vec<String> = components.values().map(key_component).collect();
    Some(parts.join(INDEX_KEY_FIELD_SEPARATOR))
}

/// Textual form of a coerced value inside a key
pub fn key_component(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format_number(f),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

fn number_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        Some(Value::from(f as i64))
    } else {
        serde_json::Number::from_f64(f).map(Value::Number)
    }
}

/// Coerce a raw value to the comparable form of `field_type`
pub fn coerce_value(field_type: FieldType, value: &Value) -> Option<Value> {
    match field_type {
        FieldType::Datetime => to_epoch_millis(value).map(Value::from),
        FieldType::Number => match value {
            Value::Number(n) => number_value(n.as_f64()?),
            Value::String(s) => number_value(s.trim().parse::<f64>().ok()?),
            _ => None,
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Object => None,
        _ => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(_) | Value::Bool(_) => Some(Value::String(key_component(value))),
            _ => None,
        },
    }
}

/// Epoch milliseconds of a datetime given as a number or a date string
pub fn to_epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_datetime(s.trim()),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
