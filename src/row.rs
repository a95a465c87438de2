use crate::RowError;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Int,
    Float,
    Bool,
}

impl ColumnType {
    fn describe(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Int => "an integer",
            ColumnType::Float => "a float",
            ColumnType::Bool => "a boolean",
        }
    }
}

/// Columns every row carries after normalization, with their types.
pub const COLUMNS: &[(&str, ColumnType)] = &[
    // identity
    ("experimentationFilename", ColumnType::Text),
    ("traceName", ColumnType::Text),
    ("firstAccess", ColumnType::Int),
    ("lastAccess", ColumnType::Int),
    // outcome
    ("hitRate", ColumnType::Float),
    ("totalMemoryCost", ColumnType::Float),
    // buffer/cache stage
    ("numIndexBits", ColumnType::Int),
    ("numWays", ColumnType::Int),
    ("numSequenceAccesses", ColumnType::Int),
    ("cacheMemoryCost", ColumnType::Float),
    ("cacheMissRate", ColumnType::Float),
    // dictionary stage
    ("numClasses", ColumnType::Int),
    ("maxConfidence", ColumnType::Int),
    ("numConfidenceJumps", ColumnType::Int),
    ("dictionaryMemoryCost", ColumnType::Float),
    ("dictionaryMissRate", ColumnType::Float),
    // two-level table stage
    ("firstTableNumIndexBits", ColumnType::Int),
    ("firstTableNumWays", ColumnType::Int),
    ("secondTableNumIndexBits", ColumnType::Int),
    ("secondTableNumWays", ColumnType::Int),
    ("firstTableMissRate", ColumnType::Float),
    ("secondTableMissRate", ColumnType::Float),
    ("firstTableMemoryCost", ColumnType::Float),
    ("secondTableMemoryCost", ColumnType::Float),
    // model stage
    ("modelMemoryCost", ColumnType::Float),
];

/// Columns computed by this crate, never read from the simulator.
pub const DERIVED_COLUMNS: &[(&str, ColumnType)] = &[
    ("predictorType", ColumnType::Text),
    ("predictorPrettyName", ColumnType::Text),
    ("cacheHitRate", ColumnType::Float),
    ("dictionaryHitRate", ColumnType::Float),
    ("modelHitRate", ColumnType::Float),
    ("buffersHitRate", ColumnType::Float),
    ("firstTableHitRate", ColumnType::Float),
    ("secondTableHitRate", ColumnType::Float),
    ("yield", ColumnType::Float),
];

/// Measured or computed results. These never identify a predictor variant.
pub const OUTCOME_FIELDS: &[&str] = &[
    "hitRate",
    "totalMemoryCost",
    "cacheMemoryCost",
    "cacheMissRate",
    "dictionaryMemoryCost",
    "dictionaryMissRate",
    "firstTableMissRate",
    "secondTableMissRate",
    "firstTableMemoryCost",
    "secondTableMemoryCost",
    "modelMemoryCost",
    "cacheHitRate",
    "dictionaryHitRate",
    "modelHitRate",
    "buffersHitRate",
    "firstTableHitRate",
    "secondTableHitRate",
    "yield",
];

/// Raw spellings of a missing float the simulator writes out.
const NAN_SENTINELS: &[&str] = &["-nan(ind)", "nan(ind)", "-nan", "nan", "NaN"];

pub fn column_type(name: &str) -> Option<ColumnType> {
    COLUMNS
        .iter()
        .chain(DERIVED_COLUMNS)
        .find(|(column, _)| *column == name)
        .map(|(_, ty)| *ty)
}

pub fn is_outcome_field(name: &str) -> bool {
    OUTCOME_FIELDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) if f.is_nan())
    }

    /// Ordering between values of comparable kinds. Numbers compare with
    /// numbers regardless of int/float storage; anything else is `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    fn default_for(ty: ColumnType) -> Value {
        match ty {
            ColumnType::Text => Value::Text(String::new()),
            ColumnType::Int | ColumnType::Float => Value::Float(f64::NAN),
            ColumnType::Bool => Value::Bool(false),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            // integral floats print without a fractional part: 4.0 -> "4"
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Fields that locate a row in the experiment output, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowIdentity {
    pub experimentation_filename: String,
    pub trace_name: String,
    pub first_access: Option<i64>,
    pub last_access: Option<i64>,
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trace {:?} of {:?}",
            self.trace_name, self.experimentation_filename
        )?;
        if let (Some(first), Some(last)) = (self.first_access, self.last_access) {
            write!(f, ", accesses [{first}, {last})")?;
        }
        Ok(())
    }
}

/// One predictor configuration measured on one trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Row {
        Row::default()
    }

    /// Builder form of [`Row::set`].
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, field: K, value: V) -> Row {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, field: K, value: V) {
        self.fields.insert(field.into(), value.into());
    }

    /// Numeric view of a field, NaN when absent or not a number.
    pub fn number(&self, field: &str) -> f64 {
        self.get(field)
            .and_then(Value::as_f64)
            .unwrap_or(f64::NAN)
    }

    pub fn text(&self, field: &str) -> &str {
        match self.get(field) {
            Some(Value::Text(s)) => s,
            _ => "",
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn identity(&self) -> RowIdentity {
        let int = |field| match self.get(field) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        };
        RowIdentity {
            experimentation_filename: self.text("experimentationFilename").to_string(),
            trace_name: self.text("traceName").to_string(),
            first_access: int("firstAccess"),
            last_access: int("lastAccess"),
        }
    }

    /// Normalize a parsed record into a typed row.
    ///
    /// Values may arrive as strings (the trace files store every parameter
    /// as text) or as JSON scalars. Every schema column ends up present:
    /// missing numbers become NaN, missing text the empty string and
    /// missing booleans `false`. Fields outside the schema are kept.
    pub fn from_raw(raw: &serde_json::Value) -> Result<Row, RowError> {
        let serde_json::Value::Object(map) = raw else {
            return Err(RowError::NotAnObject(raw.to_string()));
        };

        let mut row = Row::new();
        for (field, ty) in COLUMNS {
            let value = match map.get(*field) {
                Some(raw) => coerce(field, *ty, raw)?,
                None => Value::default_for(*ty),
            };
            row.set(*field, value);
        }
        for (field, raw) in map {
            if row.fields.contains_key(field) {
                continue;
            }
            let value = match column_type(field) {
                Some(ty) => coerce(field, ty, raw)?,
                None => infer(field, raw)?,
            };
            row.set(field.clone(), value);
        }
        Ok(row)
    }
}

fn is_nan_sentinel(s: &str) -> bool {
    NAN_SENTINELS.contains(&s.trim())
}

fn coerce(field: &str, ty: ColumnType, raw: &serde_json::Value) -> Result<Value, RowError> {
    use serde_json::Value as Json;

    let fail = || RowError::Coercion {
        field: field.to_string(),
        raw: raw.to_string(),
        expected: ty.describe(),
    };

    let value = match (ty, raw) {
        (_, Json::Null) => Value::default_for(ty),
        (_, Json::Array(_) | Json::Object(_)) => {
            return Err(RowError::Nested {
                field: field.to_string(),
            });
        }

        (ColumnType::Text, Json::String(s)) => Value::Text(s.clone()),
        (ColumnType::Text, Json::Number(n)) => Value::Text(n.to_string()),
        (ColumnType::Text, Json::Bool(b)) => Value::Text(b.to_string()),

        (ColumnType::Int | ColumnType::Float, Json::String(s)) if is_nan_sentinel(s) => {
            Value::Float(f64::NAN)
        }
        (ColumnType::Int, Json::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => integral(s.trim().parse::<f64>().map_err(|_| fail())?).ok_or_else(fail)?,
        },
        (ColumnType::Int, Json::Number(n)) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => integral(n.as_f64().ok_or_else(fail)?).ok_or_else(fail)?,
        },
        (ColumnType::Float, Json::String(s)) => {
            Value::Float(s.trim().parse::<f64>().map_err(|_| fail())?)
        }
        (ColumnType::Float, Json::Number(n)) => Value::Float(n.as_f64().ok_or_else(fail)?),
        (ColumnType::Int | ColumnType::Float, Json::Bool(_)) => return Err(fail()),

        (ColumnType::Bool, Json::Bool(b)) => Value::Bool(*b),
        (ColumnType::Bool, Json::String(s)) => match s.trim() {
            "true" | "True" | "1" => Value::Bool(true),
            "false" | "False" | "0" | "" => Value::Bool(false),
            _ => return Err(fail()),
        },
        (ColumnType::Bool, Json::Number(n)) => match n.as_i64() {
            Some(0) => Value::Bool(false),
            Some(1) => Value::Bool(true),
            _ => return Err(fail()),
        },
    };
    Ok(value)
}

/// An integer column holding a float: NaN stays NaN, whole numbers become
/// integers, anything fractional is rejected.
fn integral(x: f64) -> Option<Value> {
    if x.is_nan() {
        Some(Value::Float(x))
    } else if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Some(Value::Int(x as i64))
    } else {
        None
    }
}

fn infer(field: &str, raw: &serde_json::Value) -> Result<Value, RowError> {
    use serde_json::Value as Json;

    Ok(match raw {
        Json::Null => Value::Float(f64::NAN),
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) if is_nan_sentinel(s) => Value::Float(f64::NAN),
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(_) | Json::Object(_) => {
            return Err(RowError::Nested {
                field: field.to_string(),
            });
        }
    })
}
