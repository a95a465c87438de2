//! Error types.
//!
//! Configuration errors (malformed rules, ambiguous registry) and numeric
//! precondition violations are fatal and always carry the identity of the
//! offending row. Predicates never produce errors; they fail closed.

use crate::RowIdentity;
use std::path::PathBuf;
use thiserror::Error;

/// A raw record could not be coerced into the row schema.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("field `{field}`: cannot read {raw:?} as {expected}")]
    Coercion {
        field: String,
        raw: String,
        expected: &'static str,
    },
    #[error("field `{field}`: nested values are not supported")]
    Nested { field: String },
    #[error("row must be an object, got {0}")]
    NotAnObject(String),
}

/// The predictor rules themselves are malformed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown logical token {0:?}, expected \"and\" or \"or\"")]
    UnknownToken(String),
    #[error("unknown field `{0}` in predicate")]
    UnknownField(String),
    #[error("cannot tell regime of predictor type {0:?}, expected an \"Infinite\" or \"Real\" prefix")]
    UnknownRegime(String),
    #[error("cannot tell family of predictor type {0:?}")]
    UnknownFamily(String),
    #[error("predictor type {name:?} uses outcome field `{field}` as an identity attribute")]
    OutcomeAttribute { name: String, field: String },
    #[error("predictor type {0:?} is defined more than once")]
    DuplicateType(String),
}

/// Classification violated the one-type-per-row rule.
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("row {index} ({identity}) matches no predictor type")]
    Unclassified { index: usize, identity: RowIdentity },
    #[error("row {index} ({identity}) matches several predictor types: {}", types.join(", "))]
    Ambiguous {
        index: usize,
        identity: RowIdentity,
        types: Vec<String>,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("name {name:?} matches none of the labels {labels:?}")]
    UnmatchedLabel { name: String, labels: Vec<String> },
}

/// A bounded configuration reached the cost model with parameters the
/// formulas are not defined for.
#[derive(Debug, Error, PartialEq)]
pub enum CostError {
    #[error("{identity}: `{field}` must be positive for the cost model, got {value}")]
    NonPositive {
        identity: RowIdentity,
        field: &'static str,
        value: f64,
    },
    #[error("{identity}: `{field}` is not usable as table geometry, got {value}")]
    BadGeometry {
        identity: RowIdentity,
        field: &'static str,
        value: f64,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Row(#[from] RowError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
