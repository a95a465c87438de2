//! Predictor type registry.
//!
//! Each predictor type owns a membership rule and the list of structural
//! parameters that tell its variants apart. The registry is built once
//! (either [`Registry::builtin`] or a rules file) and then only read.

use crate::{
    Comparator, ConfigError, Error, Expression, LogicalOp, Predicate, Row, Term, TermConfig,
    Value, column_type, compile, is_outcome_field,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Idealized, unbounded tables
    Infinite,
    /// Bounded, indexed/associative tables
    Real,
}

impl Regime {
    pub fn label(self) -> &'static str {
        match self {
            Regime::Infinite => "Infinite",
            Regime::Real => "Real",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Input buffer + dictionary + SVM model (SVM4AP)
    BufferSvm,
    /// Two tables indexed by hash of hash
    DfcmHashOnHash,
    /// Two tables, the first one keeping the last K values
    DfcmGradeK,
}

impl Family {
    fn from_label(label: &str) -> Option<Family> {
        if label.contains("HashOnHash") {
            Some(Family::DfcmHashOnHash)
        } else if label.contains("GradeK") {
            Some(Family::DfcmGradeK)
        } else if label.contains("SVM") {
            Some(Family::BufferSvm)
        } else {
            None
        }
    }
}

/// Split a type name like `"Real DFCM GradeK"` into its regime and the
/// family label that follows it.
fn split_name(name: &str) -> Result<(Regime, Family, String), ConfigError> {
    let name = name.trim();
    let (regime, rest) = if let Some(rest) = name.strip_prefix("Infinite") {
        (Regime::Infinite, rest)
    } else if let Some(rest) = name.strip_prefix("Real") {
        (Regime::Real, rest)
    } else {
        return Err(ConfigError::UnknownRegime(name.to_string()));
    };
    let label = rest.trim();
    let family = Family::from_label(label)
        .ok_or_else(|| ConfigError::UnknownFamily(name.to_string()))?;
    Ok((regime, family, label.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorType {
    name: String,
    regime: Regime,
    family: Family,
    family_label: String,
    expression: Expression,
    attributes: Vec<String>,
}

impl PredictorType {
    pub fn new(
        name: &str,
        expression: Expression,
        attributes: &[&str],
    ) -> Result<PredictorType, ConfigError> {
        let (regime, family, family_label) = split_name(name)?;
        for attribute in attributes {
            if column_type(attribute).is_none() {
                return Err(ConfigError::UnknownField(attribute.to_string()));
            }
            if is_outcome_field(attribute) {
                return Err(ConfigError::OutcomeAttribute {
                    name: name.to_string(),
                    field: attribute.to_string(),
                });
            }
        }
        for field in expression.fields() {
            if column_type(field).is_none() {
                return Err(ConfigError::UnknownField(field.to_string()));
            }
        }
        Ok(PredictorType {
            name: name.trim().to_string(),
            regime,
            family,
            family_label,
            expression,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Family part of the name, as shown in pretty names.
    pub fn family_label(&self) -> &str {
        &self.family_label
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn is_real(&self) -> bool {
        self.regime == Regime::Real
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.expression.check(row)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorTypeConfig {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    pub rule: Vec<TermConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, rename = "predictor")]
    pub predictors: Vec<PredictorTypeConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    types: Vec<PredictorType>,
}

impl Registry {
    pub fn new(types: Vec<PredictorType>) -> Result<Registry, ConfigError> {
        for (i, ty) in types.iter().enumerate() {
            if types[..i].iter().any(|other| other.name == ty.name) {
                return Err(ConfigError::DuplicateType(ty.name.clone()));
            }
        }
        Ok(Registry { types })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Registry, ConfigError> {
        let mut types = vec![];
        for predictor in &config.predictors {
            let attributes: Vec<&str> = predictor.attributes.iter().map(String::as_str).collect();
            types.push(PredictorType::new(
                &predictor.name,
                compile(&predictor.rule)?,
                &attributes,
            )?);
        }
        Registry::new(types)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Registry> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RegistryConfig = toml::from_str(&content).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Registry::from_config(&config)?)
    }

    /// The six predictor types of the SVM4AP / DFCM study.
    pub fn builtin() -> Registry {
        let types = builtin_rules()
            .into_iter()
            .map(|(regime, family, family_label, expression, attributes)| PredictorType {
                name: format!("{regime} {family_label}"),
                regime,
                family,
                family_label: family_label.to_string(),
                expression,
                attributes: attributes.iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        Registry { types }
    }

    pub fn types(&self) -> &[PredictorType] {
        &self.types
    }

    pub fn get(&self, name: &str) -> Option<&PredictorType> {
        self.types.iter().find(|ty| ty.name == name)
    }

    /// Every type whose rule accepts the row, in registry order.
    pub fn matching(&self, row: &Row) -> Vec<&PredictorType> {
        self.types.iter().filter(|ty| ty.matches(row)).collect()
    }
}

fn p<V: Into<Value>>(field: &str, comparator: Comparator, value: V) -> Term {
    Term::Predicate(Predicate::new(field, comparator, value))
}

fn group(terms: Vec<Term>) -> Term {
    Term::Group(Expression::new(terms))
}

const AND: Term = Term::Op(LogicalOp::And);
const OR: Term = Term::Op(LogicalOp::Or);

type Rule = (Regime, Family, &'static str, Expression, Vec<&'static str>);

fn builtin_rules() -> Vec<Rule> {
    use Comparator::*;

    let nan = f64::NAN;
    let dfcm_tables = vec![
        "firstTableNumIndexBits",
        "firstTableNumWays",
        "secondTableNumIndexBits",
        "secondTableNumWays",
    ];

    // first table bounded: index bits >= 0 and (index bits > 0 or ways > 0)
    let bounded_first_table = || {
        vec![
            p("firstTableNumIndexBits", Ge, 0),
            group(vec![
                p("firstTableNumIndexBits", Gt, 0),
                OR,
                p("firstTableNumWays", Gt, 0),
            ]),
        ]
    };
    // exact complement of the above, NaN geometry counts as unbounded
    let unbounded_first_table = || {
        group(vec![
            p("firstTableNumIndexBits", Lt, 0),
            OR,
            p("firstTableNumIndexBits", Eq, nan),
            group(vec![
                p("firstTableNumIndexBits", Le, 0),
                group(vec![
                    p("firstTableNumWays", Le, 0),
                    OR,
                    p("firstTableNumWays", Eq, nan),
                ]),
            ]),
        ])
    };
    // hash-on-hash rows may not record a sequence length at all
    let no_sequence = || {
        group(vec![
            p("numSequenceAccesses", Le, 0),
            OR,
            p("numSequenceAccesses", Eq, nan),
        ])
    };

    let mut real_hash_on_hash = bounded_first_table();
    real_hash_on_hash.extend([p("firstTableMemoryCost", Ne, nan), no_sequence()]);

    let mut real_grade_k = bounded_first_table();
    real_grade_k.extend([
        p("firstTableMemoryCost", Ne, nan),
        p("numSequenceAccesses", Gt, 0),
    ]);

    vec![
        (
            Regime::Infinite,
            Family::BufferSvm,
            "BufferSVM",
            Expression::new(vec![
                p("numIndexBits", Lt, 0),
                OR,
                group(vec![p("numIndexBits", Le, 0), p("numWays", Le, 0)]),
                AND,
                p("firstTableMemoryCost", Eq, nan),
            ]),
            vec!["numSequenceAccesses", "numClasses"],
        ),
        (
            Regime::Real,
            Family::BufferSvm,
            "BufferSVM",
            Expression::new(vec![
                p("numIndexBits", Ge, 0),
                group(vec![p("numIndexBits", Gt, 0), OR, p("numWays", Gt, 0)]),
                p("firstTableMemoryCost", Eq, nan),
            ]),
            vec!["numSequenceAccesses", "numClasses", "numIndexBits", "numWays"],
        ),
        (
            Regime::Infinite,
            Family::DfcmHashOnHash,
            "DFCM HashOnHash",
            Expression::new(vec![
                p("firstTableMemoryCost", Ne, nan),
                no_sequence(),
                unbounded_first_table(),
            ]),
            vec![],
        ),
        (
            Regime::Infinite,
            Family::DfcmGradeK,
            "DFCM GradeK",
            Expression::new(vec![
                p("firstTableMemoryCost", Ne, nan),
                p("numSequenceAccesses", Gt, 0),
                unbounded_first_table(),
            ]),
            vec!["numSequenceAccesses"],
        ),
        (
            Regime::Real,
            Family::DfcmHashOnHash,
            "DFCM HashOnHash",
            Expression::new(real_hash_on_hash),
            dfcm_tables,
        ),
        (
            Regime::Real,
            Family::DfcmGradeK,
            "DFCM GradeK",
            Expression::new(real_grade_k),
            vec![
                "numSequenceAccesses",
                "firstTableNumIndexBits",
                "firstTableNumWays",
                "secondTableNumIndexBits",
                "secondTableNumWays",
            ],
        ),
    ]
}
