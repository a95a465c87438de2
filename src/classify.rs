use crate::{ClassifyError, PredictorType, Registry, Row, Value};
use log::debug;
use std::collections::{BTreeMap, HashSet};

pub const PREDICTOR_TYPE_FIELD: &str = "predictorType";
pub const PRETTY_NAME_FIELD: &str = "predictorPrettyName";

/// A predictor type bound to the identity attribute values of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor<'a> {
    pub predictor_type: &'a PredictorType,
    /// identity attribute values, in the type's attribute order
    pub attributes: Vec<Value>,
}

impl<'a> Predictor<'a> {
    pub fn new(predictor_type: &'a PredictorType, row: &Row) -> Predictor<'a> {
        let attributes = predictor_type
            .attributes()
            .iter()
            .map(|attribute| {
                row.get(attribute)
                    .cloned()
                    .unwrap_or(Value::Float(f64::NAN))
            })
            .collect();
        Predictor {
            predictor_type,
            attributes,
        }
    }

    /// `<Regime> <family> <attr1>-<attr2>-...`, without the trailing part
    /// when the type has no identity attributes.
    pub fn pretty_name(&self) -> String {
        let mut name = format!(
            "{} {}",
            self.predictor_type.regime(),
            self.predictor_type.family_label()
        );
        if !self.attributes.is_empty() {
            name.push(' ');
            name.push_str(
                &self
                    .attributes
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<String>>()
                    .join("-"),
            );
        }
        name
    }

    /// Copy of the row carrying the type and pretty name.
    pub fn annotate(&self, row: &Row) -> Row {
        let mut row = row.clone();
        row.set(PREDICTOR_TYPE_FIELD, self.predictor_type.name());
        row.set(PRETTY_NAME_FIELD, self.pretty_name());
        row
    }
}

/// Find the single predictor type of a row. `index` is only used to
/// locate the row in diagnostics.
pub fn classify_row<'a>(
    registry: &'a Registry,
    row: &Row,
    index: usize,
) -> Result<Predictor<'a>, ClassifyError> {
    let matching = registry.matching(row);
    match matching.as_slice() {
        [predictor_type] => Ok(Predictor::new(*predictor_type, row)),
        [] => Err(ClassifyError::Unclassified {
            index,
            identity: row.identity(),
        }),
        _ => Err(ClassifyError::Ambiguous {
            index,
            identity: row.identity(),
            types: matching.iter().map(|ty| ty.name().to_string()).collect(),
        }),
    }
}

pub fn classify(registry: &Registry, rows: &[Row]) -> Result<Vec<Row>, ClassifyError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut res = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let predictor = classify_row(registry, row, index)?;
        *counts.entry(predictor.predictor_type.name()).or_default() += 1;
        res.push(predictor.annotate(row));
    }
    for (name, count) in &counts {
        debug!("Classified {count} rows as {name}");
    }
    Ok(res)
}

/// Pretty names of classified rows, each once, in order of appearance.
pub fn distinct_pretty_names(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = vec![];
    for row in rows {
        let name = row.text(PRETTY_NAME_FIELD);
        if !name.is_empty() && seen.insert(name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comparator, Expression, Predicate, Term};

    fn real_svm(sequence: i32, classes: i32) -> Row {
        Row::new()
            .with("traceName", "mcf_s")
            .with("experimentationFilename", "testOnAllApps/mcf_s")
            .with("numIndexBits", 6)
            .with("numWays", 4)
            .with("numSequenceAccesses", sequence)
            .with("numClasses", classes)
            .with("firstTableMemoryCost", f64::NAN)
            .with("hitRate", 0.5)
    }

    #[test]
    fn test_pretty_names() {
        let registry = Registry::builtin();
        let row = real_svm(4, 4);
        let predictor = classify_row(&registry, &row, 0).unwrap();
        assert_eq!(predictor.predictor_type.name(), "Real BufferSVM");
        assert_eq!(predictor.pretty_name(), "Real BufferSVM 4-4-6-4");

        let row = Row::new()
            .with("numIndexBits", -1)
            .with("numWays", -1)
            .with("numSequenceAccesses", 8)
            .with("numClasses", 8)
            .with("firstTableMemoryCost", f64::NAN);
        let predictor = classify_row(&registry, &row, 0).unwrap();
        assert_eq!(predictor.pretty_name(), "Infinite BufferSVM 8-8");

        let row = Row::new()
            .with("numSequenceAccesses", -1)
            .with("firstTableNumIndexBits", -1)
            .with("firstTableNumWays", -1)
            .with("firstTableMemoryCost", 1.5e6);
        let predictor = classify_row(&registry, &row, 0).unwrap();
        assert_eq!(predictor.pretty_name(), "Infinite DFCM HashOnHash");

        let row = Row::new()
            .with("numSequenceAccesses", 8)
            .with("firstTableNumIndexBits", 10)
            .with("firstTableNumWays", 4)
            .with("secondTableNumIndexBits", 8)
            .with("secondTableNumWays", 2)
            .with("firstTableMemoryCost", 0.0);
        let predictor = classify_row(&registry, &row, 0).unwrap();
        assert_eq!(predictor.pretty_name(), "Real DFCM GradeK 8-10-4-8-2");
    }

    #[test]
    fn test_pretty_name_ignores_outcomes() {
        let registry = Registry::builtin();
        let a = real_svm(8, 8);
        let b = real_svm(8, 8).with("hitRate", 0.9).with("traceName", "lbm_s");
        let name_a = classify_row(&registry, &a, 0).unwrap().pretty_name();
        let name_a_again = classify_row(&registry, &a, 0).unwrap().pretty_name();
        let name_b = classify_row(&registry, &b, 1).unwrap().pretty_name();
        assert_eq!(name_a, name_a_again);
        assert_eq!(name_a, name_b);
    }

    #[test]
    fn test_classify_annotates_rows() {
        let registry = Registry::builtin();
        let rows = vec![real_svm(4, 4), real_svm(8, 8), real_svm(4, 4)];
        let classified = classify(&registry, &rows).unwrap();
        assert_eq!(classified.len(), 3);
        assert_eq!(classified[1].text(PREDICTOR_TYPE_FIELD), "Real BufferSVM");
        assert_eq!(classified[1].text(PRETTY_NAME_FIELD), "Real BufferSVM 8-8-6-4");
        // the input is left untouched
        assert!(rows[0].get(PREDICTOR_TYPE_FIELD).is_none());
        assert_eq!(
            distinct_pretty_names(&classified),
            ["Real BufferSVM 4-4-6-4", "Real BufferSVM 8-8-6-4"]
        );
    }

    #[test]
    fn test_unclassified_row_is_reported() {
        let registry = Registry::builtin();
        let rows = vec![
            real_svm(4, 4),
            // index bits unknown: neither regime of the buffer family applies
            real_svm(4, 4).with("numIndexBits", f64::NAN),
        ];
        let err = classify(&registry, &rows).unwrap_err();
        match err {
            ClassifyError::Unclassified { index, identity } => {
                assert_eq!(index, 1);
                assert_eq!(identity.trace_name, "mcf_s");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_registry_is_reported() {
        let catch_all = |name| {
            PredictorType::new(
                name,
                Expression::new(vec![Term::Predicate(Predicate::new(
                    "numWays",
                    Comparator::Ge,
                    0,
                ))]),
                &[],
            )
            .unwrap()
        };
        let registry =
            Registry::new(vec![catch_all("Real BufferSVM"), catch_all("Real DFCM GradeK")])
                .unwrap();
        let err = classify_row(&registry, &real_svm(4, 4), 7).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::Ambiguous {
                index: 7,
                identity: real_svm(4, 4).identity(),
                types: vec!["Real BufferSVM".to_string(), "Real DFCM GradeK".to_string()],
            }
        );
        assert!(err.to_string().contains("Real BufferSVM, Real DFCM GradeK"));
    }
}
