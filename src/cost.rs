//! Analytic memory footprint of bounded predictors.
//!
//! The simulator records costs that may be partial or placeholders, so
//! every bounded ("Real") configuration gets its table costs recomputed
//! from its geometry. Unbounded configurations keep what was recorded.
//! All costs are in bytes and are not rounded.

use crate::{CostError, Family, PredictorType, Row};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    /// Width of an address/value word.
    pub word_bits: u32,
    /// Valid/LRU overhead per table entry.
    pub lru_bits: u32,
}

impl Default for CostParams {
    fn default() -> Self {
        CostParams {
            word_bits: 64,
            lru_bits: 0,
        }
    }
}

/// What an entry stores after its tag and full words.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceTail {
    None,
    /// `elems` full words
    Words { elems: f64 },
    /// `elems` class ids, each wide enough for `classes + 1` values
    Classes { elems: f64, classes: f64 },
}

/// Bytes of one table entry: tag, `num_words` words and the sequence tail.
pub fn entry_cost(params: &CostParams, index_bits: f64, num_words: f64, tail: SequenceTail) -> f64 {
    let word_bits = params.word_bits as f64;
    let tag_bits = word_bits - index_bits;
    let seq_bits = match tail {
        SequenceTail::Classes { elems, classes } if elems >= 0.0 && classes >= 0.0 => {
            (classes + 1.0).log2().ceil() * elems
        }
        SequenceTail::Words { elems } if elems >= 0.0 => word_bits * elems,
        _ => 0.0,
    };
    (tag_bits + word_bits * num_words + seq_bits + params.lru_bits as f64) / 8.0
}

/// Bytes of a `2^index_bits` sets by `ways` table.
pub fn table_cost(
    params: &CostParams,
    index_bits: f64,
    ways: f64,
    num_words: f64,
    tail: SequenceTail,
) -> f64 {
    index_bits.exp2() * ways * entry_cost(params, index_bits, num_words, tail)
}

/// Bytes of the class dictionary: per class a class id, a confidence
/// counter and one word.
pub fn dictionary_cost(params: &CostParams, num_classes: f64, max_confidence: f64) -> f64 {
    let entry_bits = num_classes.log2().ceil()
        + (max_confidence + 1.0).log2().ceil()
        + params.word_bits as f64;
    num_classes * entry_bits / 8.0
}

/// Recomputed cost fields of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFields {
    Buffer {
        cache: f64,
        dictionary: f64,
        total: f64,
    },
    TwoTables {
        first_table: f64,
        second_table: f64,
        total: f64,
    },
}

impl CostFields {
    pub fn total(&self) -> f64 {
        match self {
            CostFields::Buffer { total, .. } | CostFields::TwoTables { total, .. } => *total,
        }
    }

    pub fn write(&self, row: &mut Row) {
        match *self {
            CostFields::Buffer {
                cache,
                dictionary,
                total,
            } => {
                row.set("cacheMemoryCost", cache);
                row.set("dictionaryMemoryCost", dictionary);
                row.set("totalMemoryCost", total);
            }
            CostFields::TwoTables {
                first_table,
                second_table,
                total,
            } => {
                row.set("firstTableMemoryCost", first_table);
                row.set("secondTableMemoryCost", second_table);
                row.set("totalMemoryCost", total);
            }
        }
    }
}

/// Table geometry must be a finite, non-negative number.
fn geometry(row: &Row, field: &'static str) -> Result<f64, CostError> {
    let value = row.number(field);
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CostError::BadGeometry {
            identity: row.identity(),
            field,
            value,
        })
    }
}

/// Index bits additionally leave room for a tag within one word.
fn index_bits(params: &CostParams, row: &Row, field: &'static str) -> Result<f64, CostError> {
    let value = geometry(row, field)?;
    if value <= params.word_bits as f64 {
        Ok(value)
    } else {
        Err(CostError::BadGeometry {
            identity: row.identity(),
            field,
            value,
        })
    }
}

fn positive(row: &Row, field: &'static str) -> Result<f64, CostError> {
    let value = row.number(field);
    if value > 0.0 {
        Ok(value)
    } else {
        Err(CostError::NonPositive {
            identity: row.identity(),
            field,
            value,
        })
    }
}

fn finite(row: &Row, field: &'static str) -> Result<f64, CostError> {
    let value = row.number(field);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CostError::BadGeometry {
            identity: row.identity(),
            field,
            value,
        })
    }
}

/// Cost fields of a bounded configuration, `None` for unbounded ones.
pub fn compute_costs(
    params: &CostParams,
    predictor_type: &PredictorType,
    row: &Row,
) -> Result<Option<CostFields>, CostError> {
    if !predictor_type.is_real() {
        return Ok(None);
    }

    let fields = match predictor_type.family() {
        Family::BufferSvm => buffer_costs(params, row)?,
        Family::DfcmHashOnHash => {
            let first_table = table_cost(
                params,
                index_bits(params, row, "firstTableNumIndexBits")?,
                geometry(row, "firstTableNumWays")?,
                2.0,
                SequenceTail::None,
            );
            let second_table = second_table_cost(params, row)?;
            CostFields::TwoTables {
                first_table,
                second_table,
                total: first_table + second_table,
            }
        }
        Family::DfcmGradeK => {
            let first_table = table_cost(
                params,
                index_bits(params, row, "firstTableNumIndexBits")?,
                geometry(row, "firstTableNumWays")?,
                0.0,
                SequenceTail::Words {
                    elems: finite(row, "numSequenceAccesses")?,
                },
            );
            let second_table = second_table_cost(params, row)?;
            CostFields::TwoTables {
                first_table,
                second_table,
                total: first_table + second_table,
            }
        }
    };
    Ok(Some(fields))
}

fn second_table_cost(params: &CostParams, row: &Row) -> Result<f64, CostError> {
    Ok(table_cost(
        params,
        index_bits(params, row, "secondTableNumIndexBits")?,
        geometry(row, "secondTableNumWays")?,
        1.0,
        SequenceTail::None,
    ))
}

fn buffer_costs(params: &CostParams, row: &Row) -> Result<CostFields, CostError> {
    let num_classes = positive(row, "numClasses")?;
    let cache = table_cost(
        params,
        index_bits(params, row, "numIndexBits")?,
        geometry(row, "numWays")?,
        1.0,
        SequenceTail::Classes {
            elems: finite(row, "numSequenceAccesses")?,
            classes: num_classes,
        },
    );

    let recorded_cache = row.number("cacheMemoryCost");
    let recorded_total = row.number("totalMemoryCost");
    let recorded_dictionary = row.number("dictionaryMemoryCost");

    // the cache stage is additive with the dictionary and model stages:
    // swap the recorded cache cost for the computed one and leave the
    // other stages as recorded
    if recorded_total.is_finite() {
        let old = if recorded_cache.is_finite() {
            recorded_cache
        } else {
            0.0
        };
        return Ok(CostFields::Buffer {
            cache,
            dictionary: recorded_dictionary,
            total: recorded_total - old + cache,
        });
    }

    // placeholder totals: rebuild them from the stages
    let dictionary = if recorded_dictionary.is_finite() {
        recorded_dictionary
    } else {
        dictionary_cost(params, num_classes, finite(row, "maxConfidence")?)
    };
    let model = row.number("modelMemoryCost");
    let model = if model.is_finite() {
        model
    } else {
        warn!(
            "{}: no model memory cost recorded, counting it as 0",
            row.identity()
        );
        0.0
    };
    Ok(CostFields::Buffer {
        cache,
        dictionary,
        total: cache + dictionary + model,
    })
}

/// Overwrite the cost fields of a bounded configuration. Returns whether
/// anything was written.
pub fn apply_costs(
    params: &CostParams,
    predictor_type: &PredictorType,
    row: &mut Row,
) -> Result<bool, CostError> {
    match compute_costs(params, predictor_type, row)? {
        Some(fields) => {
            fields.write(row);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Registry;

    fn real_type(registry: &Registry, name: &str) -> PredictorType {
        registry.get(name).unwrap().clone()
    }

    fn buffer_row() -> Row {
        Row::new()
            .with("traceName", "perlbench_s")
            .with("numIndexBits", 6)
            .with("numWays", 4)
            .with("numSequenceAccesses", 4)
            .with("numClasses", 4)
            .with("maxConfidence", 3)
            .with("firstTableMemoryCost", f64::NAN)
            .with("cacheMemoryCost", 1000.0)
            .with("dictionaryMemoryCost", 40.0)
            .with("modelMemoryCost", 500.0)
            .with("totalMemoryCost", 1540.0)
    }

    #[test]
    fn test_entry_cost_worked_example() {
        let params = CostParams::default();
        let tail = SequenceTail::Classes {
            elems: 4.0,
            classes: 4.0,
        };
        // classBits = ceil(log2(5)) = 3, seqBits = 12, tagBits = 58
        assert_eq!(entry_cost(&params, 6.0, 1.0, tail), 16.75);
        assert_eq!(table_cost(&params, 6.0, 4.0, 1.0, tail), 4288.0);
    }

    #[test]
    fn test_entry_cost_tails() {
        let params = CostParams::default();
        assert_eq!(entry_cost(&params, 10.0, 2.0, SequenceTail::None), 22.75);
        assert_eq!(
            entry_cost(&params, 0.0, 0.0, SequenceTail::Words { elems: 8.0 }),
            72.0
        );
        // a negative sequence length means no tail
        assert_eq!(
            entry_cost(&params, 0.0, 1.0, SequenceTail::Words { elems: -1.0 }),
            16.0
        );
        let params = CostParams {
            word_bits: 64,
            lru_bits: 1,
        };
        assert_eq!(entry_cost(&params, 8.0, 1.0, SequenceTail::None), 15.125);
    }

    #[test]
    fn test_dictionary_cost() {
        let params = CostParams::default();
        // 8 classes * (3 + 2 + 64) bits
        assert_eq!(dictionary_cost(&params, 8.0, 3.0), 69.0);
    }

    #[test]
    fn test_buffer_cache_cost_replaces_recorded() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real BufferSVM");
        let mut row = buffer_row();
        assert!(apply_costs(&CostParams::default(), &ty, &mut row).unwrap());
        assert_eq!(row.number("cacheMemoryCost"), 4288.0);
        assert_eq!(row.number("dictionaryMemoryCost"), 40.0);
        assert_eq!(row.number("modelMemoryCost"), 500.0);
        assert_eq!(row.number("totalMemoryCost"), 4288.0 + 40.0 + 500.0);
    }

    #[test]
    fn test_buffer_placeholder_total_is_rebuilt() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real BufferSVM");
        let mut row = buffer_row()
            .with("dictionaryMemoryCost", f64::NAN)
            .with("totalMemoryCost", f64::NAN);
        apply_costs(&CostParams::default(), &ty, &mut row).unwrap();
        // 4 classes * (2 + 2 + 64) bits
        assert_eq!(row.number("dictionaryMemoryCost"), 34.0);
        assert_eq!(row.number("totalMemoryCost"), 4288.0 + 34.0 + 500.0);
    }

    #[test]
    fn test_hash_on_hash_is_additive() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real DFCM HashOnHash");
        let mut row = Row::new()
            .with("firstTableNumIndexBits", 10)
            .with("firstTableNumWays", 4)
            .with("secondTableNumIndexBits", 8)
            .with("secondTableNumWays", 2)
            .with("firstTableMemoryCost", 1.0)
            .with("secondTableMemoryCost", 1.0)
            .with("totalMemoryCost", 2.0);
        apply_costs(&CostParams::default(), &ty, &mut row).unwrap();

        let first = row.number("firstTableMemoryCost");
        let second = row.number("secondTableMemoryCost");
        assert_eq!(row.number("totalMemoryCost"), first + second);
        // 1024 * 4 * (54 + 128) / 8 and 256 * 2 * (56 + 64) / 8
        assert_eq!(first, 93184.0);
        assert_eq!(second, 7680.0);
    }

    #[test]
    fn test_grade_k_first_table_keeps_sequence() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real DFCM GradeK");
        let row = Row::new()
            .with("numSequenceAccesses", 8)
            .with("firstTableNumIndexBits", 10)
            .with("firstTableNumWays", 4)
            .with("secondTableNumIndexBits", 8)
            .with("secondTableNumWays", 2)
            .with("firstTableMemoryCost", 0.0);
        let fields = compute_costs(&CostParams::default(), &ty, &row)
            .unwrap()
            .unwrap();
        // 1024 * 4 * (54 + 8 * 64) / 8
        assert_eq!(
            fields,
            CostFields::TwoTables {
                first_table: 289792.0,
                second_table: 7680.0,
                total: 289792.0 + 7680.0,
            }
        );
    }

    #[test]
    fn test_buffer_recorded_total_kept_without_dictionary() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real BufferSVM");
        let mut row = buffer_row()
            .with("dictionaryMemoryCost", f64::NAN)
            .with("modelMemoryCost", f64::NAN);
        apply_costs(&CostParams::default(), &ty, &mut row).unwrap();
        assert_eq!(row.number("cacheMemoryCost"), 4288.0);
        assert_eq!(row.number("totalMemoryCost"), 1540.0 - 1000.0 + 4288.0);
        assert!(row.number("dictionaryMemoryCost").is_nan());
        assert!(row.number("modelMemoryCost").is_nan());
    }

    #[test]
    fn test_index_bits_wider_than_word_fail() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real DFCM HashOnHash");
        let row = Row::new()
            .with("firstTableNumIndexBits", 70)
            .with("firstTableNumWays", 1)
            .with("secondTableNumIndexBits", 8)
            .with("secondTableNumWays", 2)
            .with("firstTableMemoryCost", 1.0);
        assert!(matches!(
            compute_costs(&CostParams::default(), &ty, &row),
            Err(CostError::BadGeometry {
                field: "firstTableNumIndexBits",
                ..
            })
        ));

        let ty = real_type(&registry, "Real BufferSVM");
        let row = buffer_row().with("numIndexBits", 65);
        assert!(matches!(
            compute_costs(&CostParams::default(), &ty, &row),
            Err(CostError::BadGeometry {
                field: "numIndexBits",
                ..
            })
        ));
        // a full-word index leaves an empty tag, which is still a table
        let row = buffer_row().with("numIndexBits", 64);
        assert!(compute_costs(&CostParams::default(), &ty, &row).is_ok());
    }

    #[test]
    fn test_infinite_rows_keep_recorded_costs() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Infinite BufferSVM");
        let mut row = buffer_row().with("numIndexBits", -1);
        assert!(!apply_costs(&CostParams::default(), &ty, &mut row).unwrap());
        assert_eq!(row.number("cacheMemoryCost"), 1000.0);
        assert_eq!(row.number("totalMemoryCost"), 1540.0);
    }

    #[test]
    fn test_non_positive_classes_fail() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real BufferSVM");
        let row = buffer_row().with("numClasses", 0);
        let err = compute_costs(&CostParams::default(), &ty, &row).unwrap_err();
        assert!(matches!(
            err,
            CostError::NonPositive { field: "numClasses", .. }
        ));
        assert!(err.to_string().contains("perlbench_s"));
    }

    #[test]
    fn test_missing_geometry_fails() {
        let registry = Registry::builtin();
        let ty = real_type(&registry, "Real DFCM HashOnHash");
        let row = Row::new()
            .with("firstTableNumIndexBits", 10)
            .with("firstTableNumWays", 4)
            .with("secondTableNumIndexBits", f64::NAN)
            .with("secondTableNumWays", 2);
        assert!(matches!(
            compute_costs(&CostParams::default(), &ty, &row),
            Err(CostError::BadGeometry {
                field: "secondTableNumIndexBits",
                ..
            })
        ));
    }
}
