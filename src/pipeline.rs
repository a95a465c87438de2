use crate::{
    CostParams, Error, OrderError, OrderLevels, Registry, Row, apply_costs, classify_row,
    derive_rates, derive_yield, distinct_pretty_names, rank_names,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Analysis settings, usually read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Predictor rules file; the builtin rules are used when absent.
    pub registry: Option<PathBuf>,
    pub cost: CostParams,
    pub order: OrderLevels,
    /// Keep only rows of these predictor types; empty keeps everything.
    pub only_types: Vec<String>,
}

impl Config {
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Config> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        // rules files are relative to the config file
        if let Some(dir) = path.parent() {
            config.registry = config.registry.take().map(|registry| match registry.is_relative() {
                true => dir.join(registry),
                false => registry,
            });
        }
        Ok(config)
    }
}

/// Rates, classification and costs for a batch of rows.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub registry: Registry,
    pub cost: CostParams,
    pub order: OrderLevels,
    pub only_types: Vec<String>,
}

impl Pipeline {
    pub fn new(config: &Config) -> crate::Result<Pipeline> {
        let registry = match &config.registry {
            Some(path) => {
                info!("Loading predictor rules from {}", path.display());
                Registry::from_path(path)?
            }
            None => Registry::builtin(),
        };
        for name in &config.only_types {
            if registry.get(name).is_none() {
                warn!("Filtering on unknown predictor type {name:?}");
            }
        }
        Ok(Pipeline {
            registry,
            cost: config.cost,
            order: config.order.clone(),
            only_types: config.only_types.clone(),
        })
    }

    pub fn with_registry(registry: Registry) -> Pipeline {
        Pipeline {
            registry,
            cost: CostParams::default(),
            order: OrderLevels::default(),
            only_types: vec![],
        }
    }

    /// Derive rates, classify, recompute costs and derive the yield of one
    /// row. `index` locates the row in diagnostics.
    pub fn process_row(&self, row: &Row, index: usize) -> crate::Result<Row> {
        let mut row = row.clone();
        derive_rates(&mut row);
        let predictor = classify_row(&self.registry, &row, index)?;
        let mut row = predictor.annotate(&row);
        apply_costs(&self.cost, predictor.predictor_type, &mut row)?;
        derive_yield(&mut row);
        Ok(row)
    }

    pub fn keeps(&self, row: &Row) -> bool {
        self.only_types.is_empty()
            || self
                .only_types
                .iter()
                .any(|name| name == row.text(crate::PREDICTOR_TYPE_FIELD))
    }

    pub fn process(&self, rows: &[Row]) -> crate::Result<Vec<Row>> {
        let mut res = vec![];
        for (index, row) in rows.iter().enumerate() {
            let row = self.process_row(row, index)?;
            if self.keeps(&row) {
                res.push(row);
            }
        }
        Ok(res)
    }

    /// Display rank of every pretty name among processed rows.
    pub fn ranking(&self, rows: &[Row]) -> Result<HashMap<String, usize>, OrderError> {
        rank_names(&distinct_pretty_names(rows), &self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PREDICTOR_TYPE_FIELD, PRETTY_NAME_FIELD};
    use serde_json::json;

    fn rows() -> Vec<Row> {
        [
            json!({
                "traceName": "mcf_s", "experimentationFilename": "run",
                "numIndexBits": "6", "numWays": "4", "numSequenceAccesses": "4",
                "numClasses": "4", "maxConfidence": "3",
                "hitRate": "0.5", "cacheMissRate": "0.25", "dictionaryMissRate": "0.5",
                "cacheMemoryCost": "1000", "dictionaryMemoryCost": "40",
                "modelMemoryCost": "500", "totalMemoryCost": "1540",
                "firstTableMemoryCost": "-nan(ind)",
            }),
            json!({
                "traceName": "mcf_s", "experimentationFilename": "run",
                "numIndexBits": "-1", "numWays": "-1", "numSequenceAccesses": "8",
                "numClasses": "8", "hitRate": "0.6", "totalMemoryCost": "1e6",
            }),
            json!({
                "traceName": "mcf_s", "experimentationFilename": "run",
                "numSequenceAccesses": "-1",
                "firstTableNumIndexBits": "10", "firstTableNumWays": "4",
                "secondTableNumIndexBits": "8", "secondTableNumWays": "2",
                "firstTableMemoryCost": "1", "secondTableMemoryCost": "1",
                "hitRate": "0.4", "firstTableMissRate": "0.125", "secondTableMissRate": "0.25",
            }),
        ]
        .iter()
        .map(|raw| Row::from_raw(raw).unwrap())
        .collect()
    }

    #[test]
    fn test_process() {
        let pipeline = Pipeline::with_registry(Registry::builtin());
        let processed = pipeline.process(&rows()).unwrap();
        assert_eq!(processed.len(), 3);

        assert_eq!(processed[0].text(PRETTY_NAME_FIELD), "Real BufferSVM 4-4-6-4");
        assert_eq!(processed[0].number("cacheMemoryCost"), 4288.0);
        assert_eq!(processed[0].number("totalMemoryCost"), 4828.0);
        assert_eq!(processed[0].number("yield"), 0.5 / 4828.0);

        assert_eq!(processed[1].text(PRETTY_NAME_FIELD), "Infinite BufferSVM 8-8");
        assert_eq!(processed[1].number("totalMemoryCost"), 1e6);

        assert_eq!(processed[2].text(PRETTY_NAME_FIELD), "Real DFCM HashOnHash 10-4-8-2");
        assert_eq!(processed[2].number("totalMemoryCost"), 93184.0 + 7680.0);
        assert_eq!(processed[2].number("firstTableHitRate"), 0.875);

        let rank = pipeline.ranking(&processed).unwrap();
        assert_eq!(rank["Infinite BufferSVM 8-8"], 0);
        assert_eq!(rank["Real DFCM HashOnHash 10-4-8-2"], 1);
        assert_eq!(rank["Real BufferSVM 4-4-6-4"], 2);
    }

    #[test]
    fn test_only_types() {
        let mut pipeline = Pipeline::with_registry(Registry::builtin());
        pipeline.only_types = vec!["Real BufferSVM".to_string()];
        let processed = pipeline.process(&rows()).unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].text(PREDICTOR_TYPE_FIELD), "Real BufferSVM");
    }

    #[test]
    fn test_cost_error_carries_identity() {
        let pipeline = Pipeline::with_registry(Registry::builtin());
        let row = rows()[0].clone().with("numClasses", 0);
        let err = pipeline.process_row(&row, 3).unwrap_err();
        assert!(matches!(err, Error::Cost(_)));
        assert!(err.to_string().contains("mcf_s"));
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
            only_types = ["Real DFCM GradeK"]

            [cost]
            lru_bits = 1

            [order]
            unmatched = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(config.cost.word_bits, 64);
        assert_eq!(config.cost.lru_bits, 1);
        assert_eq!(config.order.levels, OrderLevels::default().levels);
        assert!(config.registry.is_none());
        let pipeline = Pipeline::new(&config).unwrap();
        assert_eq!(pipeline.registry.types().len(), 6);
    }
}
