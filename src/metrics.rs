use crate::Row;

/// Axis labels of the metrics presentation code plots.
const METRIC_LABELS: &[(&str, &str)] = &[
    ("hitRate", "Predictor hit rate"),
    ("predictorHitRate", "Predictor hit rate"),
    ("totalMemoryCost", "Total"),
    ("cacheMemoryCost", "Cache memory capacity"),
    ("cacheMissRate", "Input buffer miss rate"),
    ("cacheHitRate", "Input buffer hit rate"),
    ("dictionaryMemoryCost", "Dictionary memory capacity"),
    ("dictionaryMissRate", "Dictionary miss rate"),
    ("dictionaryHitRate", "Dictionary hit rate"),
    ("firstTableMissRate", "First table miss rate"),
    ("firstTableHitRate", "First table hit rate"),
    ("secondTableMissRate", "Second table miss rate"),
    ("secondTableHitRate", "Second table hit rate"),
    ("firstTableNumIndexBits", "First table num. index. bits"),
    ("firstTableNumWays", "First table num. ways"),
    ("secondTableNumIndexBits", "Second table num. index. bits"),
    ("secondTableNumWays", "Second table num. ways"),
    ("firstTableMemoryCost", "First table"),
    ("secondTableMemoryCost", "Second table"),
    ("modelMemoryCost", "Model memory capacity"),
    ("modelHitRate", "Model hit rate"),
    ("buffersHitRate", "Input buffer and dictionary hit rate"),
    ("yield", "Hit rate per byte"),
];

pub fn metric_label(field: &str) -> Option<&'static str> {
    METRIC_LABELS
        .iter()
        .find(|(metric, _)| *metric == field)
        .map(|(_, label)| *label)
}

/// Add the per-stage hit rates.
///
/// The simulator's dictionary miss rate also counts accesses that already
/// missed in the input buffer, so it is first reduced by the buffer miss
/// rate; every derived rate uses the corrected value. Rows that already
/// carry derived rates are left alone so the correction is applied once.
pub fn derive_rates(row: &mut Row) {
    if row.get("dictionaryHitRate").is_some() {
        return;
    }

    let cache_miss = row.number("cacheMissRate");
    let dictionary_miss = row.number("dictionaryMissRate") - cache_miss;
    let buffers_hit = (1.0 - cache_miss) * (1.0 - dictionary_miss);

    row.set("dictionaryMissRate", dictionary_miss);
    row.set("cacheHitRate", 1.0 - cache_miss);
    row.set("dictionaryHitRate", 1.0 - dictionary_miss);
    row.set("buffersHitRate", buffers_hit);
    row.set("modelHitRate", row.number("hitRate") / buffers_hit);
    row.set("firstTableHitRate", 1.0 - row.number("firstTableMissRate"));
    row.set("secondTableHitRate", 1.0 - row.number("secondTableMissRate"));
}

/// Hit rate per byte; needs the final `totalMemoryCost`.
pub fn derive_yield(row: &mut Row) {
    row.set("yield", row.number("hitRate") / row.number("totalMemoryCost"));
}
