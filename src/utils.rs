use crate::{Error, Row};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

const TQDM_TEMPLATE: &str =
    "{percent:>3}% |{wide_bar}| {pos}/{len} rows [{elapsed_precise}<{eta_precise}, {per_sec}]";

/// tqdm-like bar counting rows.
pub fn get_tqdm_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(TQDM_TEMPLATE)
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
    .progress_chars("██ ")
}

/// Load a JSON array of raw records and normalize every one of them.
pub fn read_rows<P: AsRef<Path>>(path: P) -> crate::Result<Vec<Row>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let mut rows = Vec::with_capacity(raw.len());
    for record in &raw {
        rows.push(Row::from_raw(record)?);
    }
    Ok(rows)
}

/// Unknown numbers (NaN) are written as `null`.
pub fn write_rows<P: AsRef<Path>>(path: P, rows: &[Row]) -> crate::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), rows).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}
