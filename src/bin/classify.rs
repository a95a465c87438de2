//! Classify simulation rows by predictor type and summarize them
use clap::Parser;
use cli_table::{Cell, Table, print_stdout};
use log::info;
use predictor_stats::{
    Config, PRETTY_NAME_FIELD, Pipeline, Row, get_tqdm_style, read_rows, write_rows,
};
use std::{collections::HashMap, path::PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to JSON array of raw rows
    #[arg(short, long)]
    input: PathBuf,

    /// Path to analysis config (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to processed rows json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep only rows of this predictor type, can be repeated
    #[arg(long)]
    only_type: Vec<String>,
}

#[derive(Default)]
struct Summary {
    count: usize,
    hit_rate: f64,
    total_memory_cost: f64,
    yield_: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Config::from_path(path)?
        }
        None => Config::default(),
    };
    config.only_types.extend(args.only_type.iter().cloned());
    let pipeline = Pipeline::new(&config)?;

    println!("Loading rows from {}", args.input.display());
    let rows = read_rows(&args.input)?;

    let pbar = indicatif::ProgressBar::new(rows.len() as u64);
    pbar.set_style(get_tqdm_style());
    let mut processed: Vec<Row> = vec![];
    for (index, row) in rows.iter().enumerate() {
        let row = pipeline.process_row(row, index)?;
        if pipeline.keeps(&row) {
            processed.push(row);
        }
        pbar.inc(1);
    }
    pbar.finish();
    println!(
        "Kept {} of {} rows after classification",
        processed.len(),
        rows.len()
    );

    let rank = pipeline.ranking(&processed)?;
    processed.sort_by_key(|row| rank.get(row.text(PRETTY_NAME_FIELD)).copied());

    let mut summaries: HashMap<&str, Summary> = HashMap::new();
    for row in &processed {
        let summary = summaries.entry(row.text(PRETTY_NAME_FIELD)).or_default();
        summary.count += 1;
        summary.hit_rate += row.number("hitRate");
        summary.total_memory_cost += row.number("totalMemoryCost");
        summary.yield_ += row.number("yield");
    }
    let mut names: Vec<(&str, &Summary)> = summaries.iter().map(|(k, v)| (*k, v)).collect();
    names.sort_by_key(|(name, _)| rank.get(*name).copied());

    let mut table = vec![];
    for (name, summary) in names {
        let count = summary.count as f64;
        table.push(vec![
            rank.get(name).copied().unwrap_or_default().cell(),
            name.cell(),
            summary.count.cell(),
            format!("{:.2} %", summary.hit_rate * 100.0 / count).cell(),
            format!("{:.0}", summary.total_memory_cost / count).cell(),
            format!("{:.3e}", summary.yield_ / count).cell(),
        ]);
    }
    let table = table.table().title(vec![
        "Rank".cell(),
        "Predictor".cell(),
        "Rows".cell(),
        "Mean Hit Rate".cell(),
        "Mean Memory (B)".cell(),
        "Mean Yield".cell(),
    ]);
    print_stdout(table)?;

    if let Some(output) = &args.output {
        println!("Writing processed rows to {}", output.display());
        write_rows(output, &processed)?;
    }

    Ok(())
}
