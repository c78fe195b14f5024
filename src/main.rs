use anyhow::{Context, Result};
use chatreduce::{init_tracing_once, Pipeline, ReduceOptions};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Reduce chat/superchat captures into anonymized public datasets and monthly channel stats.
#[derive(Parser, Debug)]
#[command(name = "chatreduce", version, about)]
struct Args {
    /// Glob over the period string selecting partitions, e.g. "2023-*".
    #[arg(short, long, default_value = "*")]
    matcher: String,

    /// Append stats rows to the existing CSVs instead of overwriting them.
    #[arg(short, long)]
    append_only: bool,

    #[arg(long, env = "RAW_DATA_DIR", default_value = "./data/raw")]
    raw_dir: PathBuf,

    #[arg(long, env = "COMPLETE_DATA_DIR", default_value = "./data/complete")]
    complete_dir: PathBuf,

    #[arg(long, env = "PUBLIC_DATA_DIR", default_value = "./data/public")]
    public_dir: PathBuf,

    #[arg(long, env = "ELEMENTS_DATA_DIR", default_value = "./data/elements")]
    elements_dir: PathBuf,

    /// JSON object of currency → JPY rates used for totalSC/averageSC.
    #[arg(long, env = "CURRENCY_RATES")]
    rates: Option<PathBuf>,

    /// Partitions processed concurrently.
    #[arg(long, default_value_t = 1)]
    file_concurrency: usize,

    /// Worker threads (defaults to all cores).
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    no_progress: bool,

    /// Inputs are already in the complete dir; skip the copy step.
    #[arg(long)]
    skip_normalize: bool,

    /// Write a JSON run summary here.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing_once();
    let args = Args::parse();

    // Fails before any file is touched when the salt is absent.
    let pipeline = Pipeline::from_env()?;

    let mut opts = ReduceOptions::default()
        .with_raw_dir(&args.raw_dir)
        .with_complete_dir(&args.complete_dir)
        .with_public_dir(&args.public_dir)
        .with_elements_dir(&args.elements_dir)
        .with_matcher(args.matcher)
        .with_append_only(args.append_only)
        .with_normalize(!args.skip_normalize)
        .with_file_concurrency(args.file_concurrency)
        .with_progress(!args.no_progress);
    if let Some(rates) = &args.rates {
        opts = opts.with_rates_file(rates);
    }
    if let Some(n) = args.threads {
        opts = opts.with_parallelism(n);
    }

    let summary = pipeline.options(opts).run()?;
    tracing::info!(
        "Done: {} chat stats rows, {} superchat stats rows",
        summary.chat_stats_rows,
        summary.superchat_stats_rows
    );

    if let Some(path) = args.summary {
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(f), &summary)?;
    }
    Ok(())
}
