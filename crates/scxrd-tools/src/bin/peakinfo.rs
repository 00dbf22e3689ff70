use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scxrd_pure::contract::PeakContract;
use scxrd_pure::indexing::{annotate_peaks, index_spots, IndexingSummary, DEFAULT_TOLERANCE};
use scxrd_pure::peaks::{parse_peak_table, Axis, PeakTable};

/// Summarize a binary peak table, optionally indexing it against a UB matrix.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print the peak-table JSON document instead of a text summary.
    #[arg(long)]
    json: bool,

    /// Row-major UB matrix to index the peaks with.
    #[arg(long, num_args = 9, allow_negative_numbers = true, value_name = "UB")]
    ub: Option<Vec<f64>>,

    /// Largest distance from integer hkl that counts as indexed.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    #[arg(short, long)]
    verbose: bool,

    /// The peak table (`.tabbin`) to read.
    file: PathBuf,
}

fn format_table(table: &PeakTable) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Records: {} (declared {})\n",
        table.records.len(),
        table.declared_chunks
    ));
    if table.truncated {
        out.push_str("Truncated: yes\n");
    }
    for axis in Axis::ALL {
        if let Some(s) = table.statistics.get(&axis) {
            out.push_str(&format!(
                "  {}: min {:.4} max {:.4} mean {:.4} std {:.4} median {:.4}\n",
                axis.name(),
                s.min,
                s.max,
                s.mean,
                s.std,
                s.median
            ));
        }
    }
    out
}

fn format_indexing(summary: &IndexingSummary) -> String {
    format!(
        "Indexed: {} / {} ({:.2}%)\n",
        summary.indexed_count, summary.total_count, summary.indexing_rate_percent
    )
}

fn run(args: &Args) -> Result<String> {
    let data = std::fs::read(&args.file)
        .with_context(|| format!("Error reading '{}'", args.file.display()))?;
    let mut table = parse_peak_table(&data)
        .with_context(|| format!("Error parsing '{}'", args.file.display()))?;
    let ub = args
        .ub
        .as_deref()
        .map(scxrd_tools::ub_from_values)
        .transpose()?;

    if args.json {
        if let Some(ub) = &ub {
            if annotate_peaks(&mut table.records, ub, args.tolerance).is_none() {
                bail!("UB matrix is singular");
            }
        }
        let mut out = serde_json::to_string_pretty(&PeakContract::from(table))?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = format_table(&table);
    if let Some(ub) = &ub {
        out.push_str(&format_indexing(&index_spots(
            &table.records,
            ub,
            args.tolerance,
        )));
    }
    Ok(out)
}

fn main() {
    let args = Args::parse();
    scxrd_tools::init_tracing(args.verbose);
    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}
