use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scxrd_pure::cell::{ub_to_cell, CellParameters, DEFAULT_WAVELENGTH};
use scxrd_pure::crysalis::parse_reduced_cell;

/// Resolve the direct unit cell of a UB matrix.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// X-ray wavelength in Å.
    #[arg(long, default_value_t = DEFAULT_WAVELENGTH)]
    wavelength: f64,

    /// A CrysAlis `crystal.ini` whose reduced cell is printed alongside.
    #[arg(long)]
    ini: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Row-major UB matrix.
    #[arg(num_args = 9, required = true, allow_negative_numbers = true, value_name = "UB")]
    ub: Vec<f64>,
}

fn format_cell(label: &str, cell: &CellParameters) -> String {
    format!(
        "{}: a={:.4} b={:.4} c={:.4} alpha={:.3} beta={:.3} gamma={:.3} V={:.2}\n",
        label, cell.a, cell.b, cell.c, cell.alpha, cell.beta, cell.gamma, cell.volume
    )
}

fn run(args: &Args) -> Result<String> {
    let ub = scxrd_tools::ub_from_values(&args.ub)?;
    let Some(cell) = ub_to_cell(&ub, args.wavelength) else {
        bail!("cell undetermined");
    };
    let mut out = format_cell("Cell", &cell);

    if let Some(path) = &args.ini {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Error reading '{}'", path.display()))?;
        match parse_reduced_cell(&text) {
            Some(reduced) => out.push_str(&format_cell("Reduced cell (crystal.ini)", &reduced)),
            None => out.push_str("Reduced cell (crystal.ini): not found\n"),
        }
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
