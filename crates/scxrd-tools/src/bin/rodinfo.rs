use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use scxrd_pure::header::{parse_header, RodHeader};
use scxrd_pure::ty6::decode_image;

/// Print a summary of a rodhypix image header.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Also list the text header definitions and decode the pixels.
    #[arg(short, long)]
    verbose: bool,

    /// The rodhypix file to read.
    file: PathBuf,
}

fn format_header(header: &RodHeader) -> String {
    let mut out = String::new();
    out.push_str(&format!("Version: {}\n", header.version));
    out.push_str(&format!(
        "Compression: {} (code {})\n",
        header.compression, header.compression_code
    ));
    out.push_str(&format!("Dimensions: {} x {}\n", header.nx, header.ny));
    out.push_str(&format!("Binning: {} x {}\n", header.bin_x, header.bin_y));
    out.push_str(&format!(
        "Pixel size: {} x {} mm\n",
        header.pixel_size_mm[0], header.pixel_size_mm[1]
    ));
    out.push_str(&format!(
        "Detector distance: {} mm\n",
        header.detector_distance_mm
    ));
    out.push_str(&format!(
        "Beam center: ({}, {}) px\n",
        header.beam_center_px[0], header.beam_center_px[1]
    ));
    if let Some(panels) = header.panels {
        out.push_str(&format!(
            "Panels: {} x {}x{} px, gap {} px\n",
            panels.count, panels.panel_width, panels.panel_height, panels.gap_x
        ));
    }
    if let Some(time) = &header.time {
        out.push_str(&format!("Time: {}\n", time));
    }
    out
}

fn format_definitions(header: &RodHeader) -> String {
    let mut out = String::from("Text header:\n");
    for (key, value) in &header.definitions {
        out.push_str(&format!("  {} = {}\n", key, value));
    }
    out
}

fn run(args: &Args) -> Result<String> {
    let data = std::fs::read(&args.file)
        .with_context(|| format!("Error reading '{}'", args.file.display()))?;
    let header = parse_header(&data)
        .with_context(|| format!("Error parsing '{}'", args.file.display()))?;

    let mut out = format_header(&header);
    if args.verbose {
        out.push_str(&format_definitions(&header));
        let image = decode_image(&data, &header)
            .with_context(|| format!("Error decoding '{}'", args.file.display()))?;
        match image.min_max() {
            Some((lo, hi)) => out.push_str(&format!("Intensity range: {} .. {}\n", lo, hi)),
            None => out.push_str("Intensity range: empty image\n"),
        }
        if !image.zero_filled_rows.is_empty() {
            out.push_str(&format!(
                "Zero-filled rows: {}\n",
                image.zero_filled_rows.len()
            ));
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
