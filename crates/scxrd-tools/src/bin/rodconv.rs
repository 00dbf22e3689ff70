use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use scxrd_pure::contract::ImageContract;
use scxrd_pure::image::read_rodhypix;
use tracing::info;

/// Decode a rodhypix image and write its pixels.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The rodhypix file to read.
    input: PathBuf,

    /// Where to write the decoded pixels.
    output: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Raw)]
    format: Format,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Row-major little-endian i32 pixels, no header.
    Raw,
    /// The decoded-image JSON document.
    Json,
}

fn run(args: &Args) -> Result<String> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("Error reading '{}'", args.input.display()))?;
    let rod = read_rodhypix(&data)
        .with_context(|| format!("Error decoding '{}'", args.input.display()))?;
    let (nx, ny) = (rod.image.nx, rod.image.ny);

    let bytes = match args.format {
        Format::Raw => rod.image.to_le_bytes(),
        Format::Json => serde_json::to_vec(&ImageContract::from(rod))?,
    };
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Error writing '{}'", args.output.display()))?;
    info!(bytes = bytes.len(), output = %args.output.display(), "wrote decoded image");

    Ok(format!(
        "Wrote {} x {} image to {} ({} bytes)\n",
        nx,
        ny,
        args.output.display(),
        bytes.len()
    ))
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

#[cfg(test)]
mod tests {
    use super::*;
    use scxrd_pure::header::RodHeader;
    use scxrd_pure::image::build_rodhypix;

    const PIXELS: [i32; 6] = [0, 1, -1, 40_000, 5, 6];

    fn args_for(dir: &tempfile::TempDir, format: Format) -> Args {
        let input = dir.path().join("in.rodhypix");
        let header = RodHeader::new(3, 2);
        std::fs::write(&input, build_rodhypix(&header, &PIXELS).unwrap()).unwrap();
        Args {
            input,
            output: dir.path().join("out"),
            format,
            verbose: false,
        }
    }

    #[test]
    fn raw_output_is_le_i32() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(&dir, Format::Raw);
        let summary = run(&args).unwrap();
        assert!(summary.contains("3 x 2"));
        let raw = std::fs::read(&args.output).unwrap();
        let pixels: Vec<i32> = raw
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(pixels, PIXELS);
    }

    #[test]
    fn json_output_follows_contract() {
        let dir = tempfile::tempdir().unwrap();
        let args = args_for(&dir, Format::Json);
        run(&args).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&args.output).unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["dimensions"], serde_json::json!([3, 2]));
        assert_eq!(value["image_data"][3], 40_000);
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.rodhypix");
        std::fs::write(&input, b"not an image").unwrap();
        let args = Args {
            input,
            output: dir.path().join("out"),
            format: Format::Raw,
            verbose: false,
        };
        let err = run(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("truncated header"));
    }
}
