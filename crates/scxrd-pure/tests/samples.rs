//! Validation against real instrument files.
//!
//! Drop `.rodhypix` frames and `.tabbin` peak tables into
//! `reference/samples/` at the workspace root to run these; they are skipped
//! otherwise.

use std::path::{Path, PathBuf};

fn samples_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../reference/samples")
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_files(&path, extension, out);
            } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                out.push(path);
            }
        }
    }
}

fn sample_files(extension: &str) -> Option<Vec<PathBuf>> {
    let dir = samples_dir();
    if !dir.exists() {
        eprintln!("Skipping: samples not found at {}", dir.display());
        return None;
    }
    let mut files = Vec::new();
    collect_files(&dir, extension, &mut files);
    files.sort();
    Some(files)
}

#[test]
fn decode_sample_frames() {
    let Some(files) = sample_files("rodhypix") else {
        return;
    };
    for path in &files {
        let data = std::fs::read(path).unwrap();
        let rod = scxrd_pure::read_rodhypix(&data)
            .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        assert_eq!(rod.image.data.len(), rod.image.nx * rod.image.ny);
        let (lo, hi) = rod.image.min_max().unwrap_or_default();
        eprintln!(
            "  {}: {} x {} ({}), range {lo} .. {hi}, {} zero-filled rows",
            path.display(),
            rod.image.nx,
            rod.image.ny,
            rod.header.compression,
            rod.image.zero_filled_rows.len()
        );
    }
}

#[test]
fn parse_sample_peak_tables() {
    let Some(files) = sample_files("tabbin") else {
        return;
    };
    for path in &files {
        let table = scxrd_pure::read_peak_table_file(path)
            .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        assert!(table.records.len() as u64 <= table.declared_chunks);
        eprintln!(
            "  {}: {} records (declared {}){}",
            path.display(),
            table.records.len(),
            table.declared_chunks,
            if table.truncated { ", truncated" } else { "" }
        );
    }
}
