use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use claxon::FlacReader;
use hound::WavReader;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use phoneme_data_rs::manifest::{sort_entries, write_manifest, ManifestEntry};

const AUDIO_EXTENSIONS: [&str; 2] = ["wav", "flac"];

#[derive(Debug, Parser)]
#[command(name = "dataset_index")]
#[command(about = "Probe audio durations under one or more roots and write a sorted manifest")]
struct Args {
    /// Directories to scan recursively for audio files.
    #[arg(required = true)]
    roots: Vec<PathBuf>,
    #[arg(long, env = "DATASET_INDEX_OUT", default_value = "datasets/list_pretrain.csv")]
    out: PathBuf,
    #[arg(long, env = "DATASET_INDEX_WORKERS", default_value_t = 8)]
    workers: usize,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    if args.workers == 0 {
        return Err("--workers must be >= 1.".to_string());
    }

    let mut audio_files = Vec::new();
    for root in &args.roots {
        if !root.is_dir() {
            return Err(format!("Not a directory: {}", root.display()));
        }
        collect_audio_files(root, &mut audio_files)
            .map_err(|err| format!("Failed to scan '{}': {err}", root.display()))?;
    }
    if audio_files.is_empty() {
        return Err("No .wav or .flac files found under the given roots.".to_string());
    }

    let progress = ProgressBar::new(audio_files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("probing durations");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build()
        .map_err(|err| format!("Failed to build worker pool: {err}"))?;
    let probed: Vec<Result<ManifestEntry, String>> = pool.install(|| {
        audio_files
            .par_iter()
            .map(|path| {
                let entry = probe_duration_seconds(path).map(|duration_seconds| ManifestEntry {
                    path: path.clone(),
                    duration_seconds,
                });
                progress.inc(1);
                entry
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut entries = Vec::with_capacity(probed.len());
    for result in probed {
        entries.push(result?);
    }
    sort_entries(&mut entries);

    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create '{}': {err}", parent.display()))?;
        }
    }
    write_manifest(&args.out, &entries)
        .map_err(|err| format!("Failed to write '{}': {err}", args.out.display()))?;
    println!("Wrote {} entries to {}", entries.len(), args.out.display());
    Ok(())
}

fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), std::io::Error> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_audio_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn probe_duration_seconds(path: &Path) -> Result<f64, String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "wav" => {
            let reader = WavReader::open(path)
                .map_err(|err| format!("Failed to open WAV '{}': {err}", path.display()))?;
            let spec = reader.spec();
            if spec.sample_rate == 0 {
                return Err(format!("WAV has zero sample rate: {}", path.display()));
            }
            Ok(reader.duration() as f64 / spec.sample_rate as f64)
        }
        "flac" => {
            let reader = FlacReader::open(path)
                .map_err(|err| format!("Failed to open FLAC '{}': {err}", path.display()))?;
            let streaminfo = reader.streaminfo();
            if streaminfo.sample_rate == 0 {
                return Err(format!("FLAC has zero sample rate: {}", path.display()));
            }
            let samples = streaminfo.samples.ok_or_else(|| {
                format!("FLAC stream length unknown: {}", path.display())
            })?;
            Ok(samples as f64 / streaminfo.sample_rate as f64)
        }
        _ => Err(format!("Unsupported audio format: {}", path.display())),
    }
}
