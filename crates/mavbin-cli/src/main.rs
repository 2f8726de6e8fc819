use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use mavbin::{
    extract_from, BinFile, ChunkProgress, ExtractOptions, MessageFilter, MessageKind, RunMode,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mavbin", about = "ArduPilot BIN flight-log decoder CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Mode {
    Sequential,
    Threaded,
    Parallel,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> RunMode {
        match mode {
            Mode::Sequential => RunMode::Sequential,
            Mode::Threaded => RunMode::Threaded,
            Mode::Parallel => RunMode::Parallel,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the declared FMT type table and file statistics.
    Info { file: PathBuf },

    /// Decode messages to NDJSON (one JSON object per line).
    Decode {
        file: PathBuf,
        /// Round scaled fields to 7 decimals.
        #[arg(long)]
        round: bool,
        #[arg(long, value_enum, default_value = "sequential")]
        mode: Mode,
        /// Chunk count for the chunked modes.
        #[arg(short, long, default_value_t = mavbin::DEFAULT_WORKERS)]
        workers: usize,
        /// Message type name(s) to keep. Repeat for several: -t GPS -t ATT
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
        /// Emit FMT meta-records only.
        #[arg(long, conflicts_with = "data_only")]
        fmt_only: bool,
        /// Emit data records only.
        #[arg(long)]
        data_only: bool,
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export GPS coordinates as CSV.
    Coords {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "threaded")]
        mode: Mode,
        #[arg(short, long, default_value_t = mavbin::DEFAULT_WORKERS)]
        workers: usize,
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Benchmark: decode the whole file with each run mode.
    Bench {
        file: PathBuf,
        #[arg(short, long, default_value_t = mavbin::DEFAULT_WORKERS)]
        workers: usize,
        #[arg(long)]
        round: bool,
    },
}

/// Spawn a progress bar tracking per-chunk decode progress.
///
/// Workers advance `progress` once per finished chunk; a background thread
/// polls it every 50ms to update the bar. Set `done` and join the handle to
/// finish.
fn spawn_progress_bar(
    total: u64,
    msg: &str,
) -> (ChunkProgress, Arc<AtomicBool>, std::thread::JoinHandle<()>) {
    let progress = ChunkProgress::new();
    let done = Arc::new(AtomicBool::new(false));

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("=> "),
    );
    bar.set_message(msg.to_string());

    let progress_clone = progress.clone();
    let done_clone = Arc::clone(&done);
    let handle = std::thread::spawn(move || {
        while !done_clone.load(Ordering::Relaxed) {
            bar.set_position(progress_clone.finished());
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        bar.set_position(progress_clone.finished());
        bar.finish();
    });

    (progress, done, handle)
}

fn open_writer(output: Option<PathBuf>) -> anyhow::Result<Box<dyn std::io::Write>> {
    Ok(if let Some(path) = output {
        Box::new(std::io::BufWriter::new(std::fs::File::create(path)?))
    } else {
        Box::new(std::io::BufWriter::new(std::io::stdout()))
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Info { file } => {
            let log = BinFile::open_mmap(&file)?;
            let (registry, stats) = log.formats();
            println!("File:      {}", file.display());
            println!(
                "Size:      {} bytes ({:.1} MB)",
                log.len(),
                log.len() as f64 / 1e6
            );
            println!("Types:     {}", registry.len());
            if stats.formats_rejected > 0 {
                println!("Rejected:  {} FMT records", stats.formats_rejected);
            }
            if stats.noise_bytes > 0 {
                println!("Noise:     {} bytes", stats.noise_bytes);
            }
            println!();
            println!("{:>4}  {:<5} {:>6}  {:<17} COLUMNS", "ID", "NAME", "LENGTH", "FORMAT");
            for fmt in registry.iter() {
                let columns: Vec<&str> = fmt.columns.iter().map(|c| &**c).collect();
                println!(
                    "{:>4}  {:<5} {:>6}  {:<17} {}",
                    fmt.type_id,
                    fmt.name,
                    fmt.record_length,
                    fmt.types,
                    columns.join(",")
                );
            }
        }

        Commands::Decode {
            file,
            round,
            mode,
            workers,
            types,
            fmt_only,
            data_only,
            output,
        } => {
            let kind = if fmt_only {
                MessageKind::Fmt
            } else if data_only {
                MessageKind::Data
            } else {
                MessageKind::All
            };
            let mut options = ExtractOptions {
                round,
                mode: mode.into(),
                workers,
                filter: MessageFilter { names: types, kind },
                progress: None,
            };

            let log = BinFile::open_mmap(&file)?;
            let chunked = mode != Mode::Sequential;
            let bar = if chunked {
                let (progress, done, handle) = spawn_progress_bar(workers as u64, "Decoding");
                options.progress = Some(progress);
                Some((done, handle))
            } else {
                None
            };

            let start = std::time::Instant::now();
            let run = extract_from(&log, &options);
            if let Some((done, handle)) = bar {
                done.store(true, Ordering::Relaxed);
                handle.join().unwrap();
            }
            let elapsed = start.elapsed();

            let mut writer = open_writer(output)?;
            for msg in &run.messages {
                serde_json::to_writer(&mut writer, msg)?;
                writeln!(writer)?;
            }
            writer.flush()?;

            eprintln!(
                "{} messages in {:.1}ms ({} types, {} noise bytes, {} truncated)",
                run.stats.messages_decoded,
                elapsed.as_secs_f64() * 1000.0,
                run.stats.formats_registered,
                run.stats.noise_bytes,
                run.stats.truncated_bytes,
            );
        }

        Commands::Coords {
            file,
            mode,
            workers,
            output,
        } => {
            let log = BinFile::open_mmap(&file)?;
            let coords = mavbin::coordinates_from(&log, mode.into(), workers);
            let mut writer = open_writer(output)?;
            writeln!(writer, "lat,lng")?;
            for (lat, lng) in &coords {
                writeln!(writer, "{:.7},{:.7}", lat, lng)?;
            }
            writer.flush()?;
            eprintln!("Found {} coordinates", coords.len());
        }

        Commands::Bench {
            file,
            workers,
            round,
        } => {
            let log = BinFile::open_mmap(&file)?;
            println!(
                "File: {} ({:.1} MB), workers: {}",
                file.display(),
                log.len() as f64 / 1e6,
                workers
            );
            for mode in [RunMode::Sequential, RunMode::Threaded, RunMode::Parallel] {
                let options = ExtractOptions {
                    round,
                    mode,
                    workers,
                    ..ExtractOptions::default()
                };
                let start = std::time::Instant::now();
                let run = extract_from(&log, &options);
                let elapsed = start.elapsed();
                println!(
                    "{:<12} {:>9} messages in {:>8.1}ms ({:.2} M msg/sec)",
                    format!("{:?}:", mode),
                    run.stats.messages_decoded,
                    elapsed.as_secs_f64() * 1000.0,
                    run.stats.messages_decoded as f64 / elapsed.as_secs_f64() / 1e6,
                );
            }
        }
    }
    Ok(())
}
