//! Top-level extraction facade: run-mode selection and stats aggregation.

use crate::bin_file::BinFile;
use crate::chunk;
use crate::error::BinError;
use crate::message::{DecodeOptions, Message, MessageFilter};
use crate::parallel::{self, ChunkProgress};
use crate::scanner::DecodeStats;
use std::path::Path;

/// Default chunk count for the chunked run modes.
pub const DEFAULT_WORKERS: usize = 8;

/// Execution strategy for a decode run. All modes produce the same output,
/// modulo documented seam losses in [`RunMode::Parallel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One scanner over the whole buffer.
    #[default]
    Sequential,
    /// Chunked workers sharing the mapped buffer and registry.
    Threaded,
    /// Chunked workers with isolated buffers and per-worker registries.
    Parallel,
}

/// Configuration for [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Round `ROUND_SET` fields to 7 decimals after scaling.
    pub round: bool,
    pub mode: RunMode,
    /// Number of chunks in the chunked modes.
    pub workers: usize,
    pub filter: MessageFilter,
    /// Ticked once per finished chunk (chunked modes only).
    pub progress: Option<ChunkProgress>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            round: false,
            mode: RunMode::default(),
            workers: DEFAULT_WORKERS,
            filter: MessageFilter::default(),
            progress: None,
        }
    }
}

/// A completed decode run.
#[derive(Debug)]
pub struct Extraction {
    pub messages: Vec<Message>,
    pub stats: DecodeStats,
}

/// Decode a BIN log file according to `options`.
///
/// The file is memory-mapped; decode failures on corrupt data never abort
/// the run — they surface as [`DecodeStats`] counters instead.
pub fn extract(path: impl AsRef<Path>, options: &ExtractOptions) -> Result<Extraction, BinError> {
    let file = BinFile::open_mmap(path)?;
    Ok(extract_from(&file, options))
}

/// Decode an already-opened BIN log according to `options`.
pub fn extract_from(file: &BinFile, options: &ExtractOptions) -> Extraction {
    let decode = DecodeOptions {
        round: options.round,
        filter: options.filter.clone(),
    };
    match options.mode {
        RunMode::Sequential => {
            let mut iter = file.messages(&decode);
            let messages: Vec<Message> = iter.by_ref().collect();
            let stats = iter.stats();
            Extraction { messages, stats }
        }
        RunMode::Threaded | RunMode::Parallel => {
            let data = file.data();
            let (registry, prescan) = file.formats();
            let boundaries = chunk::find_boundaries(data, &registry, options.workers);
            let progress = options.progress.as_ref();
            let (messages, mut stats) = match options.mode {
                RunMode::Threaded => {
                    parallel::decode_shared(data, &registry, &boundaries, &decode, progress)
                }
                _ => parallel::decode_isolated(data, &registry, &boundaries, &decode, progress),
            };
            stats.formats_registered = registry.len() as u64;
            stats.formats_rejected += prescan.formats_rejected;
            Extraction { messages, stats }
        }
    }
}
