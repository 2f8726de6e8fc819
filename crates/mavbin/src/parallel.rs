//! Chunk-parallel decoding on the rayon pool.
//!
//! Chunks are decoded independently against the registry built by the FMT
//! prescan and concatenated in chunk index order; because chunks are
//! non-overlapping byte ranges, that order equals byte order.

use crate::format::{FormatRegistry, FMT_TYPE_ID};
use crate::message::{self, DecodeOptions, Message};
use crate::scanner::{DecodeStats, FrameScanner};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Chunk-completion counter shared between rayon workers and a UI poller.
///
/// Workers bump the count as each chunk finishes; the CLI polls
/// [`ChunkProgress::finished`] on a timer to drive a progress bar, keeping
/// the core library free of any UI coupling.
#[derive(Debug, Clone, Default)]
pub struct ChunkProgress {
    finished: Arc<AtomicU64>,
}

impl ChunkProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks decoded so far.
    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    fn tick(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }
}

/// Decode one byte range against a shared registry.
///
/// Frames must start inside `[start, stop)`. In shared-buffer mode a final
/// record may extend past `stop`, which keeps chunked output identical to a
/// sequential pass over the same buffer.
pub fn decode_range(
    data: &[u8],
    registry: &FormatRegistry,
    start: usize,
    stop: usize,
    options: &DecodeOptions,
) -> (Vec<Message>, DecodeStats) {
    let mut scanner = FrameScanner::with_registry(data, registry, start, stop);
    let mut messages = Vec::new();
    while let Some(frame) = scanner.next_frame() {
        if frame.type_id == FMT_TYPE_ID {
            if options.filter.wants_fmt() {
                messages.push(message::decode_fmt(data, frame.offset));
            }
        } else if options.filter.wants_data() {
            let Some(fmt) = registry.get(frame.type_id) else {
                continue;
            };
            if options.filter.passes_name(&fmt.name) {
                messages.push(message::decode_data(data, fmt, frame.offset, options.round));
            }
        }
    }
    let mut stats = scanner.stats();
    stats.messages_decoded = messages.len() as u64;
    (messages, stats)
}

/// Decode chunks over the shared buffer: workers borrow `data` and the
/// registry directly. Output equals the sequential pass byte-for-byte.
pub fn decode_shared(
    data: &[u8],
    registry: &FormatRegistry,
    boundaries: &[usize],
    options: &DecodeOptions,
    progress: Option<&ChunkProgress>,
) -> (Vec<Message>, DecodeStats) {
    let results: Vec<(Vec<Message>, DecodeStats)> = boundaries
        .par_windows(2)
        .map(|range| {
            let out = decode_range(data, registry, range[0], range[1], options);
            if let Some(progress) = progress {
                progress.tick();
            }
            out
        })
        .collect();
    merge(results)
}

/// Decode chunks in isolation: each worker copies its byte range and clones
/// the registry, mirroring a process pool handed serialized chunks. Records
/// straddling an unconfirmed seam are dropped (seam loss, at most one per
/// boundary).
pub fn decode_isolated(
    data: &[u8],
    registry: &FormatRegistry,
    boundaries: &[usize],
    options: &DecodeOptions,
    progress: Option<&ChunkProgress>,
) -> (Vec<Message>, DecodeStats) {
    let results: Vec<(Vec<Message>, DecodeStats)> = boundaries
        .par_windows(2)
        .map(|range| {
            let chunk = data[range[0]..range[1]].to_vec();
            let registry = registry.clone();
            let out = decode_range(&chunk, &registry, 0, chunk.len(), options);
            if let Some(progress) = progress {
                progress.tick();
            }
            out
        })
        .collect();
    merge(results)
}

/// Concatenate worker outputs in chunk order and fold their counters.
fn merge(results: Vec<(Vec<Message>, DecodeStats)>) -> (Vec<Message>, DecodeStats) {
    let mut stats = DecodeStats::default();
    let mut total = 0;
    for (msgs, s) in &results {
        stats.merge(*s);
        total += msgs.len();
    }
    let mut messages = Vec::with_capacity(total);
    for (msgs, _) in results {
        messages.extend(msgs);
    }
    (messages, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::find_boundaries;
    use crate::format::{SYNC0, SYNC1};
    use crate::scanner::scan_formats;

    fn fmt_record(type_id: u8, length: u8, name: &str, types: &str, columns: &str) -> Vec<u8> {
        let mut buf = vec![SYNC0, SYNC1, FMT_TYPE_ID, type_id, length];
        let mut pad = |s: &str, n: usize| {
            let mut field = s.as_bytes().to_vec();
            field.resize(n, 0);
            buf.extend_from_slice(&field);
        };
        pad(name, 4);
        pad(types, 16);
        pad(columns, 64);
        buf
    }

    fn two_type_log(n: usize) -> Vec<u8> {
        let mut buf = fmt_record(1, 7, "GPS", "L", "Lat");
        buf.extend_from_slice(&fmt_record(2, 5, "MODE", "H", "Num"));
        for i in 0..n {
            if i % 3 == 0 {
                buf.extend_from_slice(&[SYNC0, SYNC1, 2]);
                buf.extend_from_slice(&(i as u16).to_le_bytes());
            } else {
                buf.extend_from_slice(&[SYNC0, SYNC1, 1]);
                buf.extend_from_slice(&((i as i32) * 1000).to_le_bytes());
            }
        }
        buf
    }

    #[test]
    fn test_shared_matches_sequential() {
        let buf = two_type_log(5000);
        let options = DecodeOptions::default();
        let (registry, _) = scan_formats(&buf);

        let (sequential, seq_stats) =
            decode_range(&buf, &registry, 0, buf.len(), &options);
        for workers in [2, 4, 8] {
            let boundaries = find_boundaries(&buf, &registry, workers);
            let (chunked, stats) =
                decode_shared(&buf, &registry, &boundaries, &options, None);
            assert_eq!(chunked, sequential, "workers = {workers}");
            assert_eq!(stats.messages_decoded, seq_stats.messages_decoded);
        }
    }

    #[test]
    fn test_isolated_matches_sequential_on_confirmed_boundaries() {
        let buf = two_type_log(5000);
        let options = DecodeOptions::default();
        let (registry, _) = scan_formats(&buf);

        let (sequential, _) = decode_range(&buf, &registry, 0, buf.len(), &options);
        let boundaries = find_boundaries(&buf, &registry, 4);
        let (chunked, _) = decode_isolated(&buf, &registry, &boundaries, &options, None);
        assert_eq!(chunked, sequential);
    }

    #[test]
    fn test_isolated_seam_loss_is_bounded() {
        // Force unconfirmed boundaries with an empty registry window: decode
        // with boundaries cutting records mid-way. Each of the N-1 seams may
        // cost at most the straddling record.
        let buf = two_type_log(1000);
        let options = DecodeOptions::default();
        let (registry, _) = scan_formats(&buf);
        let (sequential, _) = decode_range(&buf, &registry, 0, buf.len(), &options);

        let workers = 4;
        let mut boundaries: Vec<usize> = (0..workers).map(|i| buf.len() / workers * i).collect();
        boundaries.push(buf.len());
        let (chunked, _) = decode_isolated(&buf, &registry, &boundaries, &options, None);
        assert!(chunked.len() + (workers - 1) >= sequential.len());
        assert!(chunked.len() <= sequential.len());
    }

    #[test]
    fn test_progress_ticks_once_per_chunk() {
        let buf = two_type_log(100);
        let (registry, _) = scan_formats(&buf);
        let boundaries = find_boundaries(&buf, &registry, 4);
        let progress = ChunkProgress::new();
        decode_shared(
            &buf,
            &registry,
            &boundaries,
            &DecodeOptions::default(),
            Some(&progress),
        );
        assert_eq!(progress.finished(), 4);
    }
}
