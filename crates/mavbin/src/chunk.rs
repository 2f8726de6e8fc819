//! Chunk-boundary detection for parallel decoding.
//!
//! Tentative split points at `size * i / N` are snapped forward to a
//! confirmed frame start: a sync candidate whose declared record length
//! lands exactly on another sync marker ("double-sync"). A random `A3 95`
//! inside a payload fails that check. When no confirmed boundary exists in
//! the window the tentative offset stands and the scanner's resync recovers
//! the next real frame, at the cost of a few seam records.

use crate::format::{FormatRegistry, FMT_RECORD_LEN, FMT_TYPE_ID, MAX_RECORD_LEN, RECORD_HEADER_LEN, SYNC0, SYNC1};
use crate::scanner::find_sync;

/// Forward search window at each tentative split point. Two max-length
/// records guarantee room for a frame plus its trailing sync marker.
const BOUNDARY_WINDOW: usize = 2 * MAX_RECORD_LEN;

/// Split `data` into `workers` byte ranges aligned to confirmed frame starts.
///
/// Returns `workers + 1` monotone offsets covering the whole buffer; chunk
/// `i` spans `[boundaries[i], boundaries[i + 1])`. Ranges never overlap, so
/// concatenating per-chunk output in index order preserves byte order.
pub fn find_boundaries(data: &[u8], registry: &FormatRegistry, workers: usize) -> Vec<usize> {
    let size = data.len();
    let workers = workers.max(1);
    let mut boundaries = Vec::with_capacity(workers + 1);
    boundaries.push(0);

    let mut prev = 0usize;
    for i in 1..workers {
        let tentative = size / workers * i;
        let snapped = confirm_boundary(data, registry, tentative)
            .unwrap_or(tentative)
            .max(prev);
        boundaries.push(snapped);
        prev = snapped;
    }

    boundaries.push(size);
    boundaries
}

/// Find the first confirmed frame start at or after `tentative`.
fn confirm_boundary(data: &[u8], registry: &FormatRegistry, tentative: usize) -> Option<usize> {
    let end = (tentative + BOUNDARY_WINDOW).min(data.len());
    let mut pos = tentative;
    while pos + RECORD_HEADER_LEN <= end {
        let hit = find_sync(data, pos, end)?;
        if hit + RECORD_HEADER_LEN > end {
            return None;
        }
        let type_id = data[hit + 2];
        let len = if type_id == FMT_TYPE_ID {
            Some(FMT_RECORD_LEN)
        } else {
            registry.get(type_id).map(|f| f.record_length)
        };
        if let Some(len) = len {
            if hit + len + 2 <= end && data[hit + len] == SYNC0 && data[hit + len + 1] == SYNC1 {
                return Some(hit);
            }
        }
        pos = hit + 1;
    }
    None
}
