//! The framing scanner: resynchronizing frame iteration over a byte buffer.
//!
//! The scanner walks forward over the buffer, emitting `(type id, offset)`
//! frames for every well-formed record. A candidate header is only accepted
//! when its type id is FMT or already registered; a random `A3 95` inside a
//! payload therefore never consumes bytes as a record. On any invalid
//! candidate the scanner advances to the next sync marker one byte at a
//! time, so the cursor is strictly monotone and corrupt regions degrade to
//! counted noise instead of failed runs.

use crate::format::{FormatRegistry, FMT_RECORD_LEN, FMT_TYPE_ID, RECORD_HEADER_LEN, SYNC0, SYNC1};

/// One framed record: its type id and the offset of its sync marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub type_id: u8,
    pub offset: usize,
}

/// Counters reported alongside every decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Messages emitted after filtering.
    pub messages_decoded: u64,
    /// Distinct types in the registry at the end of the run.
    pub formats_registered: u64,
    /// FMT records whose compilation failed and was skipped.
    pub formats_rejected: u64,
    /// Bytes skipped while resynchronizing.
    pub noise_bytes: u64,
    /// Bytes of a partial record dropped at end of input.
    pub truncated_bytes: u64,
}

impl DecodeStats {
    /// Fold a worker's counters into a run total.
    pub fn merge(&mut self, other: DecodeStats) {
        self.messages_decoded += other.messages_decoded;
        self.formats_registered += other.formats_registered;
        self.formats_rejected += other.formats_rejected;
        self.noise_bytes += other.noise_bytes;
        self.truncated_bytes += other.truncated_bytes;
    }
}

/// Registry access: built on the fly in a sequential pass, shared read-only
/// inside chunk workers.
enum RegistrySource<'a> {
    Owned(FormatRegistry),
    Shared(&'a FormatRegistry),
}

pub struct FrameScanner<'a> {
    data: &'a [u8],
    registry: RegistrySource<'a>,
    pos: usize,
    /// Frames must start before this offset.
    stop: usize,
    noise_bytes: u64,
    truncated_bytes: u64,
    rejected_formats: u64,
}

impl<'a> FrameScanner<'a> {
    /// Scanner over a whole buffer, building its own registry from the FMT
    /// records it passes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            registry: RegistrySource::Owned(FormatRegistry::new()),
            pos: 0,
            stop: data.len(),
            noise_bytes: 0,
            truncated_bytes: 0,
            rejected_formats: 0,
        }
    }

    /// Scanner over frames starting in `[start, stop)`, validating against a
    /// pre-built registry. A record that begins before `stop` may extend
    /// past it as long as it fits the buffer, so chunked scans over a shared
    /// buffer reproduce the sequential output.
    pub fn with_registry(
        data: &'a [u8],
        registry: &'a FormatRegistry,
        start: usize,
        stop: usize,
    ) -> Self {
        let stop = stop.min(data.len());
        Self {
            data,
            registry: RegistrySource::Shared(registry),
            pos: start.min(stop),
            stop,
            noise_bytes: 0,
            truncated_bytes: 0,
            rejected_formats: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn registry(&self) -> &FormatRegistry {
        match &self.registry {
            RegistrySource::Owned(r) => r,
            RegistrySource::Shared(r) => r,
        }
    }

    /// Consume the scanner, yielding its registry (cloned if shared).
    pub fn into_registry(self) -> FormatRegistry {
        match self.registry {
            RegistrySource::Owned(r) => r,
            RegistrySource::Shared(r) => r.clone(),
        }
    }

    /// Snapshot of the scanner's counters. `messages_decoded` is left for
    /// the caller, which owns emission.
    pub fn stats(&self) -> DecodeStats {
        DecodeStats {
            messages_decoded: 0,
            formats_registered: match &self.registry {
                RegistrySource::Owned(r) => r.len() as u64,
                RegistrySource::Shared(_) => 0,
            },
            formats_rejected: self.rejected_formats,
            noise_bytes: self.noise_bytes,
            truncated_bytes: self.truncated_bytes,
        }
    }

    fn record_len(&self, type_id: u8) -> Option<usize> {
        self.registry().get(type_id).map(|f| f.record_length)
    }

    /// Advance to the next well-formed frame.
    ///
    /// Returns `None` at end of input. The scanner itself cannot fail:
    /// corrupt regions are skipped and counted, a truncated final record is
    /// silently dropped.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let data = self.data;
        loop {
            if self.pos + RECORD_HEADER_LEN > self.stop {
                // A record consumed just before stop may already have pushed
                // the cursor past it; saturate so the tail count stays zero.
                self.truncated_bytes += self.stop.saturating_sub(self.pos) as u64;
                self.pos = self.pos.max(self.stop);
                return None;
            }
            if data[self.pos] == SYNC0 && data[self.pos + 1] == SYNC1 {
                let type_id = data[self.pos + 2];
                if type_id == FMT_TYPE_ID {
                    if self.pos + FMT_RECORD_LEN > data.len() {
                        self.truncated_bytes += (self.stop - self.pos) as u64;
                        self.pos = self.stop;
                        return None;
                    }
                    let offset = self.pos;
                    if let RegistrySource::Owned(registry) = &mut self.registry {
                        if let Err(err) = registry.register(data, offset) {
                            // A rejected FMT leaves its type unknown, so later
                            // records of that id fall through as noise.
                            eprintln!("Warning: skipping FMT at offset {}: {}", offset, err);
                            self.rejected_formats += 1;
                        }
                    }
                    self.pos += FMT_RECORD_LEN;
                    return Some(Frame { type_id, offset });
                }
                if let Some(len) = self.record_len(type_id) {
                    if self.pos + len > data.len() {
                        self.truncated_bytes += (self.stop - self.pos) as u64;
                        self.pos = self.stop;
                        return None;
                    }
                    let offset = self.pos;
                    self.pos += len;
                    return Some(Frame { type_id, offset });
                }
            }
            // Not a valid frame here: resync to the next sync marker.
            match find_sync(data, self.pos + 1, self.stop) {
                Some(next) => {
                    self.noise_bytes += (next - self.pos) as u64;
                    self.pos = next;
                }
                None => {
                    self.noise_bytes += (self.stop - self.pos) as u64;
                    self.pos = self.stop;
                    return None;
                }
            }
        }
    }
}

/// First occurrence of the sync marker in `data[from..end]`.
pub(crate) fn find_sync(data: &[u8], from: usize, end: usize) -> Option<usize> {
    if from >= end {
        return None;
    }
    data[from..end]
        .windows(2)
        .position(|w| w[0] == SYNC0 && w[1] == SYNC1)
        .map(|p| from + p)
}

/// First pass over a whole buffer: register FMTs, skip data records.
///
/// Data records are stepped over by their declared length, so this is a
/// single cheap sweep even on multi-gigabyte logs. FMTs cluster near the
/// start of real logs, which keeps the pass mostly sequential reads.
pub fn scan_formats(data: &[u8]) -> (FormatRegistry, DecodeStats) {
    let mut scanner = FrameScanner::new(data);
    while scanner.next_frame().is_some() {}
    let stats = scanner.stats();
    (scanner.into_registry(), stats)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn gps_log() -> Vec<u8> {
        let mut buf = fmt_record(1, 4, "GPS", "B", "Stat");
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 42]);
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 255]);
        buf
    }

    #[test]
    fn test_scan_clean_buffer() {
        let buf = gps_log();
        let mut scanner = FrameScanner::new(&buf);
        let frames: Vec<Frame> = std::iter::from_fn(|| scanner.next_frame()).collect();
        assert_eq!(
            frames,
            vec![
                Frame {
                    type_id: FMT_TYPE_ID,
                    offset: 0
                },
                Frame {
                    type_id: 1,
                    offset: 89
                },
                Frame {
                    type_id: 1,
                    offset: 93
                },
            ]
        );
        assert_eq!(scanner.stats().noise_bytes, 0);
        assert_eq!(scanner.stats().truncated_bytes, 0);
        assert_eq!(scanner.stats().formats_registered, 1);
    }

    #[test]
    fn test_cursor_is_monotone() {
        let mut buf = gps_log();
        buf.extend_from_slice(&[0x11, 0x22, 0x33]);
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 7]);
        let mut scanner = FrameScanner::new(&buf);
        let mut last = 0;
        while let Some(frame) = scanner.next_frame() {
            assert!(frame.offset >= last);
            last = frame.offset + 1;
            assert!(scanner.position() > frame.offset);
        }
    }

    #[test]
    fn test_resync_across_garbage() {
        let fmt = fmt_record(1, 4, "GPS", "B", "Stat");
        let mut buf = fmt.clone();
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 42]);
        // 10 garbage bytes, none forming a sync marker
        buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A]);
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 255]);

        let mut scanner = FrameScanner::new(&buf);
        let mut data_frames = 0;
        while let Some(frame) = scanner.next_frame() {
            if frame.type_id == 1 {
                data_frames += 1;
            }
        }
        assert_eq!(data_frames, 2);
        assert_eq!(scanner.stats().noise_bytes, 10);
    }

    #[test]
    fn test_unknown_type_id_is_not_consumed() {
        let fmt = fmt_record(1, 4, "GPS", "B", "Stat");
        let mut buf = fmt;
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 42]);
        // Looks like a header but 0xFF was never declared
        buf.extend_from_slice(&[SYNC0, SYNC1, 0xFF]);
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 255]);

        let mut scanner = FrameScanner::new(&buf);
        let mut stats = Vec::new();
        while let Some(frame) = scanner.next_frame() {
            if frame.type_id == 1 {
                stats.push(buf[frame.offset + 3]);
            }
        }
        assert_eq!(stats, vec![42, 255]);
        assert_eq!(scanner.stats().noise_bytes, 3);
    }

    #[test]
    fn test_truncated_tail_dropped() {
        let mut buf = gps_log();
        // Partial record: header only, payload cut off
        buf.extend_from_slice(&[SYNC0, SYNC1]);
        let mut scanner = FrameScanner::new(&buf);
        let mut count = 0;
        while scanner.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(scanner.stats().truncated_bytes, 2);
    }

    #[test]
    fn test_coverage_accounting() {
        // consumed + noise + truncated covers the buffer exactly
        let mut buf = gps_log();
        buf.extend_from_slice(&[0xDE, 0xAD]);
        buf.extend_from_slice(&[SYNC0, SYNC1, 1, 9]);
        // Truncated tail: header only, the 4-byte record is cut short
        buf.extend_from_slice(&[SYNC0, SYNC1, 1]);

        let mut scanner = FrameScanner::new(&buf);
        let mut consumed = 0usize;
        while let Some(frame) = scanner.next_frame() {
            consumed += if frame.type_id == FMT_TYPE_ID {
                FMT_RECORD_LEN
            } else {
                scanner.registry().get(frame.type_id).unwrap().record_length
            };
        }
        let stats = scanner.stats();
        assert_eq!(
            consumed as u64 + stats.noise_bytes + stats.truncated_bytes,
            buf.len() as u64
        );
        assert_eq!(stats.truncated_bytes, 3);
    }

    #[test]
    fn test_shared_registry_does_not_register() {
        let buf = gps_log();
        let (registry, _) = scan_formats(&buf);
        let other = fmt_record(2, 5, "ATT", "H", "Roll");
        let mut shared = FrameScanner::with_registry(&other, &registry, 0, other.len());
        // FMT frame still emitted, but the shared registry stays untouched
        assert!(shared.next_frame().is_some());
        assert!(!registry.contains(2));
    }

    #[test]
    fn test_range_scan_emits_record_spanning_stop() {
        let buf = gps_log();
        let (registry, _) = scan_formats(&buf);
        // stop lands mid-way through the second data record; it still
        // decodes because it starts before stop and fits the buffer
        let mut scanner = FrameScanner::with_registry(&buf, &registry, 89, 95);
        let frames: Vec<Frame> = std::iter::from_fn(|| scanner.next_frame()).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].offset, 93);
    }

    #[test]
    fn test_scan_formats_skips_data_records() {
        let buf = gps_log();
        let (registry, stats) = scan_formats(&buf);
        assert_eq!(registry.len(), 1);
        assert_eq!(stats.formats_registered, 1);
        assert!(registry.contains(1));
    }

    #[test]
    fn test_empty_buffer() {
        let mut scanner = FrameScanner::new(&[]);
        assert_eq!(scanner.next_frame(), None);
        assert_eq!(scanner.stats(), DecodeStats::default());
    }
}
