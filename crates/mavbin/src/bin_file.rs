//! Top-level entry point: open and decode BIN flight logs.

use crate::error::BinError;
use crate::format::{FormatRegistry, FMT_TYPE_ID};
use crate::message::{self, DecodeOptions, Message};
use crate::scanner::{scan_formats, DecodeStats, FrameScanner};
use std::path::Path;

/// Backing storage for an open log: a heap buffer or a read-only mapping.
/// Everything downstream works on the byte slice either one exposes.
enum LogData {
    Heap(Vec<u8>),
    Mapped(memmap2::Mmap),
}

impl LogData {
    fn bytes(&self) -> &[u8] {
        match self {
            LogData::Heap(v) => v,
            LogData::Mapped(m) => m,
        }
    }
}

/// A BIN flight log opened for decoding.
///
/// The log is self-describing, so opening performs no parsing; decoding
/// passes build the format registry from the FMT records they encounter.
pub struct BinFile {
    data: LogData,
}

impl BinFile {
    /// Open a BIN log, reading it entirely into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BinError> {
        let data = std::fs::read(path.as_ref())?;
        Ok(Self {
            data: LogData::Heap(data),
        })
    }

    /// Open a BIN log using memory-mapping, letting the OS page data in on
    /// demand. Preferred for multi-gigabyte logs.
    ///
    /// # Safety
    /// The file must not be modified while the BinFile is open.
    pub fn open_mmap(path: impl AsRef<Path>) -> Result<Self, BinError> {
        let file = std::fs::File::open(path.as_ref())?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self {
            data: LogData::Mapped(mmap),
        })
    }

    /// Wrap an in-memory buffer (synthetic logs, tests).
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: LogData::Heap(data),
        }
    }

    /// The underlying byte buffer.
    pub fn data(&self) -> &[u8] {
        self.data.bytes()
    }

    pub fn len(&self) -> usize {
        self.data.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.bytes().is_empty()
    }

    /// Prescan the whole file for FMT records, building the complete
    /// registry without decoding data records.
    pub fn formats(&self) -> (FormatRegistry, DecodeStats) {
        scan_formats(self.data.bytes())
    }

    /// Lazily decode messages in a single sequential pass.
    ///
    /// The registry builds itself from FMT records as they are encountered,
    /// so no prescan is needed. The iterator borrows the file buffer; drain
    /// it before calling [`MessageIter::stats`] for final counters.
    pub fn messages(&self, options: &DecodeOptions) -> MessageIter<'_> {
        MessageIter {
            data: self.data.bytes(),
            scanner: FrameScanner::new(self.data.bytes()),
            options: options.clone(),
            decoded: 0,
        }
    }
}

/// Lazy iterator over decoded messages, borrowing the file buffer.
pub struct MessageIter<'a> {
    data: &'a [u8],
    scanner: FrameScanner<'a>,
    options: DecodeOptions,
    decoded: u64,
}

impl MessageIter<'_> {
    /// Counters accumulated so far (final once the iterator is drained).
    pub fn stats(&self) -> DecodeStats {
        let mut stats = self.scanner.stats();
        stats.messages_decoded = self.decoded;
        stats
    }

    /// The registry built so far.
    pub fn registry(&self) -> &FormatRegistry {
        self.scanner.registry()
    }
}

impl Iterator for MessageIter<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        loop {
            let frame = self.scanner.next_frame()?;
            if frame.type_id == FMT_TYPE_ID {
                if !self.options.filter.wants_fmt() {
                    continue;
                }
                self.decoded += 1;
                return Some(message::decode_fmt(self.data, frame.offset));
            }
            if !self.options.filter.wants_data() {
                continue;
            }
            let Some(fmt) = self.scanner.registry().get(frame.type_id) else {
                continue;
            };
            if !self.options.filter.passes_name(&fmt.name) {
                continue;
            }
            let msg = message::decode_data(self.data, fmt, frame.offset, self.options.round);
            self.decoded += 1;
            return Some(msg);
        }
    }
}
