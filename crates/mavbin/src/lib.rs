//! Pure Rust ArduPilot BIN flight-log decoder.
//!
//! BIN logs are self-describing: FMT meta-records declare every message
//! type's id, name, record length, field types, and field names; all other
//! records are instances of those types. This crate provides:
//!
//! - A resynchronizing framing scanner tolerant of noise and truncation
//! - A format registry compiling FMT field strings into reusable codecs
//! - Lazy sequential decoding over owned or memory-mapped buffers
//! - Chunk-parallel decoding via rayon
//!
//! # Example
//!
//! ```no_run
//! use mavbin::{BinFile, DecodeOptions};
//!
//! let log = BinFile::open_mmap("flight.bin").unwrap();
//! for msg in log.messages(&DecodeOptions::default()) {
//!     println!("{}", msg.packet_type());
//! }
//! ```

pub mod bin_file;
pub mod chunk;
pub mod coords;
pub mod error;
pub mod extract;
pub mod format;
pub mod io_utils;
pub mod message;
pub mod parallel;
pub mod scanner;
pub mod typemap;

pub use bin_file::{BinFile, MessageIter};
pub use coords::{coordinates_from, extract_coordinates};
pub use error::BinError;
pub use extract::{extract, extract_from, ExtractOptions, Extraction, RunMode, DEFAULT_WORKERS};
pub use format::{Format, FormatRegistry};
pub use message::{DecodeOptions, Message, MessageFilter, MessageKind, Value};
pub use parallel::ChunkProgress;
pub use scanner::{scan_formats, DecodeStats, Frame, FrameScanner};
