//! FMT record parsing, descriptor compilation, and the format registry.
//!
//! BIN logs are self-describing: the FMT meta-record (type id `0x80`, always
//! 89 bytes) declares another message type's id, record length, name, field
//! types, and field names.
//!
//! FMT record layout:
//!
//! | Offset | Size | Field |
//! |--------|------|-------------------------------------------|
//! | 0      | 2    | sync marker `A3 95`                       |
//! | 2      | 1    | type id (`0x80`)                          |
//! | 3      | 1    | declared type id                          |
//! | 4      | 1    | declared record length (incl. header)     |
//! | 5      | 4    | declared name, NUL-padded ASCII           |
//! | 9      | 16   | field-type string, NUL-padded ASCII       |
//! | 25     | 64   | field names, comma-separated, NUL-padded  |

use crate::error::BinError;
use crate::io_utils::BinaryReader;
use crate::typemap::{post_op_for, FieldCodec, WireType};
use std::sync::Arc;

/// First byte of the sync marker opening every record.
pub const SYNC0: u8 = 0xA3;
/// Second byte of the sync marker.
pub const SYNC1: u8 = 0x95;
/// Reserved type id of the FMT meta-record.
pub const FMT_TYPE_ID: u8 = 0x80;
/// An FMT record is always exactly 89 bytes.
pub const FMT_RECORD_LEN: usize = 89;
/// Sync marker plus type id byte.
pub const RECORD_HEADER_LEN: usize = 3;
/// Record lengths are declared in one byte, so no record exceeds this.
pub const MAX_RECORD_LEN: usize = 255;

/// The raw fields of one FMT record, before compilation.
#[derive(Debug, Clone)]
pub struct RawFmt {
    pub type_id: u8,
    pub length: u8,
    pub name: String,
    /// Field-type chars, NUL-trimmed.
    pub types: String,
    /// Comma-joined field names, NUL-trimmed.
    pub columns: String,
}

impl RawFmt {
    /// Parse the 89-byte FMT record starting at `offset` (its sync marker).
    ///
    /// The caller guarantees `offset + FMT_RECORD_LEN <= data.len()`.
    pub fn parse(data: &[u8], offset: usize) -> RawFmt {
        let mut r = BinaryReader::at_offset(data, offset + RECORD_HEADER_LEN);
        let type_id = r.read_u8();
        let length = r.read_u8();
        let name = r.read_cstr(4);
        let types = r.read_cstr(16);
        let columns = r.read_cstr(64);
        RawFmt {
            type_id,
            length,
            name,
            types,
            columns,
        }
    }
}

/// A compiled message-type descriptor.
#[derive(Debug, Clone)]
pub struct Format {
    pub type_id: u8,
    pub name: Arc<str>,
    /// Total record length in bytes, including the 3-byte header.
    pub record_length: usize,
    /// The raw field-type spec, NUL-trimmed.
    pub types: String,
    /// Field names in declaration order.
    pub columns: Vec<Arc<str>>,
    /// Per-field unpack and post-processing plan, in declaration order.
    pub codecs: Vec<FieldCodec>,
}

impl Format {
    /// Compile a parsed FMT into a reusable descriptor.
    ///
    /// Validates that every type char is known, that each has a column name,
    /// and that the declared record length equals the header plus the summed
    /// field widths. Compilation is idempotent: the same FMT bytes always
    /// produce an identical descriptor.
    pub fn compile(raw: &RawFmt) -> Result<Format, BinError> {
        let columns: Vec<Arc<str>> = raw
            .columns
            .split(',')
            .filter(|c| !c.is_empty())
            .map(Arc::from)
            .collect();

        let n_types = raw.types.chars().count();
        if columns.len() != n_types {
            return Err(BinError::ColumnCountMismatch {
                type_id: raw.type_id,
                name: raw.name.clone(),
                types: n_types,
                columns: columns.len(),
            });
        }

        let mut codecs = Vec::with_capacity(n_types);
        let mut payload_len = 0usize;
        for (c, col) in raw.types.chars().zip(columns.iter()) {
            let wire = WireType::from_char(c).ok_or_else(|| BinError::UnsupportedTypeChar {
                type_id: raw.type_id,
                name: raw.name.clone(),
                type_char: c,
            })?;
            payload_len += wire.width();
            codecs.push(FieldCodec {
                wire,
                post: post_op_for(c, col),
            });
        }

        let declared = raw.length as usize;
        if declared != RECORD_HEADER_LEN + payload_len {
            return Err(BinError::LengthMismatch {
                type_id: raw.type_id,
                name: raw.name.clone(),
                declared,
                computed: RECORD_HEADER_LEN + payload_len,
            });
        }

        Ok(Format {
            type_id: raw.type_id,
            name: Arc::from(raw.name.as_str()),
            record_length: declared,
            types: raw.types.clone(),
            columns,
            codecs,
        })
    }
}

/// Message-type descriptors keyed by type id.
///
/// Entries are created on first observation of their FMT and never change
/// afterwards; a re-declared type id keeps its original descriptor.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<Option<Format>>,
    count: usize,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            formats: vec![None; 256],
            count: 0,
        }
    }

    pub fn get(&self, type_id: u8) -> Option<&Format> {
        self.formats[type_id as usize].as_ref()
    }

    pub fn contains(&self, type_id: u8) -> bool {
        self.formats[type_id as usize].is_some()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Insert a compiled format. First observation wins; returns whether the
    /// descriptor was newly inserted.
    pub fn insert(&mut self, format: Format) -> bool {
        let slot = &mut self.formats[format.type_id as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(format);
        self.count += 1;
        true
    }

    /// Parse, compile, and insert the FMT record at `offset`.
    pub fn register(&mut self, data: &[u8], offset: usize) -> Result<bool, BinError> {
        let raw = RawFmt::parse(data, offset);
        let format = Format::compile(&raw)?;
        Ok(self.insert(format))
    }

    /// Registered formats in type-id order.
    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.iter().filter_map(|f| f.as_ref())
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::PostOp;

    /// Build an 89-byte FMT record.
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

    #[test]
    fn test_parse_fmt_record() {
        let buf = fmt_record(1, 4, "GPS", "B", "Stat");
        assert_eq!(buf.len(), FMT_RECORD_LEN);
        let raw = RawFmt::parse(&buf, 0);
        assert_eq!(raw.type_id, 1);
        assert_eq!(raw.length, 4);
        assert_eq!(raw.name, "GPS");
        assert_eq!(raw.types, "B");
        assert_eq!(raw.columns, "Stat");
    }

    #[test]
    fn test_compile_mixed_fields() {
        let buf = fmt_record(10, 3 + 8 + 4 + 2 + 16, "POS", "QLcN", "TimeUS,Lat,Temp,Msg");
        let fmt = Format::compile(&RawFmt::parse(&buf, 0)).unwrap();
        assert_eq!(fmt.record_length, 33);
        assert_eq!(fmt.columns.len(), 4);
        assert_eq!(&*fmt.columns[1], "Lat");
        assert_eq!(fmt.codecs[0].post, PostOp::None);
        assert_eq!(fmt.codecs[1].post, PostOp::LatLon { round: true });
        assert_eq!(fmt.codecs[2].post, PostOp::Scale100 { round: true });
        assert_eq!(fmt.codecs[3].post, PostOp::Text);
    }

    #[test]
    fn test_compile_is_idempotent() {
        let buf = fmt_record(7, 3 + 4 + 4, "AHRS", "Lf", "Lat,Roll");
        let raw = RawFmt::parse(&buf, 0);
        let a = Format::compile(&raw).unwrap();
        let b = Format::compile(&raw).unwrap();
        assert_eq!(a.record_length, b.record_length);
        assert_eq!(a.types, b.types);
        assert_eq!(a.columns, b.columns);
        assert_eq!(a.codecs, b.codecs);
    }

    #[test]
    fn test_compile_rejects_unknown_char() {
        let buf = fmt_record(2, 4, "BAD", "x", "Field");
        let err = Format::compile(&RawFmt::parse(&buf, 0)).unwrap_err();
        assert!(matches!(
            err,
            BinError::UnsupportedTypeChar { type_char: 'x', .. }
        ));
    }

    #[test]
    fn test_compile_rejects_length_mismatch() {
        // 'I' is 4 bytes so the record must be 7 bytes, not 9
        let buf = fmt_record(3, 9, "BAD", "I", "Val");
        let err = Format::compile(&RawFmt::parse(&buf, 0)).unwrap_err();
        assert!(matches!(
            err,
            BinError::LengthMismatch {
                declared: 9,
                computed: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_compile_rejects_column_count_mismatch() {
        let buf = fmt_record(4, 3 + 2, "BAD", "hh", "Only");
        let err = Format::compile(&RawFmt::parse(&buf, 0)).unwrap_err();
        assert!(matches!(err, BinError::ColumnCountMismatch { .. }));
    }

    #[test]
    fn test_registry_first_observation_wins() {
        let mut registry = FormatRegistry::new();
        let first = fmt_record(1, 4, "GPS", "B", "Stat");
        let second = fmt_record(1, 5, "ATT", "H", "Roll");
        assert!(registry.register(&first, 0).unwrap());
        assert!(!registry.register(&second, 0).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(&*registry.get(1).unwrap().name, "GPS");
        assert_eq!(registry.get(1).unwrap().record_length, 4);
    }
}
