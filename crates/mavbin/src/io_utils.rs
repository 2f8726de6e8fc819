//! Binary reading utilities for parsing record payloads.

use byteorder::{ByteOrder, LittleEndian};

/// A little-endian reader over a bounds-validated byte window.
///
/// The framing scanner only emits frames whose declared record length fits
/// the buffer, so reads inside a record window stay in bounds.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader starting at a specific offset.
    pub fn at_offset(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    pub fn read_i8(&mut self) -> i8 {
        self.take(1)[0] as i8
    }

    pub fn read_u16(&mut self) -> u16 {
        LittleEndian::read_u16(self.take(2))
    }

    pub fn read_i16(&mut self) -> i16 {
        LittleEndian::read_i16(self.take(2))
    }

    pub fn read_u32(&mut self) -> u32 {
        LittleEndian::read_u32(self.take(4))
    }

    pub fn read_i32(&mut self) -> i32 {
        LittleEndian::read_i32(self.take(4))
    }

    pub fn read_u64(&mut self) -> u64 {
        LittleEndian::read_u64(self.take(8))
    }

    pub fn read_i64(&mut self) -> i64 {
        LittleEndian::read_i64(self.take(8))
    }

    pub fn read_f32(&mut self) -> f32 {
        LittleEndian::read_f32(self.take(4))
    }

    pub fn read_f64(&mut self) -> f64 {
        LittleEndian::read_f64(self.take(8))
    }

    /// Read N raw bytes into a new Vec.
    pub fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        self.take(n).to_vec()
    }

    /// Read a fixed-size NUL-padded ASCII string.
    pub fn read_cstr(&mut self, n: usize) -> String {
        decode_cstr(self.take(n))
    }

    /// Read `n` consecutive little-endian i16 values.
    pub fn read_i16_array(&mut self, n: usize) -> Vec<i16> {
        self.take(n * 2)
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    /// Skip N bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Trim a NUL-padded byte window to an ASCII string.
///
/// Everything from the first NUL on is discarded; non-ASCII bytes are
/// dropped rather than rejected, matching permissive log tooling.
pub fn decode_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}
