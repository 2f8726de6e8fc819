//! The field-type alphabet of FMT descriptors.
//!
//! Each character in an FMT's 16-byte field-type string selects one wire
//! representation and an optional post-processing step (scaling, string
//! trimming, coordinate conversion).

/// Wire representation of a single field (little-endian, fixed width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// 32 consecutive int16 values (the `a` type).
    I16Array,
    /// NUL-padded ASCII, 4 bytes (`n`).
    Bytes4,
    /// NUL-padded ASCII, 16 bytes (`N`).
    Bytes16,
    /// NUL-padded ASCII, 64 bytes (`Z`).
    Bytes64,
}

impl WireType {
    /// Map an FMT field-type character to its wire representation.
    ///
    /// `M` (flight mode) is a plain uint8 on the wire; `c`/`C`/`e`/`E`/`L`
    /// share integer wire types with `h`/`H`/`i`/`I` and differ only in
    /// post-processing.
    pub fn from_char(c: char) -> Option<WireType> {
        Some(match c {
            'b' => WireType::I8,
            'B' | 'M' => WireType::U8,
            'h' | 'c' => WireType::I16,
            'H' | 'C' => WireType::U16,
            'i' | 'e' | 'L' => WireType::I32,
            'I' | 'E' => WireType::U32,
            'q' => WireType::I64,
            'Q' => WireType::U64,
            'f' => WireType::F32,
            'd' => WireType::F64,
            'a' => WireType::I16Array,
            'n' => WireType::Bytes4,
            'N' => WireType::Bytes16,
            'Z' => WireType::Bytes64,
            _ => return None,
        })
    }

    /// Raw width in bytes.
    pub fn width(self) -> usize {
        match self {
            WireType::I8 | WireType::U8 => 1,
            WireType::I16 | WireType::U16 => 2,
            WireType::I32 | WireType::U32 | WireType::F32 | WireType::Bytes4 => 4,
            WireType::I64 | WireType::U64 | WireType::F64 => 8,
            WireType::Bytes16 => 16,
            WireType::I16Array | WireType::Bytes64 => 64,
        }
    }
}

/// Post-processing applied to a field after the raw unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOp {
    /// Emit the raw value unchanged.
    None,
    /// Divide by 100 (`c`/`C`/`e`/`E` store value x 100).
    Scale100 { round: bool },
    /// Multiply by 1e-7 (`L` stores degrees x 1e7).
    LatLon { round: bool },
    /// Trim at the first NUL and decode as ASCII (`n`/`N`/`Z`).
    Text,
}

/// Field names rounded to 7 decimal places when rounding is requested.
/// Applies only to scaled (`c`/`C`/`e`/`E`/`L`) fields; frozen at build time.
pub const ROUND_SET: &[&str] = &[
    "Lat", "Lng", "TLat", "TLng", "Pitch", "IPE", "Yaw", "IPN", "IYAW", "DesPitch", "NavPitch",
    "Temp", "AltE", "VDop", "VAcc", "Roll", "HAGL", "SM", "VWN", "VWE", "IVT", "SAcc", "TAW",
    "IPD", "ErrRP", "SVT", "SP", "TAT", "GZ", "HDop", "NavRoll", "NavBrg", "TAsp", "HAcc",
    "DesRoll", "SH", "TBrg", "AX",
];

/// Whether a field name participates in 7-decimal rounding.
pub fn is_rounded(name: &str) -> bool {
    ROUND_SET.contains(&name)
}

/// One compiled field: wire type plus post-processing, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCodec {
    pub wire: WireType,
    pub post: PostOp,
}

/// Resolve the post-op for one (type char, field name) pair.
pub fn post_op_for(c: char, name: &str) -> PostOp {
    match c {
        'c' | 'C' | 'e' | 'E' => PostOp::Scale100 {
            round: is_rounded(name),
        },
        'L' => PostOp::LatLon {
            round: is_rounded(name),
        },
        // A field literally named `Data` carries a firmware-specific binary
        // blob and stays raw bytes.
        'n' | 'N' | 'Z' if name != "Data" => PostOp::Text,
        _ => PostOp::None,
    }
}
