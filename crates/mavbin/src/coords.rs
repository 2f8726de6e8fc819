//! Coordinate extraction from GPS messages.

use crate::bin_file::BinFile;
use crate::error::BinError;
use crate::extract::{extract_from, ExtractOptions, RunMode};
use crate::message::{Message, MessageFilter, MessageKind, Value};
use std::path::Path;

/// Decode a log and collect `(lat, lng)` pairs from its GPS messages.
pub fn extract_coordinates(
    path: impl AsRef<Path>,
    mode: RunMode,
    workers: usize,
) -> Result<Vec<(f64, f64)>, BinError> {
    let file = BinFile::open_mmap(path)?;
    Ok(coordinates_from(&file, mode, workers))
}

/// Collect `(lat, lng)` pairs from the GPS messages of an opened log.
///
/// Only the first GPS unit is sampled: a message carrying an instance
/// field `I` must have `I == 1`, so logs with several receivers do not
/// interleave fixes. Messages without both `Lat` and `Lng` are skipped.
pub fn coordinates_from(file: &BinFile, mode: RunMode, workers: usize) -> Vec<(f64, f64)> {
    let options = ExtractOptions {
        round: false,
        mode,
        workers,
        filter: MessageFilter {
            names: vec!["GPS".to_string()],
            kind: MessageKind::Data,
        },
        progress: None,
    };
    let extraction = extract_from(file, &options);

    let mut coordinates = Vec::new();
    for msg in &extraction.messages {
        if !is_primary_instance(msg) {
            continue;
        }
        let (Some(Value::Float(lat)), Some(Value::Float(lng))) =
            (msg.get("Lat"), msg.get("Lng"))
        else {
            continue;
        };
        coordinates.push((*lat, *lng));
    }
    coordinates
}

/// Multi-receiver logs tag each GPS message with an instance field `I`;
/// coordinates come from instance 1 only. Single-unit logs without the
/// field pass.
fn is_primary_instance(msg: &Message) -> bool {
    match msg.get("I") {
        Some(Value::Int(i)) => *i == 1,
        Some(Value::UInt(i)) => *i == 1,
        None => true,
        _ => false,
    }
}
