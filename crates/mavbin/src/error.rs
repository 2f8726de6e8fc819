use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FMT for type {type_id} ('{name}') uses unsupported field type char '{type_char}'")]
    UnsupportedTypeChar {
        type_id: u8,
        name: String,
        type_char: char,
    },

    #[error("FMT for type {type_id} ('{name}') declares {types} field types but {columns} column names")]
    ColumnCountMismatch {
        type_id: u8,
        name: String,
        types: usize,
        columns: usize,
    },

    #[error("FMT for type {type_id} ('{name}') declares length {declared} but field widths total {computed}")]
    LengthMismatch {
        type_id: u8,
        name: String,
        declared: usize,
        computed: usize,
    },
}
