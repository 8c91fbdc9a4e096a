use thiserror::Error;

/// Errors raised while decoding EARSS buffers or packing miniSEED records.
///
/// All errors are fatal to the current conversion; there is no retry or
/// skip-ahead. Errors returned from a sink callback propagate unchanged.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid length, EARSS buffer is {0} bytes not 16384")]
    InvalidLength(usize),
    #[error("unable to represent difference in <= 30 bits ({0})")]
    SteimOverflow(i32),
    #[error("IO Error")]
    Io(#[from] std::io::Error),
    #[error("invalid block size {0}, expected a power of two between 256 and 4096")]
    InvalidBlockSize(usize),
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("short record, {0} bytes < {1} needed")]
    ShortRecord(usize, usize),
    #[error("unsupported record: {0}")]
    Unsupported(String),
    #[error("compression/decompression error: {0}")]
    Compression(String),
}
