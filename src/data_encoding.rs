use std::fmt;
use std::fmt::Formatter;

/// Payload encoding codes carried in Blockette 1000.
/// ```text
/// 0   ASCII text
/// 1   16-bit integer (two's complement)
/// 3   32-bit integer (two's complement)
/// 4   32-bit floats (IEEE float)
/// 5   64-bit floats (IEEE double)
/// 10  Steim-1 integer compression, big endian byte order
/// 11  Steim-2 integer compression, big endian byte order
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Ascii,
    Int16,
    Int32,
    Float32,
    Float64,
    Steim1,
    Steim2,
}

impl DataEncoding {
    /// Creates a DataEncoding based on the input integer
    pub fn from_int(val: u8) -> Option<DataEncoding> {
        match val {
            0 => Some(DataEncoding::Ascii),
            1 => Some(DataEncoding::Int16),
            3 => Some(DataEncoding::Int32),
            4 => Some(DataEncoding::Float32),
            5 => Some(DataEncoding::Float64),
            10 => Some(DataEncoding::Steim1),
            11 => Some(DataEncoding::Steim2),
            _ => None,
        }
    }

    /// The integer value, as a u8, of the encoding
    pub fn value(self) -> u8 {
        match self {
            DataEncoding::Ascii => 0,
            DataEncoding::Int16 => 1,
            DataEncoding::Int32 => 3,
            DataEncoding::Float32 => 4,
            DataEncoding::Float64 => 5,
            DataEncoding::Steim1 => 10,
            DataEncoding::Steim2 => 11,
        }
    }
}

impl fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DataEncoding::Ascii => write!(f, "ASCII text"),
            DataEncoding::Int16 => write!(f, "16-bit integer (two's complement)"),
            DataEncoding::Int32 => write!(f, "32-bit integer (two's complement)"),
            DataEncoding::Float32 => write!(f, "32-bit floats (IEEE float)"),
            DataEncoding::Float64 => write!(f, "64-bit floats (IEEE double)"),
            DataEncoding::Steim1 => write!(f, "Steim-1 integer compression, big endian byte order"),
            DataEncoding::Steim2 => write!(f, "Steim-2 integer compression, big endian byte order"),
        }
    }
}
