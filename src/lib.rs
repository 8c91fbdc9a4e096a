//! Convert EARSS triggered event recordings into miniSEED.
//!
//! EARSS acquisition hardware writes fixed 16384-byte buffers of
//! interleaved gain-ranged samples with a trailing bit-packed header.
//! This crate decodes those buffers, de-interleaves the channels, and
//! packs the samples into fixed-length miniSEED data records compressed
//! with Steim2.
//!
//! The conversion is a pure byte-to-byte transform: no network, no
//! database, no signal processing. The core types are [`EarssRecord`]
//! for one decoded buffer and [`MiniseedRecord`] for one output block;
//! [`Converter`] wires them together the way the command line tool does.
//!
//! ```
//! use earss2mseed::{ConvertConfig, Converter};
//!
//! let mut converter = Converter::new(ConvertConfig {
//!     network: String::from("NZ"),
//!     station: String::from("LYLM"),
//!     ..ConvertConfig::default()
//! }).unwrap();
//!
//! let mut out = Vec::new();
//! for record in earss2mseed::earss::decode_all(&[]).unwrap() {
//!     converter.convert(&record, &mut out).unwrap();
//! }
//! assert!(out.is_empty());
//! ```

pub mod btime;
pub mod convert;
pub mod data_encoding;
pub mod earss;
pub mod error;
mod pack;
pub mod process;
pub mod record;
pub mod steim;
mod unpack;
pub mod wire;

pub use btime::BTime;
pub use convert::{ConvertConfig, Converter};
pub use data_encoding::DataEncoding;
pub use earss::EarssRecord;
pub use error::ConvertError;
pub use record::{Blockette1000, Blockette1001, MiniseedRecord, RecordHeader};
pub use wire::WordOrder;
