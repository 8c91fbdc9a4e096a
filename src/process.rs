//! Reading fixed-length record streams and handing decoded blocks to a
//! callback.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use crate::error::ConvertError;
use crate::record::MiniseedRecord;

/// Read fixed-size blocks from the reader, decode each one, and pass the
/// source name, start time, sample period and samples to the callback.
///
/// A clean end of stream at a block boundary ends iteration; a partial
/// final block is an error. Callback errors are returned immediately.
pub fn process<R, F>(mut rd: R, blksize: usize, mut f: F) -> Result<(), ConvertError>
where
    R: Read,
    F: FnMut(&str, DateTime<Utc>, Duration, &[f64]) -> Result<(), ConvertError>,
{
    let mut buf = vec![0u8; blksize];

    loop {
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = rd.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(());
        }
        if filled < buf.len() {
            return Err(ConvertError::ShortRecord(filled, blksize));
        }

        let msr = MiniseedRecord::unpack(&buf)?;
        let samples = msr.float64s()?;
        f(
            &msr.src_name(),
            msr.start_time()?,
            msr.sample_period(),
            &samples,
        )?;
    }
}

/// Run [`process`] over the contents of a file.
pub fn process_file<P, F>(path: P, blksize: usize, f: F) -> Result<(), ConvertError>
where
    P: AsRef<Path>,
    F: FnMut(&str, DateTime<Utc>, Duration, &[f64]) -> Result<(), ConvertError>,
{
    let file = File::open(path)?;
    process(BufReader::new(file), blksize, f)
}

/// Run [`process`] over an in-memory byte slice.
pub fn process_bytes<F>(data: &[u8], blksize: usize, f: F) -> Result<(), ConvertError>
where
    F: FnMut(&str, DateTime<Utc>, Duration, &[f64]) -> Result<(), ConvertError>,
{
    process(data, blksize, f)
}
