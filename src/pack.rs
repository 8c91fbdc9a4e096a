//! Packing sample streams into fixed-length miniSEED records.
//!
//! Each pack method treats `self` as a template: identifier codes, sequence
//! number and time correction are taken as already set. One record is
//! assembled per payload-sized batch and handed to the caller's sink, which
//! owns sequence numbering and output.

use chrono::{DateTime, Duration, Utc};

use crate::btime::BTime;
use crate::data_encoding::DataEncoding;
use crate::error::ConvertError;
use crate::record::MiniseedRecord;
use crate::steim;
use crate::wire::{self, WordOrder};

impl MiniseedRecord {
    fn payload_size(&self) -> usize {
        self.block_size() - self.header.beginning_of_data as usize
    }

    fn time_offset(&self, start: DateTime<Utc>, count: usize) -> DateTime<Utc> {
        start + self.sample_period() * count as i32
    }

    fn with_payload(&self, data: Vec<u8>) -> MiniseedRecord {
        MiniseedRecord {
            header: self.header.clone(),
            b1000: self.b1000.clone(),
            b1001: self.b1001.clone(),
            data,
        }
    }

    /// Pack lines of text into ASCII records, one per payload-sized chunk.
    pub fn pack_ascii<F>(&self, start: DateTime<Utc>, lines: &[&str], mut sink: F) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        let size = self.payload_size();
        let text = lines.join("\n").into_bytes();

        for chunk in text.chunks(size) {
            let mut rec = self.with_payload(chunk.to_vec());
            rec.header.start_time = BTime::new(start);
            rec.header.num_samples = chunk.len() as u16;
            rec.b1000.encoding = DataEncoding::Ascii.value();
            sink(&mut rec)?;
        }

        Ok(())
    }

    /// Pack int32 samples into uncompressed records, splitting long runs.
    pub fn pack_int32<F>(&self, start: DateTime<Utc>, raw: &[i32], mut sink: F) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        let size = self.payload_size() / 4;
        let order = self.word_order();

        let mut count = 0usize;
        for b in raw.chunks(size) {
            let mut block = vec![0u8; size * 4];
            for (i, &v) in b.iter().enumerate() {
                wire::put_i32(&mut block[i * 4..i * 4 + 4], v, order);
            }

            let mut rec = self.with_payload(block);
            let offset = self.time_offset(start, count);
            let btime = BTime::new(offset);
            rec.header.start_time = btime;
            rec.header.num_samples = b.len() as u16;
            rec.b1000.encoding = DataEncoding::Int32.value();
            rec.b1001.microsec = microsec_residual(offset, &btime)?;
            sink(&mut rec)?;

            count += b.len();
        }

        Ok(())
    }

    /// Pack float32 samples into uncompressed records, splitting long runs.
    pub fn pack_float32<F>(&self, start: DateTime<Utc>, raw: &[f32], mut sink: F) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        let size = self.payload_size() / 4;
        let order = self.word_order();

        let mut count = 0usize;
        for b in raw.chunks(size) {
            let mut block = vec![0u8; size * 4];
            for (i, &v) in b.iter().enumerate() {
                wire::put_f32(&mut block[i * 4..i * 4 + 4], v, order);
            }

            let mut rec = self.with_payload(block);
            let offset = self.time_offset(start, count);
            let btime = BTime::new(offset);
            rec.header.start_time = btime;
            rec.header.num_samples = b.len() as u16;
            rec.b1000.encoding = DataEncoding::Float32.value();
            rec.b1001.microsec = microsec_residual(offset, &btime)?;
            sink(&mut rec)?;

            count += b.len();
        }

        Ok(())
    }

    /// Pack float64 samples into uncompressed records, splitting long runs.
    pub fn pack_float64<F>(&self, start: DateTime<Utc>, raw: &[f64], mut sink: F) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        let size = self.payload_size() / 8;
        let order = self.word_order();

        let mut count = 0usize;
        for b in raw.chunks(size) {
            let mut block = vec![0u8; size * 8];
            for (i, &v) in b.iter().enumerate() {
                wire::put_f64(&mut block[i * 8..i * 8 + 8], v, order);
            }

            let mut rec = self.with_payload(block);
            let offset = self.time_offset(start, count);
            let btime = BTime::new(offset);
            rec.header.start_time = btime;
            rec.header.num_samples = b.len() as u16;
            rec.b1000.encoding = DataEncoding::Float64.value();
            rec.b1001.microsec = microsec_residual(offset, &btime)?;
            sink(&mut rec)?;

            count += b.len();
        }

        Ok(())
    }

    /// Pack int32 samples with Steim1 compression. `prev` seeds the first
    /// difference.
    pub fn pack_steim1<F>(
        &self,
        start: DateTime<Utc>,
        prev: i32,
        raw: &[i32],
        sink: F,
    ) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        self.pack_steim(1, DataEncoding::Steim1, start, prev, raw, sink)
    }

    /// Pack int32 samples with Steim2 compression. `prev` seeds the first
    /// difference.
    pub fn pack_steim2<F>(
        &self,
        start: DateTime<Utc>,
        prev: i32,
        raw: &[i32],
        sink: F,
    ) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        self.pack_steim(2, DataEncoding::Steim2, start, prev, raw, sink)
    }

    fn pack_steim<F>(
        &self,
        version: u32,
        encoding: DataEncoding,
        start: DateTime<Utc>,
        prev: i32,
        raw: &[i32],
        mut sink: F,
    ) -> Result<(), ConvertError>
    where
        F: FnMut(&mut MiniseedRecord) -> Result<(), ConvertError>,
    {
        let frames = self.payload_size() / steim::FRAME_SIZE;

        let mut count = 0usize;
        steim::pack_steim(version, frames, prev, raw, |buf, index, used| {
            let mut rec = self.with_payload(buf.to_vec());

            let offset = self.time_offset(start, count);
            let btime = BTime::new(offset);
            rec.header.start_time = btime;
            rec.header.num_samples = index;
            rec.b1000.encoding = encoding.value();
            // compressed payloads are big endian regardless of the template
            rec.b1000.word_order = WordOrder::Big.value();
            rec.b1001.microsec = microsec_residual(offset, &btime)?;
            rec.b1001.frame_count = used;
            sink(&mut rec)?;

            count += index as usize;
            Ok(())
        })
    }
}

fn microsec_residual(offset: DateTime<Utc>, btime: &BTime) -> Result<i8, ConvertError> {
    let residual: Duration = offset - btime.time()?;
    Ok(residual.num_microseconds().unwrap_or(0) as i8)
}
