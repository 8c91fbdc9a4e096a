//! The miniSEED fixed-length data record and its blockettes.

use std::fmt;
use std::io::Write;

use chrono::{DateTime, Duration, Utc};

use crate::btime::BTime;
use crate::error::ConvertError;
use crate::wire::{self, WordOrder};

/// Size in bytes of the fixed section of the data header.
pub const RECORD_HEADER_SIZE: usize = 48;

/// Size in bytes of a blockette header (type + next offset).
pub const BLOCKETTE_HEADER_SIZE: usize = 4;

/// Size in bytes of the Blockette 1000 body.
pub const BLOCKETTE_1000_SIZE: usize = 4;

/// Size in bytes of the Blockette 1001 body.
pub const BLOCKETTE_1001_SIZE: usize = 4;

/// The 48-byte fixed section of a miniSEED data header.
///
/// ASCII fields are fixed width, left justified and space padded.
/// Multi-byte integers follow the word order declared in Blockette 1000.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    pub sequence_number: [u8; 6],
    pub quality_indicator: u8,
    pub reserved: u8,
    pub station: [u8; 5],
    pub location: [u8; 2],
    pub channel: [u8; 3],
    pub network: [u8; 2],
    pub start_time: BTime,
    pub num_samples: u16,
    /// Samples per second if positive, seconds per sample if negative.
    pub sample_rate_factor: i16,
    pub sample_rate_multiplier: i16,
    pub activity_flags: u8,
    pub io_clock_flags: u8,
    pub quality_flags: u8,
    pub num_blockettes: u8,
    /// In 0.0001 second units.
    pub time_correction: i32,
    pub beginning_of_data: u16,
    pub first_blockette: u16,
}

impl RecordHeader {
    pub fn to_bytes(&self, order: WordOrder) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..6].copy_from_slice(&self.sequence_number);
        buf[6] = self.quality_indicator;
        buf[7] = self.reserved;
        buf[8..13].copy_from_slice(&self.station);
        buf[13..15].copy_from_slice(&self.location);
        buf[15..18].copy_from_slice(&self.channel);
        buf[18..20].copy_from_slice(&self.network);
        buf[20..30].copy_from_slice(&self.start_time.encode(order));
        wire::put_u16(&mut buf[30..32], self.num_samples, order);
        wire::put_i16(&mut buf[32..34], self.sample_rate_factor, order);
        wire::put_i16(&mut buf[34..36], self.sample_rate_multiplier, order);
        buf[36] = self.activity_flags;
        buf[37] = self.io_clock_flags;
        buf[38] = self.quality_flags;
        buf[39] = self.num_blockettes;
        wire::put_i32(&mut buf[40..44], self.time_correction, order);
        wire::put_u16(&mut buf[44..46], self.beginning_of_data, order);
        wire::put_u16(&mut buf[46..48], self.first_blockette, order);
        buf
    }

    pub fn from_bytes(buf: &[u8; RECORD_HEADER_SIZE], order: WordOrder) -> RecordHeader {
        let mut sequence_number = [0u8; 6];
        sequence_number.copy_from_slice(&buf[0..6]);
        let mut station = [0u8; 5];
        station.copy_from_slice(&buf[8..13]);
        let mut location = [0u8; 2];
        location.copy_from_slice(&buf[13..15]);
        let mut channel = [0u8; 3];
        channel.copy_from_slice(&buf[15..18]);
        let mut network = [0u8; 2];
        network.copy_from_slice(&buf[18..20]);
        RecordHeader {
            sequence_number,
            quality_indicator: buf[6],
            reserved: buf[7],
            station,
            location,
            channel,
            network,
            start_time: BTime::decode(&buf[20..30], order),
            num_samples: wire::get_u16(&buf[30..32], order),
            sample_rate_factor: wire::get_i16(&buf[32..34], order),
            sample_rate_multiplier: wire::get_i16(&buf[34..36], order),
            activity_flags: buf[36],
            io_clock_flags: buf[37],
            quality_flags: buf[38],
            num_blockettes: buf[39],
            time_correction: wire::get_i32(&buf[40..44], order),
            beginning_of_data: wire::get_u16(&buf[44..46], order),
            first_blockette: wire::get_u16(&buf[46..48], order),
        }
    }
}

/// Data-only SEED blockette: encoding, word order and record length.
#[derive(Debug, Clone, Default)]
pub struct Blockette1000 {
    pub encoding: u8,
    /// 0 little endian, 1 big endian.
    pub word_order: u8,
    /// log2 of the record block size.
    pub record_length: u8,
    pub reserved: u8,
}

/// Data extension blockette: timing quality and microsecond residual.
#[derive(Debug, Clone, Default)]
pub struct Blockette1001 {
    pub timing_quality: u8,
    /// Start time residual below BTime resolution, in microseconds.
    pub microsec: i8,
    pub reserved: u8,
    /// Steim frames used in the payload.
    pub frame_count: u8,
}

/// One fixed-length miniSEED data record: header, Blockette 1000,
/// Blockette 1001 and the encoded payload.
#[derive(Debug, Clone)]
pub struct MiniseedRecord {
    pub header: RecordHeader,
    pub b1000: Blockette1000,
    pub b1001: Blockette1001,
    pub data: Vec<u8>,
}

fn copy_padded(dest: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = *bytes.get(i).unwrap_or(&b' ');
    }
}

fn trimmed(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim_end().to_string()
}

impl MiniseedRecord {
    /// A record template with the base required settings: quality `D`, two
    /// blockettes starting at offset 48, data at offset 64, big endian.
    ///
    /// `record_length` is the log2 of the block size. The caller fills the
    /// identifier codes, sequence number and time correction before packing.
    pub fn new_empty(record_length: u8, factor: i16, multiplier: i16) -> MiniseedRecord {
        MiniseedRecord {
            header: RecordHeader {
                sequence_number: *b"000000",
                quality_indicator: b'D',
                reserved: b' ',
                station: [b' '; 5],
                location: [b' '; 2],
                channel: [b' '; 3],
                network: [b' '; 2],
                start_time: BTime::default(),
                num_samples: 0,
                sample_rate_factor: factor,
                sample_rate_multiplier: multiplier,
                activity_flags: 0,
                io_clock_flags: 0,
                quality_flags: 0,
                num_blockettes: 2,
                time_correction: 0,
                beginning_of_data: 64,
                first_blockette: 48,
            },
            b1000: Blockette1000 {
                encoding: 0,
                word_order: WordOrder::Big.value(),
                record_length,
                reserved: 0,
            },
            b1001: Blockette1001::default(),
            data: Vec::new(),
        }
    }

    /// A fresh template with the same block size and sample rate as this record.
    pub fn empty_record(&self) -> MiniseedRecord {
        MiniseedRecord::new_empty(
            self.b1000.record_length,
            self.header.sample_rate_factor,
            self.header.sample_rate_multiplier,
        )
    }

    pub fn block_size(&self) -> usize {
        1usize << self.b1000.record_length
    }

    pub fn word_order(&self) -> WordOrder {
        WordOrder::from_value(self.b1000.word_order)
    }

    pub fn set_word_order(&mut self, order: WordOrder) {
        self.b1000.word_order = order.value();
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.header.quality_indicator = quality;
    }

    pub fn set_network(&mut self, code: &str) {
        copy_padded(&mut self.header.network, code);
    }

    pub fn set_station(&mut self, code: &str) {
        copy_padded(&mut self.header.station, code);
    }

    pub fn set_location(&mut self, code: &str) {
        copy_padded(&mut self.header.location, code);
    }

    pub fn set_channel(&mut self, code: &str) {
        copy_padded(&mut self.header.channel, code);
    }

    /// Set the six-digit zero-padded sequence number.
    pub fn set_sequence(&mut self, n: usize) {
        let digits = format!("{:06}", n);
        self.header
            .sequence_number
            .copy_from_slice(&digits.as_bytes()[..6]);
    }

    pub fn sample_count(&self) -> usize {
        self.header.num_samples as usize
    }

    /// Sample rate in Hz from the factor and multiplier, per SEED convention.
    pub fn sample_rate(&self) -> f64 {
        let f = f64::from(self.header.sample_rate_factor);
        let m = f64::from(self.header.sample_rate_multiplier);
        if f == 0.0 || m == 0.0 {
            return 0.0;
        }
        match (f > 0.0, m > 0.0) {
            (true, true) => f * m,
            (true, false) => -f / m,
            (false, true) => -m / f,
            (false, false) => 1.0 / (f * m),
        }
    }

    /// Time between consecutive samples.
    pub fn sample_period(&self) -> Duration {
        let rate = self.sample_rate();
        if rate <= 0.0 {
            return Duration::zero();
        }
        Duration::nanoseconds((1_000_000_000.0 / rate).round() as i64)
    }

    /// The instant of the first sample in this record.
    pub fn start_time(&self) -> Result<DateTime<Utc>, ConvertError> {
        self.header.start_time.time()
    }

    /// `NET.STA.LOC.CHA` identifier with trailing padding removed.
    pub fn src_name(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            trimmed(&self.header.network),
            trimmed(&self.header.station),
            trimmed(&self.header.location),
            trimmed(&self.header.channel),
        )
    }

    /// Write the record into the given Writer: header, blockette chain and
    /// payload, with any gaps zero filled. Does not pad past the payload;
    /// use [`MiniseedRecord::marshal`] for an exactly block-sized image.
    pub fn encode<W: Write>(&self, wr: &mut W) -> Result<(), ConvertError> {
        let order = self.word_order();

        wr.write_all(&self.header.to_bytes(order))?;

        // any space between the header and the first blockette
        let mut offset = self.header.first_blockette as usize;
        if offset > RECORD_HEADER_SIZE {
            wr.write_all(&vec![0u8; offset - RECORD_HEADER_SIZE])?;
        }

        // where the next blockette will be if present
        offset += BLOCKETTE_HEADER_SIZE + BLOCKETTE_1000_SIZE;
        let next = if self.header.num_blockettes > 1 {
            offset as u16
        } else {
            0
        };

        let mut bh = [0u8; BLOCKETTE_HEADER_SIZE];
        wire::put_u16(&mut bh[0..2], 1000, order);
        wire::put_u16(&mut bh[2..4], next, order);
        wr.write_all(&bh)?;
        wr.write_all(&[
            self.b1000.encoding,
            self.b1000.word_order,
            self.b1000.record_length,
            self.b1000.reserved,
        ])?;

        if self.header.num_blockettes > 1 {
            offset += BLOCKETTE_HEADER_SIZE + BLOCKETTE_1001_SIZE;

            let mut bh = [0u8; BLOCKETTE_HEADER_SIZE];
            wire::put_u16(&mut bh[0..2], 1001, order);
            // next blockette offset stays zero
            wr.write_all(&bh)?;
            wr.write_all(&[
                self.b1001.timing_quality,
                self.b1001.microsec as u8,
                self.b1001.reserved,
                self.b1001.frame_count,
            ])?;
        }

        // any space between the blockettes and the data
        let begin = self.header.beginning_of_data as usize;
        if begin > offset {
            wr.write_all(&vec![0u8; begin - offset])?;
        }

        wr.write_all(&self.data)?;

        Ok(())
    }

    /// Encode to a byte vector of exactly the declared block size, zero
    /// padded past the payload.
    pub fn marshal(&self) -> Result<Vec<u8>, ConvertError> {
        let mut buf = Vec::with_capacity(self.block_size());
        self.encode(&mut buf)?;
        buf.resize(self.block_size(), 0);
        Ok(buf)
    }
}

impl fmt::Display for MiniseedRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} samples at {} Hz",
            self.src_name(),
            self.header.start_time,
            self.header.num_samples,
            self.sample_rate(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn template() -> MiniseedRecord {
        let mut rec = MiniseedRecord::new_empty(9, 100, 1);
        rec.set_network("NZ");
        rec.set_station("LYLM");
        rec.set_location("10");
        rec.set_channel("EHZ");
        rec.set_sequence(42);
        rec.header.start_time = BTime::new(Utc.with_ymd_and_hms(2003, 3, 13, 1, 2, 3).unwrap());
        rec.header.num_samples = 7;
        rec.header.time_correction = 5400;
        rec.b1000.encoding = 11;
        rec.b1001.frame_count = 1;
        rec.data = vec![0xAA; 64];
        rec
    }

    #[test]
    fn marshal_layout() {
        let rec = template();
        let blk = rec.marshal().unwrap();
        assert_eq!(blk.len(), 512);
        assert_eq!(&blk[0..6], b"000042");
        assert_eq!(blk[6], b'D');
        assert_eq!(blk[7], b' ');
        assert_eq!(&blk[8..13], b"LYLM ");
        assert_eq!(&blk[13..15], b"10");
        assert_eq!(&blk[15..18], b"EHZ");
        assert_eq!(&blk[18..20], b"NZ");
        // 2003-072 01:02:03.0000 big endian
        assert_eq!(&blk[20..24], &[0x07, 0xd3, 0x00, 0x48]);
        assert_eq!(&blk[24..27], &[1, 2, 3]);
        assert_eq!(&blk[30..32], &[0, 7]);
        assert_eq!(&blk[32..34], &[0, 100]);
        assert_eq!(&blk[34..36], &[0, 1]);
        assert_eq!(blk[39], 2);
        assert_eq!(&blk[40..44], &[0, 0, 0x15, 0x18]);
        assert_eq!(&blk[44..46], &[0, 64]);
        assert_eq!(&blk[46..48], &[0, 48]);
        // blockette 1000: type, next, encoding, word order, length code
        assert_eq!(&blk[48..50], &[0x03, 0xe8]);
        assert_eq!(&blk[50..52], &[0, 56]);
        assert_eq!(blk[52], 11);
        assert_eq!(blk[53], 1);
        assert_eq!(blk[54], 9);
        // blockette 1001: type, next, body
        assert_eq!(&blk[56..58], &[0x03, 0xe9]);
        assert_eq!(&blk[58..60], &[0, 0]);
        assert_eq!(blk[63], 1);
        // payload then zero fill
        assert_eq!(&blk[64..128], &[0xAA; 64][..]);
        assert!(blk[128..].iter().all(|&b| b == 0));
    }

    #[test]
    fn header_bytes_round_trip() {
        let rec = template();
        for order in [WordOrder::Big, WordOrder::Little] {
            let bytes = rec.header.to_bytes(order);
            let parsed = RecordHeader::from_bytes(&bytes, order);
            assert_eq!(parsed.to_bytes(order), bytes);
            assert_eq!(parsed.num_samples, 7);
            assert_eq!(parsed.time_correction, 5400);
            assert_eq!(parsed.start_time, rec.header.start_time);
        }
    }

    #[test]
    fn sample_rate_conventions() {
        let mut rec = MiniseedRecord::new_empty(9, 100, 1);
        assert_eq!(rec.sample_rate(), 100.0);
        assert_eq!(rec.sample_period(), Duration::milliseconds(10));
        rec.header.sample_rate_factor = -10;
        rec.header.sample_rate_multiplier = 1;
        assert_eq!(rec.sample_rate(), 0.1);
        assert_eq!(rec.sample_period(), Duration::seconds(10));
    }

    #[test]
    fn src_name_trims_padding() {
        let rec = template();
        assert_eq!(rec.src_name(), "NZ.LYLM.10.EHZ");
    }

    #[test]
    fn fresh_template_from_record() {
        let mut rec = template();
        rec.set_quality(b'Q');
        let fresh = rec.empty_record();
        assert_eq!(fresh.block_size(), rec.block_size());
        assert_eq!(fresh.header.sample_rate_factor, 100);
        assert_eq!(fresh.header.quality_indicator, b'D');
        assert_eq!(fresh.header.num_samples, 0);
        assert!(fresh.data.is_empty());
    }

    #[test]
    fn block_size_from_length_code() {
        for (code, size) in [(8u8, 256usize), (9, 512), (10, 1024), (12, 4096)] {
            let rec = MiniseedRecord::new_empty(code, 50, 1);
            assert_eq!(rec.block_size(), size);
        }
    }
}
