//! Decoding EARSS triggered event buffers.
//!
//! An EARSS file is a sequence of fixed 16384-byte buffers. Each buffer
//! carries 8184 interleaved gain-ranged 16-bit samples followed by a
//! 16-byte trailer header whose fields are bit-fields spread across byte
//! boundaries. The header layout is extracted with explicit shifts and
//! masks only.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use log::debug;

use crate::error::ConvertError;

/// Size of one EARSS buffer in bytes.
pub const BUFFER_LENGTH: usize = 16384;

/// Size of the trailing header in bytes.
pub const HEADER_LENGTH: usize = 16;

/// Largest channel count a buffer can interleave.
pub const MAX_CHANNELS: usize = 3;

/// Interleaved sample values per buffer.
pub const DATA_VALUES: usize = 8184;

/// Sample magnitude multiplier per gain-range code.
pub const GAIN_SAMPLE: [i32; 8] = [128, 64, 32, 16, 8, 4, 2, 1];

/// System gain per channel gain setting. Exposed as metadata; never
/// applied to samples here.
pub const GAIN_SYSTEM: [i32; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Reconstruct a signed sample from its gain-ranged 16-bit word.
///
/// The magnitude comes from the unsigned low 12 bits scaled by the
/// gain-range code in bits 12-14; the sign comes from the signed value of
/// the whole word. A word with mantissa 0 and the sign bit set decodes to
/// 0, which matches the acquisition hardware.
fn decode_sample(value: i16) -> i32 {
    let mag = i32::from(value & 4095) * GAIN_SAMPLE[((value >> 12) & 7) as usize];
    if value < 0 {
        -mag
    } else {
        mag
    }
}

/// One decoded EARSS buffer.
#[derive(Debug, Clone)]
pub struct EarssRecord {
    /// Trigger time from the header; the first emitted sample sits
    /// `pre_event_seconds` earlier.
    pub start_time: DateTime<Utc>,
    pub instrument: u8,
    pub tape_number: u8,
    pub pre_event_seconds: u8,
    pub num_channels: usize,
    pub buffer_type: u8,
    pub buffer_number: u16,
    pub last_trigger: bool,
    /// Samples per second, one of 25, 50, 100 or 200.
    pub sample_rate: u32,
    /// In 0.01 second units.
    pub time_correction: u16,
    /// Per-channel system-gain codes.
    pub gain: [u8; MAX_CHANNELS],
    /// De-gained samples, still interleaved by channel.
    pub samples: Vec<i32>,
}

impl EarssRecord {
    /// Decode a single 16384-byte buffer.
    pub fn decode(data: &[u8]) -> Result<EarssRecord, ConvertError> {
        if data.len() != BUFFER_LENGTH {
            return Err(ConvertError::InvalidLength(data.len()));
        }

        let header = &data[BUFFER_LENGTH - HEADER_LENGTH..];

        let year = i32::from(header[5])
            + match header[5] {
                0..=49 => 2000,
                _ => 1900,
            };
        let month = u32::from(header[6]);
        let day = u32::from(header[7]);
        let nano = 10_000_000 * i64::from(header[13]);

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ConvertError::InvalidTime(format!("{:04}-{:02}-{:02}", year, month, day))
        })?;
        let naive = date
            .and_hms_opt(
                u32::from(header[10]),
                u32::from(header[11]),
                u32::from(header[12]),
            )
            .ok_or_else(|| {
                ConvertError::InvalidTime(format!(
                    "{:02}:{:02}:{:02}",
                    header[10], header[11], header[12]
                ))
            })?;
        let start_time = Utc.from_utc_datetime(&naive) + Duration::nanoseconds(nano);

        let num_channels = usize::from(header[2] & 3) + 1;

        let mut samples = Vec::with_capacity(DATA_VALUES);
        for pair in data[..DATA_VALUES * 2].chunks_exact(2) {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            samples.push(decode_sample(value));
        }

        Ok(EarssRecord {
            start_time,
            instrument: header[14],
            tape_number: header[15],
            pre_event_seconds: header[4],
            num_channels,
            buffer_type: header[0] & 15,
            buffer_number: u16::from(header[1]) + 1,
            last_trigger: header[0] & 128 != 0,
            sample_rate: 25 << ((header[0] & 48) >> 4),
            time_correction: u16::from_le_bytes([header[8], header[9]]),
            gain: [
                (header[2] & 112) >> 4,
                ((header[2] & 128) >> 7) + (header[3] & 3) * 2,
                (header[3] & 28) >> 2,
            ],
            samples,
        })
    }

    /// Samples of a single channel, de-interleaved in acquisition order.
    pub fn channel_samples(&self, channel: usize) -> Vec<i32> {
        self.samples
            .iter()
            .skip(channel)
            .step_by(self.num_channels)
            .copied()
            .collect()
    }

    /// Samples recorded per channel.
    pub fn samples_per_channel(&self) -> usize {
        DATA_VALUES / self.num_channels
    }
}

impl fmt::Display for EarssRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} instrument {} tape {} pre-event {}s channels {} type {} buffer {} last {} rate {} correction {} gain {}/{}/{}",
            self.start_time.to_rfc3339(),
            self.instrument,
            self.tape_number,
            self.pre_event_seconds,
            self.num_channels,
            self.buffer_type,
            self.buffer_number,
            self.last_trigger,
            self.sample_rate,
            self.time_correction,
            self.gain[0],
            self.gain[1],
            self.gain[2],
        )
    }
}

/// Slice a byte stream into 16384-byte buffers and decode each one.
/// Trailing bytes shorter than one buffer are silently ignored.
pub fn decode_all(data: &[u8]) -> Result<Vec<EarssRecord>, ConvertError> {
    let mut records = Vec::with_capacity(data.len() / BUFFER_LENGTH);
    for chunk in data.chunks_exact(BUFFER_LENGTH) {
        records.push(EarssRecord::decode(chunk)?);
    }
    debug!("decoded {} EARSS records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    // value layout: sign bit 15, gain code bits 12-14, mantissa bits 0-11
    fn word(sign: bool, gain: u16, mantissa: u16) -> i16 {
        ((if sign { 0x8000 } else { 0 }) | (gain << 12) | (mantissa & 0x0fff)) as i16
    }

    fn build_buffer(words: &[i16]) -> Vec<u8> {
        let mut data = vec![0u8; BUFFER_LENGTH];
        for (i, w) in words.iter().enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
        let header = &mut data[BUFFER_LENGTH - HEADER_LENGTH..];
        header[0] = 5 | (2 << 4) | 0x80; // type 5, 100 Hz, last trigger
        header[1] = 11; // buffer 12
        header[2] = 2 | (5 << 4) | 0x80; // 3 channels, gain0 5, gain1 low bit
        header[3] = 1 | (6 << 2); // gain1 high bits, gain2 6
        header[4] = 10; // pre-event seconds
        header[5] = 3; // 2003
        header[6] = 3; // March
        header[7] = 13;
        header[8..10].copy_from_slice(&54u16.to_le_bytes());
        header[10] = 1;
        header[11] = 2;
        header[12] = 3;
        header[13] = 25; // 0.25 s
        header[14] = 106;
        header[15] = 7;
        data
    }

    #[test]
    fn header_fields() {
        use chrono::TimeZone;
        let rec = EarssRecord::decode(&build_buffer(&[])).unwrap();
        assert_eq!(
            rec.start_time,
            Utc.with_ymd_and_hms(2003, 3, 13, 1, 2, 3).unwrap() + Duration::milliseconds(250)
        );
        assert_eq!(rec.instrument, 106);
        assert_eq!(rec.tape_number, 7);
        assert_eq!(rec.pre_event_seconds, 10);
        assert_eq!(rec.num_channels, 3);
        assert_eq!(rec.buffer_type, 5);
        assert_eq!(rec.buffer_number, 12);
        assert!(rec.last_trigger);
        assert_eq!(rec.sample_rate, 100);
        assert_eq!(rec.time_correction, 54);
        assert_eq!(rec.gain, [5, 3, 6]);
        assert_eq!(rec.samples.len(), DATA_VALUES);
    }

    #[test]
    fn sample_decoding() {
        let words = [
            word(false, 0, 0),    // 0
            word(true, 0, 0),     // negative zero collapses to 0
            word(true, 7, 4095),  // -4095
            word(false, 7, 4095), // 4095
            word(false, 0, 1),    // 1 * 128
            word(false, 3, 100),  // 100 * 16
            word(true, 4, 10),    // -(10 * 8)
        ];
        let rec = EarssRecord::decode(&build_buffer(&words)).unwrap();
        assert_eq!(&rec.samples[..7], &[0, 0, -4095, 4095, 128, 1600, -80]);
    }

    #[test]
    fn raw_word_boundaries() {
        // 0x0000, 0x8000 and 0xffff from the wire
        let rec = EarssRecord::decode(&build_buffer(&[0, -32768, -1])).unwrap();
        assert_eq!(&rec.samples[..3], &[0, 0, -4095]);
    }

    #[test]
    fn year_pivot() {
        let mut data = build_buffer(&[]);
        data[BUFFER_LENGTH - HEADER_LENGTH + 5] = 49;
        assert_eq!(
            EarssRecord::decode(&data).unwrap().start_time.format("%Y").to_string(),
            "2049"
        );
        data[BUFFER_LENGTH - HEADER_LENGTH + 5] = 50;
        assert_eq!(
            EarssRecord::decode(&data).unwrap().start_time.format("%Y").to_string(),
            "1950"
        );
    }

    #[test]
    fn invalid_length() {
        assert!(matches!(
            EarssRecord::decode(&[0u8; 100]),
            Err(ConvertError::InvalidLength(100))
        ));
    }

    #[test]
    fn invalid_month() {
        let mut data = build_buffer(&[]);
        data[BUFFER_LENGTH - HEADER_LENGTH + 6] = 0;
        assert!(matches!(
            EarssRecord::decode(&data),
            Err(ConvertError::InvalidTime(_))
        ));
    }

    #[test]
    fn decode_all_ignores_trailing_bytes() {
        let mut data = build_buffer(&[]);
        data.extend(build_buffer(&[]));
        data.extend_from_slice(&[0u8; 500]);
        let records = decode_all(&data).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn gain_tables_are_reciprocal() {
        // every gain code splits the same full-scale range
        for i in 0..8 {
            assert_eq!(GAIN_SAMPLE[i] * GAIN_SYSTEM[i], 128);
        }
    }

    #[test]
    fn channel_de_interleaving() {
        let words: Vec<i16> = (0..9).map(|i| word(false, 7, 10 * i + 1)).collect();
        let rec = EarssRecord::decode(&build_buffer(&words)).unwrap();
        assert_eq!(rec.samples_per_channel(), 2728);
        assert_eq!(&rec.channel_samples(0)[..3], &[1, 31, 61]);
        assert_eq!(&rec.channel_samples(1)[..3], &[11, 41, 71]);
        assert_eq!(&rec.channel_samples(2)[..3], &[21, 51, 81]);
    }
}
