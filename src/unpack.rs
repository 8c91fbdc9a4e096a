//! Parsing encoded miniSEED records back into headers and samples.
//!
//! The reverse codec exists for verification and round-trip tests; the
//! conversion path itself only ever writes records.

use crate::data_encoding::DataEncoding;
use crate::error::ConvertError;
use crate::record::{
    Blockette1000, Blockette1001, MiniseedRecord, RecordHeader, BLOCKETTE_HEADER_SIZE,
    RECORD_HEADER_SIZE,
};
use crate::steim;
use crate::wire::{self, WordOrder};

impl MiniseedRecord {
    /// Parse one encoded record. The input must hold at least one full
    /// block; extra trailing bytes are ignored.
    pub fn unpack(data: &[u8]) -> Result<MiniseedRecord, ConvertError> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(ConvertError::ShortRecord(data.len(), RECORD_HEADER_SIZE));
        }

        // the word order is declared in Blockette 1000, which cannot be
        // located without already knowing it; a plausible BTime year in
        // big-endian interpretation settles it
        let year = u16::from_be_bytes([data[20], data[21]]);
        let order = if (1800..2500).contains(&year) {
            WordOrder::Big
        } else {
            WordOrder::Little
        };

        let mut fixed = [0u8; RECORD_HEADER_SIZE];
        fixed.copy_from_slice(&data[0..RECORD_HEADER_SIZE]);
        let header = RecordHeader::from_bytes(&fixed, order);

        let mut b1000 = None;
        let mut b1001 = None;
        let mut offset = header.first_blockette as usize;
        while offset != 0 && offset + BLOCKETTE_HEADER_SIZE <= data.len() {
            let btype = wire::get_u16(&data[offset..offset + 2], order);
            let next = wire::get_u16(&data[offset + 2..offset + 4], order) as usize;
            let body = offset + BLOCKETTE_HEADER_SIZE;
            match btype {
                1000 if body + 4 <= data.len() => {
                    b1000 = Some(Blockette1000 {
                        encoding: data[body],
                        word_order: data[body + 1],
                        record_length: data[body + 2],
                        reserved: data[body + 3],
                    });
                }
                1001 if body + 4 <= data.len() => {
                    b1001 = Some(Blockette1001 {
                        timing_quality: data[body],
                        microsec: data[body + 1] as i8,
                        reserved: data[body + 2],
                        frame_count: data[body + 3],
                    });
                }
                _ => {}
            }
            if next <= offset {
                break;
            }
            offset = next;
        }

        let b1000 = b1000
            .ok_or_else(|| ConvertError::Unsupported(String::from("no blockette 1000 found")))?;

        let block_size = 1usize << b1000.record_length;
        if data.len() < block_size {
            return Err(ConvertError::ShortRecord(data.len(), block_size));
        }
        let begin = header.beginning_of_data as usize;
        if begin > block_size {
            return Err(ConvertError::Unsupported(format!(
                "data offset {} past end of {} byte block",
                begin, block_size
            )));
        }

        Ok(MiniseedRecord {
            header,
            b1000,
            b1001: b1001.unwrap_or_default(),
            data: data[begin..block_size].to_vec(),
        })
    }

    fn encoding(&self) -> Result<DataEncoding, ConvertError> {
        DataEncoding::from_int(self.b1000.encoding).ok_or_else(|| {
            ConvertError::Unsupported(format!("unknown data encoding {}", self.b1000.encoding))
        })
    }

    /// Recover the integer samples of this record.
    pub fn int32s(&self) -> Result<Vec<i32>, ConvertError> {
        let n = self.sample_count();
        match self.encoding()? {
            // compressed payloads are big endian regardless of the header
            DataEncoding::Steim1 => steim::decode_steim(1, &self.data, n),
            DataEncoding::Steim2 => steim::decode_steim(2, &self.data, n),
            DataEncoding::Int32 => {
                if self.data.len() < n * 4 {
                    return Err(ConvertError::ShortRecord(self.data.len(), n * 4));
                }
                let order = self.word_order();
                Ok((0..n)
                    .map(|i| wire::get_i32(&self.data[i * 4..i * 4 + 4], order))
                    .collect())
            }
            DataEncoding::Int16 => {
                if self.data.len() < n * 2 {
                    return Err(ConvertError::ShortRecord(self.data.len(), n * 2));
                }
                let order = self.word_order();
                Ok((0..n)
                    .map(|i| i32::from(wire::get_i16(&self.data[i * 2..i * 2 + 2], order)))
                    .collect())
            }
            other => Err(ConvertError::Unsupported(format!(
                "cannot decode {} as integers",
                other
            ))),
        }
    }

    /// Recover the samples of this record as doubles.
    pub fn float64s(&self) -> Result<Vec<f64>, ConvertError> {
        let n = self.sample_count();
        match self.encoding()? {
            DataEncoding::Float32 => {
                if self.data.len() < n * 4 {
                    return Err(ConvertError::ShortRecord(self.data.len(), n * 4));
                }
                let order = self.word_order();
                Ok((0..n)
                    .map(|i| f64::from(wire::get_f32(&self.data[i * 4..i * 4 + 4], order)))
                    .collect())
            }
            DataEncoding::Float64 => {
                if self.data.len() < n * 8 {
                    return Err(ConvertError::ShortRecord(self.data.len(), n * 8));
                }
                let order = self.word_order();
                Ok((0..n)
                    .map(|i| wire::get_f64(&self.data[i * 8..i * 8 + 8], order))
                    .collect())
            }
            _ => Ok(self.int32s()?.into_iter().map(f64::from).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btime::BTime;
    use chrono::{TimeZone, Utc};

    fn packed_block() -> Vec<u8> {
        let mut rec = MiniseedRecord::new_empty(9, 100, 1);
        rec.set_network("NZ");
        rec.set_station("AUCT");
        rec.set_location("40");
        rec.set_channel("BTT");
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let samples: Vec<i32> = (0..100).map(|i| i * i % 997).collect();
        let mut out = Vec::new();
        rec.pack_steim2(start, 0, &samples, |msr| {
            msr.set_sequence(1);
            out.extend(msr.marshal()?);
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn unpack_round_trip() {
        let block = packed_block();
        assert_eq!(block.len(), 512);
        let rec = MiniseedRecord::unpack(&block).unwrap();
        assert_eq!(rec.src_name(), "NZ.AUCT.40.BTT");
        assert_eq!(rec.sample_count(), 100);
        assert_eq!(rec.block_size(), 512);
        assert_eq!(
            rec.start_time().unwrap(),
            Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
        );
        let expected: Vec<i32> = (0..100).map(|i| i * i % 997).collect();
        assert_eq!(rec.int32s().unwrap(), expected);
    }

    #[test]
    fn unpack_short_input() {
        let block = packed_block();
        assert!(matches!(
            MiniseedRecord::unpack(&block[..40]),
            Err(ConvertError::ShortRecord(40, _))
        ));
        assert!(matches!(
            MiniseedRecord::unpack(&block[..256]),
            Err(ConvertError::ShortRecord(256, 512))
        ));
    }

    #[test]
    fn unpack_little_endian_header() {
        let mut rec = MiniseedRecord::new_empty(8, 50, 1);
        rec.set_word_order(WordOrder::Little);
        rec.set_station("LE");
        rec.header.start_time = BTime::new(Utc.with_ymd_and_hms(1999, 1, 2, 3, 4, 5).unwrap());
        rec.header.num_samples = 3;
        rec.b1000.encoding = DataEncoding::Int32.value();
        let mut data = vec![0u8; 12];
        for (i, v) in [7i32, -8, 9].iter().enumerate() {
            wire::put_i32(&mut data[i * 4..i * 4 + 4], *v, WordOrder::Little);
        }
        rec.data = data;
        let block = rec.marshal().unwrap();
        let parsed = MiniseedRecord::unpack(&block).unwrap();
        assert_eq!(parsed.word_order(), WordOrder::Little);
        assert_eq!(parsed.header.start_time.year, 1999);
        assert_eq!(parsed.int32s().unwrap(), vec![7, -8, 9]);
    }
}
