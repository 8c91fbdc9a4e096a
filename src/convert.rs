//! The per-channel conversion pipeline.
//!
//! For each EARSS record and each of its channels: de-interleave the
//! samples, build a record template labelled with the configured codes,
//! shift the start time back by the pre-event window, and drive Steim2
//! packing into the output sink. Sequence numbers run across the life of
//! one [`Converter`].

use std::io::Write;

use chrono::Duration;
use log::debug;

use crate::earss::EarssRecord;
use crate::error::ConvertError;
use crate::record::MiniseedRecord;

/// Station labelling and block sizing for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// 2-character SEED network code.
    pub network: String,
    /// SEED station code, up to 5 characters.
    pub station: String,
    /// 2-character SEED location code.
    pub location: String,
    /// 2-character channel code prefix.
    pub channel: String,
    /// One component character per channel, appended to the prefix.
    pub components: String,
    /// Output block size in bytes, a power of two between 256 and 4096.
    pub block_size: usize,
}

impl Default for ConvertConfig {
    fn default() -> ConvertConfig {
        ConvertConfig {
            network: String::from("XX"),
            station: String::from("XXXX"),
            location: String::from("XX"),
            channel: String::from("EH"),
            components: String::from("ZNE"),
            block_size: 512,
        }
    }
}

impl ConvertConfig {
    /// The full channel code for a component offset, e.g. `"EH"` + `'Z'`.
    /// Offsets past the component list fall back to the bare prefix.
    pub fn channel_code(&self, offset: usize) -> String {
        match self.components.as_bytes().get(offset) {
            Some(&c) => format!("{}{}", self.channel, c as char),
            None => self.channel.clone(),
        }
    }

    fn record_length(&self) -> u8 {
        self.block_size.trailing_zeros() as u8
    }
}

/// Converts EARSS records into a stream of miniSEED blocks.
pub struct Converter {
    config: ConvertConfig,
    counter: usize,
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Result<Converter, ConvertError> {
        let size = config.block_size;
        if !size.is_power_of_two() || !(256..=4096).contains(&size) {
            return Err(ConvertError::InvalidBlockSize(size));
        }
        Ok(Converter { config, counter: 0 })
    }

    /// Blocks written so far; also the last sequence number assigned.
    pub fn blocks_written(&self) -> usize {
        self.counter
    }

    /// Convert one EARSS record, writing one marshalled block per packed
    /// miniSEED record to the sink. Returns the number of blocks written.
    pub fn convert<W: Write>(
        &mut self,
        record: &EarssRecord,
        out: &mut W,
    ) -> Result<usize, ConvertError> {
        let before = self.counter;
        let start = record.start_time - Duration::seconds(i64::from(record.pre_event_seconds));

        for channel in 0..record.num_channels {
            let samples = record.channel_samples(channel);

            let mut rec =
                MiniseedRecord::new_empty(self.config.record_length(), record.sample_rate as i16, 1);
            rec.set_network(&self.config.network);
            rec.set_station(&self.config.station);
            rec.set_location(&self.config.location);
            rec.set_channel(&self.config.channel_code(channel));
            rec.header.time_correction = 100 * i32::from(record.time_correction);

            let counter = &mut self.counter;
            rec.pack_steim2(start, 0, &samples, |msr| {
                *counter += 1;
                msr.set_sequence(*counter);
                out.write_all(&msr.marshal()?)?;
                Ok(())
            })?;

            debug!(
                "channel {} packed through block {}",
                self.config.channel_code(channel),
                self.counter
            );
        }

        Ok(self.counter - before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_block_sizes() {
        for size in [0usize, 100, 128, 500, 8192] {
            let config = ConvertConfig {
                block_size: size,
                ..ConvertConfig::default()
            };
            assert!(matches!(
                Converter::new(config),
                Err(ConvertError::InvalidBlockSize(_))
            ));
        }
        for size in [256usize, 512, 1024, 2048, 4096] {
            let config = ConvertConfig {
                block_size: size,
                ..ConvertConfig::default()
            };
            assert!(Converter::new(config).is_ok());
        }
    }

    #[test]
    fn channel_codes() {
        let config = ConvertConfig::default();
        assert_eq!(config.channel_code(0), "EHZ");
        assert_eq!(config.channel_code(1), "EHN");
        assert_eq!(config.channel_code(2), "EHE");
        assert_eq!(config.channel_code(3), "EH");
    }

    #[test]
    fn record_length_codes() {
        for (size, code) in [(256usize, 8u8), (512, 9), (4096, 12)] {
            let config = ConvertConfig {
                block_size: size,
                ..ConvertConfig::default()
            };
            assert_eq!(config.record_length(), code);
        }
    }
}
