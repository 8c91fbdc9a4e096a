//! The 10-byte SEED record start time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::ConvertError;
use crate::wire::{self, WordOrder};

/// Encoded size of a [`BTime`] in the fixed header.
pub const BTIME_SIZE: usize = 10;

/// SEED timestamp: year, day-of-year, time of day and 0.0001 second ticks.
///
/// The 16-bit fields follow the word order of the containing record, so
/// encoding and decoding take the order explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BTime {
    pub year: u16,
    /// Day of year, 1 based.
    pub doy: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Fractional seconds in 0.0001 second units.
    pub fract: u16,
}

impl BTime {
    /// Build a BTime from an instant, truncating to 0.0001 second resolution.
    pub fn new(t: DateTime<Utc>) -> BTime {
        let nano = t.nanosecond() % 1_000_000_000;
        BTime {
            year: t.year() as u16,
            doy: t.ordinal() as u16,
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: (t.second() + t.nanosecond() / 1_000_000_000) as u8,
            fract: (nano / 100_000) as u16,
        }
    }

    /// The instant this BTime represents.
    pub fn time(&self) -> Result<DateTime<Utc>, ConvertError> {
        let date = NaiveDate::from_yo_opt(i32::from(self.year), u32::from(self.doy))
            .ok_or_else(|| ConvertError::InvalidTime(format!("year {} day {}", self.year, self.doy)))?;
        let naive = date
            .and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
            .ok_or_else(|| {
                ConvertError::InvalidTime(format!(
                    "{:02}:{:02}:{:02}",
                    self.hour, self.minute, self.second
                ))
            })?;
        Ok(Utc.from_utc_datetime(&naive) + Duration::microseconds(i64::from(self.fract) * 100))
    }

    pub fn encode(&self, order: WordOrder) -> [u8; BTIME_SIZE] {
        let mut buf = [0u8; BTIME_SIZE];
        wire::put_u16(&mut buf[0..2], self.year, order);
        wire::put_u16(&mut buf[2..4], self.doy, order);
        buf[4] = self.hour;
        buf[5] = self.minute;
        buf[6] = self.second;
        // buf[7] unused
        wire::put_u16(&mut buf[8..10], self.fract, order);
        buf
    }

    pub fn decode(buf: &[u8], order: WordOrder) -> BTime {
        BTime {
            year: wire::get_u16(&buf[0..2], order),
            doy: wire::get_u16(&buf[2..4], order),
            hour: buf[4],
            minute: buf[5],
            second: buf[6],
            fract: wire::get_u16(&buf[8..10], order),
        }
    }
}

impl std::fmt::Display for BTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04},{:03},{:02}:{:02}:{:02}.{:04}",
            self.year, self.doy, self.hour, self.minute, self.second, self.fract
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2003, 3, 13, 1, 2, 3).unwrap() + Duration::milliseconds(250)
    }

    #[test]
    fn from_instant() {
        let bt = BTime::new(instant());
        assert_eq!(bt.year, 2003);
        assert_eq!(bt.doy, 72);
        assert_eq!(bt.hour, 1);
        assert_eq!(bt.minute, 2);
        assert_eq!(bt.second, 3);
        assert_eq!(bt.fract, 2500);
    }

    #[test]
    fn time_round_trip() {
        let t = instant();
        let bt = BTime::new(t);
        assert_eq!(bt.time().unwrap(), t);
    }

    #[test]
    fn truncates_below_tick() {
        // 123.456789 ms truncates to 1234 ticks
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(123_456_789);
        let bt = BTime::new(t);
        assert_eq!(bt.fract, 1234);
        let residual = t - bt.time().unwrap();
        assert_eq!(residual.num_microseconds().unwrap(), 56);
    }

    #[test]
    fn encode_both_orders() {
        let bt = BTime::new(instant());
        let be = bt.encode(WordOrder::Big);
        assert_eq!(be[0..2], [0x07, 0xd3]);
        assert_eq!(be[2..4], [0x00, 0x48]);
        assert_eq!(&be[4..7], &[1, 2, 3]);
        assert_eq!(be[8..10], [0x09, 0xc4]);
        assert_eq!(BTime::decode(&be, WordOrder::Big), bt);

        let le = bt.encode(WordOrder::Little);
        assert_eq!(le[0..2], [0xd3, 0x07]);
        assert_eq!(BTime::decode(&le, WordOrder::Little), bt);
    }

    #[test]
    fn bad_day_of_year() {
        let bt = BTime {
            year: 2021,
            doy: 366,
            ..BTime::default()
        };
        assert!(bt.time().is_err());
    }
}
