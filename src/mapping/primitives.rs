//! # Primitive Adapters
//!
//! A [`Primitive`] is a value stored directly in a vector slot. The trait
//! pairs the application type with its native slot type and converts between
//! them; most conversions are identities, the rest are the adapters below.
//!
//! | Type | Kind | Native | Adapter |
//! |------|------|--------|---------|
//! | `bool` | BOOLEAN | `u8` | 0 / 1 |
//! | `String` | VARCHAR | `StringRef` | inline or arena copy, UTF-8 checked on read |
//! | `Blob` | BLOB | `StringRef` | inline or arena copy |
//! | `NaiveDate` | DATE | `i32` | days since 1970-01-01 |
//! | `NaiveTime` | TIME | `i64` | microseconds since midnight, leap second clamped |
//! | `NaiveDateTime` | TIMESTAMP | `i64` | microseconds since the epoch |
//! | `DateTime<Utc>` | TIMESTAMP WITH TIME ZONE | `i64` | UTC microseconds since the epoch |
//! | `Uuid` | UUID | `i128` | big-endian value with the top bit flipped |
//!
//! Types that stand for NULL with an in-band value instead of `Option` set
//! `SENTINEL` and override [`Primitive::is_nullish`] / [`Primitive::nullish`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use eyre::{eyre, Result};
use uuid::Uuid;

use crate::memory::{Arena, StringRef};
use crate::types::{Blob, Interval, PrimitiveKind};
use crate::vector::NativeValue;

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const MICROS_PER_SECOND: i64 = 1_000_000;

const UUID_SIGN_FLIP: u128 = 1 << 127;

pub trait Primitive: Clone + Send + Sync + 'static {
    type Native: NativeValue;

    const KIND: PrimitiveKind;

    /// Whether some value of this type stands for NULL.
    const SENTINEL: bool = false;

    fn to_native(&self, arena: &mut Arena) -> Result<Self::Native>;

    /// Converts a present slot back. String-like natives must reference live
    /// memory, which holds for every present row of a vector being read.
    fn from_native(native: &Self::Native) -> Result<Self>;

    fn is_nullish(&self) -> bool {
        false
    }

    fn nullish() -> Option<Self> {
        None
    }
}

macro_rules! identity_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                type Native = $ty;
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                #[inline]
                fn to_native(&self, _arena: &mut Arena) -> Result<Self::Native> {
                    Ok(*self)
                }

                #[inline]
                fn from_native(native: &Self::Native) -> Result<Self> {
                    Ok(*native)
                }
            }
        )*
    };
}

identity_primitive! {
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    i128 => HugeInt,
    u8 => UTinyInt,
    u16 => USmallInt,
    u32 => UInteger,
    u64 => UBigInt,
    f32 => Float,
    f64 => Double,
    Interval => Interval,
}

impl Primitive for bool {
    type Native = u8;
    const KIND: PrimitiveKind = PrimitiveKind::Boolean;

    fn to_native(&self, _arena: &mut Arena) -> Result<u8> {
        Ok(*self as u8)
    }

    fn from_native(native: &u8) -> Result<Self> {
        Ok(*native != 0)
    }
}

/// Reads the bytes of a present string slot.
fn slot_bytes(native: &StringRef) -> &[u8] {
    // SAFETY: codecs only convert present rows, whose string data is owned by
    // the arena or engine buffer backing the vector being read.
    unsafe { native.as_bytes() }
}

impl Primitive for String {
    type Native = StringRef;
    const KIND: PrimitiveKind = PrimitiveKind::Varchar;

    fn to_native(&self, arena: &mut Arena) -> Result<StringRef> {
        StringRef::encode(self.as_bytes(), arena)
    }

    fn from_native(native: &StringRef) -> Result<Self> {
        std::str::from_utf8(slot_bytes(native))
            .map(str::to_owned)
            .map_err(|e| eyre!("VARCHAR value is not valid UTF-8: {}", e))
    }
}

impl Primitive for Blob {
    type Native = StringRef;
    const KIND: PrimitiveKind = PrimitiveKind::Blob;

    fn to_native(&self, arena: &mut Arena) -> Result<StringRef> {
        StringRef::encode(&self.0, arena)
    }

    fn from_native(native: &StringRef) -> Result<Self> {
        Ok(Blob(slot_bytes(native).to_vec()))
    }
}

impl Primitive for NaiveDate {
    type Native = i32;
    const KIND: PrimitiveKind = PrimitiveKind::Date;

    fn to_native(&self, _arena: &mut Arena) -> Result<i32> {
        Ok(self.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    fn from_native(native: &i32) -> Result<Self> {
        native
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or_else(|| eyre!("DATE value {} is out of range", native))
    }
}

impl Primitive for NaiveTime {
    type Native = i64;
    const KIND: PrimitiveKind = PrimitiveKind::Time;

    /// A leap second (`nanosecond() >= 1e9`) is stored as the last
    /// microsecond of the second it extends.
    fn to_native(&self, _arena: &mut Arena) -> Result<i64> {
        let nanos = self.nanosecond().min(999_999_999);
        Ok(self.num_seconds_from_midnight() as i64 * MICROS_PER_SECOND + (nanos / 1_000) as i64)
    }

    fn from_native(native: &i64) -> Result<Self> {
        let seconds = native.div_euclid(MICROS_PER_SECOND);
        let micros = native.rem_euclid(MICROS_PER_SECOND);
        u32::try_from(seconds)
            .ok()
            .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, micros as u32 * 1_000))
            .ok_or_else(|| eyre!("TIME value {} is out of range", native))
    }
}

impl Primitive for NaiveDateTime {
    type Native = i64;
    const KIND: PrimitiveKind = PrimitiveKind::Timestamp;

    fn to_native(&self, _arena: &mut Arena) -> Result<i64> {
        Ok(self.and_utc().timestamp_micros())
    }

    fn from_native(native: &i64) -> Result<Self> {
        DateTime::from_timestamp_micros(*native)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| eyre!("TIMESTAMP value {} is out of range", native))
    }
}

impl Primitive for DateTime<Utc> {
    type Native = i64;
    const KIND: PrimitiveKind = PrimitiveKind::TimestampTz;

    fn to_native(&self, _arena: &mut Arena) -> Result<i64> {
        Ok(self.timestamp_micros())
    }

    fn from_native(native: &i64) -> Result<Self> {
        DateTime::from_timestamp_micros(*native)
            .ok_or_else(|| eyre!("TIMESTAMP WITH TIME ZONE value {} is out of range", native))
    }
}

impl Primitive for Uuid {
    type Native = i128;
    const KIND: PrimitiveKind = PrimitiveKind::Uuid;

    fn to_native(&self, _arena: &mut Arena) -> Result<i128> {
        Ok((self.as_u128() ^ UUID_SIGN_FLIP) as i128)
    }

    fn from_native(native: &i128) -> Result<Self> {
        Ok(Uuid::from_u128(*native as u128 ^ UUID_SIGN_FLIP))
    }
}

crate::mapped_primitive!(
    bool,
    i8,
    i16,
    i32,
    i64,
    i128,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Blob,
    Interval,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<P: Primitive + PartialEq + std::fmt::Debug>(value: P) {
        let mut arena = Arena::new();
        let native = value.to_native(&mut arena).unwrap();
        assert_eq!(P::from_native(&native).unwrap(), value);
    }

    #[test]
    fn dates_count_days_from_the_epoch() {
        let mut arena = Arena::new();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch.to_native(&mut arena).unwrap(), 0);

        let before = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(before.to_native(&mut arena).unwrap(), -1);
        round_trip(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn times_are_microseconds() {
        let mut arena = Arena::new();
        let t = NaiveTime::from_hms_micro_opt(1, 2, 3, 456_789).unwrap();
        assert_eq!(t.to_native(&mut arena).unwrap(), 3_723_456_789);
        round_trip(t);
        assert!(NaiveTime::from_native(&-1).is_err());
    }

    #[test]
    fn leap_seconds_stay_within_the_day() {
        let mut arena = Arena::new();
        let leap = NaiveTime::from_hms_nano_opt(23, 59, 59, 1_500_000_000).unwrap();
        let native = leap.to_native(&mut arena).unwrap();
        assert_eq!(native, 86_399_999_999);
        assert_eq!(
            NaiveTime::from_native(&native).unwrap(),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap()
        );
    }

    #[test]
    fn timestamps_round_trip() {
        let ts = NaiveDate::from_ymd_opt(2001, 9, 9)
            .unwrap()
            .and_hms_micro_opt(1, 46, 40, 123_456)
            .unwrap();
        let mut arena = Arena::new();
        assert_eq!(ts.to_native(&mut arena).unwrap(), 1_000_000_000_123_456);
        round_trip(ts);
        round_trip(ts.and_utc());
    }

    #[test]
    fn uuid_top_bit_is_flipped() {
        let mut arena = Arena::new();
        let nil = Uuid::nil();
        assert_eq!(nil.to_native(&mut arena).unwrap(), i128::MIN);

        let max = Uuid::from_u128(u128::MAX);
        assert_eq!(max.to_native(&mut arena).unwrap(), i128::MAX);
        round_trip(Uuid::from_u128(0x1234_5678_9abc_def0_0fed_cba9_8765_4321));
    }

    #[test]
    fn strings_check_utf8() {
        let mut arena = Arena::new();
        round_trip("a string longer than twelve bytes".to_string());
        let bad = StringRef::encode(&[0xff, 0xfe], &mut arena).unwrap();
        assert!(String::from_native(&bad).is_err());
        assert_eq!(Blob::from_native(&bad).unwrap(), Blob(vec![0xff, 0xfe]));
    }

    #[test]
    fn booleans_are_bytes() {
        let mut arena = Arena::new();
        assert_eq!(true.to_native(&mut arena).unwrap(), 1);
        assert!(bool::from_native(&2).unwrap());
        assert!(!bool::from_native(&0).unwrap());
    }
}
