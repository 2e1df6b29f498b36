//! # Primitive Kinds
//!
//! `PrimitiveKind` enumerates the engine's scalar column types. Every kind has
//! a fixed physical width in a vector slot; variable-length kinds store a
//! 16-byte [`StringRef`](crate::memory::StringRef) header.
//!
//! | Kind | SQL name | Width | Physical value |
//! |------|----------|-------|----------------|
//! | Boolean | BOOLEAN | 1 | `u8` 0/1 |
//! | TinyInt .. BigInt | TINYINT .. BIGINT | 1-8 | signed integer |
//! | HugeInt | HUGEINT | 16 | `i128` |
//! | UTinyInt .. UBigInt | UTINYINT .. UBIGINT | 1-8 | unsigned integer |
//! | Float, Double | FLOAT, DOUBLE | 4, 8 | IEEE 754 |
//! | Date | DATE | 4 | days since 1970-01-01 |
//! | Time | TIME | 8 | microseconds since midnight |
//! | Timestamp | TIMESTAMP | 8 | microseconds since the epoch |
//! | TimestampTz | TIMESTAMP WITH TIME ZONE | 8 | UTC microseconds since the epoch |
//! | Interval | INTERVAL | 16 | months, days, micros |
//! | Uuid | UUID | 16 | `i128` with the top bit flipped |
//! | Varchar, Blob | VARCHAR, BLOB | 16 | string header |
//!
//! Discriminants are stable: they feed the structural type hash.

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean = 1,
    TinyInt = 2,
    SmallInt = 3,
    Integer = 4,
    BigInt = 5,
    HugeInt = 6,
    UTinyInt = 7,
    USmallInt = 8,
    UInteger = 9,
    UBigInt = 10,
    Float = 11,
    Double = 12,
    Date = 13,
    Time = 14,
    Timestamp = 15,
    TimestampTz = 16,
    Interval = 17,
    Uuid = 18,
    Varchar = 19,
    Blob = 20,
}

impl PrimitiveKind {
    /// Bytes occupied by one value in a vector's data buffer.
    pub fn width(&self) -> usize {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::TinyInt | PrimitiveKind::UTinyInt => 1,
            PrimitiveKind::SmallInt | PrimitiveKind::USmallInt => 2,
            PrimitiveKind::Integer
            | PrimitiveKind::UInteger
            | PrimitiveKind::Float
            | PrimitiveKind::Date => 4,
            PrimitiveKind::BigInt
            | PrimitiveKind::UBigInt
            | PrimitiveKind::Double
            | PrimitiveKind::Time
            | PrimitiveKind::Timestamp
            | PrimitiveKind::TimestampTz => 8,
            PrimitiveKind::HugeInt
            | PrimitiveKind::Interval
            | PrimitiveKind::Uuid
            | PrimitiveKind::Varchar
            | PrimitiveKind::Blob => 16,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, PrimitiveKind::Varchar | PrimitiveKind::Blob)
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "BOOLEAN",
            PrimitiveKind::TinyInt => "TINYINT",
            PrimitiveKind::SmallInt => "SMALLINT",
            PrimitiveKind::Integer => "INTEGER",
            PrimitiveKind::BigInt => "BIGINT",
            PrimitiveKind::HugeInt => "HUGEINT",
            PrimitiveKind::UTinyInt => "UTINYINT",
            PrimitiveKind::USmallInt => "USMALLINT",
            PrimitiveKind::UInteger => "UINTEGER",
            PrimitiveKind::UBigInt => "UBIGINT",
            PrimitiveKind::Float => "FLOAT",
            PrimitiveKind::Double => "DOUBLE",
            PrimitiveKind::Date => "DATE",
            PrimitiveKind::Time => "TIME",
            PrimitiveKind::Timestamp => "TIMESTAMP",
            PrimitiveKind::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            PrimitiveKind::Interval => "INTERVAL",
            PrimitiveKind::Uuid => "UUID",
            PrimitiveKind::Varchar => "VARCHAR",
            PrimitiveKind::Blob => "BLOB",
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl TryFrom<u8> for PrimitiveKind {
    type Error = eyre::Report;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PrimitiveKind::Boolean),
            2 => Ok(PrimitiveKind::TinyInt),
            3 => Ok(PrimitiveKind::SmallInt),
            4 => Ok(PrimitiveKind::Integer),
            5 => Ok(PrimitiveKind::BigInt),
            6 => Ok(PrimitiveKind::HugeInt),
            7 => Ok(PrimitiveKind::UTinyInt),
            8 => Ok(PrimitiveKind::USmallInt),
            9 => Ok(PrimitiveKind::UInteger),
            10 => Ok(PrimitiveKind::UBigInt),
            11 => Ok(PrimitiveKind::Float),
            12 => Ok(PrimitiveKind::Double),
            13 => Ok(PrimitiveKind::Date),
            14 => Ok(PrimitiveKind::Time),
            15 => Ok(PrimitiveKind::Timestamp),
            16 => Ok(PrimitiveKind::TimestampTz),
            17 => Ok(PrimitiveKind::Interval),
            18 => Ok(PrimitiveKind::Uuid),
            19 => Ok(PrimitiveKind::Varchar),
            20 => Ok(PrimitiveKind::Blob),
            _ => eyre::bail!("invalid PrimitiveKind discriminant: {}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_engine_layout() {
        assert_eq!(PrimitiveKind::Boolean.width(), 1);
        assert_eq!(PrimitiveKind::USmallInt.width(), 2);
        assert_eq!(PrimitiveKind::Date.width(), 4);
        assert_eq!(PrimitiveKind::Timestamp.width(), 8);
        assert_eq!(PrimitiveKind::HugeInt.width(), 16);
        assert_eq!(PrimitiveKind::Varchar.width(), 16);
    }

    #[test]
    fn discriminant_round_trips() {
        for value in 1..=20u8 {
            let kind = PrimitiveKind::try_from(value).unwrap();
            assert_eq!(kind as u8, value);
        }
        assert!(PrimitiveKind::try_from(0).is_err());
        assert!(PrimitiveKind::try_from(21).is_err());
    }
}
