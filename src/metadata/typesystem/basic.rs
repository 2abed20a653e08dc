//! Basic (single-column) value types.
//!
//! Mapping documents name basic types either by their short mapping name (`string`,
//! `big_decimal`, `yes_no`, ...) or by the fully qualified class they map (`java.lang.String`).
//! Both spellings parse into the same [`BasicTypeKind`].

use strum::{EnumIter, EnumString};

/// The closed set of basic value types a column can hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, EnumString, EnumIter,
)]
pub enum BasicTypeKind {
    /// Text
    #[strum(to_string = "string", serialize = "java.lang.String")]
    String,
    /// Single character
    #[strum(
        to_string = "character",
        serialize = "char",
        serialize = "java.lang.Character"
    )]
    Character,
    /// Boolean stored natively
    #[strum(
        to_string = "boolean",
        serialize = "java.lang.Boolean",
        serialize = "bool"
    )]
    Boolean,
    /// Boolean stored as `Y`/`N`
    #[strum(to_string = "yes_no")]
    YesNo,
    /// Boolean stored as `T`/`F`
    #[strum(to_string = "true_false")]
    TrueFalse,
    /// Boolean stored as `0`/`1`
    #[strum(to_string = "numeric_boolean")]
    NumericBoolean,
    /// 8-bit integer
    #[strum(to_string = "byte", serialize = "java.lang.Byte")]
    Byte,
    /// 16-bit integer
    #[strum(to_string = "short", serialize = "java.lang.Short")]
    Short,
    /// 32-bit integer
    #[strum(
        to_string = "integer",
        serialize = "int",
        serialize = "java.lang.Integer"
    )]
    Integer,
    /// 64-bit integer
    #[strum(to_string = "long", serialize = "java.lang.Long")]
    Long,
    /// 32-bit float
    #[strum(to_string = "float", serialize = "java.lang.Float")]
    Float,
    /// 64-bit float
    #[strum(to_string = "double", serialize = "java.lang.Double")]
    Double,
    /// Arbitrary precision decimal
    #[strum(to_string = "big_decimal", serialize = "java.math.BigDecimal")]
    BigDecimal,
    /// Arbitrary precision integer
    #[strum(to_string = "big_integer", serialize = "java.math.BigInteger")]
    BigInteger,
    /// SQL date
    #[strum(to_string = "date", serialize = "java.sql.Date")]
    Date,
    /// SQL time
    #[strum(to_string = "time", serialize = "java.sql.Time")]
    Time,
    /// SQL timestamp
    #[strum(
        to_string = "timestamp",
        serialize = "java.sql.Timestamp",
        serialize = "java.util.Date"
    )]
    Timestamp,
    /// Calendar stored as timestamp
    #[strum(to_string = "calendar", serialize = "java.util.Calendar")]
    Calendar,
    /// Calendar stored as date
    #[strum(to_string = "calendar_date")]
    CalendarDate,
    /// Instant
    #[strum(to_string = "instant", serialize = "java.time.Instant")]
    Instant,
    /// Local date
    #[strum(to_string = "local_date", serialize = "java.time.LocalDate")]
    LocalDate,
    /// Local date-time
    #[strum(to_string = "local_date_time", serialize = "java.time.LocalDateTime")]
    LocalDateTime,
    /// Byte array
    #[strum(to_string = "binary", serialize = "byte[]")]
    Binary,
    /// Unbounded text
    #[strum(to_string = "text")]
    Text,
    /// Character large object
    #[strum(to_string = "clob", serialize = "java.sql.Clob")]
    Clob,
    /// Binary large object
    #[strum(to_string = "blob", serialize = "java.sql.Blob")]
    Blob,
    /// Serialized object graph
    #[strum(to_string = "serializable", serialize = "java.io.Serializable")]
    Serializable,
    /// Locale
    #[strum(to_string = "locale", serialize = "java.util.Locale")]
    Locale,
    /// Time zone
    #[strum(to_string = "timezone", serialize = "java.util.TimeZone")]
    TimeZone,
    /// Currency
    #[strum(to_string = "currency", serialize = "java.util.Currency")]
    Currency,
    /// Class reference stored by name
    #[strum(to_string = "class", serialize = "java.lang.Class")]
    Class,
    /// UUID in binary form
    #[strum(to_string = "uuid-binary", serialize = "java.util.UUID")]
    UuidBinary,
    /// UUID as text
    #[strum(to_string = "uuid-char")]
    UuidChar,
    /// URL
    #[strum(to_string = "url", serialize = "java.net.URL")]
    Url,
}

impl BasicTypeKind {
    /// Map a primitive type name (`int`, `long`, ...) to its basic type.
    #[must_use]
    pub fn from_primitive(name: &str) -> Option<BasicTypeKind> {
        match name {
            "int" => Some(BasicTypeKind::Integer),
            "long" => Some(BasicTypeKind::Long),
            "short" => Some(BasicTypeKind::Short),
            "byte" => Some(BasicTypeKind::Byte),
            "float" => Some(BasicTypeKind::Float),
            "double" => Some(BasicTypeKind::Double),
            "boolean" => Some(BasicTypeKind::Boolean),
            "char" => Some(BasicTypeKind::Character),
            _ => None,
        }
    }

    /// Whether values of this type are rendered unquoted in SQL
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BasicTypeKind::Byte
                | BasicTypeKind::Short
                | BasicTypeKind::Integer
                | BasicTypeKind::Long
                | BasicTypeKind::Float
                | BasicTypeKind::Double
                | BasicTypeKind::BigDecimal
                | BasicTypeKind::BigInteger
                | BasicTypeKind::NumericBoolean
        )
    }

    /// Whether this type is usable as a version column
    #[must_use]
    pub fn is_versionable(&self) -> bool {
        matches!(
            self,
            BasicTypeKind::Short
                | BasicTypeKind::Integer
                | BasicTypeKind::Long
                | BasicTypeKind::Timestamp
                | BasicTypeKind::Calendar
                | BasicTypeKind::Instant
                | BasicTypeKind::LocalDateTime
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_short_and_class_names() {
        assert_eq!(
            BasicTypeKind::from_str("big_decimal").unwrap(),
            BasicTypeKind::BigDecimal
        );
        assert_eq!(
            BasicTypeKind::from_str("java.math.BigDecimal").unwrap(),
            BasicTypeKind::BigDecimal
        );
        assert_eq!(
            BasicTypeKind::from_str("java.util.Date").unwrap(),
            BasicTypeKind::Timestamp
        );
        assert!(BasicTypeKind::from_str("org.acme.Order").is_err());
    }

    #[test]
    fn test_display_uses_short_name() {
        assert_eq!(BasicTypeKind::YesNo.to_string(), "yes_no");
        assert_eq!(BasicTypeKind::Integer.to_string(), "integer");

        for kind in BasicTypeKind::iter() {
            assert_eq!(BasicTypeKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_primitives() {
        assert_eq!(
            BasicTypeKind::from_primitive("int"),
            Some(BasicTypeKind::Integer)
        );
        assert_eq!(BasicTypeKind::from_primitive("Integer"), None);
        assert!(BasicTypeKind::Long.is_numeric());
        assert!(!BasicTypeKind::String.is_numeric());
        assert!(BasicTypeKind::Timestamp.is_versionable());
    }
}
