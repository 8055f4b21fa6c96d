//! Column types and the typed `Value` every record, index key, and literal
//! in a predicate is built from.

use std::convert::TryInto;
use std::fmt;
use std::io::Read;

use crate::error::{DbError, DbResult};
use crate::io::{read_exact, Decodeable, Encodeable};
use crate::page::PageId;

/// A record's physical location: which heap page, and which slot in that
/// page's slot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

/// A column's declared type. `max_length` on `Varchar`/`Char` and
/// `precision`/`scale` on `Decimal` live on the owning `Column`, not here,
/// since they constrain storage but not which `Value` variant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    Int,
    BigInt,
    Float,
    Boolean,
    Varchar,
    Char,
    Decimal,
    Date,
    Time,
    DateTime,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Char => "CHAR",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
        };
        write!(f, "{}", name)
    }
}

/// A typed value. Decimal and date/time/datetime values are stored as
/// their canonical string form, matching the source's choice to avoid
/// pulling in a decimal or calendar crate for a storage core that never
/// performs arithmetic on them itself.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    TinyInt(i8),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Boolean(bool),
    Varchar(String),
    Char(String),
    Decimal(String),
    Date(String),
    Time(String),
    DateTime(String),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::TinyInt(_) => "TINYINT",
            Value::Int(_) => "INT",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "FLOAT",
            Value::Boolean(_) => "BOOLEAN",
            Value::Varchar(_) => "VARCHAR",
            Value::Char(_) => "CHAR",
            Value::Decimal(_) => "DECIMAL",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::DateTime(_) => "DATETIME",
            Value::Null => "NULL",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn matches_type(&self, ty: &ColumnType) -> bool {
        if self.is_null() {
            return true;
        }
        matches!(
            (self, ty),
            (Value::TinyInt(_), ColumnType::TinyInt)
                | (Value::Int(_), ColumnType::Int)
                | (Value::BigInt(_), ColumnType::BigInt)
                | (Value::Float(_), ColumnType::Float)
                | (Value::Boolean(_), ColumnType::Boolean)
                | (Value::Varchar(_), ColumnType::Varchar)
                | (Value::Char(_), ColumnType::Char)
                | (Value::Decimal(_), ColumnType::Decimal)
                | (Value::Date(_), ColumnType::Date)
                | (Value::Time(_), ColumnType::Time)
                | (Value::DateTime(_), ColumnType::DateTime)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Varchar(v) | Value::Char(v) | Value::Decimal(v) => write!(f, "{}", v),
            Value::Date(v) | Value::Time(v) | Value::DateTime(v) => write!(f, "{}", v),
            Value::Null => write!(f, "NULL"),
        }
    }
}

/// Tag byte preceding every non-null payload; tag `0` is reserved for NULL.
const TAG_NULL: u8 = 0;
const TAG_TINYINT: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_BIGINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_BOOLEAN: u8 = 5;
const TAG_VARCHAR: u8 = 6;
const TAG_CHAR: u8 = 7;
const TAG_DECIMAL: u8 = 8;
const TAG_DATE: u8 = 9;
const TAG_TIME: u8 = 10;
const TAG_DATETIME: u8 = 11;

impl Encodeable for Value {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Value::Null => buf.push(TAG_NULL),
            Value::TinyInt(v) => {
                buf.push(TAG_TINYINT);
                buf.extend(v.encode());
            }
            Value::Int(v) => {
                buf.push(TAG_INT);
                buf.extend(v.encode());
            }
            Value::BigInt(v) => {
                buf.push(TAG_BIGINT);
                buf.extend(v.encode());
            }
            Value::Float(v) => {
                buf.push(TAG_FLOAT);
                buf.extend(v.encode());
            }
            Value::Boolean(v) => {
                buf.push(TAG_BOOLEAN);
                buf.extend(v.encode());
            }
            Value::Varchar(v) => {
                buf.push(TAG_VARCHAR);
                buf.extend(v.encode());
            }
            Value::Char(v) => {
                buf.push(TAG_CHAR);
                buf.extend(v.encode());
            }
            Value::Decimal(v) => {
                buf.push(TAG_DECIMAL);
                buf.extend(v.encode());
            }
            Value::Date(v) => {
                buf.push(TAG_DATE);
                buf.extend(v.encode());
            }
            Value::Time(v) => {
                buf.push(TAG_TIME);
                buf.extend(v.encode());
            }
            Value::DateTime(v) => {
                buf.push(TAG_DATETIME);
                buf.extend(v.encode());
            }
        }
        buf
    }
}

impl Decodeable for Value {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let tag = read_exact(reader, 1)[0];
        match tag {
            TAG_NULL => Value::Null,
            TAG_TINYINT => Value::TinyInt(i8::decode_from(reader)),
            TAG_INT => Value::Int(i32::decode_from(reader)),
            TAG_BIGINT => Value::BigInt(i64::decode_from(reader)),
            TAG_FLOAT => Value::Float(f32::decode_from(reader)),
            TAG_BOOLEAN => Value::Boolean(bool::decode_from(reader)),
            TAG_VARCHAR => Value::Varchar(String::decode_from(reader)),
            TAG_CHAR => Value::Char(String::decode_from(reader)),
            TAG_DECIMAL => Value::Decimal(String::decode_from(reader)),
            TAG_DATE => Value::Date(String::decode_from(reader)),
            TAG_TIME => Value::Time(String::decode_from(reader)),
            TAG_DATETIME => Value::DateTime(String::decode_from(reader)),
            other => panic!("corrupt value tag byte: {}", other),
        }
    }
}

pub fn check_type(value: &Value, column_name: &str, ty: &ColumnType) -> DbResult<()> {
    if value.matches_type(ty) {
        Ok(())
    } else {
        Err(DbError::TypeMismatch {
            column: column_name.to_string(),
            expected: ty.to_string(),
            actual: value.type_name().to_string(),
        })
    }
}

/// Parses a column's `DEFAULT` literal (stored as plain text on `Column`)
/// into a typed value, for the executor to substitute in place of a column
/// missing from an `INSERT`'s column list.
pub fn parse_default(text: &str, column_name: &str, ty: &ColumnType) -> DbResult<Value> {
    let mismatch = || DbError::TypeMismatch {
        column: column_name.to_string(),
        expected: ty.to_string(),
        actual: format!("DEFAULT '{}'", text),
    };
    Ok(match ty {
        ColumnType::TinyInt => Value::TinyInt(text.parse().map_err(|_| mismatch())?),
        ColumnType::Int => Value::Int(text.parse().map_err(|_| mismatch())?),
        ColumnType::BigInt => Value::BigInt(text.parse().map_err(|_| mismatch())?),
        ColumnType::Float => Value::Float(text.parse().map_err(|_| mismatch())?),
        ColumnType::Boolean => Value::Boolean(text.parse().map_err(|_| mismatch())?),
        ColumnType::Varchar => Value::Varchar(text.to_string()),
        ColumnType::Char => Value::Char(text.to_string()),
        ColumnType::Decimal => Value::Decimal(text.to_string()),
        ColumnType::Date => Value::Date(text.to_string()),
        ColumnType::Time => Value::Time(text.to_string()),
        ColumnType::DateTime => Value::DateTime(text.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_each_variant() {
        let values = vec![
            Value::TinyInt(-5),
            Value::Int(42),
            Value::BigInt(9_000_000_000),
            Value::Float(1.5),
            Value::Boolean(true),
            Value::Varchar("hello".to_string()),
            Value::Char("AB".to_string()),
            Value::Decimal("3.14".to_string()),
            Value::Date("2024-01-01".to_string()),
            Value::Null,
        ];
        for value in values {
            let bytes = value.encode();
            let mut cur = Cursor::new(bytes);
            let decoded = Value::decode_from(&mut cur);
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn null_matches_any_type() {
        assert!(Value::Null.matches_type(&ColumnType::Int));
        assert!(Value::Null.matches_type(&ColumnType::Varchar));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let err = check_type(&Value::Int(1), "age", &ColumnType::Varchar).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch { .. }));
    }

    #[test]
    fn parse_default_coerces_text_to_the_declared_type() {
        assert_eq!(parse_default("0", "age", &ColumnType::Int).unwrap(), Value::Int(0));
        assert_eq!(
            parse_default("active", "status", &ColumnType::Varchar).unwrap(),
            Value::Varchar("active".to_string())
        );
        assert!(parse_default("not-a-number", "age", &ColumnType::Int).is_err());
    }
}
