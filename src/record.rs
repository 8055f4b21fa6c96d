//! A record: an ordered mapping from column name to typed value, matching
//! a `TableSchema`'s column order.

use std::io::Read;

use crate::io::{Decodeable, Encodeable};
use crate::schema::TableSchema;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, schema: &TableSchema, column: &str) -> Option<&Value> {
        schema.column_index(column).and_then(|i| self.values.get(i))
    }

    pub fn primary_key(&self, schema: &TableSchema) -> Vec<Value> {
        schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| self.values[i].clone())
            .collect()
    }

    /// Two records share the same identity when every primary-key column
    /// matches, or (no primary key declared) when every field matches.
    pub fn same_identity(&self, other: &Record, schema: &TableSchema) -> bool {
        let pk_indices: Vec<usize> = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        if pk_indices.is_empty() {
            self.values == other.values
        } else {
            pk_indices.iter().all(|&i| self.values[i] == other.values[i])
        }
    }
}

impl Encodeable for Record {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend((self.values.len() as u32).encode());
        for value in &self.values {
            buf.extend(value.encode());
        }
        buf
    }
}

impl Decodeable for Record {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let count = u32::decode_from(reader);
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(Value::decode_from(reader));
        }
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::types::ColumnType;
    use std::io::Cursor;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ColumnType::Int).primary_key(),
            Column::new("name", ColumnType::Varchar),
        ])
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let record = Record::new(vec![Value::Int(1), Value::Varchar("A".to_string())]);
        let bytes = record.encode();
        let mut cur = Cursor::new(bytes);
        assert_eq!(record, Record::decode_from(&mut cur));
    }

    #[test]
    fn same_identity_compares_by_primary_key() {
        let schema = schema();
        let a = Record::new(vec![Value::Int(1), Value::Varchar("A".to_string())]);
        let b = Record::new(vec![Value::Int(1), Value::Varchar("B".to_string())]);
        assert!(a.same_identity(&b, &schema));
    }

    #[test]
    fn different_primary_key_is_different_identity() {
        let schema = schema();
        let a = Record::new(vec![Value::Int(1), Value::Varchar("A".to_string())]);
        let b = Record::new(vec![Value::Int(2), Value::Varchar("A".to_string())]);
        assert!(!a.same_identity(&b, &schema));
    }
}
