//! Table schemas: column definitions and the table-level constraints that
//! ride along with them (checks, foreign keys).

use crate::ast::Predicate;
use crate::io::{read_exact, Decodeable, Encodeable};
use crate::types::ColumnType;
use std::io::Read;

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// A boolean expression over this table's own columns, evaluated by the
/// executor at INSERT/UPDATE time with `ast::eval`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckExpr {
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub max_length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub check: Option<CheckExpr>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            max_length: None,
            precision: None,
            scale: None,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
            check: None,
            foreign_key: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn check_exprs(&self) -> Vec<&CheckExpr> {
        self.columns.iter().filter_map(|c| c.check.as_ref()).collect()
    }

    pub fn foreign_keys(&self) -> Vec<&ForeignKey> {
        self.columns.iter().filter_map(|c| c.foreign_key.as_ref()).collect()
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn drop_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }
}

fn encode_column_type(ty: &ColumnType) -> u8 {
    match ty {
        ColumnType::TinyInt => 0,
        ColumnType::Int => 1,
        ColumnType::BigInt => 2,
        ColumnType::Float => 3,
        ColumnType::Boolean => 4,
        ColumnType::Varchar => 5,
        ColumnType::Char => 6,
        ColumnType::Decimal => 7,
        ColumnType::Date => 8,
        ColumnType::Time => 9,
        ColumnType::DateTime => 10,
    }
}

fn decode_column_type(tag: u8) -> ColumnType {
    match tag {
        0 => ColumnType::TinyInt,
        1 => ColumnType::Int,
        2 => ColumnType::BigInt,
        3 => ColumnType::Float,
        4 => ColumnType::Boolean,
        5 => ColumnType::Varchar,
        6 => ColumnType::Char,
        7 => ColumnType::Decimal,
        8 => ColumnType::Date,
        9 => ColumnType::Time,
        10 => ColumnType::DateTime,
        other => panic!("corrupt column type tag: {}", other),
    }
}

impl Encodeable for Option<u32> {
    fn encode(&self) -> Vec<u8> {
        match self {
            Some(v) => {
                let mut buf = vec![1u8];
                buf.extend(v.encode());
                buf
            }
            None => vec![0u8],
        }
    }
}

impl Decodeable for Option<u32> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        if bool::decode_from(reader) {
            Some(u32::decode_from(reader))
        } else {
            None
        }
    }
}

impl Encodeable for Option<String> {
    fn encode(&self) -> Vec<u8> {
        match self {
            Some(v) => {
                let mut buf = vec![1u8];
                buf.extend(v.encode());
                buf
            }
            None => vec![0u8],
        }
    }
}

impl Decodeable for Option<String> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        if bool::decode_from(reader) {
            Some(String::decode_from(reader))
        } else {
            None
        }
    }
}

impl Encodeable for ForeignKey {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(self.column.encode());
        buf.extend(self.ref_table.encode());
        buf.extend(self.ref_column.encode());
        buf
    }
}

impl Decodeable for ForeignKey {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        Self {
            column: String::decode_from(reader),
            ref_table: String::decode_from(reader),
            ref_column: String::decode_from(reader),
        }
    }
}

impl Encodeable for Option<ForeignKey> {
    fn encode(&self) -> Vec<u8> {
        match self {
            Some(fk) => {
                let mut buf = vec![1u8];
                buf.extend(fk.encode());
                buf
            }
            None => vec![0u8],
        }
    }
}

impl Decodeable for Option<ForeignKey> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        if bool::decode_from(reader) {
            Some(ForeignKey::decode_from(reader))
        } else {
            None
        }
    }
}

impl Encodeable for Option<CheckExpr> {
    fn encode(&self) -> Vec<u8> {
        match self {
            Some(c) => {
                let mut buf = vec![1u8];
                buf.extend(c.predicate.encode());
                buf
            }
            None => vec![0u8],
        }
    }
}

impl Decodeable for Option<CheckExpr> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        if bool::decode_from(reader) {
            Some(CheckExpr {
                predicate: Predicate::decode_from(reader),
            })
        } else {
            None
        }
    }
}

impl Encodeable for Column {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(self.name.encode());
        buf.push(encode_column_type(&self.ty));
        buf.extend(self.max_length.encode());
        buf.extend(self.precision.encode());
        buf.extend(self.scale.encode());
        buf.extend(self.nullable.encode());
        buf.extend(self.primary_key.encode());
        buf.extend(self.unique.encode());
        buf.extend(self.default.encode());
        buf.extend(self.check.encode());
        buf.extend(self.foreign_key.encode());
        buf
    }
}

impl Decodeable for Column {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let name = String::decode_from(reader);
        let ty = decode_column_type(read_exact(reader, 1)[0]);
        Self {
            name,
            ty,
            max_length: Option::<u32>::decode_from(reader),
            precision: Option::<u32>::decode_from(reader),
            scale: Option::<u32>::decode_from(reader),
            nullable: bool::decode_from(reader),
            primary_key: bool::decode_from(reader),
            unique: bool::decode_from(reader),
            default: Option::<String>::decode_from(reader),
            check: Option::<CheckExpr>::decode_from(reader),
            foreign_key: Option::<ForeignKey>::decode_from(reader),
        }
    }
}

impl Encodeable for TableSchema {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend((self.columns.len() as u32).encode());
        for column in &self.columns {
            buf.extend(column.encode());
        }
        buf
    }
}

impl Decodeable for TableSchema {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let count = u32::decode_from(reader);
        let mut columns = Vec::with_capacity(count as usize);
        for _ in 0..count {
            columns.push(Column::decode_from(reader));
        }
        Self { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ColumnType::Int).primary_key(),
            Column::new("email", ColumnType::Varchar)
                .unique()
                .with_max_length(50),
            Column {
                foreign_key: Some(ForeignKey {
                    column: "dept_id".to_string(),
                    ref_table: "departments".to_string(),
                    ref_column: "id".to_string(),
                }),
                ..Column::new("dept_id", ColumnType::Int)
            },
        ])
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let schema = sample_schema();
        let bytes = schema.encode();
        let mut cur = Cursor::new(bytes);
        let decoded = TableSchema::decode_from(&mut cur);
        assert_eq!(schema, decoded);
    }

    #[test]
    fn primary_key_columns_lookup() {
        let schema = sample_schema();
        let pks = schema.primary_key_columns();
        assert_eq!(pks.len(), 1);
        assert_eq!(pks[0].name, "id");
    }

    #[test]
    fn add_and_drop_column() {
        let mut schema = sample_schema();
        schema.add_column(Column::new("nickname", ColumnType::Varchar));
        assert!(schema.column("nickname").is_some());
        schema.drop_column("nickname");
        assert!(schema.column("nickname").is_none());
    }
}
