//! The seam between an external SQL parser and this core. A parser
//! produces these plain types; this crate never lexes or parses SQL text
//! itself — `Statement::CreateView`/`CreateTrigger` even carry their body
//! as opaque source text for exactly that reason.

use std::io::Read;

use crate::catalog::{TriggerEvent, TriggerTiming};
use crate::io::{read_exact, Decodeable, Encodeable};
use crate::record::Record;
use crate::schema::TableSchema;
use crate::transaction::IsolationLevel;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub max_length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub check: Option<Predicate>,
    pub foreign_key: Option<(String, String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A small boolean-expression tree over column references, literals, and
/// comparison/logical operators — just enough to drive a nested-loop scan
/// filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

pub type Predicate = Expr;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    TruncateTable {
        table: String,
    },
    AlterTableAddColumn {
        table: String,
        column: ColumnDef,
    },
    AlterTableDropColumn {
        table: String,
        column: String,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
        unique: bool,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    CreateView {
        name: String,
        query_text: String,
        if_not_exists: bool,
    },
    DropView {
        name: String,
        if_exists: bool,
    },
    CreateUser {
        name: String,
        if_not_exists: bool,
    },
    DropUser {
        name: String,
        if_exists: bool,
    },
    CreateTrigger {
        name: String,
        table: String,
        event: TriggerEvent,
        timing: TriggerTiming,
        body: String,
        if_not_exists: bool,
    },
    DropTrigger {
        name: String,
        if_exists: bool,
    },
    Grant {
        user: String,
        privilege: String,
    },
    Revoke {
        user: String,
        privilege: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        predicate: Option<Predicate>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        predicate: Option<Predicate>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
    Begin,
    Commit,
    Rollback,
    SetAutocommit(bool),
    SetIsolationLevel(IsolationLevel),
    ShowAutocommit,
    ShowIsolationLevel,
}

pub fn eval_value(expr: &Expr, schema: &TableSchema, record: &Record) -> Value {
    match expr {
        Expr::Column(name) => record.get(schema, name).cloned().unwrap_or(Value::Null),
        Expr::Literal(v) => v.clone(),
        _ => panic!("expected a value expression, found a boolean one"),
    }
}

/// Evaluates `expr` as a boolean-expression tree against `record`. NULL
/// comparisons follow SQL's three-valued logic collapsed to `false` (a
/// comparison against NULL is never true).
pub fn eval(expr: &Expr, schema: &TableSchema, record: &Record) -> bool {
    match expr {
        Expr::Compare { left, op, right } => {
            let lv = eval_value(left, schema, record);
            let rv = eval_value(right, schema, record);
            if lv.is_null() || rv.is_null() {
                return false;
            }
            match op {
                CompareOp::Eq => lv == rv,
                CompareOp::Ne => lv != rv,
                CompareOp::Lt => lv.partial_cmp(&rv).map_or(false, |o| o.is_lt()),
                CompareOp::Le => lv.partial_cmp(&rv).map_or(false, |o| o.is_le()),
                CompareOp::Gt => lv.partial_cmp(&rv).map_or(false, |o| o.is_gt()),
                CompareOp::Ge => lv.partial_cmp(&rv).map_or(false, |o| o.is_ge()),
            }
        }
        Expr::And(l, r) => eval(l, schema, record) && eval(r, schema, record),
        Expr::Or(l, r) => eval(l, schema, record) || eval(r, schema, record),
        Expr::Not(inner) => !eval(inner, schema, record),
        Expr::Column(_) | Expr::Literal(_) => panic!("expected a boolean expression, found a value one"),
    }
}

impl Encodeable for CompareOp {
    fn encode(&self) -> Vec<u8> {
        vec![match self {
            CompareOp::Eq => 0,
            CompareOp::Ne => 1,
            CompareOp::Lt => 2,
            CompareOp::Le => 3,
            CompareOp::Gt => 4,
            CompareOp::Ge => 5,
        }]
    }
}

impl Decodeable for CompareOp {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        match read_exact(reader, 1)[0] {
            0 => CompareOp::Eq,
            1 => CompareOp::Ne,
            2 => CompareOp::Lt,
            3 => CompareOp::Le,
            4 => CompareOp::Gt,
            5 => CompareOp::Ge,
            other => panic!("corrupt compare op tag: {}", other),
        }
    }
}

/// Tagged recursive encoding so a `CHECK` predicate can ride along inside
/// a persisted `TableSchema`, the same way every other column attribute
/// does.
impl Encodeable for Expr {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Expr::Column(name) => {
                buf.push(0);
                buf.extend(name.encode());
            }
            Expr::Literal(v) => {
                buf.push(1);
                buf.extend(v.encode());
            }
            Expr::Compare { left, op, right } => {
                buf.push(2);
                buf.extend(left.encode());
                buf.extend(op.encode());
                buf.extend(right.encode());
            }
            Expr::And(l, r) => {
                buf.push(3);
                buf.extend(l.encode());
                buf.extend(r.encode());
            }
            Expr::Or(l, r) => {
                buf.push(4);
                buf.extend(l.encode());
                buf.extend(r.encode());
            }
            Expr::Not(inner) => {
                buf.push(5);
                buf.extend(inner.encode());
            }
        }
        buf
    }
}

impl Decodeable for Expr {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        match read_exact(reader, 1)[0] {
            0 => Expr::Column(String::decode_from(reader)),
            1 => Expr::Literal(Value::decode_from(reader)),
            2 => {
                let left = Box::new(Expr::decode_from(reader));
                let op = CompareOp::decode_from(reader);
                let right = Box::new(Expr::decode_from(reader));
                Expr::Compare { left, op, right }
            }
            3 => Expr::And(Box::new(Expr::decode_from(reader)), Box::new(Expr::decode_from(reader))),
            4 => Expr::Or(Box::new(Expr::decode_from(reader)), Box::new(Expr::decode_from(reader))),
            5 => Expr::Not(Box::new(Expr::decode_from(reader))),
            other => panic!("corrupt expr tag: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::types::ColumnType;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ColumnType::Int).primary_key(),
            Column::new("name", ColumnType::Varchar),
        ])
    }

    fn rec(id: i32, name: &str) -> Record {
        Record::new(vec![Value::Int(id), Value::Varchar(name.to_string())])
    }

    #[test]
    fn evaluates_simple_comparison() {
        let expr = Expr::Compare {
            left: Box::new(Expr::Column("id".to_string())),
            op: CompareOp::Eq,
            right: Box::new(Expr::Literal(Value::Int(1))),
        };
        assert!(eval(&expr, &schema(), &rec(1, "A")));
        assert!(!eval(&expr, &schema(), &rec(2, "A")));
    }

    #[test]
    fn evaluates_and_or_not() {
        let is_one = Expr::Compare {
            left: Box::new(Expr::Column("id".to_string())),
            op: CompareOp::Eq,
            right: Box::new(Expr::Literal(Value::Int(1))),
        };
        let is_named_a = Expr::Compare {
            left: Box::new(Expr::Column("name".to_string())),
            op: CompareOp::Eq,
            right: Box::new(Expr::Literal(Value::Varchar("A".to_string()))),
        };
        let both = Expr::And(Box::new(is_one.clone()), Box::new(is_named_a.clone()));
        assert!(eval(&both, &schema(), &rec(1, "A")));
        assert!(!eval(&both, &schema(), &rec(1, "B")));

        let either = Expr::Or(Box::new(is_one), Box::new(is_named_a));
        assert!(eval(&either, &schema(), &rec(2, "A")));

        let not_one = Expr::Not(Box::new(eval_expr_is_one()));
        assert!(!eval(&not_one, &schema(), &rec(1, "A")));
    }

    fn eval_expr_is_one() -> Expr {
        Expr::Compare {
            left: Box::new(Expr::Column("id".to_string())),
            op: CompareOp::Eq,
            right: Box::new(Expr::Literal(Value::Int(1))),
        }
    }

    #[test]
    fn comparison_against_null_is_false() {
        let expr = Expr::Compare {
            left: Box::new(Expr::Literal(Value::Null)),
            op: CompareOp::Eq,
            right: Box::new(Expr::Literal(Value::Int(1))),
        };
        assert!(!eval(&expr, &schema(), &rec(1, "A")));
    }

    #[test]
    fn expr_round_trips_through_encode_decode() {
        use std::io::Cursor;

        let expr = Expr::And(
            Box::new(Expr::Compare {
                left: Box::new(Expr::Column("id".to_string())),
                op: CompareOp::Gt,
                right: Box::new(Expr::Literal(Value::Int(0))),
            }),
            Box::new(Expr::Not(Box::new(Expr::Compare {
                left: Box::new(Expr::Column("name".to_string())),
                op: CompareOp::Eq,
                right: Box::new(Expr::Literal(Value::Null)),
            }))),
        );

        let bytes = expr.encode();
        let mut cur = Cursor::new(bytes);
        let decoded = Expr::decode_from(&mut cur);
        assert_eq!(expr, decoded);
    }
}
