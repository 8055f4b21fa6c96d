//! S3 and S4 from SPEC_FULL.md §8: dirty reads are visible under
//! READ UNCOMMITTED and hidden under READ COMMITTED, and both converge once
//! the writer settles (rollback or commit).

use minisql_core::{ColumnDef, Engine, EngineConfig, ExecResult, IsolationLevel, Statement, Value};
use tempfile::TempDir;

fn column(name: &str, type_name: &str, primary_key: bool) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
        max_length: None,
        precision: None,
        scale: None,
        nullable: !primary_key,
        primary_key,
        unique: false,
        default: None,
        check: None,
        foreign_key: None,
    }
}

fn balance_of(engine: &Engine, session: &mut minisql_core::Session) -> i32 {
    let result = engine
        .execute(
            session,
            Statement::Select {
                table: "accounts".to_string(),
                columns: None,
                predicate: Some(minisql_core::Expr::Compare {
                    left: Box::new(minisql_core::Expr::Column("id".to_string())),
                    op: minisql_core::CompareOp::Eq,
                    right: Box::new(minisql_core::Expr::Literal(Value::Int(1))),
                }),
            },
        )
        .unwrap();
    match result {
        ExecResult::Select { data, .. } => match data[0].values[1] {
            Value::Int(balance) => balance,
            _ => panic!("expected int balance"),
        },
        other => panic!("expected Select, got {:?}", other),
    }
}

fn set_balance(engine: &Engine, session: &mut minisql_core::Session, balance: i32) {
    let result = engine
        .execute(
            session,
            Statement::Update {
                table: "accounts".to_string(),
                assignments: vec![minisql_core::Assignment {
                    column: "balance".to_string(),
                    value: minisql_core::Expr::Literal(Value::Int(balance)),
                }],
                predicate: Some(minisql_core::Expr::Compare {
                    left: Box::new(minisql_core::Expr::Column("id".to_string())),
                    op: minisql_core::CompareOp::Eq,
                    right: Box::new(minisql_core::Expr::Literal(Value::Int(1))),
                }),
            },
        )
        .unwrap();
    assert!(matches!(result, ExecResult::Update { rows_updated: 1, .. }));
}

fn setup(engine: &Engine, session: &mut minisql_core::Session) {
    engine
        .execute(
            session,
            Statement::CreateTable {
                table: "accounts".to_string(),
                columns: vec![column("id", "INT", true), column("balance", "INT", false)],
                if_not_exists: false,
            },
        )
        .unwrap();
    engine
        .execute(
            session,
            Statement::Insert {
                table: "accounts".to_string(),
                columns: None,
                values: vec![Value::Int(1), Value::Int(1000)],
            },
        )
        .unwrap();
}

#[test]
fn read_uncommitted_sees_uncommitted_write_then_reverts_on_rollback() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(EngineConfig::new(dir.path())).unwrap();

    let mut session_a = engine.new_session();
    session_a.txn_manager.set_isolation_level(IsolationLevel::ReadUncommitted).unwrap();
    setup(&engine, &mut session_a);

    let mut session_b = engine.new_session();
    session_b.txn_manager.set_isolation_level(IsolationLevel::ReadUncommitted).unwrap();

    engine.execute(&mut session_a, Statement::Begin).unwrap();
    set_balance(&engine, &mut session_a, 1500);

    assert_eq!(balance_of(&engine, &mut session_b), 1500);

    engine.execute(&mut session_a, Statement::Rollback).unwrap();

    assert_eq!(balance_of(&engine, &mut session_b), 1000);
}

#[test]
fn read_committed_hides_uncommitted_write_until_commit() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(EngineConfig::new(dir.path())).unwrap();

    let mut session_a = engine.new_session();
    session_a.txn_manager.set_isolation_level(IsolationLevel::ReadCommitted).unwrap();
    setup(&engine, &mut session_a);

    let mut session_b = engine.new_session();
    session_b.txn_manager.set_isolation_level(IsolationLevel::ReadCommitted).unwrap();

    engine.execute(&mut session_a, Statement::Begin).unwrap();
    set_balance(&engine, &mut session_a, 1500);

    assert_eq!(balance_of(&engine, &mut session_b), 1000);

    engine.execute(&mut session_a, Statement::Commit).unwrap();

    assert_eq!(balance_of(&engine, &mut session_b), 1500);
}
