use thiserror::Error;

/// Every error the storage, indexing, transaction and executor layers can
/// raise. Lower layers (`Pager`, `BufferPool`, `RecordManager`, `BPlusTree`)
/// only ever construct `Io`, `AllPagesPinned`, `CorruptPage` and
/// `UniqueViolation`; every other variant is constructed by the executor.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page {page_id} is corrupt: {reason}")]
    CorruptPage { page_id: u32, reason: String },

    #[error("all pages in the buffer pool are pinned")]
    AllPagesPinned,

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),

    #[error("type mismatch for column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("column {0} may not be null")]
    NullInNotNull(String),

    #[error("unique constraint {index} violated by key {key}")]
    UniqueViolation { index: String, key: String },

    #[error("primary key constraint violated")]
    PrimaryKeyViolation,

    #[error("CHECK constraint violated: {0}")]
    CheckViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("transaction state error: {0}")]
    TransactionStateError(String),

    #[error("lock conflict on table {table}")]
    LockConflict { table: String },

    #[error("trigger recursion detected: {trigger}")]
    TriggerRecursion { trigger: String },

    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),
}

pub type DbResult<T> = Result<T, DbError>;
