//! Engine-wide configuration, collected in one place instead of threading
//! individual parameters through every constructor.

use std::path::PathBuf;

use crate::transaction::IsolationLevel;

pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 256;
pub const DEFAULT_BTREE_ORDER: usize = 50;
pub const DEFAULT_DB_FILE_NAME: &str = "minisql.db";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the database file and any auxiliary files.
    pub data_dir: PathBuf,
    pub db_file_name: String,
    pub buffer_pool_capacity: usize,
    pub btree_order: usize,
    pub default_isolation: IsolationLevel,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
            btree_order: DEFAULT_BTREE_ORDER,
            default_isolation: IsolationLevel::default(),
        }
    }

    pub fn db_file_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    pub fn with_buffer_pool_capacity(mut self, capacity: usize) -> Self {
        self.buffer_pool_capacity = capacity;
        self
    }

    pub fn with_btree_order(mut self, order: usize) -> Self {
        self.btree_order = order;
        self
    }

    pub fn with_default_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_file_path_joins_data_dir_and_file_name() {
        let cfg = EngineConfig::new("/tmp/mydb");
        assert_eq!(cfg.db_file_path(), PathBuf::from("/tmp/mydb/minisql.db"));
    }

    #[test]
    fn builder_methods_override_defaults() {
        let cfg = EngineConfig::new("/tmp/mydb")
            .with_buffer_pool_capacity(8)
            .with_btree_order(4)
            .with_default_isolation(IsolationLevel::Serializable);
        assert_eq!(cfg.buffer_pool_capacity, 8);
        assert_eq!(cfg.btree_order, 4);
        assert_eq!(cfg.default_isolation, IsolationLevel::Serializable);
    }
}
