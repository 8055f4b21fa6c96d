mod node;
mod tree;

pub use node::{Node, NO_PARENT};
pub use tree::{init_leaf_page, BPlusTree};
