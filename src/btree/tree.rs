//! Page-backed B+ tree mapping an indexed column's `Value` to the `Rid` of
//! the record it belongs to.

use std::cmp::Ordering;
use std::io::Cursor;

use crate::btree::node::{Node, NO_PARENT};
use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::io::{Decodeable, Encodeable};
use crate::page::{PageId, PAGE_SIZE};
use crate::types::{Rid, Value};

fn key_cmp(a: &Value, b: &Value) -> Ordering {
    a.partial_cmp(b).expect("incomparable index keys (NaN or mixed types)")
}

pub struct BPlusTree<'a> {
    buffer_pool: &'a BufferPool,
    order: usize,
    root_page_id: PageId,
}

/// Result of a leaf/internal split that the parent (or the tree root,
/// one level up) must absorb.
struct SplitUp {
    separator: Value,
    new_sibling: PageId,
}

/// Writes an empty leaf node into `page_id`, so it's ready to serve as a
/// fresh index's root. A newly allocated page is all zero bytes, which
/// `Node::decode_from` would otherwise misread as an internal node with a
/// dangling child pointer at page 0.
pub fn init_leaf_page(buffer_pool: &BufferPool, page_id: PageId) -> DbResult<()> {
    let node: Node<Rid> = Node::Leaf {
        parent_id: NO_PARENT,
        next_leaf_id: 0,
        entries: Vec::new(),
    };
    let mut guard = buffer_pool.get_page(page_id)?;
    guard.write_bytes(0, &node.encode());
    Ok(())
}

impl<'a> BPlusTree<'a> {
    pub fn new(buffer_pool: &'a BufferPool, order: usize, root_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            order,
            root_page_id,
        }
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    fn load(&self, page_id: PageId) -> DbResult<Node<Rid>> {
        let guard = self.buffer_pool.get_page(page_id)?;
        let bytes = guard.read_bytes(0, PAGE_SIZE).to_vec();
        Ok(Node::decode_from(&mut Cursor::new(bytes)))
    }

    fn store(&self, page_id: PageId, node: &Node<Rid>) -> DbResult<()> {
        let mut guard = self.buffer_pool.get_page(page_id)?;
        let bytes = node.encode();
        guard.write_bytes(0, &bytes);
        Ok(())
    }

    fn new_page(&self) -> DbResult<PageId> {
        Ok(self.buffer_pool.new_page()?.page_id())
    }

    fn set_parent(&self, page_id: PageId, parent_id: PageId) -> DbResult<()> {
        let mut node = self.load(page_id)?;
        node.set_parent_id(parent_id);
        self.store(page_id, &node)
    }

    pub fn insert(&mut self, key: Value, value: Rid, unique: bool) -> DbResult<()> {
        if let Some(split) = self.insert_into(self.root_page_id, key, value, unique)? {
            let new_root_id = self.new_page()?;
            let new_root = Node::Internal {
                parent_id: NO_PARENT,
                keys: vec![split.separator],
                children: vec![self.root_page_id, split.new_sibling],
            };
            self.store(new_root_id, &new_root)?;
            self.set_parent(self.root_page_id, new_root_id)?;
            self.set_parent(split.new_sibling, new_root_id)?;
            self.root_page_id = new_root_id;
        }
        Ok(())
    }

    fn insert_into(
        &mut self,
        page_id: PageId,
        key: Value,
        value: Rid,
        unique: bool,
    ) -> DbResult<Option<SplitUp>> {
        let node = self.load(page_id)?;
        match node {
            Node::Leaf {
                parent_id,
                next_leaf_id,
                mut entries,
            } => {
                let pos = entries.iter().position(|(k, _)| key_cmp(k, &key) != Ordering::Less);
                match pos {
                    Some(i) if key_cmp(&entries[i].0, &key) == Ordering::Equal => {
                        if unique {
                            return Err(DbError::UniqueViolation {
                                index: format!("page {}", page_id),
                                key: key.to_string(),
                            });
                        }
                        entries[i].1 = value;
                        self.store(
                            page_id,
                            &Node::Leaf {
                                parent_id,
                                next_leaf_id,
                                entries,
                            },
                        )?;
                        Ok(None)
                    }
                    Some(i) => {
                        entries.insert(i, (key, value));
                        self.finish_leaf_insert(page_id, parent_id, next_leaf_id, entries)
                    }
                    None => {
                        entries.push((key, value));
                        self.finish_leaf_insert(page_id, parent_id, next_leaf_id, entries)
                    }
                }
            }
            Node::Internal {
                parent_id,
                mut keys,
                mut children,
            } => {
                let child_idx = keys.iter().position(|k| key_cmp(&key, k) == Ordering::Less).unwrap_or(keys.len());
                let child_id = children[child_idx];
                match self.insert_into(child_id, key, value, unique)? {
                    None => Ok(None),
                    Some(split) => {
                        keys.insert(child_idx, split.separator);
                        children.insert(child_idx + 1, split.new_sibling);
                        self.set_parent(split.new_sibling, page_id)?;

                        if keys.len() > self.order - 1 {
                            let mid = keys.len() / 2;
                            let promoted = keys[mid].clone();
                            let right_keys = keys.split_off(mid + 1);
                            keys.truncate(mid);
                            let right_children = children.split_off(mid + 1);

                            let new_page_id = self.new_page()?;
                            for &child in &right_children {
                                self.set_parent(child, new_page_id)?;
                            }
                            self.store(
                                new_page_id,
                                &Node::Internal {
                                    parent_id,
                                    keys: right_keys,
                                    children: right_children,
                                },
                            )?;
                            self.store(page_id, &Node::Internal { parent_id, keys, children })?;
                            Ok(Some(SplitUp {
                                separator: promoted,
                                new_sibling: new_page_id,
                            }))
                        } else {
                            self.store(page_id, &Node::Internal { parent_id, keys, children })?;
                            Ok(None)
                        }
                    }
                }
            }
        }
    }

    fn finish_leaf_insert(
        &self,
        page_id: PageId,
        parent_id: PageId,
        next_leaf_id: PageId,
        mut entries: Vec<(Value, Rid)>,
    ) -> DbResult<Option<SplitUp>> {
        if entries.len() > self.order - 1 {
            let mid = entries.len() / 2;
            let right_entries = entries.split_off(mid);
            let new_leaf_id = self.new_page()?;
            let separator = right_entries[0].0.clone();

            self.store(
                new_leaf_id,
                &Node::Leaf {
                    parent_id,
                    next_leaf_id,
                    entries: right_entries,
                },
            )?;
            self.store(
                page_id,
                &Node::Leaf {
                    parent_id,
                    next_leaf_id: new_leaf_id,
                    entries,
                },
            )?;
            Ok(Some(SplitUp {
                separator,
                new_sibling: new_leaf_id,
            }))
        } else {
            self.store(
                page_id,
                &Node::Leaf {
                    parent_id,
                    next_leaf_id,
                    entries,
                },
            )?;
            Ok(None)
        }
    }

    fn find_leaf(&self, key: &Value) -> DbResult<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            match self.load(page_id)? {
                Node::Leaf { .. } => return Ok(page_id),
                Node::Internal { keys, children, .. } => {
                    let idx = keys
                        .iter()
                        .position(|k| key_cmp(key, k) == Ordering::Less)
                        .unwrap_or(keys.len());
                    page_id = children[idx];
                }
            }
        }
    }

    pub fn search(&self, key: &Value) -> DbResult<Option<Rid>> {
        let leaf_id = self.find_leaf(key)?;
        match self.load(leaf_id)? {
            Node::Leaf { entries, .. } => Ok(entries
                .into_iter()
                .find(|(k, _)| key_cmp(k, key) == Ordering::Equal)
                .map(|(_, v)| v)),
            Node::Internal { .. } => unreachable!("find_leaf always returns a leaf"),
        }
    }

    pub fn range_search(&self, lo: &Value, hi: &Value) -> DbResult<Vec<(Value, Rid)>> {
        let mut result = Vec::new();
        let mut page_id = self.find_leaf(lo)?;
        loop {
            let node = self.load(page_id)?;
            match node {
                Node::Leaf { entries, next_leaf_id, .. } => {
                    for (key, value) in entries {
                        if key_cmp(&key, hi) == Ordering::Greater {
                            return Ok(result);
                        }
                        if key_cmp(&key, lo) != Ordering::Less {
                            result.push((key, value));
                        }
                    }
                    if next_leaf_id == 0 {
                        return Ok(result);
                    }
                    page_id = next_leaf_id;
                }
                Node::Internal { .. } => unreachable!("find_leaf always returns a leaf"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Pager;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn setup(order: usize) -> (BufferPool, PageId) {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Arc::new(Pager::open(tmp.path()).unwrap());
        let pool = BufferPool::new(pager, 64);
        let root = pool.new_page().unwrap().page_id();
        pool.get_page(root).unwrap(); // ensure allocated before tree use
        (pool, root)
    }

    fn init_tree(pool: &BufferPool, root: PageId, order: usize) -> BPlusTree<'_> {
        {
            let mut guard = pool.get_page(root).unwrap();
            let empty: Node<Rid> = Node::Leaf {
                parent_id: NO_PARENT,
                next_leaf_id: 0,
                entries: vec![],
            };
            guard.write_bytes(0, &empty.encode());
        }
        BPlusTree::new(pool, order, root)
    }

    #[test]
    fn insert_then_search_finds_value() {
        let (pool, root) = setup(4);
        let mut tree = init_tree(&pool, root, 4);
        tree.insert(Value::Int(1), Rid::new(10, 0), true).unwrap();
        tree.insert(Value::Int(2), Rid::new(10, 1), true).unwrap();

        assert_eq!(tree.search(&Value::Int(1)).unwrap(), Some(Rid::new(10, 0)));
        assert_eq!(tree.search(&Value::Int(3)).unwrap(), None);
    }

    #[test]
    fn unique_tree_rejects_duplicate_key() {
        let (pool, root) = setup(4);
        let mut tree = init_tree(&pool, root, 4);
        tree.insert(Value::Int(1), Rid::new(10, 0), true).unwrap();
        let err = tree.insert(Value::Int(1), Rid::new(10, 1), true).unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[test]
    fn non_unique_tree_overwrites_duplicate_key() {
        let (pool, root) = setup(4);
        let mut tree = init_tree(&pool, root, 4);
        tree.insert(Value::Int(1), Rid::new(10, 0), false).unwrap();
        tree.insert(Value::Int(1), Rid::new(20, 5), false).unwrap();
        assert_eq!(tree.search(&Value::Int(1)).unwrap(), Some(Rid::new(20, 5)));
    }

    #[test]
    fn splits_propagate_and_range_search_is_sorted() {
        let (pool, root) = setup(4);
        let mut tree = init_tree(&pool, root, 4);
        for i in 0..30 {
            tree.insert(Value::Int(i), Rid::new(100 + i as u32, 0), true).unwrap();
        }
        let range = tree.range_search(&Value::Int(5), &Value::Int(15)).unwrap();
        let keys: Vec<i32> = range
            .iter()
            .map(|(k, _)| match k {
                Value::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, (5..=15).collect::<Vec<_>>());
    }
}
