//! On-page encoding of B+ tree nodes, per the node page layout in the data
//! model: a common header, then leaf- or internal-specific content.

use std::io::Read;

use crate::io::{Decodeable, Encodeable};
use crate::page::PageId;
use crate::types::Value;

/// `0` means "no parent" (this node is the root).
pub const NO_PARENT: PageId = 0;

#[derive(Debug, Clone)]
pub enum Node<V> {
    Leaf {
        parent_id: PageId,
        next_leaf_id: PageId,
        entries: Vec<(Value, V)>,
    },
    Internal {
        parent_id: PageId,
        keys: Vec<Value>,
        children: Vec<PageId>,
    },
}

impl<V> Node<V> {
    pub fn parent_id(&self) -> PageId {
        match self {
            Node::Leaf { parent_id, .. } => *parent_id,
            Node::Internal { parent_id, .. } => *parent_id,
        }
    }

    pub fn set_parent_id(&mut self, new_parent: PageId) {
        match self {
            Node::Leaf { parent_id, .. } => *parent_id = new_parent,
            Node::Internal { parent_id, .. } => *parent_id = new_parent,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

impl<V: Encodeable> Encodeable for Node<V> {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Node::Leaf {
                parent_id,
                next_leaf_id,
                entries,
            } => {
                buf.extend(1i32.encode());
                buf.extend((*parent_id as i32).encode());
                buf.extend((entries.len() as i32).encode());
                buf.extend((*next_leaf_id as i32).encode());
                for (key, value) in entries {
                    let key_bytes = key.encode();
                    buf.extend((key_bytes.len() as i32).encode());
                    buf.extend(key_bytes);
                    let value_bytes = value.encode();
                    buf.extend((value_bytes.len() as i32).encode());
                    buf.extend(value_bytes);
                }
            }
            Node::Internal {
                parent_id,
                keys,
                children,
            } => {
                buf.extend(0i32.encode());
                buf.extend((*parent_id as i32).encode());
                buf.extend((keys.len() as i32).encode());
                for key in keys {
                    let key_bytes = key.encode();
                    buf.extend((key_bytes.len() as i32).encode());
                    buf.extend(key_bytes);
                }
                for child in children {
                    buf.extend((*child as i32).encode());
                }
            }
        }
        buf
    }
}

impl<V: Decodeable> Decodeable for Node<V> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let is_leaf = i32::decode_from(reader) == 1;
        let parent_id = i32::decode_from(reader) as PageId;
        let key_count = i32::decode_from(reader) as usize;

        if is_leaf {
            let next_leaf_id = i32::decode_from(reader) as PageId;
            let mut entries = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                let key_len = i32::decode_from(reader) as usize;
                let key_bytes = crate::io::read_exact(reader, key_len);
                let key = Value::decode_from(&mut std::io::Cursor::new(key_bytes));
                let value_len = i32::decode_from(reader) as usize;
                let value_bytes = crate::io::read_exact(reader, value_len);
                let value = V::decode_from(&mut std::io::Cursor::new(value_bytes));
                entries.push((key, value));
            }
            Node::Leaf {
                parent_id,
                next_leaf_id,
                entries,
            }
        } else {
            let mut keys = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                let key_len = i32::decode_from(reader) as usize;
                let key_bytes = crate::io::read_exact(reader, key_len);
                keys.push(Value::decode_from(&mut std::io::Cursor::new(key_bytes)));
            }
            let mut children = Vec::with_capacity(key_count + 1);
            for _ in 0..=key_count {
                children.push(i32::decode_from(reader) as PageId);
            }
            Node::Internal {
                parent_id,
                keys,
                children,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::io::Cursor;

    #[test]
    fn leaf_round_trips() {
        let node: Node<u32> = Node::Leaf {
            parent_id: 0,
            next_leaf_id: 7,
            entries: vec![(Value::Int(1), 100), (Value::Int(2), 200)],
        };
        let bytes = node.encode();
        let decoded = Node::<u32>::decode_from(&mut Cursor::new(bytes));
        match decoded {
            Node::Leaf {
                parent_id,
                next_leaf_id,
                entries,
            } => {
                assert_eq!(parent_id, 0);
                assert_eq!(next_leaf_id, 7);
                assert_eq!(entries, vec![(Value::Int(1), 100), (Value::Int(2), 200)]);
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn internal_round_trips() {
        let node: Node<u32> = Node::Internal {
            parent_id: 3,
            keys: vec![Value::Int(10), Value::Int(20)],
            children: vec![4, 5, 6],
        };
        let bytes = node.encode();
        let decoded = Node::<u32>::decode_from(&mut Cursor::new(bytes));
        match decoded {
            Node::Internal {
                parent_id,
                keys,
                children,
            } => {
                assert_eq!(parent_id, 3);
                assert_eq!(keys, vec![Value::Int(10), Value::Int(20)]);
                assert_eq!(children, vec![4, 5, 6]);
            }
            _ => panic!("expected internal"),
        }
    }
}
