//! Tagged binary encoding for everything this crate persists: B+ tree keys
//! and values, catalog blobs, and typed column values. Deliberately not a
//! language-native pickle format: every encoded value is length-prefixed or
//! fixed-width so the byte layout is stable and implementation-independent.

use std::convert::TryInto;
use std::io::Read;

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable: Sized {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|e| panic!("io error reading {} bytes: {}", bytes_count, e));
    buffer
}

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

/// `len:u32 || utf8 bytes`
impl Encodeable for str {
    fn encode(&self) -> Vec<u8> {
        let bytes = self.as_bytes();
        let mut buf = Vec::with_capacity(4 + bytes.len());
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        self.as_str().encode()
    }
}

impl Decodeable for String {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let len = u32::decode_from(reader) as usize;
        let bytes = read_exact(reader, len);
        String::from_utf8(bytes).expect("corrupt utf-8 in encoded string")
    }
}

/// `len:u32 || bytes`
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.len());
        buf.extend_from_slice(&(self.len() as u32).to_le_bytes());
        buf.extend_from_slice(self);
        buf
    }
}

impl Decodeable for Vec<u8> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let len = u32::decode_from(reader) as usize;
        read_exact(reader, len)
    }
}

macro_rules! impl_le_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, std::mem::size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_le_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_primitives() {
        let mut buf = Vec::new();
        buf.extend(42i32.encode());
        buf.extend("hello".to_string().encode());
        buf.extend(true.encode());

        let mut cur = Cursor::new(buf);
        assert_eq!(i32::decode_from(&mut cur), 42);
        assert_eq!(String::decode_from(&mut cur), "hello".to_string());
        assert_eq!(bool::decode_from(&mut cur), true);
    }
}
