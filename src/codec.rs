use std::borrow::Cow;
use std::hash::BuildHasher;
use std::io::{Result, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use foldhash::fast::FixedState;

use super::cursor;

/// Capability bundle the builder needs to serialize one kind of entry.
///
/// The codec owns the framing of individual entries: [`emit_lengths`] may
/// write a length prefix in whatever encoding it chooses, and the lengths it
/// returns must match exactly what [`emit_key`] and [`emit_value`] write
/// afterwards. The table frames only buckets and the directory around that.
///
/// The hash must be deterministic and bit-identical to the one produced by
/// the matching [`ChainTableReadCodec`], since it is stored per entry and
/// compared verbatim during lookups.
///
/// [`emit_lengths`]: Self::emit_lengths
/// [`emit_key`]: Self::emit_key
/// [`emit_value`]: Self::emit_value
pub trait ChainTableWriteCodec {
    /// Key type accepted by the builder.
    type Key;
    /// Value type accepted by the builder.
    type Value;

    /// Computes the 32-bit hash of `key`.
    fn hash(&self, key: &Self::Key) -> u32;

    /// Writes the entry's length prefix, if any, and returns
    /// `(key_len, value_len)` in bytes.
    fn emit_lengths<S: Write>(
        &self,
        sink: &mut S,
        key: &Self::Key,
        value: &Self::Value,
    ) -> Result<(u32, u32)>;

    /// Writes exactly `key_len` bytes encoding `key`.
    fn emit_key<S: Write>(&self, sink: &mut S, key: &Self::Key, key_len: u32) -> Result<()>;

    /// Writes exactly `value_len` bytes encoding `value`. The key is passed
    /// in case the value's encoding depends on it.
    fn emit_value<S: Write>(
        &self,
        sink: &mut S,
        key: &Self::Key,
        value: &Self::Value,
        value_len: u32,
    ) -> Result<()>;
}

/// Capability bundle readers need to decode entries from a serialized table.
///
/// The trait is parameterized by the lifetime `'t` of the byte region backing
/// the table so decoded keys and values may borrow from it instead of copying.
/// Lookups accept an [`ExternalKey`] and bridge it to the stored
/// [`InternalKey`] representation via [`to_internal`]; the two are typically
/// the same type.
///
/// All operations decode from bytes previously produced by the matching
/// [`ChainTableWriteCodec`] and are infallible over such input.
///
/// [`ExternalKey`]: Self::ExternalKey
/// [`InternalKey`]: Self::InternalKey
/// [`to_internal`]: Self::to_internal
pub trait ChainTableReadCodec<'t> {
    /// Key type accepted by lookups.
    type ExternalKey;
    /// Key representation stored in (or decoded from) the table.
    type InternalKey;
    /// Decoded value type.
    type Value;

    /// Computes the 32-bit hash of `key`; must match the write codec's hash.
    fn hash(&self, key: &Self::InternalKey) -> u32;

    /// Compares two keys for equality.
    fn equal(&self, a: &Self::InternalKey, b: &Self::InternalKey) -> bool;

    /// Bridges a lookup key to the stored representation.
    fn to_internal(&self, key: &Self::ExternalKey) -> Self::InternalKey;

    /// Bridges a stored key back to the external representation.
    fn to_external(&self, key: &Self::InternalKey) -> Self::ExternalKey;

    /// Decodes the entry's length prefix, advancing `cursor` past it, and
    /// returns `(key_len, value_len)` in bytes.
    fn read_lengths(&self, cursor: &mut &'t [u8]) -> (u32, u32);

    /// Decodes a key from its `key_len` encoded bytes.
    fn read_key(&self, bytes: &'t [u8], key_len: u32) -> Self::InternalKey;

    /// Decodes a value from its `value_len` encoded bytes.
    fn read_value(&self, key: &Self::InternalKey, bytes: &'t [u8], value_len: u32) -> Self::Value;
}

/// Codec mapping `u32` keys to `u32` values.
///
/// Keys and values are stored as four little-endian bytes each with no extra
/// length prefix, and keys hash to themselves. Handy for index tables whose
/// keys are already well-distributed identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct U32PairCodec;

impl ChainTableWriteCodec for U32PairCodec {
    type Key = u32;
    type Value = u32;

    fn hash(&self, key: &u32) -> u32 {
        *key
    }

    fn emit_lengths<S: Write>(&self, _sink: &mut S, _key: &u32, _value: &u32) -> Result<(u32, u32)> {
        Ok((4, 4))
    }

    fn emit_key<S: Write>(&self, sink: &mut S, key: &u32, _key_len: u32) -> Result<()> {
        sink.write_u32::<LittleEndian>(*key)
    }

    fn emit_value<S: Write>(&self, sink: &mut S, _key: &u32, value: &u32, _value_len: u32) -> Result<()> {
        sink.write_u32::<LittleEndian>(*value)
    }
}

impl<'t> ChainTableReadCodec<'t> for U32PairCodec {
    type ExternalKey = u32;
    type InternalKey = u32;
    type Value = u32;

    fn hash(&self, key: &u32) -> u32 {
        *key
    }

    fn equal(&self, a: &u32, b: &u32) -> bool {
        a == b
    }

    fn to_internal(&self, key: &u32) -> u32 {
        *key
    }

    fn to_external(&self, key: &u32) -> u32 {
        *key
    }

    fn read_lengths(&self, _cursor: &mut &'t [u8]) -> (u32, u32) {
        (4, 4)
    }

    fn read_key(&self, bytes: &'t [u8], _key_len: u32) -> u32 {
        LittleEndian::read_u32(bytes)
    }

    fn read_value(&self, _key: &u32, bytes: &'t [u8], _value_len: u32) -> u32 {
        LittleEndian::read_u32(bytes)
    }
}

/// Codec for arbitrary byte-string keys and values.
///
/// Every entry is prefixed with a pair of little-endian `u16` lengths, so
/// keys and values are limited to 65535 bytes apiece. Keys are hashed with a
/// seeded [`foldhash`] state folded down to 32 bits; writer and reader must
/// use the same seed.
///
/// Reads are zero-copy: stored keys come back as `Cow::Borrowed` slices and
/// values as plain `&[u8]` borrowing from the table's byte region.
#[derive(Debug, Clone)]
pub struct BytesCodec {
    state: FixedState,
}

impl BytesCodec {
    /// Creates a codec with the default seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Creates a codec hashing with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        BytesCodec {
            state: FixedState::with_seed(seed),
        }
    }

    fn hash_bytes(&self, bytes: &[u8]) -> u32 {
        let hash = self.state.hash_one(bytes);
        (hash ^ (hash >> 32)) as u32
    }
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainTableWriteCodec for BytesCodec {
    type Key = Vec<u8>;
    type Value = Vec<u8>;

    fn hash(&self, key: &Vec<u8>) -> u32 {
        self.hash_bytes(key)
    }

    fn emit_lengths<S: Write>(
        &self,
        sink: &mut S,
        key: &Vec<u8>,
        value: &Vec<u8>,
    ) -> Result<(u32, u32)> {
        assert!(
            key.len() <= u16::MAX as usize,
            "key length exceeds the u16 framing range"
        );
        assert!(
            value.len() <= u16::MAX as usize,
            "value length exceeds the u16 framing range"
        );
        sink.write_u16::<LittleEndian>(key.len() as u16)?;
        sink.write_u16::<LittleEndian>(value.len() as u16)?;
        Ok((key.len() as u32, value.len() as u32))
    }

    fn emit_key<S: Write>(&self, sink: &mut S, key: &Vec<u8>, _key_len: u32) -> Result<()> {
        sink.write_all(key)
    }

    fn emit_value<S: Write>(
        &self,
        sink: &mut S,
        _key: &Vec<u8>,
        value: &Vec<u8>,
        _value_len: u32,
    ) -> Result<()> {
        sink.write_all(value)
    }
}

impl<'t> ChainTableReadCodec<'t> for BytesCodec {
    type ExternalKey = Vec<u8>;
    type InternalKey = Cow<'t, [u8]>;
    type Value = &'t [u8];

    fn hash(&self, key: &Cow<'t, [u8]>) -> u32 {
        self.hash_bytes(key)
    }

    fn equal(&self, a: &Cow<'t, [u8]>, b: &Cow<'t, [u8]>) -> bool {
        a == b
    }

    fn to_internal(&self, key: &Vec<u8>) -> Cow<'t, [u8]> {
        Cow::Owned(key.clone())
    }

    fn to_external(&self, key: &Cow<'t, [u8]>) -> Vec<u8> {
        key.clone().into_owned()
    }

    fn read_lengths(&self, cursor: &mut &'t [u8]) -> (u32, u32) {
        let key_len = cursor::read_u16(cursor) as u32;
        let value_len = cursor::read_u16(cursor) as u32;
        (key_len, value_len)
    }

    fn read_key(&self, bytes: &'t [u8], _key_len: u32) -> Cow<'t, [u8]> {
        Cow::Borrowed(bytes)
    }

    fn read_value(&self, _key: &Cow<'t, [u8]>, bytes: &'t [u8], _value_len: u32) -> &'t [u8] {
        bytes
    }
}
