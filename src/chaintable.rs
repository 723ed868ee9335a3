use byteorder::{ByteOrder, LittleEndian};

use super::{cursor, ChainTableReadCodec};

/// Immutable hash table resolved directly against a serialized byte region.
///
/// A `ChainTable` borrows the stream that contains the table (`base`, whose
/// first byte is stream offset 0) and the offset of the bucket directory
/// returned by [`ChainTableBuilder::emit`](crate::ChainTableBuilder::emit).
/// Lookups hash the key, index the directory, and walk the bucket's chain,
/// decoding keys lazily through the codec; nothing is materialized up front
/// and a miss costs no decoding beyond the colliding keys.
///
/// The table never outlives the borrowed bytes and is never mutated, so
/// sharing it across threads only requires the codec's read operations to be
/// safely callable concurrently.
///
/// # Examples
///
/// ```
/// use std::io::{Cursor, Write};
/// use chaintable::{ChainTable, ChainTableBuilder, U32PairCodec};
///
/// # fn main() -> std::io::Result<()> {
/// let mut sink = Cursor::new(Vec::new());
/// sink.write_all(&[0u8; 8])?;
/// let mut builder = ChainTableBuilder::new(U32PairCodec);
/// builder.insert(3, 300);
/// let directory = builder.emit(&mut sink)?;
///
/// let bytes = sink.into_inner();
/// let table = ChainTable::new(&bytes, directory, U32PairCodec);
/// assert_eq!(table.find(&3).map(|entry| entry.value()), Some(300));
/// assert!(table.find(&4).is_none());
/// # Ok(())
/// # }
/// ```
pub struct ChainTable<'t, C: ChainTableReadCodec<'t>> {
    num_buckets: u32,
    num_entries: u32,
    buckets: &'t [u8],
    base: &'t [u8],
    codec: C,
}

impl<'t, C: ChainTableReadCodec<'t>> ChainTable<'t, C> {
    /// Opens the table whose bucket directory starts at `directory_offset`
    /// within `base`.
    ///
    /// `base` must cover the whole region the table was emitted into, with
    /// index 0 corresponding to stream offset 0; the stored bucket offsets
    /// are resolved against it.
    ///
    /// # Panics
    ///
    /// Panics if `directory_offset` is 0, not 4-byte aligned, or out of
    /// range of `base`.
    pub fn new(base: &'t [u8], directory_offset: u32, codec: C) -> Self {
        assert!(
            directory_offset > 0,
            "the bucket directory cannot start at stream offset 0"
        );
        assert!(
            directory_offset % 4 == 0,
            "the bucket directory must be 4-byte aligned"
        );

        let mut directory = &base[directory_offset as usize..];
        let num_buckets = cursor::read_u32(&mut directory);
        let num_entries = cursor::read_u32(&mut directory);
        ChainTable {
            num_buckets,
            num_entries,
            buckets: directory,
            base,
            codec,
        }
    }

    /// Number of hash buckets in the directory.
    pub fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    /// Number of entries stored in the table.
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// The byte region the table resolves offsets against.
    pub fn base(&self) -> &'t [u8] {
        self.base
    }

    /// The codec the table was opened with.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Looks up `key`, returning its entry if present.
    ///
    /// The returned entry carries the stored key and the raw value bytes;
    /// the value itself is not decoded until
    /// [`ChainTableEntry::value`] is called.
    pub fn find(&self, key: &C::ExternalKey) -> Option<ChainTableEntry<'t, '_, C>> {
        self.find_with(key, &self.codec)
    }

    /// Looks up `key` through an explicit codec, overriding the one the
    /// table was opened with for this call.
    pub fn find_with<'c>(
        &self,
        key: &C::ExternalKey,
        codec: &'c C,
    ) -> Option<ChainTableEntry<'t, 'c, C>> {
        let probe = codec.to_internal(key);
        let hash = codec.hash(&probe);
        let index = hash & (self.num_buckets - 1);

        let cell = &self.buckets[index as usize * 4..];
        let offset = LittleEndian::read_u32(cell);
        if offset == 0 {
            return None;
        }

        let mut items = &self.base[offset as usize..];
        let length = cursor::read_u16(&mut items);

        for _ in 0..length {
            let item_hash = cursor::read_u32(&mut items);
            let (key_len, value_len) = codec.read_lengths(&mut items);
            let item_len = (key_len + value_len) as usize;

            // Stored hashes diverge: skip without touching the codec.
            if item_hash != hash {
                items = &items[item_len..];
                continue;
            }

            let stored = codec.read_key(&items[..key_len as usize], key_len);
            if !codec.equal(&stored, &probe) {
                items = &items[item_len..];
                continue;
            }

            let data = &items[key_len as usize..item_len];
            return Some(ChainTableEntry {
                key: stored,
                data,
                codec,
            });
        }
        None
    }
}

/// An entry located by [`ChainTable::find`], with lazy value decoding.
pub struct ChainTableEntry<'t, 'c, C: ChainTableReadCodec<'t>> {
    key: C::InternalKey,
    data: &'t [u8],
    codec: &'c C,
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> ChainTableEntry<'t, 'c, C> {
    /// The key as stored in the table.
    pub fn key(&self) -> &C::InternalKey {
        &self.key
    }

    /// The raw encoded value bytes.
    pub fn value_bytes(&self) -> &'t [u8] {
        self.data
    }

    /// Decodes and returns the value.
    pub fn value(&self) -> C::Value {
        self.codec
            .read_value(&self.key, self.data, self.data.len() as u32)
    }
}
