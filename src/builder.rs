use std::io::Result;

use byteorder::{LittleEndian, WriteBytesExt};

use super::{ChainTableSink, ChainTableWriteCodec};

/// Chain link marking the end of a bucket's item list.
const NIL: u32 = u32::MAX;

/// Number of buckets a fresh builder starts with.
const INITIAL_BUCKETS: usize = 64;

struct Item<K, V> {
    key: K,
    value: V,
    hash: u32,
    next: u32,
}

#[derive(Clone, Copy)]
struct Bucket {
    head: u32,
    length: u32,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        head: NIL,
        length: 0,
    };
}

/// Builder accumulating key-value pairs and emitting them as a chained hash
/// table.
///
/// Entries live in an arena owned by the builder and are chained per bucket
/// through `u32` indices; inserting never performs IO. The bucket count is a
/// power of two and doubles whenever the load factor would reach 0.75, so
/// chains stay short. [`emit`](Self::emit) consumes the builder, streams the
/// payload and bucket directory into a [`ChainTableSink`], and returns the
/// directory's offset, which is the handle a reader needs.
///
/// # Examples
///
/// ```
/// use std::io::{Cursor, Write};
/// use chaintable::{ChainTableBuilder, U32PairCodec};
///
/// # fn main() -> std::io::Result<()> {
/// let mut sink = Cursor::new(Vec::new());
/// sink.write_all(&[0u8; 8])?;
///
/// let mut builder = ChainTableBuilder::new(U32PairCodec);
/// builder.insert(7, 42);
/// let directory = builder.emit(&mut sink)?;
/// assert_eq!(directory, 24);
/// # Ok(())
/// # }
/// ```
pub struct ChainTableBuilder<C: ChainTableWriteCodec> {
    codec: C,
    buckets: Vec<Bucket>,
    items: Vec<Item<C::Key, C::Value>>,
}

impl<C: ChainTableWriteCodec + Default> Default for ChainTableBuilder<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: ChainTableWriteCodec> ChainTableBuilder<C> {
    /// Creates an empty builder around `codec`.
    pub fn new(codec: C) -> Self {
        ChainTableBuilder {
            codec,
            buckets: vec![Bucket::EMPTY; INITIAL_BUCKETS],
            items: Vec::new(),
        }
    }

    /// Overrides the number of buckets the builder starts with.
    ///
    /// A larger count avoids growth rounds when the final entry count is
    /// known up front.
    ///
    /// # Panics
    ///
    /// Panics if `count` is not a power of two, or if entries were already
    /// inserted.
    pub fn with_initial_buckets(mut self, count: usize) -> Self {
        assert!(count.is_power_of_two(), "bucket count must be a power of two");
        assert!(
            self.items.is_empty(),
            "initial bucket count must be set before inserting"
        );
        self.buckets = vec![Bucket::EMPTY; count];
        self
    }

    /// Number of entries inserted so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no entries were inserted yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current number of hash buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Inserts a key-value pair.
    ///
    /// Duplicate keys are kept as distinct entries; lookups on the emitted
    /// table resolve to the most recently inserted one.
    pub fn insert(&mut self, key: C::Key, value: C::Value) {
        // Keep the load factor below 0.75, counting the incoming entry.
        if 4 * (self.items.len() + 1) >= 3 * self.buckets.len() {
            self.resize(self.buckets.len() * 2);
        }

        let hash = self.codec.hash(&key);
        let index = self.items.len() as u32;
        assert!(index != NIL, "entry count exceeds the u32 index range");

        let mask = self.buckets.len() - 1;
        let bucket = &mut self.buckets[(hash as usize) & mask];
        self.items.push(Item {
            key,
            value,
            hash,
            next: bucket.head,
        });
        bucket.head = index;
        bucket.length += 1;
    }

    /// Doubles the bucket array and re-chains every item.
    fn resize(&mut self, new_size: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![Bucket::EMPTY; new_size]);
        let mask = new_size - 1;
        for bucket in old {
            let mut index = bucket.head;
            while index != NIL {
                let item = &mut self.items[index as usize];
                let next = item.next;
                let slot = &mut self.buckets[(item.hash as usize) & mask];
                item.next = slot.head;
                slot.head = index;
                slot.length += 1;
                index = next;
            }
        }
    }

    /// Serializes the table into `sink` and returns the absolute stream
    /// offset of its bucket directory.
    ///
    /// Non-empty buckets are written in index order, each as a `u16` chain
    /// length followed by its entries (stored hash, then the codec's length
    /// prefix, key and value bytes). The directory is zero-padded to a
    /// 4-byte boundary and lists the bucket count, the entry count and one
    /// absolute `u32` offset per bucket, with 0 marking an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the sink or the codec, unchanged. The
    /// sink is left at an indeterminate position on failure.
    ///
    /// # Panics
    ///
    /// Panics if the payload would start at stream offset 0 (the stream must
    /// carry a non-empty prefix so that offset 0 can mark empty buckets), if
    /// a bucket chain exceeds 65535 entries, or if the table does not fit in
    /// the `u32` offset range.
    pub fn emit<S: ChainTableSink>(self, sink: &mut S) -> Result<u32> {
        let mut offsets = vec![0u32; self.buckets.len()];

        for (index, bucket) in self.buckets.iter().enumerate() {
            if bucket.head == NIL {
                continue;
            }

            let offset = stream_offset(sink)?;
            assert!(
                offset != 0,
                "a bucket cannot be written at stream offset 0; emit a prefix first"
            );
            offsets[index] = offset;

            assert!(
                bucket.length <= u16::MAX as u32,
                "bucket chain length exceeds the u16 range"
            );
            sink.write_u16::<LittleEndian>(bucket.length as u16)?;

            let mut item_index = bucket.head;
            while item_index != NIL {
                let item = &self.items[item_index as usize];
                sink.write_u32::<LittleEndian>(item.hash)?;
                let (key_len, value_len) = self.codec.emit_lengths(sink, &item.key, &item.value)?;
                self.codec.emit_key(sink, &item.key, key_len)?;
                self.codec.emit_value(sink, &item.key, &item.value, value_len)?;
                item_index = item.next;
            }
        }

        // Zero-pad so the directory lands on a 4-byte boundary.
        let table_offset = sink.offset()?;
        let padding = (4 - table_offset % 4) % 4;
        sink.write_all(&[0u8; 3][..padding as usize])?;

        let directory_offset = stream_offset(sink)?;
        sink.write_u32::<LittleEndian>(self.buckets.len() as u32)?;
        sink.write_u32::<LittleEndian>(self.items.len() as u32)?;
        for offset in offsets {
            sink.write_u32::<LittleEndian>(offset)?;
        }
        Ok(directory_offset)
    }
}

fn stream_offset<S: ChainTableSink>(sink: &mut S) -> Result<u32> {
    let offset = sink.offset()?;
    assert!(
        offset <= u32::MAX as u64,
        "stream offset exceeds the u32 range of the directory"
    );
    Ok(offset as u32)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::super::U32PairCodec;
    use super::*;

    #[test]
    fn test_growth_keeps_power_of_two() {
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        assert!(builder.is_empty());
        assert_eq!(builder.num_buckets(), 64);

        for key in 0..47 {
            builder.insert(key, key);
        }
        assert_eq!(builder.num_buckets(), 64);

        // The 48th entry pushes the load factor to 0.75.
        builder.insert(47, 47);
        assert_eq!(builder.num_buckets(), 128);
        assert_eq!(builder.len(), 48);
    }

    #[test]
    fn test_initial_buckets_override() {
        let mut builder = ChainTableBuilder::new(U32PairCodec).with_initial_buckets(2);
        assert_eq!(builder.num_buckets(), 2);
        builder.insert(0, 0);
        assert_eq!(builder.num_buckets(), 2);
        builder.insert(1, 1);
        assert_eq!(builder.num_buckets(), 4);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_initial_buckets_rejects_non_power_of_two() {
        let _ = ChainTableBuilder::new(U32PairCodec).with_initial_buckets(48);
    }

    #[test]
    #[should_panic(expected = "offset 0")]
    fn test_rejects_emit_at_stream_offset_zero() {
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        builder.insert(1, 1);
        let mut sink = Cursor::new(Vec::new());
        let _ = builder.emit(&mut sink);
    }

    #[test]
    #[should_panic(expected = "u16 range")]
    fn test_rejects_oversized_bucket_chain() {
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        // Duplicate keys share one hash, so every entry chains into the same
        // bucket no matter how often the table grows.
        for _ in 0..=u16::MAX as usize {
            builder.insert(9, 9);
        }
        let mut sink = Cursor::new(Vec::new());
        sink.write_all(&[0u8; 4]).unwrap();
        let _ = builder.emit(&mut sink);
    }

    #[test]
    fn test_empty_emit_directory_only() {
        let builder = ChainTableBuilder::new(U32PairCodec);
        let mut sink = Cursor::new(Vec::new());
        sink.write_all(&[0u8; 8]).unwrap();
        let directory = builder.emit(&mut sink).unwrap();
        assert_eq!(directory, 8);
        assert_eq!(sink.into_inner().len(), 8 + 8 + 64 * 4);
    }
}
