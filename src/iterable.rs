use super::{cursor, ChainTable, ChainTableEntry, ChainTableReadCodec};

/// Reader that supports whole-table iteration in addition to lookups.
///
/// The iterable variant additionally remembers where the payload begins (the
/// stream offset at which [`ChainTableBuilder::emit`] started writing), which
/// lets it walk every entry in payload order without consulting the bucket
/// directory. Iteration order is unspecified; the multiset of yielded pairs
/// equals the multiset of inserted pairs.
///
/// [`ChainTableBuilder::emit`]: crate::ChainTableBuilder::emit
///
/// # Examples
///
/// ```
/// use std::io::{Cursor, Write};
/// use chaintable::{ChainTableBuilder, IterableChainTable, U32PairCodec};
///
/// # fn main() -> std::io::Result<()> {
/// let mut sink = Cursor::new(Vec::new());
/// sink.write_all(&[0u8; 8])?;
/// let mut builder = ChainTableBuilder::new(U32PairCodec);
/// builder.insert(1, 10);
/// builder.insert(2, 20);
/// let directory = builder.emit(&mut sink)?;
///
/// let bytes = sink.into_inner();
/// let table = IterableChainTable::new(&bytes, directory, 8, U32PairCodec);
/// let mut pairs: Vec<(u32, u32)> = table.iter().collect();
/// pairs.sort_unstable();
/// assert_eq!(pairs, [(1, 10), (2, 20)]);
/// # Ok(())
/// # }
/// ```
pub struct IterableChainTable<'t, C: ChainTableReadCodec<'t>> {
    table: ChainTable<'t, C>,
    payload: u32,
}

impl<'t, C: ChainTableReadCodec<'t>> IterableChainTable<'t, C> {
    /// Opens the table whose bucket directory starts at `directory_offset`
    /// and whose payload starts at `payload_offset` within `base`.
    ///
    /// `payload_offset` is the stream offset the sink was at when emission
    /// began, i.e. the first byte the builder wrote.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`ChainTable::new`].
    pub fn new(base: &'t [u8], directory_offset: u32, payload_offset: u32, codec: C) -> Self {
        IterableChainTable {
            table: ChainTable::new(base, directory_offset, codec),
            payload: payload_offset,
        }
    }

    /// Looks up `key`, returning its entry if present.
    pub fn find(&self, key: &C::ExternalKey) -> Option<ChainTableEntry<'t, '_, C>> {
        self.table.find(key)
    }

    /// Looks up `key` through an explicit codec for this call.
    pub fn find_with<'c>(
        &self,
        key: &C::ExternalKey,
        codec: &'c C,
    ) -> Option<ChainTableEntry<'t, 'c, C>> {
        self.table.find_with(key, codec)
    }

    /// Number of hash buckets in the directory.
    pub fn num_buckets(&self) -> u32 {
        self.table.num_buckets()
    }

    /// Number of entries stored in the table.
    pub fn num_entries(&self) -> u32 {
        self.table.num_entries()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterates over every key, in payload order.
    pub fn keys(&self) -> ChainTableKeys<'t, '_, C> {
        ChainTableKeys {
            walker: PayloadWalker::new(self),
        }
    }

    /// Iterates over every entry, yielding decoded `(key, value)` pairs.
    pub fn iter(&self) -> ChainTableIter<'t, '_, C> {
        ChainTableIter {
            walker: PayloadWalker::new(self),
        }
    }
}

/// Walks the payload entry by entry, straddling bucket boundaries.
///
/// The payload interleaves `u16` bucket headers with entries, so the walker
/// tracks how many items remain in the current bucket: a zero means the
/// cursor sits on the next bucket's header. Exhaustion is detected purely by
/// the global entry counter.
struct PayloadWalker<'t, 'c, C: ChainTableReadCodec<'t>> {
    cursor: &'t [u8],
    items_left_in_bucket: u32,
    entries_left: u32,
    codec: &'c C,
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> PayloadWalker<'t, 'c, C> {
    fn new(table: &'c IterableChainTable<'t, C>) -> Self {
        PayloadWalker {
            cursor: &table.table.base()[table.payload as usize..],
            items_left_in_bucket: 0,
            entries_left: table.table.num_entries(),
            codec: table.table.codec(),
        }
    }

    fn next_entry(&mut self) -> Option<(C::InternalKey, &'t [u8], u32)> {
        if self.entries_left == 0 {
            return None;
        }
        if self.items_left_in_bucket == 0 {
            self.items_left_in_bucket = cursor::read_u16(&mut self.cursor) as u32;
        }
        cursor::read_u32(&mut self.cursor); // skip the stored hash
        let (key_len, value_len) = self.codec.read_lengths(&mut self.cursor);
        let key_bytes = cursor::take(&mut self.cursor, key_len as usize);
        let value_bytes = cursor::take(&mut self.cursor, value_len as usize);
        self.items_left_in_bucket -= 1;
        self.entries_left -= 1;
        Some((self.codec.read_key(key_bytes, key_len), value_bytes, value_len))
    }
}

/// Iterator over all keys of an [`IterableChainTable`].
pub struct ChainTableKeys<'t, 'c, C: ChainTableReadCodec<'t>> {
    walker: PayloadWalker<'t, 'c, C>,
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> Iterator for ChainTableKeys<'t, 'c, C> {
    type Item = C::ExternalKey;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, _, _) = self.walker.next_entry()?;
        Some(self.walker.codec.to_external(&key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.walker.entries_left as usize;
        (left, Some(left))
    }
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> ExactSizeIterator for ChainTableKeys<'t, 'c, C> {}

/// Iterator over all `(key, value)` pairs of an [`IterableChainTable`].
pub struct ChainTableIter<'t, 'c, C: ChainTableReadCodec<'t>> {
    walker: PayloadWalker<'t, 'c, C>,
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> Iterator for ChainTableIter<'t, 'c, C> {
    type Item = (C::ExternalKey, C::Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value_bytes, value_len) = self.walker.next_entry()?;
        let external = self.walker.codec.to_external(&key);
        let value = self.walker.codec.read_value(&key, value_bytes, value_len);
        Some((external, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.walker.entries_left as usize;
        (left, Some(left))
    }
}

impl<'t, 'c, C: ChainTableReadCodec<'t>> ExactSizeIterator for ChainTableIter<'t, 'c, C> {}

#[cfg(test)]
mod tests {
    use std::io::{BufWriter, Cursor, Write};

    use crate::{BytesCodec, ChainTableBuilder, IterableChainTable, U32PairCodec};

    fn emit_with_prefix(builder: ChainTableBuilder<U32PairCodec>, prefix: usize) -> (Vec<u8>, u32) {
        let mut sink = Cursor::new(Vec::new());
        sink.write_all(&vec![0u8; prefix]).unwrap();
        let directory = builder.emit(&mut sink).unwrap();
        (sink.into_inner(), directory)
    }

    #[test]
    fn test_iterate_empty() {
        let builder = ChainTableBuilder::new(U32PairCodec);
        let (bytes, directory) = emit_with_prefix(builder, 8);
        let table = IterableChainTable::new(&bytes, directory, 8, U32PairCodec);
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.keys().count(), 0);
    }

    #[test]
    fn test_iterate_single_bucket_chain() {
        // All keys are congruent mod 64, so they chain into one bucket.
        let keys = [7u32, 71, 135, 199, 263];
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        for &key in &keys {
            builder.insert(key, key * 3);
        }
        let (bytes, directory) = emit_with_prefix(builder, 8);

        let table = IterableChainTable::new(&bytes, directory, 8, U32PairCodec);
        let mut pairs: Vec<(u32, u32)> = table.iter().collect();
        pairs.sort_unstable();
        let expected: Vec<(u32, u32)> = keys.iter().map(|&key| (key, key * 3)).collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_iterate_after_growth() {
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        for key in 0..49 {
            builder.insert(key, key * 2);
        }
        let (bytes, directory) = emit_with_prefix(builder, 4);

        let table = IterableChainTable::new(&bytes, directory, 4, U32PairCodec);
        assert_eq!(table.num_buckets(), 128);
        assert_eq!(table.num_entries(), 49);

        let mut pairs: Vec<(u32, u32)> = table.iter().collect();
        assert_eq!(pairs.len(), 49);
        pairs.sort_unstable();
        let expected: Vec<(u32, u32)> = (0..49).map(|key| (key, key * 2)).collect();
        assert_eq!(pairs, expected);

        let mut keys: Vec<u32> = table.keys().collect();
        keys.sort_unstable();
        let expected: Vec<u32> = (0..49).collect();
        assert_eq!(keys, expected);

        for key in 0..49 {
            assert_eq!(table.find(&key).map(|entry| entry.value()), Some(key * 2));
        }
    }

    #[test]
    fn test_iterate_random_pairs() {
        let mut expected: Vec<(u32, u32)> = (0..1000)
            .map(|_| (rand::random::<u32>(), rand::random::<u32>()))
            .collect();
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        for &(key, value) in &expected {
            builder.insert(key, value);
        }
        let (bytes, directory) = emit_with_prefix(builder, 8);

        let table = IterableChainTable::new(&bytes, directory, 8, U32PairCodec);
        assert_eq!(table.num_entries(), 1000);

        let mut collected: Vec<(u32, u32)> = table.iter().collect();
        assert_eq!(collected.len(), 1000);
        collected.sort_unstable();
        expected.sort_unstable();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_size_hint_counts_down() {
        let mut builder = ChainTableBuilder::new(U32PairCodec);
        builder.insert(1, 1);
        builder.insert(2, 2);
        let (bytes, directory) = emit_with_prefix(builder, 8);

        let table = IterableChainTable::new(&bytes, directory, 8, U32PairCodec);
        let mut iter = table.iter();
        assert_eq!(iter.len(), 2);
        iter.next();
        assert_eq!(iter.len(), 1);
        iter.next();
        assert_eq!(iter.len(), 0);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_bytes_codec_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fruits.table");
        let entries = [
            ("apple", "red"),
            ("banana", "yellow"),
            ("cherry", "dark red"),
            ("date", "brown"),
            ("elderberry", "purple"),
        ];

        let mut builder = ChainTableBuilder::new(BytesCodec::with_seed(42));
        for (key, value) in entries {
            builder.insert(key.as_bytes().to_vec(), value.as_bytes().to_vec());
        }

        let prefix = b"fruit-catalog-v1";
        let mut sink = BufWriter::new(std::fs::File::create(&path).unwrap());
        sink.write_all(prefix).unwrap();
        let directory = builder.emit(&mut sink).unwrap();
        sink.into_inner().unwrap().sync_all().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let table = IterableChainTable::new(
            &bytes,
            directory,
            prefix.len() as u32,
            BytesCodec::with_seed(42),
        );

        assert_eq!(
            table.find(&b"banana".to_vec()).map(|entry| entry.value()),
            Some(&b"yellow"[..])
        );
        assert!(table.find(&b"fig".to_vec()).is_none());

        let mut collected: Vec<(Vec<u8>, &[u8])> = table.iter().collect();
        collected.sort();
        let mut expected: Vec<(Vec<u8>, &[u8])> = entries
            .iter()
            .map(|(key, value)| (key.as_bytes().to_vec(), value.as_bytes()))
            .collect();
        expected.sort();
        assert_eq!(collected, expected);
    }
}
