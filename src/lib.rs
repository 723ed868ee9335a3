//! Compact on-disk chained hash tables for embedding in larger binary artifacts.
//!
//! The `chaintable` crate serializes an in-memory key-value map into a
//! little-endian byte stream and answers point lookups directly against those
//! bytes, without deserializing the table up front. The format is built for
//! containers that pack many small maps into one artifact: a builder emits the
//! table at the stream's current position and hands back the offset of its
//! bucket directory, and a reader later resolves lookups against the mapped or
//! loaded bytes in O(1) expected time with no allocation of its own.
//!
//! How keys and values are hashed, framed and decoded is delegated to a codec
//! pair ([`ChainTableWriteCodec`] / [`ChainTableReadCodec`]); the crate frames
//! only buckets and the directory. [`U32PairCodec`] and [`BytesCodec`] are
//! provided for common cases.
//!
//! ```
//! use std::io::{Cursor, Write};
//! use chaintable::{ChainTable, ChainTableBuilder, U32PairCodec};
//!
//! # fn main() -> std::io::Result<()> {
//! let mut sink = Cursor::new(Vec::new());
//! sink.write_all(b"artifact.")?; // tables never start at stream offset 0
//!
//! let mut builder = ChainTableBuilder::new(U32PairCodec);
//! builder.insert(7, 42);
//! builder.insert(9, 1000);
//! let directory = builder.emit(&mut sink)?;
//!
//! let bytes = sink.into_inner();
//! let table = ChainTable::new(&bytes, directory, U32PairCodec);
//! assert_eq!(table.find(&7).map(|entry| entry.value()), Some(42));
//! assert!(table.find(&8).is_none());
//! # Ok(())
//! # }
//! ```
pub mod cursor;

mod sink;
pub use sink::ChainTableSink;

mod codec;
pub use codec::{BytesCodec, ChainTableReadCodec, ChainTableWriteCodec, U32PairCodec};

mod builder;
pub use builder::ChainTableBuilder;

mod chaintable;
pub use chaintable::{ChainTable, ChainTableEntry};

mod iterable;
pub use iterable::{ChainTableIter, ChainTableKeys, IterableChainTable};
