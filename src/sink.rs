use std::io::{Result, Seek, Write};

/// Byte sink consumed by [`ChainTableBuilder::emit`](crate::ChainTableBuilder::emit).
///
/// Emission needs an ordinary [`Write`] stream that can also report the
/// absolute offset the next write will land at, because every bucket records
/// its position in the bucket directory. The trait is blanket-implemented for
/// any seekable writer, which covers `Cursor<Vec<u8>>`, `File` and buffered
/// wrappers around them.
pub trait ChainTableSink: Write {
    /// Reports the absolute stream offset of the next write.
    fn offset(&mut self) -> Result<u64>;
}

impl<W: Write + Seek> ChainTableSink for W {
    fn offset(&mut self) -> Result<u64> {
        self.stream_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_offset_tracks_writes() {
        let mut sink = Cursor::new(Vec::new());
        assert_eq!(sink.offset().unwrap(), 0);
        sink.write_all(b"abc").unwrap();
        assert_eq!(sink.offset().unwrap(), 3);
    }
}
