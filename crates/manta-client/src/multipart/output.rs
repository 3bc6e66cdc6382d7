//! Block-aligned fan-out buffer
//!
//! Encrypted multipart uploads must hand the store part bodies whose
//! lengths are whole multiples of the cipher block size, while the cipher
//! itself produces a continuous stream. This buffer sits between them:
//! `write` forwards the aligned prefix to the current sink and keeps the
//! tail (< block size); `set_next` switches sinks without emitting the
//! tail, carrying it over into the next part; `flush_buffer` writes the
//! tail out and is called only when the stream is finished.

use std::io::{self, Write};

pub struct MultipartOutputStream<W: Write> {
    block_size: usize,
    buf: Vec<u8>,
    current: Option<W>,
}

impl<W: Write> MultipartOutputStream<W> {
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            block_size,
            buf: Vec::with_capacity(block_size),
            current: None,
        }
    }

    /// Switch the downstream sink, returning the previous one. The
    /// buffered tail is not emitted; it carries over.
    pub fn set_next(&mut self, sink: W) -> Option<W> {
        self.current.replace(sink)
    }

    /// Remove the current sink, leaving the buffered tail in place.
    pub fn take_current(&mut self) -> Option<W> {
        self.current.take()
    }

    /// Bytes currently buffered (always < block size after a `write`).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Write `data`, forwarding whole blocks and buffering the remainder.
    pub fn write(&mut self, mut data: &[u8]) -> io::Result<()> {
        let sink = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no downstream sink"))?;

        if !self.buf.is_empty() {
            let need = self.block_size - self.buf.len();
            if data.len() < need {
                self.buf.extend_from_slice(data);
                return Ok(());
            }
            self.buf.extend_from_slice(&data[..need]);
            sink.write_all(&self.buf)?;
            self.buf.clear();
            data = &data[need..];
        }

        let aligned = data.len() / self.block_size * self.block_size;
        sink.write_all(&data[..aligned])?;
        self.buf.extend_from_slice(&data[aligned..]);
        Ok(())
    }

    /// Emit the buffered tail to the current sink.
    pub fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let sink = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no downstream sink"))?;
        sink.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path() {
        let mut mpos = MultipartOutputStream::new(16);

        mpos.set_next(Vec::new());
        mpos.write(b"foo").unwrap();
        mpos.write(b"foo").unwrap();
        assert!(
            mpos.current.as_ref().unwrap().is_empty(),
            "sub-block writes must stay buffered"
        );
        mpos.flush_buffer().unwrap();
        let s1 = mpos.set_next(Vec::new()).unwrap();

        mpos.write(b"bar").unwrap();
        mpos.flush_buffer().unwrap();
        let s2 = mpos.set_next(Vec::new()).unwrap();

        mpos.write(b"baz").unwrap();
        mpos.flush_buffer().unwrap();
        let s3 = mpos.take_current().unwrap();

        assert_eq!(s1, b"foofoo");
        assert_eq!(s2, b"bar");
        assert_eq!(s3, b"baz");
    }

    #[test]
    fn buffered_tail_switches_sinks() {
        let mut mpos = MultipartOutputStream::new(16);

        mpos.set_next(Vec::new());
        mpos.write(b"foo").unwrap();
        let s1 = mpos.set_next(Vec::new()).unwrap();
        mpos.flush_buffer().unwrap();
        let s2 = mpos.take_current().unwrap();

        assert_eq!(s1, b"");
        assert_eq!(s2, b"foo");
    }

    #[test]
    fn aligned_writes_pass_straight_through() {
        let mut mpos = MultipartOutputStream::new(4);

        mpos.set_next(Vec::new());
        mpos.write(b"fooo").unwrap();
        mpos.write(b"baarbaar").unwrap();
        let s1 = mpos.set_next(Vec::new()).unwrap();
        let s2 = mpos.take_current().unwrap();

        assert_eq!(s1, b"fooobaarbaar");
        assert_eq!(s2, b"");
    }

    #[test]
    fn partial_block_completes_across_writes() {
        let mut mpos = MultipartOutputStream::new(4);
        mpos.set_next(Vec::new());
        mpos.write(b"ab").unwrap();
        mpos.write(b"cdef").unwrap();
        // "abcd" flushes as a block, "ef" stays buffered
        assert_eq!(mpos.current.as_ref().unwrap().as_slice(), &b"abcd"[..]);
        assert_eq!(mpos.buffered(), 2);
    }

    #[test]
    fn write_without_sink_fails() {
        let mut mpos: MultipartOutputStream<Vec<u8>> = MultipartOutputStream::new(16);
        assert!(mpos.write(b"x").is_err());
    }

    proptest! {
        /// Every sink except the final flush target receives a whole
        /// multiple of the block size, and the concatenation preserves
        /// the input byte stream.
        #[test]
        fn alignment_and_order_hold(
            chunks in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..40),
                1..12,
            ),
            block in 1usize..20,
            switches in proptest::collection::vec(any::<bool>(), 1..12),
        ) {
            let mut mpos = MultipartOutputStream::new(block);
            mpos.set_next(Vec::new());
            let mut sinks: Vec<Vec<u8>> = Vec::new();

            for (i, chunk) in chunks.iter().enumerate() {
                if *switches.get(i).unwrap_or(&false) {
                    if let Some(done) = mpos.set_next(Vec::new()) {
                        sinks.push(done);
                    }
                }
                mpos.write(chunk).unwrap();
            }
            mpos.flush_buffer().unwrap();
            sinks.push(mpos.take_current().unwrap());

            // all sinks but the last are block aligned
            for sink in &sinks[..sinks.len() - 1] {
                prop_assert_eq!(sink.len() % block, 0, "unaligned sink");
            }
            // concatenation equals the input
            let written: Vec<u8> = chunks.concat();
            let emitted: Vec<u8> = sinks.concat();
            prop_assert_eq!(emitted, written);
        }
    }
}
