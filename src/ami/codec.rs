//! Block framing for the AMI byte stream
//!
//! The stream is a sequence of blocks, each made of `Key: Value` lines and
//! closed by an empty line. [`BlockCodec`] plugs into `tokio_util::codec`
//! so a socket can be read through `FramedRead`; [`BlockParser`] offers the
//! same framing for callers that hold raw chunks.
//!
//! Framing only depends on the bytes seen so far, never on where reads
//! happened to split them, so any chunking yields the same blocks.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use super::block::RawBlock;

const CRLF: &[u8] = b"\r\n";

/// Decoder/encoder for AMI blocks.
#[derive(Debug, Default, Clone)]
pub struct BlockCodec {
    /// Offset to resume the terminator scan from, so a long block still
    /// arriving is not rescanned from the start on every read.
    next_index: usize,
}

impl BlockCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume empty lines sitting at the start of the buffer.
    ///
    /// Returns `false` when the buffer ends in a lone `\r` that may still
    /// turn out to be half of an empty line.
    fn skip_leading_empty_lines(buf: &mut BytesMut) -> bool {
        loop {
            match buf.as_ref() {
                [b'\n', ..] => buf.advance(1),
                [b'\r', b'\n', ..] => buf.advance(2),
                [b'\r'] => return false,
                _ => return true,
            }
        }
    }

    /// Locate the end of the first complete block.
    ///
    /// Returns `(content_len, consumed)`: the block text is
    /// `buf[..content_len]` and `consumed` bytes including the empty line
    /// belong to it.
    fn find_block_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
        let mut i = from;
        while i < buf.len() {
            if buf[i] == b'\n' {
                match &buf[i + 1..] {
                    [b'\n', ..] => return Some((i, i + 2)),
                    [b'\r', b'\n', ..] => return Some((i, i + 3)),
                    _ => {}
                }
            }
            i += 1;
        }
        None
    }
}

impl Decoder for BlockCodec {
    type Item = RawBlock;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RawBlock>, io::Error> {
        loop {
            if self.next_index == 0 && !Self::skip_leading_empty_lines(buf) {
                return Ok(None);
            }

            match Self::find_block_end(buf, self.next_index) {
                Some((content_len, consumed)) => {
                    self.next_index = 0;
                    let raw = buf.split_to(consumed);
                    let block = RawBlock::parse(&String::from_utf8_lossy(&raw[..content_len]));

                    if block.is_empty() {
                        trace!("Skipping block without fields ({} bytes)", consumed);
                        continue;
                    }

                    return Ok(Some(block));
                }
                None => {
                    // A terminator is at most three bytes long; rescan the tail
                    // in case it was split across reads.
                    self.next_index = buf.len().saturating_sub(2);
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<RawBlock>, io::Error> {
        if let Some(block) = self.decode(buf)? {
            return Ok(Some(block));
        }

        if !buf.is_empty() {
            debug!("Discarding {} bytes of unterminated block at end of stream", buf.len());
            buf.clear();
        }
        self.next_index = 0;

        Ok(None)
    }
}

impl Encoder<RawBlock> for BlockCodec {
    type Error = io::Error;

    fn encode(&mut self, block: RawBlock, dst: &mut BytesMut) -> Result<(), io::Error> {
        for (key, value) in block.fields() {
            dst.reserve(key.len() + value.len() + 4);
            dst.put_slice(key.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(CRLF);
        }
        dst.put_slice(CRLF);
        Ok(())
    }
}

/// Push-style block parser over an owned accumulation buffer.
#[derive(Debug, Default)]
pub struct BlockParser {
    codec: BlockCodec,
    buffer: BytesMut,
}

impl BlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one read worth of bytes and return every block it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawBlock> {
        self.buffer.extend_from_slice(chunk);

        let mut blocks = Vec::new();
        // Decoding from memory cannot fail with an I/O error.
        while let Ok(Some(block)) = self.codec.decode(&mut self.buffer) {
            blocks.push(block);
        }
        blocks
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Signal end of stream, dropping any trailing partial block.
    pub fn finish(mut self) -> Option<RawBlock> {
        self.codec.decode_eof(&mut self.buffer).ok().flatten()
    }
}
