
//! On-the-fly base64 transcoding streams.
//!
//! Both sides work block by block through a [`MemoryBlock`] staging area,
//! which is more convenient than buffering and converting a whole stream:
//! the input stream reads one coded block and serves its decoded bytes,
//! the output stream collects raw bytes until a block is full, then
//! encodes and writes it.

use crate::encoding;
use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use super::{BaseStream, InputStream, OutputStream, SIZE_UNKNOWN};


const DEFAULT_BLOCK_SIZE: usize = 4096;


/// An input stream that decodes base64 data on the fly while reading.
#[derive(Debug)]
pub struct Base64InputStream<Inner: InputStream> {
    inner: Inner,
    block: MemoryBlock,
    /// Coded bytes pulled per refill; always a multiple of four so no
    /// group straddles two refills.
    block_size: usize,
}

impl<Inner: InputStream> Base64InputStream<Inner> {

    pub fn new(inner: Inner) -> Self {
        Self::with_block_size(inner, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(inner: Inner, block_size: usize) -> Self {
        Base64InputStream {
            inner,
            block: MemoryBlock::new(),
            block_size: (block_size + 3) & !3,
        }
    }

    fn decoded_estimate(coded: u64) -> u64 {
        if coded >= SIZE_UNKNOWN - 1 { return coded; }
        coded * 3 / 4
    }
}

impl<Inner: InputStream> BaseStream for Base64InputStream<Inner> {
    fn full_size(&self) -> u64 {
        Self::decoded_estimate(self.inner.full_size())
    }

    fn end_reached(&self) -> bool {
        self.inner.end_reached() && self.block.is_empty()
    }

    fn current_position(&self) -> u64 {
        Self::decoded_estimate(self.inner.current_position())
            .saturating_sub(self.block.len() as u64)
    }

    fn set_position(&mut self, position: u64) -> bool {
        // only forward seeks are possible without decoding again
        if position > self.current_position() {
            return self.go_forward(position - self.current_position());
        }
        false
    }
}

impl<Inner: InputStream> InputStream for Base64InputStream<Inner> {
    fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        // the staged decoded bytes go out first
        let staged = self.block.len().min(output.len());
        self.block.extract(&mut output[.. staged])?;
        if staged >= output.len() { return Ok(staged); }

        let mut done = staged;
        let mut coded = vec![0_u8; self.block_size];

        while done < output.len() {
            let got = self.inner.read(&mut coded)?;
            self.block.rebuild_from_base64(&coded[.. got])?;

            let take = (output.len() - done).min(self.block.len());
            self.block.extract(&mut output[done .. done + take])?;
            done += take;

            if got < self.block_size { break; }
        }

        Ok(done)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount < self.block.len() as u64 {
            return self.block.discard(amount as usize).is_ok();
        }

        // skip whole coded groups and restart on a fresh block
        let coded_amount = encoding::encoded_size_base64(amount as usize) as u64;
        if !self.inner.go_forward(coded_amount) { return false; }
        self.block.strip_to(0);
        true
    }
}


/// An output stream that encodes into base64 on the fly while writing.
///
/// Because the coding works in blocks, call [`Self::flush`] (or drop the
/// stream) to push out the trailing partial block with its padding.
#[derive(Debug)]
pub struct Base64OutputStream<Inner: OutputStream> {
    inner: Inner,
    block: MemoryBlock,
    /// Raw bytes collected per encode; rounded up to a multiple of three
    /// so only the very last block ever carries padding.
    block_size: usize,
}

impl<Inner: OutputStream> Base64OutputStream<Inner> {

    pub fn new(inner: Inner) -> Self {
        Self::with_block_size(inner, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(inner: Inner, block_size: usize) -> Self {
        Base64OutputStream {
            inner,
            block: MemoryBlock::new(),
            block_size: (block_size + 2) / 3 * 3,
        }
    }

    /// Encode and write whatever is collected, with padding. Without this
    /// (or the drop that calls it), the trailing bytes never reach the
    /// sink.
    pub fn flush(&mut self) -> Result<()> {
        if self.block.is_empty() { return Ok(()); }

        let coded = self.block.to_base64()?;
        let written = self.inner.write(coded.as_bytes())?;
        if written != coded.len() {
            return Err(Error::io("sink refused the flushed base64 block"));
        }

        self.block.strip_to(0);
        Ok(())
    }
}

impl<Inner: OutputStream> BaseStream for Base64OutputStream<Inner> {
    fn full_size(&self) -> u64 {
        self.inner.full_size() + encoding::encoded_size_base64(self.block.len()) as u64
    }

    fn end_reached(&self) -> bool { true }
    fn current_position(&self) -> u64 { self.full_size() }
    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl<Inner: OutputStream> OutputStream for Base64OutputStream<Inner> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.block.len() + bytes.len() < self.block_size {
            // not enough for a whole block yet
            self.block.append(bytes);
            return Ok(bytes.len());
        }

        let mut processed = 0_usize;
        while processed < bytes.len() {
            let space = self.block_size - self.block.len();
            let current = space.min(bytes.len() - processed);
            self.block.append(&bytes[processed .. processed + current]);
            if current < space { return Ok(bytes.len()); }

            let coded = self.block.to_base64()?;
            let written = match self.inner.write(coded.as_bytes()) {
                Ok(written) => written,
                Err(error) => {
                    self.block.strip_to(0);
                    return Err(error);
                },
            };

            if written != coded.len() {
                // the sink stalled mid-block; drop what it took and
                // report the raw bytes that made it through
                let consumed = (written * 3 / 4 + 1).min(self.block.len());
                self.block.discard(consumed)?;
                return Ok(consumed);
            }

            self.block.strip_to(0);
            processed += current;
        }

        Ok(processed)
    }
}

impl<Inner: OutputStream> Drop for Base64OutputStream<Inner> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
