
//! On-the-fly compression and decompression streams.
//!
//! These are pseudo streams: a real stream underneath refills or drains
//! the codec's staging buffer as needed. Neither side can seek. Beware
//! that the compressed output is only complete once the writing stream is
//! dropped (or [`CompressOutputStream::finish`] is called), because the
//! codec writes trailing frames then.

use crate::compress::{Compressor, GZip};
use crate::error::{Error, Result, PassiveResult};
use super::{
    BaseStream, InputStream, OutputStream,
    MemoryBlockStream, MemoryBlockOutStream, NullOutputStream, SIZE_UNKNOWN,
};


/// An output stream that compresses on the fly while being written into.
pub struct CompressOutputStream<Inner: OutputStream> {
    inner: Inner,
    compressor: Box<dyn Compressor>,
    amount: u64,
    finished: bool,
}

impl<Inner: OutputStream> CompressOutputStream<Inner> {

    /// Compress with gzip into the given sink.
    pub fn new(inner: Inner) -> Self {
        Self::with_compressor(inner, Box::new(GZip::new()))
    }

    /// Compress with the given codec into the given sink.
    pub fn with_compressor(inner: Inner, compressor: Box<dyn Compressor>) -> Self {
        CompressOutputStream { inner, compressor, amount: 0, finished: false }
    }

    /// The codec in use.
    pub fn compressor(&self) -> &dyn Compressor { self.compressor.as_ref() }

    /// Flush the trailing frames. Called by drop, but an explicit call
    /// surfaces the outcome.
    pub fn finish(&mut self) -> PassiveResult {
        if self.finished { return Ok(()); }
        self.finished = true;

        let mut empty = MemoryBlockStream::new(&[]);
        self.compressor.compress_stream(&mut self.inner, &mut empty, 0, true)
    }
}

impl<Inner: OutputStream> std::fmt::Debug for CompressOutputStream<Inner> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("CompressOutputStream")
            .field("compressor", &self.compressor.name())
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

impl<Inner: OutputStream> BaseStream for CompressOutputStream<Inner> {
    fn full_size(&self) -> u64 { self.amount }
    fn end_reached(&self) -> bool { true }
    fn current_position(&self) -> u64 { self.amount }
    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl<Inner: OutputStream> OutputStream for CompressOutputStream<Inner> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() { return Ok(0); }
        if self.finished { return Err(Error::io("the compressed stream is already finished")); }

        let mut block = MemoryBlockStream::new(bytes);
        self.compressor.compress_stream(&mut self.inner, &mut block, 0, false)?;

        self.amount += bytes.len() as u64;
        Ok(bytes.len())
    }
}

impl<Inner: OutputStream> Drop for CompressOutputStream<Inner> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}


/// An input stream that decompresses on the fly while being read.
pub struct DecompressInputStream<Inner: InputStream> {
    inner: Inner,
    compressor: Box<dyn Compressor>,
    position: u64,
    decompressed_size: u64,
}

impl<Inner: InputStream> DecompressInputStream<Inner> {

    /// Decompress gzip data from the given stream.
    pub fn new(inner: Inner) -> Self {
        Self::with_compressor(inner, Box::new(GZip::new()))
    }

    /// Decompress with the given codec from the given stream.
    pub fn with_compressor(inner: Inner, compressor: Box<dyn Compressor>) -> Self {
        DecompressInputStream { inner, compressor, position: 0, decompressed_size: SIZE_UNKNOWN }
    }

    /// Announce the decoded size when it is known beforehand, so that
    /// `full_size` can report it.
    pub fn with_known_size(mut self, size: u64) -> Self {
        self.decompressed_size = size;
        self
    }

    /// The codec in use.
    pub fn compressor(&self) -> &dyn Compressor { self.compressor.as_ref() }
}

impl<Inner: InputStream> std::fmt::Debug for DecompressInputStream<Inner> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("DecompressInputStream")
            .field("compressor", &self.compressor.name())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl<Inner: InputStream> BaseStream for DecompressInputStream<Inner> {
    /// The decompressed size when announced; unknown otherwise, which is
    /// safer than reporting the compressed size.
    fn full_size(&self) -> u64 { self.decompressed_size }

    fn end_reached(&self) -> bool {
        self.inner.current_position() == self.inner.full_size()
    }

    /// An estimate of the amount of data processed so far: the count of
    /// decoded bytes handed out, not a seekable offset.
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl<Inner: InputStream> InputStream for DecompressInputStream<Inner> {
    fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        if output.is_empty() { return Ok(0); }

        let quota = output.len() as u64;
        let mut sink = MemoryBlockOutStream::new(output);
        self.compressor.decompress_stream(&mut sink, &mut self.inner, quota)?;

        let produced = sink.current_position();
        self.position += produced;
        Ok(produced as usize)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount == 0 { return true; }

        // decode into a discarding sink; the quota bounds the skip
        let mut sink = NullOutputStream::new();
        if self.compressor.decompress_stream(&mut sink, &mut self.inner, amount).is_err() {
            return false;
        }

        self.position += sink.current_position();
        sink.current_position() == amount
    }
}

impl<Inner: InputStream> Drop for DecompressInputStream<Inner> {
    fn drop(&mut self) {
        // reading nothing more lets the codec run its cleanup pass
        let mut empty = MemoryBlockStream::new(&[]);
        let mut discard = NullOutputStream::new();
        let _ = self.compressor.decompress_stream(&mut discard, &mut empty, 0);
    }
}
