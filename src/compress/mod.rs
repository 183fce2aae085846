
//! Lossless compression and decompression primitives.
//!
//! Both compressors wrap the deflate engine behind block operations (with
//! the two-call size-then-fill protocol) and streaming operations that keep
//! an incremental context alive between calls. You might be interested in
//! the stream-based wrappers in [`crate::stream`] for transparent
//! on-the-fly (de)compression.

pub mod zlib;
pub mod gzip;

pub use zlib::ZLib;
pub use gzip::GZip;

use crate::error::{Error, Result, PassiveResult};
use crate::memory::MemoryBlock;
use crate::stream::{InputStream, OutputStream};


/// Status codes of the deflate engine, kept with their conventional
/// values. `Success` and `EndOfStream` are regular outcomes; the negative
/// codes are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CodecError {
    Success = 0,
    /// Not an error: the regular end of a compressed stream was found.
    EndOfStream = 1,
    StreamError = -2,
    DataError = -3,
    MemoryError = -4,
    BufferError = -5,
}

/// Special compression factor meaning "raw deflate without the two-byte
/// framing and the adler32 trailer".
pub const HEADERLESS: f32 = 2.0;

/// Map the [0, 1] factor onto the engine's 0..=9 strength,
/// round-to-nearest.
pub(crate) fn factor_to_strength(factor: f32) -> i32 {
    (factor * 9.0 + 0.5) as i32
}


/// The base compression interface.
///
/// All (de)compressors implement this interface. Since each compressor
/// might show different options, check the concrete documentation.
/// Concurrent instances are independent, but a single instance holds
/// mutable buffers and must not be shared without external locking.
pub trait Compressor {

    /// The compressor name.
    fn name(&self) -> &'static str;

    /// The status of the last operation.
    fn last_error(&self) -> CodecError;

    /// Set the compression factor, from 0.0 (fastest) to 1.0 (best).
    /// The sentinel [`HEADERLESS`] selects raw deflate output.
    fn set_compression_factor(&mut self, factor: f32);

    /// Prepare the incremental context for the given direction. Switching
    /// the direction mid-stream discards the context.
    fn reset(&mut self, compressing: bool);

    /// Compress `input` in one shot.
    ///
    /// With `output == None` this is the sizing pass: it reports the
    /// required output size without producing anything (the last error is
    /// left at `BufferError`, as the engine convention has it). With a
    /// buffer, the number of bytes written is returned, or
    /// `BufferTooSmall` when the buffer cannot take the whole result.
    fn compress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize>;

    /// Decompress `input` in one shot; the same two-call protocol as
    /// [`Self::compress_data`].
    fn decompress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize>;

    /// Continuous compression. Pulls up to `amount` input bytes from
    /// `source` (0 = the whole stream) and writes compressed output to
    /// `sink`. With `last_call` set and an empty source, the trailing
    /// frames are flushed.
    fn compress_stream(
        &mut self,
        sink: &mut dyn OutputStream,
        source: &mut dyn InputStream,
        amount: u64,
        last_call: bool,
    ) -> PassiveResult;

    /// Continuous decompression. Produces up to `amount` decoded bytes
    /// into `sink` (0 = everything the source holds); decoded bytes beyond
    /// the quota stay staged for the next call.
    fn decompress_stream(
        &mut self,
        sink: &mut dyn OutputStream,
        source: &mut dyn InputStream,
        amount: u64,
    ) -> PassiveResult;

    /// Compress a memory block into a new one, sizing with the query pass.
    fn compress_block(&mut self, input: &MemoryBlock) -> Result<MemoryBlock> {
        let required = self.compress_data(input.as_bytes(), None)?;
        let mut output = MemoryBlock::with_size(required);
        let written = self.compress_data(input.as_bytes(), Some(output.as_bytes_mut()))?;
        output.strip_to(written);
        Ok(output)
    }

    /// Decompress a memory block into a new one, sizing with the query pass.
    fn decompress_block(&mut self, input: &MemoryBlock) -> Result<MemoryBlock> {
        let required = self.decompress_data(input.as_bytes(), None)?;
        let mut output = MemoryBlock::with_size(required);
        let written = self.decompress_data(input.as_bytes(), Some(output.as_bytes_mut()))?;
        output.strip_to(written);
        Ok(output)
    }
}


// ------------------------------------------------------- incremental pump

/// The staging area between the incremental engine and the sink.
pub(crate) const WORK_BUFFER_SIZE: usize = 32768;

/// How much is pulled from the source per engine call.
pub(crate) const SOURCE_CHUNK: usize = 8192;

/// What one engine call did: input consumed, output produced, and whether
/// the compressed stream ended.
pub(crate) struct Feed {
    pub consumed: usize,
    pub produced: usize,
    pub end: bool,
}

/// One incremental engine step over borrowed buffers. `finish` signals
/// that no further input will arrive and trailing frames must be emitted.
pub(crate) trait IncrementalEngine {
    fn feed(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<Feed>;
}

/// The 32 KiB work buffer with its fill level.
pub(crate) struct WorkBuffer {
    bytes: Box<[u8]>,
    filled: usize,
}

impl WorkBuffer {
    pub fn new() -> Self {
        WorkBuffer { bytes: vec![0_u8; WORK_BUFFER_SIZE].into_boxed_slice(), filled: 0 }
    }

    pub fn clear(&mut self) { self.filled = 0; }

    /// Write up to `limit` staged bytes into the sink, keeping anything
    /// beyond the limit staged. Returns the number of bytes drained.
    fn drain(&mut self, sink: &mut dyn OutputStream, limit: usize) -> Result<usize> {
        let count = self.filled.min(limit);
        if count == 0 { return Ok(0); }

        let written = sink.write(&self.bytes[.. count])?;
        if written != count { return Err(Error::io("sink refused staged output")); }

        self.bytes.copy_within(count .. self.filled, 0);
        self.filled -= count;
        Ok(count)
    }
}

/// The streaming compression pump: drain staged output, pull up to 8 KiB
/// of input, feed the engine, repeat; finalise with zero-length finishing
/// feeds once the source is done.
pub(crate) fn pump_compress(
    work: &mut WorkBuffer,
    engine: &mut dyn IncrementalEngine,
    sink: &mut dyn OutputStream,
    source: &mut dyn InputStream,
    amount: u64,
    last_call: bool,
) -> PassiveResult
{
    // 0 = the whole source; an unknown size simply never bounds the loop
    let mut quota = if amount == 0 { source.full_size() } else { amount };

    let mut input = [0_u8; SOURCE_CHUNK];
    let mut available = 0_usize;
    let mut position = 0_usize;

    while quota > 0 {
        work.drain(sink, usize::MAX)?;

        if position == available {
            let wanted = (SOURCE_CHUNK as u64).min(quota) as usize;
            available = source.read(&mut input[.. wanted])?;
            position = 0;
            if available == 0 { break; }
        }

        let step = engine.feed(&input[position .. available], &mut work.bytes, false)?;
        work.filled = step.produced;

        position += step.consumed;
        quota = quota.saturating_sub(step.consumed as u64);

        if step.end {
            work.drain(sink, usize::MAX)?;
            return Ok(());
        }
    }

    if last_call && source.full_size() == 0 {
        loop {
            work.drain(sink, usize::MAX)?;

            let step = engine.feed(&[], &mut work.bytes, true)?;
            work.filled = step.produced;

            if step.end {
                work.drain(sink, usize::MAX)?;
                return Ok(());
            }
            if step.produced == 0 {
                return Err(Error::codec("compression context made no progress while finishing"));
            }
        }
    }

    Ok(())
}

/// The streaming decompression pump. The quota bounds *decoded* bytes;
/// staged output beyond it survives until the next call.
pub(crate) fn pump_decompress(
    work: &mut WorkBuffer,
    engine: &mut dyn IncrementalEngine,
    sink: &mut dyn OutputStream,
    source: &mut dyn InputStream,
    amount: u64,
) -> PassiveResult
{
    let consume_all = amount == 0;
    let mut quota = amount;

    let mut input = [0_u8; SOURCE_CHUNK];
    let mut available = 0_usize;
    let mut position = 0_usize;

    loop {
        // flush staged output first, bounded by the remaining quota
        if consume_all {
            work.drain(sink, usize::MAX)?;
        }
        else {
            quota -= work.drain(sink, quota.min(usize::MAX as u64) as usize)? as u64;
            if quota == 0 { return Ok(()); }
        }

        if position == available {
            available = source.read(&mut input)?;
            position = 0;
            if available == 0 { break; }
        }

        let step = engine.feed(&input[position .. available], &mut work.bytes, false)?;
        work.filled = step.produced;
        position += step.consumed;

        if step.end {
            if consume_all { work.drain(sink, usize::MAX)?; }
            else { work.drain(sink, quota.min(usize::MAX as u64) as usize)?; }
            return Ok(());
        }

        if step.consumed == 0 && step.produced == 0 {
            // the staging buffer was drained before the call, so a step
            // without any progress means the context is stuck
            return Err(Error::codec("decompression context made no progress"));
        }
    }

    // an empty source is the signal to flush whatever the context holds
    if source.full_size() == 0 {
        loop {
            if consume_all { work.drain(sink, usize::MAX)?; }
            else {
                quota -= work.drain(sink, quota.min(usize::MAX as u64) as usize)? as u64;
                if quota == 0 { return Ok(()); }
            }

            let step = engine.feed(&[], &mut work.bytes, true)?;
            work.filled = step.produced;

            if step.end {
                if consume_all { work.drain(sink, usize::MAX)?; }
                else { work.drain(sink, quota.min(usize::MAX as u64) as usize)?; }
                return Ok(());
            }
            if step.produced == 0 {
                return Err(Error::codec("decompression context made no progress while finishing"));
            }
        }
    }

    Ok(())
}
