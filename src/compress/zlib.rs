
//! ZLib compression, RFC 1950.
//!
//! ZLib frames a deflate body with a two-byte header and an adler32
//! trailer. It is made to compress streams, not files: it is a bit lighter
//! than GZip when the source filename and modification time do not need to
//! be stored. The [`HEADERLESS`](super::HEADERLESS) factor selects the raw
//! deflate stream without any framing.

use crate::error::{Error, Result, PassiveResult};
use crate::stream::{InputStream, OutputStream};
use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status, Compression};

use super::{
    CodecError, Compressor, Feed, IncrementalEngine, WorkBuffer,
    factor_to_strength, pump_compress, pump_decompress, HEADERLESS, WORK_BUFFER_SIZE,
};


/// The worst-case compressed size for `length` input bytes.
pub(crate) fn compress_bound(length: usize) -> usize {
    length + length / 1000 + 1 + 12
}

pub(crate) fn compression_level(strength: i32) -> Compression {
    if strength < 0 { Compression::default() }
    else { Compression::new(strength.clamp(0, 9) as u32) }
}


/// The direction-tagged deflate context.
enum Context {
    Deflate(Compress),
    Inflate(Decompress),
}

/// The incremental zlib engine: one resettable context plus the position
/// snapshots needed to report per-call byte counts.
struct Engine {
    context: Context,
    finished: bool,
    last_error: CodecError,
}

impl Engine {
    fn is_decompressing(&self) -> bool {
        matches!(self.context, Context::Inflate(_))
    }
}

impl IncrementalEngine for Engine {
    fn feed(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<Feed> {
        if self.finished {
            return Ok(Feed { consumed: input.len(), produced: 0, end: true });
        }

        match &mut self.context {
            Context::Deflate(context) => {
                let (input_before, output_before) = (context.total_in(), context.total_out());
                let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };

                let status = context.compress(input, output, flush).map_err(|error| {
                    self.last_error = CodecError::StreamError;
                    Error::codec(format!("deflate failed: {}", error))
                })?;

                let end = status == Status::StreamEnd;
                if end { self.finished = true; }
                self.last_error = if end { CodecError::EndOfStream } else { CodecError::Success };

                Ok(Feed {
                    consumed: (context.total_in() - input_before) as usize,
                    produced: (context.total_out() - output_before) as usize,
                    end,
                })
            },

            Context::Inflate(context) => {
                let (input_before, output_before) = (context.total_in(), context.total_out());
                let flush = if finish { FlushDecompress::Finish } else { FlushDecompress::None };

                let status = context.decompress(input, output, flush).map_err(|error| {
                    self.last_error = CodecError::DataError;
                    Error::codec(format!("inflate failed: {}", error))
                })?;

                let end = status == Status::StreamEnd;
                if end { self.finished = true; }
                self.last_error = if end { CodecError::EndOfStream } else { CodecError::Success };

                Ok(Feed {
                    consumed: (context.total_in() - input_before) as usize,
                    produced: (context.total_out() - output_before) as usize,
                    end,
                })
            },
        }
    }
}


/// The zlib (de)compressor.
///
/// Set the strength with `set_compression_factor` and fetch the status of
/// the last operation with `last_error`. The streaming side keeps an
/// incremental context between calls; call `reset` before reusing the
/// instance for another stream.
pub struct ZLib {
    strength: i32,
    with_header: bool,
    engine: Engine,
    work: WorkBuffer,
}

impl ZLib {

    pub fn new() -> Self {
        ZLib {
            strength: -1,
            with_header: true,
            engine: Engine {
                context: Context::Deflate(Compress::new(Compression::default(), true)),
                finished: false,
                last_error: CodecError::Success,
            },
            work: WorkBuffer::new(),
        }
    }

    fn rebuild(&mut self, compressing: bool) {
        self.engine.context = if compressing {
            Context::Deflate(Compress::new(compression_level(self.strength), self.with_header))
        } else {
            Context::Inflate(Decompress::new(self.with_header))
        };
        self.engine.finished = false;
        self.work.clear();
    }
}

impl Default for ZLib {
    fn default() -> Self { ZLib::new() }
}

impl std::fmt::Debug for ZLib {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("ZLib")
            .field("strength", &self.strength)
            .field("with_header", &self.with_header)
            .finish_non_exhaustive()
    }
}

impl Compressor for ZLib {

    fn name(&self) -> &'static str { "zlib" }

    fn last_error(&self) -> CodecError { self.engine.last_error }

    fn set_compression_factor(&mut self, factor: f32) {
        self.strength = factor_to_strength(factor);
        self.with_header = factor != HEADERLESS;
        self.rebuild(true);
    }

    fn reset(&mut self, compressing: bool) {
        if self.engine.is_decompressing() == compressing || self.engine.finished {
            self.rebuild(compressing);
        }
    }

    fn compress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize> {
        let output = match output {
            None => {
                // the sizing pass of the two-call protocol
                self.engine.last_error = CodecError::BufferError;
                return Ok(compress_bound(input.len()));
            },
            Some(output) => output,
        };

        // one-shot contexts stay independent of the streaming state
        let mut context = Compress::new(compression_level(self.strength), self.with_header);
        let mut read = 0_usize;
        let mut written = 0_usize;

        loop {
            let status = context
                .compress(&input[read ..], &mut output[written ..], FlushCompress::Finish)
                .map_err(|error| {
                    self.engine.last_error = CodecError::StreamError;
                    Error::codec(format!("deflate failed: {}", error))
                })?;

            let read_now = context.total_in() as usize;
            let written_now = context.total_out() as usize;
            let progressed = read_now != read || written_now != written;
            read = read_now;
            written = written_now;

            match status {
                Status::StreamEnd => {
                    self.engine.last_error = CodecError::Success;
                    return Ok(written);
                },
                Status::Ok if progressed => continue,
                _ => {
                    self.engine.last_error = CodecError::BufferError;
                    return Err(Error::BufferTooSmall);
                },
            }
        }
    }

    fn decompress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize> {
        match output {
            None => {
                // sizing pass: a counting inflate into scratch space
                let mut context = Decompress::new(self.with_header);
                let mut scratch = vec![0_u8; WORK_BUFFER_SIZE];
                let mut read = 0_usize;
                let mut written = 0_usize;

                loop {
                    let status = context
                        .decompress(&input[read ..], &mut scratch, FlushDecompress::Finish)
                        .map_err(|error| {
                            self.engine.last_error = CodecError::DataError;
                            Error::codec(format!("inflate failed: {}", error))
                        })?;

                    let read_now = context.total_in() as usize;
                    let written_now = context.total_out() as usize;
                    let progressed = read_now != read || written_now != written;
                    read = read_now;
                    written = written_now;

                    match status {
                        Status::StreamEnd => {
                            self.engine.last_error = CodecError::BufferError;
                            return Ok(written);
                        },
                        _ if progressed => continue,
                        _ => {
                            self.engine.last_error = CodecError::DataError;
                            return Err(Error::codec("truncated zlib stream"));
                        },
                    }
                }
            },

            Some(output) => {
                let mut context = Decompress::new(self.with_header);
                let mut read = 0_usize;
                let mut written = 0_usize;

                loop {
                    let status = context
                        .decompress(&input[read ..], &mut output[written ..], FlushDecompress::Finish)
                        .map_err(|error| {
                            self.engine.last_error = CodecError::DataError;
                            Error::codec(format!("inflate failed: {}", error))
                        })?;

                    let read_now = context.total_in() as usize;
                    let written_now = context.total_out() as usize;
                    let progressed = read_now != read || written_now != written;
                    read = read_now;
                    written = written_now;

                    match status {
                        Status::StreamEnd => {
                            self.engine.last_error = CodecError::Success;
                            return Ok(written);
                        },
                        _ if written == output.len() => {
                            self.engine.last_error = CodecError::BufferError;
                            return Err(Error::BufferTooSmall);
                        },
                        _ if !progressed => {
                            self.engine.last_error = CodecError::DataError;
                            return Err(Error::codec("truncated zlib stream"));
                        },
                        _ => continue,
                    }
                }
            },
        }
    }

    fn compress_stream(
        &mut self,
        sink: &mut dyn OutputStream,
        source: &mut dyn InputStream,
        amount: u64,
        last_call: bool,
    ) -> PassiveResult
    {
        if self.engine.is_decompressing() || self.engine.finished {
            self.rebuild(true);
        }
        pump_compress(&mut self.work, &mut self.engine, sink, source, amount, last_call)
    }

    fn decompress_stream(
        &mut self,
        sink: &mut dyn OutputStream,
        source: &mut dyn InputStream,
        amount: u64,
    ) -> PassiveResult
    {
        if !self.engine.is_decompressing() { self.rebuild(false); }
        pump_decompress(&mut self.work, &mut self.engine, sink, source, amount)
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::MemoryBlock;

    #[test]
    fn block_roundtrip_all_strengths(){
        let data: Vec<u8> = (0 .. 4096_u32).flat_map(|value| value.to_le_bytes()).collect();
        let block = MemoryBlock::from(data.clone());

        for strength in 0 ..= 9 {
            let mut codec = ZLib::new();
            codec.set_compression_factor(strength as f32 / 9.0);

            let packed = codec.compress_block(&block).unwrap();
            assert!(packed.len() < data.len());

            let unpacked = codec.decompress_block(&packed).unwrap();
            assert_eq!(unpacked.as_bytes(), &data[..]);
        }
    }

    #[test]
    fn sizing_pass_reports_buffer_error(){
        let mut codec = ZLib::new();
        let required = codec.compress_data(b"some bytes to pack", None).unwrap();
        assert!(required >= 18);
        assert_eq!(codec.last_error(), CodecError::BufferError);
    }

    #[test]
    fn undersized_output_fails(){
        let mut codec = ZLib::new();
        let data = vec![7_u8; 1024];
        let packed = codec.compress_block(&MemoryBlock::from(data)).unwrap();

        let mut tiny = [0_u8; 4];
        assert_eq!(
            codec.decompress_data(packed.as_bytes(), Some(&mut tiny[..])),
            Err(Error::BufferTooSmall),
        );
    }

    #[test]
    fn headerless_roundtrip(){
        let mut codec = ZLib::new();
        codec.set_compression_factor(HEADERLESS);

        let block = MemoryBlock::from(&b"raw deflate, no framing at all"[..]);
        let packed = codec.compress_block(&block).unwrap();

        // raw deflate must not start with the usual 0x78 zlib marker
        assert_ne!(packed.as_bytes()[0], 0x78);

        let unpacked = codec.decompress_block(&packed).unwrap();
        assert_eq!(unpacked, block);
    }

    #[test]
    fn corrupted_data_is_rejected(){
        let mut codec = ZLib::new();
        let packed = codec.compress_block(&MemoryBlock::from(&b"payload"[..])).unwrap();

        let mut broken = packed.as_bytes().to_vec();
        let middle = broken.len() / 2;
        broken[middle] ^= 0xFF;
        broken[0] ^= 0xFF;

        let mut output = [0_u8; 64];
        assert!(codec.decompress_data(&broken, Some(&mut output[..])).is_err());
    }
}
