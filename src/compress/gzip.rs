
//! GZip compression, RFC 1952.
//!
//! GZip is made to store files: a raw deflate body framed by a member
//! header that can carry the source filename and modification time, and a
//! trailer with the crc32 and the decoded size modulo 2^32. Because the
//! decoded size field is four bytes, a single member cannot describe more
//! than 4 GiB of data at once.
//!
//! When reusing the same compressor for several files, call `reset`
//! between them to prepare a fresh member.

use crate::error::{Error, Result, PassiveResult};
use crate::stream::{InputStream, OutputStream};
use flate2::{Compress, Crc, Decompress, FlushCompress, FlushDecompress, Status};
use lebe::prelude::*;
use smallvec::SmallVec;

use super::{
    CodecError, Compressor, Feed, IncrementalEngine, WorkBuffer,
    factor_to_strength, pump_compress, pump_decompress,
};
use super::zlib::{compress_bound, compression_level};


const MAGIC: [u8; 2] = [0x1F, 0x8B];
const METHOD_DEFLATED: u8 = 8;

// header flag bits
const FLAG_TEXT: u8 = 1;
const FLAG_HEADER_CRC: u8 = 2;
const FLAG_EXTRA: u8 = 4;
const FLAG_NAME: u8 = 8;
const FLAG_COMMENT: u8 = 16;
const FLAG_RESERVED: u8 = 0xE0;

// extra-flags byte, derived from the compression strength
const XFL_SLOW: u8 = 2;
const XFL_FAST: u8 = 4;

const TRAILER_SIZE: usize = 8;


fn assemble_header(file_name: &str, modif_time: f64, strength: i32) -> SmallVec<[u8; 64]> {
    let mut header = SmallVec::<[u8; 64]>::new();
    header.extend_from_slice(&MAGIC);
    header.push(METHOD_DEFLATED);
    header.push(if file_name.is_empty() { 0 } else { FLAG_NAME });

    // seconds since epoch, truncated to whole seconds
    header.write_as_little_endian(&(modif_time as u32)).expect("in-memory write failed");

    header.push(match strength { 1 => XFL_FAST, 9 => XFL_SLOW, _ => 0 });
    header.push(255); // unknown operating system

    if !file_name.is_empty() {
        header.extend_from_slice(file_name.as_bytes());
        header.push(0);
    }

    header
}

/// Parsed member header: total byte length, filename, modification time.
/// `None` means more bytes are needed.
fn parse_header(bytes: &[u8]) -> Result<Option<(usize, String, u32)>> {
    if bytes.len() < 10 { return Ok(None); }

    if bytes[0 .. 2] != MAGIC || bytes[2] != METHOD_DEFLATED {
        return Err(Error::codec("not a gzip stream"));
    }

    let flags = bytes[3];
    if flags & (FLAG_TEXT | FLAG_HEADER_CRC | FLAG_RESERVED) != 0 {
        return Err(Error::codec("unsupported gzip header flags"));
    }

    let modif_time = u32::read_from_little_endian(&mut &bytes[4 .. 8])
        .expect("in-memory read failed");

    // bytes 8 and 9 are the extra flags and the operating system
    let mut position = 10;

    if flags & FLAG_EXTRA != 0 {
        if bytes.len() < position + 2 { return Ok(None); }
        let length = u16::read_from_little_endian(&mut &bytes[position .. position + 2])
            .expect("in-memory read failed") as usize;
        position += 2;
        if bytes.len() < position + length { return Ok(None); }
        position += length;
    }

    let mut file_name = String::new();
    if flags & FLAG_NAME != 0 {
        match bytes[position ..].iter().position(|&byte| byte == 0) {
            None => return Ok(None),
            Some(length) => {
                file_name = String::from_utf8_lossy(&bytes[position .. position + length]).into_owned();
                position += length + 1;
            },
        }
    }

    if flags & FLAG_COMMENT != 0 {
        match bytes[position ..].iter().position(|&byte| byte == 0) {
            None => return Ok(None),
            Some(length) => position += length + 1,
        }
    }

    Ok(Some((position, file_name, modif_time)))
}


/// Compression half of the incremental engine: header, raw deflate body,
/// crc32/size trailer.
struct Deflater {
    context: Compress,
    crc: Crc,
    /// Header or trailer bytes waiting for room in the output buffer.
    pending: SmallVec<[u8; 64]>,
    header_emitted: bool,
    trailer_emitted: bool,
}

/// Decompression half: header parse, raw inflate, trailer check.
struct Inflater {
    context: Decompress,
    crc: Crc,
    stage: Stage,
    /// Input is staged here so state transitions never lose bytes.
    staged: Vec<u8>,
    file_name: String,
    modif_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage { Header, Body, Trailer, Done }

enum Direction {
    Compressing(Deflater),
    Decompressing(Inflater),
}

struct Engine {
    direction: Direction,
    last_error: CodecError,
}

impl Engine {
    fn is_decompressing(&self) -> bool {
        matches!(self.direction, Direction::Decompressing(_))
    }

    /// Whether the compression side already emitted its trailer. A new
    /// member needs a fresh context then.
    fn finished_compressing(&self) -> bool {
        match &self.direction {
            Direction::Compressing(deflater) => deflater.trailer_emitted,
            Direction::Decompressing(_) => false,
        }
    }
}

impl IncrementalEngine for Engine {
    fn feed(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<Feed> {
        match &mut self.direction {
            Direction::Compressing(deflater) => {
                let result = deflater.feed(input, output, finish);
                self.last_error = match &result {
                    Ok(step) if step.end => CodecError::EndOfStream,
                    Ok(_) => CodecError::Success,
                    Err(_) => CodecError::StreamError,
                };
                result
            },

            Direction::Decompressing(inflater) => {
                let result = inflater.feed(input, output, finish);
                self.last_error = match &result {
                    Ok(step) if step.end => CodecError::EndOfStream,
                    Ok(_) => CodecError::Success,
                    Err(_) => CodecError::DataError,
                };
                result
            },
        }
    }
}

impl Deflater {
    fn new(strength: i32, file_name: &str, modif_time: f64) -> Self {
        Deflater {
            context: Compress::new(compression_level(strength), false),
            crc: Crc::new(),
            pending: assemble_header(file_name, modif_time, strength),
            header_emitted: false,
            trailer_emitted: false,
        }
    }

    fn feed(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<Feed> {
        let mut written = self.drain_pending(output, 0);
        self.header_emitted = self.header_emitted || self.pending.is_empty();

        if self.trailer_emitted {
            return Ok(Feed { consumed: input.len(), produced: written, end: self.pending.is_empty() });
        }
        if !self.header_emitted {
            // no room for the body before the header is out
            return Ok(Feed { consumed: 0, produced: written, end: false });
        }

        let (input_before, output_before) = (self.context.total_in(), self.context.total_out());
        let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };

        let status = self.context.compress(input, &mut output[written ..], flush)
            .map_err(|error| Error::codec(format!("deflate failed: {}", error)))?;

        let consumed = (self.context.total_in() - input_before) as usize;
        written += (self.context.total_out() - output_before) as usize;
        self.crc.update(&input[.. consumed]);

        if status == Status::StreamEnd {
            self.pending.write_as_little_endian(&self.crc.sum()).expect("in-memory write failed");
            self.pending.write_as_little_endian(&self.crc.amount()).expect("in-memory write failed");
            self.trailer_emitted = true;
            written = self.drain_pending(output, written);
        }

        Ok(Feed {
            consumed,
            produced: written,
            end: self.trailer_emitted && self.pending.is_empty(),
        })
    }

    fn drain_pending(&mut self, output: &mut [u8], position: usize) -> usize {
        let count = self.pending.len().min(output.len() - position);
        output[position .. position + count].copy_from_slice(&self.pending[.. count]);
        self.pending.drain(.. count);
        position + count
    }
}

impl Inflater {
    fn new() -> Self {
        Inflater {
            context: Decompress::new(false),
            crc: Crc::new(),
            stage: Stage::Header,
            staged: Vec::new(),
            file_name: String::new(),
            modif_time: 0,
        }
    }

    fn feed(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<Feed> {
        self.staged.extend_from_slice(input);
        let mut written = 0_usize;

        loop {
            match self.stage {
                Stage::Header => {
                    match parse_header(&self.staged)? {
                        None if finish => return Err(Error::codec("truncated gzip header")),
                        None => break,
                        Some((length, file_name, modif_time)) => {
                            self.staged.drain(.. length);
                            self.file_name = file_name;
                            self.modif_time = modif_time;
                            self.stage = Stage::Body;
                        },
                    }
                },

                Stage::Body => {
                    if self.staged.is_empty() && !finish { break; }

                    let (input_before, output_before) = (self.context.total_in(), self.context.total_out());
                    let flush = if finish { FlushDecompress::Finish } else { FlushDecompress::None };

                    let status = self.context.decompress(&self.staged, &mut output[written ..], flush)
                        .map_err(|error| Error::codec(format!("inflate failed: {}", error)))?;

                    let consumed = (self.context.total_in() - input_before) as usize;
                    let produced = (self.context.total_out() - output_before) as usize;
                    self.staged.drain(.. consumed);
                    self.crc.update(&output[written .. written + produced]);
                    written += produced;

                    match status {
                        Status::StreamEnd => self.stage = Stage::Trailer,
                        _ if written == output.len() => break,
                        _ if consumed == 0 && produced == 0 => {
                            if finish { return Err(Error::codec("truncated gzip body")); }
                            break;
                        },
                        _ => {},
                    }
                },

                Stage::Trailer => {
                    if self.staged.len() < TRAILER_SIZE {
                        if finish { return Err(Error::codec("truncated gzip trailer")); }
                        break;
                    }

                    let mut trailer = &self.staged[.. TRAILER_SIZE];
                    let stored_crc = u32::read_from_little_endian(&mut trailer).expect("in-memory read failed");
                    let stored_size = u32::read_from_little_endian(&mut trailer).expect("in-memory read failed");
                    self.staged.drain(.. TRAILER_SIZE);

                    if stored_crc != self.crc.sum() || stored_size != self.crc.amount() {
                        return Err(Error::codec("gzip checksum mismatch"));
                    }

                    self.stage = Stage::Done;
                },

                Stage::Done => {
                    // bytes after the member are swallowed
                    self.staged.clear();
                    break;
                },
            }
        }

        Ok(Feed { consumed: input.len(), produced: written, end: self.stage == Stage::Done })
    }
}


/// The gzip (de)compressor.
///
/// Set specific file information with `set_file_source_info` before
/// compressing, and read it back with `file_name`/`file_time` after
/// decompressing.
pub struct GZip {
    strength: i32,
    engine: Engine,
    work: WorkBuffer,
    file_name: String,
    modif_time: f64,
    expected_file_size: u32,
}

impl GZip {

    pub fn new() -> Self {
        GZip {
            strength: -1,
            engine: Engine {
                direction: Direction::Compressing(Deflater::new(-1, "", 0.0)),
                last_error: CodecError::Success,
            },
            work: WorkBuffer::new(),
            file_name: String::new(),
            modif_time: 0.0,
            expected_file_size: 0,
        }
    }

    /// Set the filename and modification time stored in the member header.
    pub fn set_file_source_info(&mut self, file_name: impl Into<String>, modif_time: f64) {
        self.file_name = file_name.into();
        self.modif_time = modif_time;
        if let Direction::Compressing(_) = self.engine.direction {
            self.rebuild(true);
        }
    }

    /// The filename recovered from the last decompressed member (or the
    /// one configured for compression).
    pub fn file_name(&self) -> &str { &self.file_name }

    /// The modification time in seconds since the epoch.
    pub fn file_time(&self) -> f64 { self.modif_time }

    /// The decoded size announced by the trailer of the input handed to
    /// the sizing pass of `decompress_data`.
    pub fn expected_file_size(&self) -> u32 { self.expected_file_size }

    fn rebuild(&mut self, compressing: bool) {
        self.engine.direction = if compressing {
            Direction::Compressing(Deflater::new(self.strength, &self.file_name, self.modif_time))
        } else {
            Direction::Decompressing(Inflater::new())
        };
        self.work.clear();
    }

    fn capture_recovered_info(&mut self) {
        if let Direction::Decompressing(inflater) = &self.engine.direction {
            self.file_name = inflater.file_name.clone();
            self.modif_time = inflater.modif_time as f64;
        }
    }

    fn run_to_end(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.is_empty() {
            // probe an empty buffer with one byte of scratch, so that an
            // empty member still reaches its trailer check
            let mut probe = [0_u8; 1];
            return match self.run_feed(input, &mut probe)? {
                0 => Ok(0),
                _ => Err(Error::BufferTooSmall),
            };
        }

        self.run_feed(input, output)
    }

    fn run_feed(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut written = 0_usize;
        let mut read = 0_usize;

        loop {
            let step = self.engine.feed(&input[read ..], &mut output[written ..], true)?;
            read += step.consumed;
            written += step.produced;

            if step.end { return Ok(written); }
            if step.produced == 0 && step.consumed == 0 { return Err(Error::BufferTooSmall); }
        }
    }
}

impl Default for GZip {
    fn default() -> Self { GZip::new() }
}

impl std::fmt::Debug for GZip {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("GZip")
            .field("strength", &self.strength)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

impl Compressor for GZip {

    fn name(&self) -> &'static str { "gzip" }

    fn last_error(&self) -> CodecError { self.engine.last_error }

    fn set_compression_factor(&mut self, factor: f32) {
        self.strength = factor_to_strength(factor);
        self.reset(true);
    }

    fn reset(&mut self, compressing: bool) {
        self.expected_file_size = 0;
        self.rebuild(compressing);
    }

    fn compress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize> {
        let output = match output {
            None => {
                self.engine.last_error = CodecError::BufferError;
                let header = 10 + if self.file_name.is_empty() { 0 } else { self.file_name.len() + 1 };
                return Ok(header + compress_bound(input.len()) + TRAILER_SIZE);
            },
            Some(output) => output,
        };

        self.rebuild(true);
        let written = self.run_to_end(input, output);
        self.engine.last_error = match &written {
            Ok(_) => CodecError::Success,
            Err(_) => CodecError::BufferError,
        };
        written
    }

    fn decompress_data(&mut self, input: &[u8], output: Option<&mut [u8]>) -> Result<usize> {
        self.reset(false);

        // the trailer announces the decoded size in its last four bytes
        if input.len() >= 4 {
            let mut tail = &input[input.len() - 4 ..];
            self.expected_file_size = u32::read_from_little_endian(&mut tail)
                .expect("in-memory read failed");
        }

        let output = match output {
            None => {
                self.engine.last_error = CodecError::BufferError;
                return Ok(self.expected_file_size as usize);
            },
            Some(output) => output,
        };

        let written = self.run_to_end(input, output);
        self.capture_recovered_info();
        self.engine.last_error = match &written {
            Ok(_) => CodecError::Success,
            Err(_) => CodecError::DataError,
        };
        written
    }

    fn compress_stream(
        &mut self,
        sink: &mut dyn OutputStream,
        source: &mut dyn InputStream,
        amount: u64,
        last_call: bool,
    ) -> PassiveResult
    {
        if self.engine.is_decompressing() || self.engine.finished_compressing() {
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
        let outcome = pump_decompress(&mut self.work, &mut self.engine, sink, source, amount);
        self.capture_recovered_info();
        outcome
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::MemoryBlock;

    #[test]
    fn block_roundtrip_with_metadata(){
        let mut codec = GZip::new();
        codec.set_file_source_info("t.txt", 1_700_000_000.75);

        let packed = codec.compress_block(&MemoryBlock::from(&b"ABC"[..])).unwrap();
        assert_eq!(&packed.as_bytes()[.. 2], &MAGIC);

        let mut reader = GZip::new();
        let unpacked = reader.decompress_block(&packed).unwrap();
        assert_eq!(unpacked.as_bytes(), b"ABC");
        assert_eq!(reader.file_name(), "t.txt");
        assert_eq!(reader.file_time(), 1_700_000_000.0); // truncated to seconds
    }

    #[test]
    fn sizing_pass_reads_trailer_size(){
        let mut codec = GZip::new();
        let data = vec![0x5A_u8; 3000];
        let packed = codec.compress_block(&MemoryBlock::from(data)).unwrap();

        let mut reader = GZip::new();
        let expected = reader.decompress_data(packed.as_bytes(), None).unwrap();
        assert_eq!(expected, 3000);
        assert_eq!(reader.expected_file_size(), 3000);
        assert_eq!(reader.last_error(), CodecError::BufferError);
    }

    #[test]
    fn header_without_filename(){
        let mut codec = GZip::new();
        let packed = codec.compress_block(&MemoryBlock::from(&b"anonymous"[..])).unwrap();

        // flags byte must be clean when no name is configured
        assert_eq!(packed.as_bytes()[3], 0);

        let mut reader = GZip::new();
        let unpacked = reader.decompress_block(&packed).unwrap();
        assert_eq!(unpacked.as_bytes(), b"anonymous");
        assert_eq!(reader.file_name(), "");
    }

    #[test]
    fn corrupted_checksum_is_rejected(){
        let mut codec = GZip::new();
        let packed = codec.compress_block(&MemoryBlock::from(&b"checked payload"[..])).unwrap();

        let mut broken = packed.as_bytes().to_vec();
        let length = broken.len();
        broken[length - 6] ^= 0xFF; // inside the stored crc

        let mut reader = GZip::new();
        assert!(reader.decompress_block(&MemoryBlock::from(broken)).is_err());
    }

    #[test]
    fn rejects_foreign_magic(){
        let mut reader = GZip::new();
        let mut output = [0_u8; 16];
        assert!(reader.decompress_data(b"PK\x03\x04 not gzip at all", Some(&mut output[..])).is_err());
    }

    #[test]
    fn parse_header_waits_for_more_bytes(){
        assert!(parse_header(&[0x1F]).unwrap().is_none());

        let complete = assemble_header("name.bin", 77.0, 9);
        assert!(parse_header(&complete[.. complete.len() - 1]).unwrap().is_none());

        let (length, name, time) = parse_header(&complete).unwrap().unwrap();
        assert_eq!(length, complete.len());
        assert_eq!(name, "name.bin");
        assert_eq!(time, 77);
    }
}
