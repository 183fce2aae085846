
//! The concrete sources and sinks: files, strings, memory regions, the
//! process input, plus the null, tee, range and concatenation utilities.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use super::{BaseStream, InputStream, OutputStream, SIZE_UNKNOWN};


// ------------------------------------------------------------------ files

/// A file-based input stream. The size is captured when the file is
/// opened.
#[derive(Debug)]
pub struct InputFileStream {
    file: File,
    file_size: u64,
    position: u64,
}

impl InputFileStream {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(InputFileStream { file, file_size, position: 0 })
    }
}

impl BaseStream for InputFileStream {
    fn full_size(&self) -> u64 { self.file_size }
    fn end_reached(&self) -> bool { self.position >= self.file_size }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        match self.file.seek(SeekFrom::Start(position)) {
            Ok(reached) => { self.position = reached; true },
            Err(_) => false,
        }
    }
}

impl InputStream for InputFileStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if buffer.is_empty() { return Ok(0); }
        let count = self.file.read(buffer)?;
        self.position += count as u64;
        Ok(count)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        self.set_position(self.position + amount)
    }
}


/// A file-based output stream. Seeking past the end grows the file.
#[derive(Debug)]
pub struct OutputFileStream {
    path: PathBuf,
    file: Option<File>,
    file_size: u64,
    position: u64,
}

impl OutputFileStream {

    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut stream = Self::delayed(path);
        stream.open_file()?;
        Ok(stream)
    }

    /// Delay creating the file until the first write.
    pub fn delayed(path: impl AsRef<Path>) -> Self {
        OutputFileStream { path: path.as_ref().to_owned(), file: None, file_size: 0, position: 0 }
    }

    fn open_file(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            self.file = Some(File::create(&self.path)?);
            self.file_size = 0;
            self.position = 0;
        }
        Ok(self.file.as_mut().expect("just opened"))
    }
}

impl BaseStream for OutputFileStream {
    fn full_size(&self) -> u64 { self.file_size }
    fn end_reached(&self) -> bool { self.position == self.file_size }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return false,
        };

        if position > self.file_size {
            // seeking past the end grows the file
            if file.set_len(position).is_err() { return false; }
            self.file_size = position;
        }

        match file.seek(SeekFrom::Start(position)) {
            Ok(reached) => { self.position = reached; true },
            Err(_) => false,
        }
    }
}

impl OutputStream for OutputFileStream {
    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        if buffer.is_empty() { return Ok(0); }
        self.open_file()?;

        let position = self.position;
        let file = self.file.as_mut().expect("opened above");
        let written = file.write(buffer)?;
        file.flush()?;

        self.position = position + written as u64;
        self.file_size = self.file_size.max(self.position);
        Ok(written)
    }
}


// ---------------------------------------------------------------- strings

/// A string-based input stream.
#[derive(Debug, Clone)]
pub struct InputStringStream {
    content: String,
    position: u64,
}

impl InputStringStream {
    pub fn new(content: impl Into<String>) -> Self {
        InputStringStream { content: content.into(), position: 0 }
    }

    /// Reset the content string and the position.
    pub fn reset_stream(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.position = 0;
    }
}

impl BaseStream for InputStringStream {
    fn full_size(&self) -> u64 { self.content.len() as u64 }
    fn end_reached(&self) -> bool { self.position >= self.content.len() as u64 }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position <= self.content.len() as u64 { self.position = position; true }
        else { false }
    }
}

impl InputStream for InputStringStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let bytes = self.content.as_bytes();
        let position = self.position as usize;
        let count = buffer.len().min(bytes.len().saturating_sub(position));
        buffer[.. count].copy_from_slice(&bytes[position .. position + count]);
        self.position += count as u64;
        Ok(count)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        self.set_position(self.position + amount)
    }

    fn map_bytes(&self) -> Option<&[u8]> {
        Some(self.content.as_bytes())
    }
}


/// A string-based output stream over a borrowed string. Writing into the
/// middle overwrites; writing past the current length extends.
///
/// Only whole UTF-8 sequences can be spliced, because the backing store
/// is a real string.
#[derive(Debug)]
pub struct OutputStringStream<'content> {
    content: &'content mut String,
    position: u64,
}

impl<'content> OutputStringStream<'content> {
    pub fn new(content: &'content mut String) -> Self {
        OutputStringStream { content, position: 0 }
    }
}

impl BaseStream for OutputStringStream<'_> {
    fn full_size(&self) -> u64 { self.content.len() as u64 }
    fn end_reached(&self) -> bool { self.position >= self.content.len() as u64 }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position <= self.content.len() as u64 { self.position = position; true }
        else { false }
    }
}

impl OutputStream for OutputStringStream<'_> {
    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        if buffer.is_empty() { return Ok(0); }

        let text = std::str::from_utf8(buffer)
            .map_err(|_| Error::io("string streams only accept utf-8"))?;
        let position = self.position as usize;

        if position == self.content.len() {
            self.content.push_str(text);
        }
        else {
            let end = (position + text.len()).min(self.content.len());
            if !self.content.is_char_boundary(position) || !self.content.is_char_boundary(end) {
                return Err(Error::io("write would split a character"));
            }

            if position + text.len() >= self.content.len() {
                self.content.replace_range(position .., text);
            }
            else {
                self.content.replace_range(position .. end, text);
            }
        }

        self.position += text.len() as u64;
        Ok(text.len())
    }
}


// ----------------------------------------------------------------- memory

/// An input stream over a contiguous memory region, borrowed in the
/// common case and owned when produced by
/// [`clone_stream`](super::clone_stream).
#[derive(Debug, Clone)]
pub struct MemoryBlockStream<'region> {
    data: Cow<'region, [u8]>,
    position: u64,
}

impl<'region> MemoryBlockStream<'region> {
    /// View a borrowed region; nothing is copied.
    pub fn new(data: &'region [u8]) -> Self {
        MemoryBlockStream { data: Cow::Borrowed(data), position: 0 }
    }
}

impl MemoryBlockStream<'static> {
    /// Own the backing bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        MemoryBlockStream { data: Cow::Owned(data), position: 0 }
    }
}

impl BaseStream for MemoryBlockStream<'_> {
    fn full_size(&self) -> u64 { self.data.len() as u64 }
    fn end_reached(&self) -> bool { self.position >= self.data.len() as u64 }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position < self.data.len() as u64 { self.position = position; true }
        else { false }
    }
}

impl InputStream for MemoryBlockStream<'_> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let position = self.position as usize;
        let count = buffer.len().min(self.data.len().saturating_sub(position));
        buffer[.. count].copy_from_slice(&self.data[position .. position + count]);
        self.position += count as u64;
        Ok(count)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if self.position + amount > self.data.len() as u64 { return false; }
        self.position += amount;
        true
    }

    fn map_bytes(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}


/// An output stream over a fixed, borrowed memory region. Writes beyond
/// the region are clamped, so a short count signals a full region.
#[derive(Debug)]
pub struct MemoryBlockOutStream<'region> {
    buffer: &'region mut [u8],
    position: u64,
}

impl<'region> MemoryBlockOutStream<'region> {
    pub fn new(buffer: &'region mut [u8]) -> Self {
        MemoryBlockOutStream { buffer, position: 0 }
    }

    pub fn written(&self) -> &[u8] {
        &self.buffer[.. self.position as usize]
    }
}

impl BaseStream for MemoryBlockOutStream<'_> {
    fn full_size(&self) -> u64 { self.buffer.len() as u64 }
    fn end_reached(&self) -> bool { self.position == self.buffer.len() as u64 }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position <= self.buffer.len() as u64 { self.position = position; true }
        else { false }
    }
}

impl OutputStream for MemoryBlockOutStream<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() { return Ok(0); }

        let position = self.position as usize;
        let count = bytes.len().min(self.buffer.len() - position);
        self.buffer[position .. position + count].copy_from_slice(&bytes[.. count]);
        self.position += count as u64;
        Ok(count)
    }
}


/// An output stream that fills a growing [`MemoryBlock`] underneath.
#[derive(Debug, Default)]
pub struct OutputMemStream {
    content: MemoryBlock,
    position: u64,
}

impl OutputMemStream {

    pub fn new() -> Self {
        OutputMemStream { content: MemoryBlock::new(), position: 0 }
    }

    pub fn with_capacity(start_size: usize) -> Self {
        OutputMemStream { content: MemoryBlock::with_size(start_size), position: 0 }
    }

    /// The collected bytes.
    pub fn block(&self) -> &MemoryBlock { &self.content }

    pub fn into_block(self) -> MemoryBlock { self.content }
}

impl BaseStream for OutputMemStream {
    fn full_size(&self) -> u64 { self.content.len() as u64 }
    fn end_reached(&self) -> bool { self.position == self.content.len() as u64 }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position <= self.content.len() as u64 { self.position = position; true }
        else { false }
    }
}

impl OutputStream for OutputMemStream {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        // a single block never describes more than 4 GiB
        if self.position + bytes.len() as u64 > 0xFFFF_FFFF { return Ok(0); }

        let position = self.position as usize;
        let needed = position + bytes.len();
        if needed > self.content.len() {
            self.content.grow(needed - self.content.len());
        }

        self.content.as_bytes_mut()[position .. needed].copy_from_slice(bytes);
        self.position += bytes.len() as u64;
        Ok(bytes.len())
    }
}


// ------------------------------------------------------- stdin, null, tee

/// An input stream reading the standard input of the process. The same
/// limitations as stdin apply: the position only moves forward, and
/// seeking always fails.
#[derive(Debug)]
pub struct StdInStream {
    stdin: std::io::Stdin,
    position: u64,
    at_end: bool,
}

impl StdInStream {
    pub fn new() -> Self {
        StdInStream { stdin: std::io::stdin(), position: 0, at_end: false }
    }
}

impl Default for StdInStream {
    fn default() -> Self { StdInStream::new() }
}

impl BaseStream for StdInStream {
    fn full_size(&self) -> u64 { SIZE_UNKNOWN }
    fn end_reached(&self) -> bool { self.at_end }
    fn current_position(&self) -> u64 { self.position }
    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl InputStream for StdInStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let count = self.stdin.lock().read(buffer)?;
        if count == 0 && !buffer.is_empty() { self.at_end = true; }
        self.position += count as u64;
        Ok(count)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        let mut byte = [0_u8; 1];
        for _ in 0 .. amount {
            match self.read(&mut byte) {
                Ok(1) => {},
                _ => return false,
            }
        }
        true
    }
}


/// A sink that discards everything but tracks the amount written. Useful
/// for testing, or for measuring a pipeline's output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutputStream {
    size: u64,
}

impl NullOutputStream {
    pub fn new() -> Self { NullOutputStream { size: 0 } }
}

impl BaseStream for NullOutputStream {
    fn full_size(&self) -> u64 { self.size }
    fn end_reached(&self) -> bool { false }
    fn current_position(&self) -> u64 { self.size }
    fn set_position(&mut self, position: u64) -> bool { self.size = position; true }
}

impl OutputStream for NullOutputStream {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.size += bytes.len() as u64;
        Ok(bytes.len())
    }
}


/// A sink that duplicates every operation onto two sinks.
///
/// The first stream is the master: when the second one accepts fewer
/// bytes, the master is rewound to the shorter count so both stay
/// aligned. Put a stream that does not track its position second.
#[derive(Debug)]
pub struct TeeStream<One: OutputStream, Two: OutputStream> {
    one: One,
    two: Two,
}

impl<One: OutputStream, Two: OutputStream> TeeStream<One, Two> {
    pub fn new(one: One, two: Two) -> Self {
        TeeStream { one, two }
    }

    pub fn into_inner(self) -> (One, Two) {
        (self.one, self.two)
    }
}

impl<One: OutputStream, Two: OutputStream> BaseStream for TeeStream<One, Two> {
    fn full_size(&self) -> u64 { self.one.full_size().min(self.two.full_size()) }
    fn end_reached(&self) -> bool { self.one.end_reached() || self.two.end_reached() }
    fn current_position(&self) -> u64 { self.one.current_position() }

    fn set_position(&mut self, position: u64) -> bool {
        if !self.one.set_position(position) { return false; }
        if !self.two.set_position(position) {
            // re-align the master with wherever the second one is stuck
            self.one.set_position(self.two.current_position());
            return false;
        }
        true
    }
}

impl<One: OutputStream, Two: OutputStream> OutputStream for TeeStream<One, Two> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let first = self.one.write(bytes)?;
        let second = self.two.write(&bytes[.. first])?;

        if second != first {
            let position = self.one.current_position();
            self.one.set_position(position - (first - second) as u64);
        }
        Ok(second)
    }
}


// ------------------------------------------------------- range, successive

/// A range limited input stream: a sub-range `[start, stop)` of another
/// input stream, with range-relative positions. Useful when one stream
/// contains several parts at known offsets.
#[derive(Debug)]
pub struct RangeInputStream<Inner: InputStream> {
    inner: Inner,
    start: u64,
    stop: u64,
}

impl<Inner: InputStream> RangeInputStream<Inner> {
    /// Limit `inner` to `[start, stop)`, seeking to `start` right away.
    pub fn new(mut inner: Inner, start: u64, stop: u64) -> Self {
        inner.set_position(start);
        RangeInputStream { inner, start, stop }
    }
}

impl<Inner: InputStream> BaseStream for RangeInputStream<Inner> {
    fn full_size(&self) -> u64 {
        if self.start > self.inner.full_size() { return 0; }
        self.stop.min(self.inner.full_size()) - self.start
    }

    fn end_reached(&self) -> bool {
        self.inner.end_reached() || self.inner.current_position() >= self.stop
    }

    fn current_position(&self) -> u64 {
        self.stop.min(self.inner.current_position().saturating_sub(self.start))
    }

    fn set_position(&mut self, position: u64) -> bool {
        if self.start + position < self.stop && self.start + position < self.inner.full_size() {
            self.inner.set_position(self.start + position)
        }
        else { false }
    }
}

impl<Inner: InputStream> InputStream for RangeInputStream<Inner> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let allowed = self.stop.saturating_sub(self.inner.current_position())
            .min(buffer.len() as u64) as usize;
        self.inner.read(&mut buffer[.. allowed])
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount + self.inner.current_position() > self.stop { return false; }
        self.inner.go_forward(amount)
    }
}


/// Two input streams read successively, appearing as a single stream.
/// The first stream is drained before the second one is started; reads
/// spanning the boundary are served from both without duplicating bytes.
#[derive(Debug)]
pub struct SuccessiveStream<One: InputStream, Two: InputStream> {
    one: One,
    two: Two,
    position: u64,
}

impl<One: InputStream, Two: InputStream> SuccessiveStream<One, Two> {
    pub fn new(one: One, two: Two) -> Self {
        SuccessiveStream { one, two, position: 0 }
    }

    pub fn first_stream(&mut self) -> &mut One { &mut self.one }
    pub fn second_stream(&mut self) -> &mut Two { &mut self.two }
}

impl<One: InputStream, Two: InputStream> BaseStream for SuccessiveStream<One, Two> {
    fn full_size(&self) -> u64 {
        self.one.full_size().saturating_add(self.two.full_size())
    }

    fn end_reached(&self) -> bool {
        if self.position < self.one.full_size() { false }
        else { self.two.end_reached() }
    }

    fn current_position(&self) -> u64 {
        if self.position < self.one.full_size() { self.position }
        else { self.position + self.two.current_position() }
    }

    fn set_position(&mut self, position: u64) -> bool {
        if position < self.one.full_size() {
            self.position = position;
            return self.one.set_position(position);
        }
        self.position = self.one.full_size();
        self.two.set_position(position - self.one.full_size())
    }
}

impl<One: InputStream, Two: InputStream> InputStream for SuccessiveStream<One, Two> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let from_first = self.one.full_size().saturating_sub(self.position)
            .min(buffer.len() as u64) as usize;

        let first_read = if from_first > 0 { self.one.read(&mut buffer[.. from_first])? } else { 0 };
        self.position += first_read as u64;
        if first_read != from_first { return Ok(first_read); }

        let second_read = if buffer.len() > from_first {
            self.two.read(&mut buffer[from_first ..])?
        } else { 0 };

        Ok(first_read + second_read)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount + self.position > self.one.full_size().saturating_add(self.two.full_size()) {
            return false;
        }

        let from_first = self.one.full_size().saturating_sub(self.position).min(amount);
        if from_first > 0 && !self.one.go_forward(from_first) { return false; }
        self.position += from_first;

        let remaining = amount - from_first;
        if remaining == 0 { return true; }
        self.two.go_forward(remaining)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_stream_bounds(){
        let data: Vec<u8> = (0 .. 32_u8).collect();
        let mut stream = MemoryBlockStream::new(&data);
        assert_eq!(stream.full_size(), 32);

        let mut chunk = [0_u8; 10];
        assert_eq!(stream.read(&mut chunk).unwrap(), 10);
        assert_eq!(stream.current_position(), 10);

        assert!(stream.go_forward(22));
        assert!(stream.end_reached());
        assert!(!stream.go_forward(1));

        assert!(stream.set_position(31));
        assert!(!stream.set_position(32)); // the end itself is not seekable

        // position stays clamped on a short read
        assert_eq!(stream.read(&mut chunk).unwrap(), 1);
        assert_eq!(stream.current_position(), 32);
    }

    #[test]
    fn output_mem_stream_grows(){
        let mut sink = OutputMemStream::new();
        assert_eq!(sink.write(b"hello").unwrap(), 5);
        assert_eq!(sink.write(b" world").unwrap(), 6);
        assert_eq!(sink.block().as_bytes(), b"hello world");

        // rewind and overwrite without growing
        assert!(sink.set_position(0));
        assert_eq!(sink.write(b"HELLO").unwrap(), 5);
        assert_eq!(sink.block().as_bytes(), b"HELLO world");
        assert_eq!(sink.full_size(), 11);
    }

    #[test]
    fn fixed_region_clamps_writes(){
        let mut region = [0_u8; 5];
        let mut sink = MemoryBlockOutStream::new(&mut region);
        assert_eq!(sink.write(b"0123456789").unwrap(), 5);
        assert_eq!(sink.write(b"x").unwrap(), 0);
        assert!(sink.end_reached());
        assert_eq!(sink.written(), b"01234");
    }

    #[test]
    fn null_stream_tracks_and_seeks(){
        let mut sink = NullOutputStream::new();
        assert_eq!(sink.write(&[0; 10]).unwrap(), 10);
        assert_eq!(sink.current_position(), 10);
        assert!(sink.set_position(5));
        assert_eq!(sink.current_position(), 5);
    }

    #[test]
    fn tee_rewinds_master_to_shorter_write(){
        // the seed scenario: ten bytes into a null sink and a five-byte
        // region leave both positions at five
        let mut region = [0_u8; 5];
        let mut tee = TeeStream::new(NullOutputStream::new(), MemoryBlockOutStream::new(&mut region));

        assert_eq!(tee.write(&[0xAB; 10]).unwrap(), 5);
        assert_eq!(tee.current_position(), 5);

        let (null, fixed) = tee.into_inner();
        assert_eq!(null.current_position(), 5);
        assert_eq!(fixed.current_position(), 5);
    }

    #[test]
    fn range_restricts_the_inner_stream(){
        let data: Vec<u8> = (0 .. 100_u8).collect();
        let mut range = RangeInputStream::new(MemoryBlockStream::new(&data), 10, 20);

        assert_eq!(range.full_size(), 10);
        assert_eq!(range.current_position(), 0);

        let mut chunk = [0_u8; 64];
        assert_eq!(range.read(&mut chunk).unwrap(), 10);
        assert_eq!(&chunk[.. 10], &data[10 .. 20]);
        assert!(range.end_reached());

        assert!(range.set_position(5));
        assert_eq!(range.current_position(), 5);
        assert!(!range.set_position(10));
        assert_eq!(range.read(&mut chunk[.. 3]).unwrap(), 3);
        assert_eq!(&chunk[.. 3], &data[15 .. 18]);
    }

    #[test]
    fn successive_spans_the_boundary(){
        let first: Vec<u8> = (0 .. 10_u8).collect();
        let second: Vec<u8> = (10 .. 30_u8).collect();
        let mut joined = SuccessiveStream::new(
            MemoryBlockStream::new(&first),
            MemoryBlockStream::new(&second));

        assert_eq!(joined.full_size(), 30);

        let mut chunk = [0_u8; 15];
        assert_eq!(joined.read(&mut chunk).unwrap(), 15);
        let expected: Vec<u8> = (0 .. 15_u8).collect();
        assert_eq!(&chunk[..], &expected[..]);

        assert!(joined.go_forward(5));
        let mut tail = [0_u8; 64];
        assert_eq!(joined.read(&mut tail).unwrap(), 10);
        assert_eq!(&tail[.. 10], &(20 .. 30_u8).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn string_streams_roundtrip(){
        let mut text = String::new();
        {
            let mut sink = OutputStringStream::new(&mut text);
            sink.write(b"hello world").unwrap();
            assert!(sink.set_position(6));
            sink.write(b"there").unwrap();
            sink.write(b"!").unwrap();
        }
        assert_eq!(text, "hello there!");

        let mut source = InputStringStream::new(text);
        let mut bytes = [0_u8; 64];
        let count = source.read(&mut bytes).unwrap();
        assert_eq!(&bytes[.. count], b"hello there!");
    }

    #[test]
    fn file_streams_roundtrip(){
        let path = std::env::temp_dir().join("bytepipe_file_stream_test.bin");

        {
            let mut sink = OutputFileStream::new(&path).unwrap();
            sink.write(b"0123456789").unwrap();

            // seeking past the end grows the file
            assert!(sink.set_position(16));
            sink.write(b"end").unwrap();
            assert_eq!(sink.full_size(), 19);
        }

        let mut source = InputFileStream::new(&path).unwrap();
        assert_eq!(source.full_size(), 19);

        let mut bytes = [0_u8; 32];
        let mut collected = Vec::new();
        loop {
            let count = source.read(&mut bytes).unwrap();
            if count == 0 { break; }
            collected.extend_from_slice(&bytes[.. count]);
        }

        assert_eq!(&collected[.. 10], b"0123456789");
        assert_eq!(&collected[16 ..], b"end");
        assert!(source.end_reached());

        std::fs::remove_file(&path).unwrap();
    }
}
