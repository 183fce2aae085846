
//! Manipulating data from different mediums is often easier when seen as a
//! generic stream.
//!
//! Sources and sinks live in [`source`], read-ahead and write-behind
//! adapters in [`buffer`], and the transforming nodes (base64, AES,
//! compression) in their own modules. A transformer is generic over its
//! inner stream: pass `&mut inner` to borrow it, or the stream by value to
//! hand over ownership (owned inners are released when the transformer is
//! dropped).
//!
//! For a more complete list of input streams:
//!  Type                         | Description
//!  -----------------------------|------------------------------------------------------------
//!  `RangeInputStream`           | A range limiter input stream
//!  `StdInStream`                | A stream based on the standard input of the process
//!  `LineBasedInputStream`       | A wrapper that allows reading an input stream line by line
//!  `InputFileStream`            | An input stream whose source is a file
//!  `InputStringStream`          | An input stream whose source is a string
//!  `MemoryBlockStream`          | An input stream made from a contiguous memory region
//!  `MemoryBufferedInputStream`  | A wrapper that slurps the whole inner stream for caching
//!  `SuccessiveStream`           | An input stream reading from two input streams successively
//!  `Base64InputStream`          | An input stream that decodes base64 data on the fly
//!  `AesInputStream`             | An input stream that decrypts AES-CFB data on the fly
//!  `BufferedInputStream`        | An input stream that reads the inner stream block by block
//!  `DecompressInputStream`      | An input stream that decompresses data on the fly
//!
//! For a more complete list of output streams:
//!  Type                         | Description
//!  -----------------------------|------------------------------------------------------------
//!  `OutputFileStream`           | An output stream that writes to a file
//!  `OutputStringStream`         | An output stream that fills a string
//!  `OutputMemStream`            | An output stream that fills a growing memory block
//!  `MemoryBlockOutStream`       | An output stream that fills a fixed memory region
//!  `MemoryBufferedOutputStream` | A wrapper that collects into a buffer, then writes through
//!  `NullOutputStream`           | An output stream that only tracks the amount written
//!  `TeeStream`                  | An output stream that duplicates its writes onto two sinks
//!  `Base64OutputStream`         | An output stream that encodes base64 on the fly
//!  `AesOutputStream`            | An output stream that encrypts AES-CFB data on the fly
//!  `CompressOutputStream`       | An output stream that compresses data on the fly
//!  `HeaderBodyStream`           | A header buffered in memory, the body written through

pub mod source;
pub mod buffer;
pub mod base64;
pub mod aes;
pub mod compress;

pub use source::{
    InputFileStream, OutputFileStream, InputStringStream, OutputStringStream,
    MemoryBlockStream, MemoryBlockOutStream, OutputMemStream, StdInStream,
    NullOutputStream, TeeStream, RangeInputStream, SuccessiveStream,
};
pub use buffer::{
    BufferedInputStream, MemoryBufferedInputStream, MemoryBufferedOutputStream,
    HeaderBodyStream,
};
pub use base64::{Base64InputStream, Base64OutputStream};
pub use aes::{AesInputStream, AesOutputStream};
pub use compress::{CompressOutputStream, DecompressInputStream};

use crate::error::{Error, Result};


/// `full_size` value of streams whose length is not known, or of broken
/// streams.
pub const SIZE_UNKNOWN: u64 = u64::MAX;

/// `full_size` value of streams that are finite but at least 2^32 - 1
/// bytes long.
pub const SIZE_TOO_LARGE: u64 = u64::MAX - 1;


/// The interface every stream supports, readable or writable.
pub trait BaseStream {

    /// The stream length in bytes when known; [`SIZE_UNKNOWN`] otherwise,
    /// and [`SIZE_TOO_LARGE`] for finite streams of 2^32 - 1 bytes or
    /// more. A `0` can mean either an empty or a broken stream, depending
    /// on the concrete type.
    fn full_size(&self) -> u64;

    /// True once the end of the stream is reached.
    fn end_reached(&self) -> bool;

    /// The position of the next byte that would be read from or written
    /// to this stream. Monotone non-decreasing on streams that cannot
    /// seek.
    fn current_position(&self) -> u64;

    /// Try to seek to the given absolute position; false when the stream
    /// does not support it or the position is out of range.
    fn set_position(&mut self, position: u64) -> bool;
}

/// The base input stream interface.
pub trait InputStream: BaseStream {

    /// Try to fill the buffer, returning the number of bytes actually
    /// read. A short count is not an error: query `end_reached` to
    /// distinguish a drained source from a stalled one.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Move the position forward by the given amount. Same result as
    /// `set_position(current_position() + amount)`, but implementations
    /// can be faster for non-seekable streams.
    fn go_forward(&mut self, amount: u64) -> bool;

    /// Direct access to the backing memory for streams that are backed by
    /// a contiguous byte region. This can avoid copying the stream
    /// through a temporary buffer.
    fn map_bytes(&self) -> Option<&[u8]> { None }
}

/// The base output stream interface.
pub trait OutputStream: BaseStream {

    /// Try to write the buffer, returning the number of bytes actually
    /// written.
    fn write(&mut self, buffer: &[u8]) -> Result<usize>;

    /// Like `write`, but also tells whether the stream should flush after
    /// taking the bytes.
    fn write_hint(&mut self, buffer: &[u8], _flush: bool) -> Result<usize> {
        self.write(buffer)
    }
}


// borrowing a stream is passing `&mut stream`; these impls make the
// borrow itself a stream

impl<S: BaseStream + ?Sized> BaseStream for &mut S {
    fn full_size(&self) -> u64 { (**self).full_size() }
    fn end_reached(&self) -> bool { (**self).end_reached() }
    fn current_position(&self) -> u64 { (**self).current_position() }
    fn set_position(&mut self, position: u64) -> bool { (**self).set_position(position) }
}

impl<S: InputStream + ?Sized> InputStream for &mut S {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> { (**self).read(buffer) }
    fn go_forward(&mut self, amount: u64) -> bool { (**self).go_forward(amount) }
    fn map_bytes(&self) -> Option<&[u8]> { (**self).map_bytes() }
}

impl<S: OutputStream + ?Sized> OutputStream for &mut S {
    fn write(&mut self, buffer: &[u8]) -> Result<usize> { (**self).write(buffer) }
    fn write_hint(&mut self, buffer: &[u8], flush: bool) -> Result<usize> { (**self).write_hint(buffer, flush) }
}

impl<S: BaseStream + ?Sized> BaseStream for Box<S> {
    fn full_size(&self) -> u64 { (**self).full_size() }
    fn end_reached(&self) -> bool { (**self).end_reached() }
    fn current_position(&self) -> u64 { (**self).current_position() }
    fn set_position(&mut self, position: u64) -> bool { (**self).set_position(position) }
}

impl<S: InputStream + ?Sized> InputStream for Box<S> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> { (**self).read(buffer) }
    fn go_forward(&mut self, amount: u64) -> bool { (**self).go_forward(amount) }
    fn map_bytes(&self) -> Option<&[u8]> { (**self).map_bytes() }
}

impl<S: OutputStream + ?Sized> OutputStream for Box<S> {
    fn write(&mut self, buffer: &[u8]) -> Result<usize> { (**self).write(buffer) }
    fn write_hint(&mut self, buffer: &[u8], flush: bool) -> Result<usize> { (**self).write_hint(buffer, flush) }
}


// ------------------------------------------------------------ line reading

fn read_line(source: &mut (impl InputStream + ?Sized), allow_cr_at_eol: bool) -> String {
    let mut line = String::new();
    let mut byte = [0_u8; 1];

    while !source.end_reached() {
        match source.read(&mut byte) {
            Ok(1) => {},
            _ => break,
        }
        if byte[0] == b'\n' { break; }
        line.push(byte[0] as char);
    }

    if !allow_cr_at_eol && line.ends_with('\r') { line.pop(); }
    line
}

/// Line-by-line reading for any input stream. A line ends at the first
/// LF; the LF is consumed and not returned.
pub trait LineSplitStream: InputStream {

    /// Read the next line; a CR before the LF is kept.
    fn read_next_line(&mut self) -> String {
        read_line(self, true)
    }
}

impl<S: InputStream + ?Sized> LineSplitStream for S {}

/// Transform an input stream into a line split stream with configurable
/// CR handling.
#[derive(Debug)]
pub struct LineBasedInputStream<S: InputStream> {
    inner: S,
}

impl<S: InputStream> LineBasedInputStream<S> {
    pub fn new(inner: S) -> Self {
        LineBasedInputStream { inner }
    }

    /// Read the next line from the input stream. With `allow_cr_at_eol`,
    /// a line ended by CRLF is returned ended by CR; otherwise the line
    /// is trimmed of both.
    pub fn read_next_line(&mut self, allow_cr_at_eol: bool) -> String {
        read_line(&mut self.inner, allow_cr_at_eol)
    }

    pub fn into_inner(self) -> S { self.inner }
}


// ------------------------------------------------------------- free functions

fn write_fully(sink: &mut (impl OutputStream + ?Sized), bytes: &[u8], flush: bool) -> Result<()> {
    if sink.write_hint(bytes, flush)? != bytes.len() {
        return Err(Error::io("sink refused part of the copied data"));
    }
    Ok(())
}

/// Copy a stream into a sink.
///
/// When the source advertises direct buffer access, the whole backing
/// region goes out in a single write. Otherwise a 4 KiB loop is used,
/// bounded by `forced_size` when non-zero (0 copies the whole stream).
pub fn copy_stream(
    source: &mut (impl InputStream + ?Sized),
    sink: &mut (impl OutputStream + ?Sized),
    forced_size: u64,
) -> Result<()>
{
    let total = if forced_size != 0 { forced_size } else { source.full_size() };

    if let Some(bytes) = source.map_bytes() {
        let count = total.min(bytes.len() as u64) as usize;
        let bytes = &bytes[.. count];
        return write_fully(sink, bytes, true);
    }

    let mut remaining = total; // SIZE_UNKNOWN never bounds the loop
    let mut buffer = [0_u8; 4096];

    loop {
        let wanted = remaining.min(4096) as usize;
        let got = source.read(&mut buffer[.. wanted])?;

        if got == 4096 {
            write_fully(sink, &buffer, false)?;
            remaining -= 4096;
        }
        else {
            return write_fully(sink, &buffer[.. got], true);
        }
    }
}

/// The callback invoked while a stream copy is running.
pub trait CopyCallback {

    /// Informed about the progress of the copy; `current` bytes of
    /// `total` are done (`total` can be zero when unknown). Returning
    /// false aborts the copy in its current state.
    fn copied_data(&mut self, current: u64, total: u64) -> bool;
}

impl<F: FnMut(u64, u64) -> bool> CopyCallback for F {
    fn copied_data(&mut self, current: u64, total: u64) -> bool {
        self(current, total)
    }
}

/// Copy a stream into a sink, reporting progress roughly every percent.
///
/// The mappable fast path is cut into 100 equal chunks with a callback
/// after each one; the 4 KiB loop reports after every chunk. If you do
/// not care about progress, use [`copy_stream`]: it is much faster.
pub fn copy_stream_with_callback(
    source: &mut (impl InputStream + ?Sized),
    sink: &mut (impl OutputStream + ?Sized),
    callback: &mut dyn CopyCallback,
    forced_size: u64,
) -> Result<()>
{
    let total = if forced_size != 0 { forced_size } else { source.full_size() };

    if let Some(bytes) = source.map_bytes() {
        let count = total.min(bytes.len() as u64) as usize;
        let bytes = &bytes[.. count];
        let step = bytes.len() / 100;
        let mut current = 0_usize;

        for _ in 0 .. 100 {
            write_fully(sink, &bytes[current .. current + step], false)?;
            current += step;
            if !callback.copied_data(current as u64, count as u64) {
                return Err(Error::io("copy aborted by the callback"));
            }
        }

        write_fully(sink, &bytes[current ..], true)?;
        if !callback.copied_data(count as u64, count as u64) {
            return Err(Error::io("copy aborted by the callback"));
        }
        return Ok(());
    }

    let mut buffer = [0_u8; 4096];
    let mut current = 0_u64;

    loop {
        let wanted = (total - current.min(total)).min(4096) as usize;
        let got = source.read(&mut buffer[.. wanted])?;

        if got == 4096 {
            write_fully(sink, &buffer, false)?;
            current += 4096;
            if !callback.copied_data(current, total) {
                return Err(Error::io("copy aborted by the callback"));
            }
        }
        else {
            write_fully(sink, &buffer[.. got], true)?;
            current += got as u64;
            if !callback.copied_data(current, total) {
                return Err(Error::io("copy aborted by the callback"));
            }
            return Ok(());
        }
    }
}

/// Read a whole stream into memory and return an equivalent owning stream
/// positioned where the source was. The source position is restored.
///
/// This buffers everything, so it asserts against streams that are large
/// enough to look like a design mistake.
pub fn clone_stream(source: &mut (impl InputStream + ?Sized)) -> Result<MemoryBlockStream<'static>> {
    assert!(source.full_size() < 64_000_000, "refusing to clone a stream this large into memory");

    let position = source.current_position();
    let size = source.full_size() as usize;

    let mut bytes = vec![0_u8; size];
    if source.read(&mut bytes)? != size {
        return Err(Error::io("short read while cloning a stream"));
    }

    // restore the source; a failure here is ignored
    source.set_position(position);

    let mut cloned = MemoryBlockStream::from_vec(bytes);
    cloned.set_position(position);
    Ok(cloned)
}

/// Read a text string out of an input stream, stopping once one of the
/// stop characters (byte 0 when `stops` is empty) has been consumed. The
/// stop character is consumed but not appended.
pub fn read_string(source: &mut (impl InputStream + ?Sized), stops: &str) -> String {
    let mut out = String::new();
    let mut byte = [0_u8; 1];

    loop {
        match source.read(&mut byte) {
            Ok(1) => {},
            _ => return out,
        }

        let stop = if stops.is_empty() { byte[0] == 0 } else { stops.as_bytes().contains(&byte[0]) };
        if stop { return out; }
        out.push(byte[0] as char);
    }
}

fn hex_nibble(byte: u8) -> u8 {
    match byte {
        b'0' ..= b'9' => byte - b'0',
        b'a' ..= b'f' => byte - b'a' + 10,
        b'A' ..= b'F' => byte - b'A' + 10,
        _ => 0, // anything else reads as zero
    }
}

/// Read a hexadecimal number out of an input stream, converting pairs of
/// digits into bytes on the fly and stopping once one of the stop
/// characters has been consumed.
///
/// A missing final digit is read as if a `0` were appended, so `"91AFC"`
/// and `"91AFC0"` both produce `[0x91, 0xAF, 0xC0]`.
pub fn read_hex_number(source: &mut (impl InputStream + ?Sized), stops: &str) -> Vec<u8> {
    let mut out = Vec::new();

    if stops.is_empty() {
        let mut pair = [0_u8; 2];
        loop {
            match source.read(&mut pair) {
                Ok(2) => out.push((hex_nibble(pair[0]) << 4) | hex_nibble(pair[1])),
                Ok(1) => { out.push(hex_nibble(pair[0]) << 4); return out; },
                _ => return out,
            }
        }
    }

    let mut byte = [0_u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(1) => {},
            _ => return out,
        }
        if stops.as_bytes().contains(&byte[0]) { return out; }
        let high = byte[0];

        let low_read = source.read(&mut byte);
        if !matches!(low_read, Ok(1)) || stops.as_bytes().contains(&byte[0]) {
            out.push(hex_nibble(high) << 4);
            return out;
        }
        out.push((hex_nibble(high) << 4) | hex_nibble(byte[0]));
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_string_stops(){
        let mut source = InputStringStream::new("alpha,beta");
        assert_eq!(read_string(&mut source, ","), "alpha");
        assert_eq!(read_string(&mut source, ","), "beta");
        // exhausted: further reads yield the empty string
        assert_eq!(read_string(&mut source, ","), "");
    }

    #[test]
    fn read_hex_number_pads_the_last_nibble(){
        let mut even = InputStringStream::new("91AFC0");
        let mut odd = InputStringStream::new("91AFC");
        assert_eq!(read_hex_number(&mut even, ""), vec![0x91, 0xAF, 0xC0]);
        assert_eq!(read_hex_number(&mut odd, ""), vec![0x91, 0xAF, 0xC0]);

        let mut stopped = InputStringStream::new("4142;rest");
        assert_eq!(read_hex_number(&mut stopped, ";"), vec![0x41, 0x42]);
        assert_eq!(stopped.current_position(), 5);
    }

    #[test]
    fn copy_uses_the_mappable_short_circuit(){
        let data: Vec<u8> = (0 .. 200_u8).collect();
        let mut source = MemoryBlockStream::new(&data);
        let mut sink = OutputMemStream::new();

        copy_stream(&mut source, &mut sink, 0).unwrap();
        assert_eq!(sink.block().as_bytes(), &data[..]);
        // the short circuit never advanced the source cursor
        assert_eq!(source.current_position(), 0);
    }

    #[test]
    fn copy_with_callback_counts_and_aborts(){
        let data = vec![9_u8; 10_000];
        let mut source = MemoryBlockStream::new(&data);
        let mut sink = NullOutputStream::new();

        let mut calls = 0_u32;
        copy_stream_with_callback(&mut source, &mut sink, &mut |_current, _total| {
            calls += 1;
            true
        }, 0).unwrap();
        assert_eq!(calls, 101);
        assert_eq!(sink.current_position(), 10_000);

        let mut source = MemoryBlockStream::new(&data);
        let mut sink = NullOutputStream::new();
        let aborting = copy_stream_with_callback(&mut source, &mut sink, &mut |current, _total| {
            current < 1000
        }, 0);
        assert!(aborting.is_err());
    }

    #[test]
    fn clone_returns_an_equivalent_stream(){
        let data: Vec<u8> = (0 .. 64_u8).collect();
        let mut source = MemoryBlockStream::new(&data);

        let mut cloned = clone_stream(&mut source).unwrap();
        assert_eq!(cloned.full_size(), 64);

        let mut bytes = [0_u8; 64];
        assert_eq!(cloned.read(&mut bytes).unwrap(), 64);
        assert_eq!(&bytes[..], &data[..]);
    }

    #[test]
    fn line_reading(){
        let mut source = InputStringStream::new("one\r\ntwo\nthree");
        let mut lines = LineBasedInputStream::new(&mut source);
        assert_eq!(lines.read_next_line(false), "one");
        assert_eq!(lines.read_next_line(true), "two");
        assert_eq!(lines.read_next_line(true), "three");

        let mut split = InputStringStream::new("kept\r\nline");
        assert_eq!(split.read_next_line(), "kept\r");
    }
}
