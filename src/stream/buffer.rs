
//! Read-ahead and write-behind adapters, plus the header/body splitter.

use crate::error::{Error, Result, PassiveResult};
use super::{BaseStream, InputStream, OutputStream, OutputMemStream};


/// The default read-ahead window.
pub const DEFAULT_BUFFER_SIZE: usize = 32768;


/// A buffered input stream that reads the inner stream block by block.
///
/// The inner stream's position is the buffer's high-water mark; reads are
/// served from the window behind it. Seeking within the live window only
/// moves the cursor; any other seek snaps the inner stream to a
/// buffer-aligned base and refills. When only reading forward, the inner
/// stream merely has to report a monotonic position.
#[derive(Debug)]
pub struct BufferedInputStream<Inner: InputStream> {
    inner: Inner,
    buffer: Vec<u8>,
    buffer_size: usize,
    initial_size: usize,
    position: u64,
}

impl<Inner: InputStream> BufferedInputStream<Inner> {

    pub fn new(inner: Inner) -> Self {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(inner: Inner, buffer_size: usize) -> Self {
        let mut stream = BufferedInputStream {
            inner,
            buffer: vec![0_u8; buffer_size],
            buffer_size: 0,
            initial_size: buffer_size,
            position: 0,
        };
        let _ = stream.refill();
        stream
    }

    pub fn buffer_size(&self) -> usize { self.buffer_size }

    fn refill(&mut self) -> PassiveResult {
        self.buffer_size = self.inner.read(&mut self.buffer)?;
        Ok(())
    }
}

impl<Inner: InputStream> BaseStream for BufferedInputStream<Inner> {
    fn full_size(&self) -> u64 { self.inner.full_size() }
    fn end_reached(&self) -> bool { self.position == self.inner.full_size() }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if self.position == position { return true; }
        if position >= self.inner.full_size() { return false; }

        // seeks within the live window only move the cursor
        let high = self.inner.current_position();
        let low = high.saturating_sub(self.buffer_size as u64);
        if position >= low && position < high {
            self.position = position;
            return true;
        }

        // snap to a buffer-aligned base; skipping forward avoids
        // `set_position` on streams that cannot seek backward
        let base = (position / self.initial_size as u64) * self.initial_size as u64;
        if position > high {
            if !self.inner.go_forward(base - high) { return false; }
        }
        else if !self.inner.set_position(base) { return false; }

        if self.refill().is_err() { return false; }
        self.position = position;
        true
    }
}

impl<Inner: InputStream> InputStream for BufferedInputStream<Inner> {
    fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        if self.buffer_size == 0 { return Err(Error::io("buffered stream holds no data")); }

        let mut done = 0_usize;
        while done < output.len() {
            // serve from the window behind the inner position first
            let in_buffer = (self.inner.current_position() - self.position) as usize;
            let amount = (output.len() - done).min(in_buffer);
            let start = self.buffer_size - in_buffer;
            output[done .. done + amount].copy_from_slice(&self.buffer[start .. start + amount]);
            self.position += amount as u64;
            done += amount;

            if done == output.len() { break; }
            if self.inner.end_reached() { return Ok(done); }
            self.refill()?;
        }
        Ok(done)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount + self.position >= self.inner.full_size() { return false; }
        self.set_position(self.position + amount)
    }
}


/// A memory-buffered input stream: the whole inner stream is read into
/// one buffer at construction, and every access afterwards is direct.
#[derive(Debug)]
pub struct MemoryBufferedInputStream {
    buffer: Vec<u8>,
    stream_size: u64,
    position: u64,
}

impl MemoryBufferedInputStream {

    /// Slurp the inner stream. With `zero_terminated`, a NUL is appended
    /// behind the data so the buffer can be handed to text interfaces.
    pub fn new(inner: &mut impl InputStream, zero_terminated: bool) -> Result<Self> {
        let stream_size = inner.full_size();
        if stream_size >= 0xFFFF_FFFE {
            return Err(Error::io("stream is too large to buffer in memory"));
        }

        let size = stream_size as usize;
        let mut buffer = vec![0_u8; size + usize::from(zero_terminated)];
        if inner.read(&mut buffer[.. size])? != size {
            return Err(Error::io("short read while buffering a stream"));
        }

        Ok(MemoryBufferedInputStream { buffer, stream_size, position: 0 })
    }
}

impl BaseStream for MemoryBufferedInputStream {
    fn full_size(&self) -> u64 { self.stream_size }
    fn end_reached(&self) -> bool { self.position == self.stream_size }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        if position >= self.stream_size { return false; }
        self.position = position;
        true
    }
}

impl InputStream for MemoryBufferedInputStream {
    fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        let position = self.position as usize;
        let count = output.len().min(self.stream_size as usize - position);
        output[.. count].copy_from_slice(&self.buffer[position .. position + count]);
        self.position += count as u64;
        Ok(count)
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount + self.position >= self.stream_size { return false; }
        self.position += amount;
        true
    }

    fn map_bytes(&self) -> Option<&[u8]> {
        Some(&self.buffer)
    }
}


/// A write-behind buffer: collect into a caller-sized buffer, then push
/// the whole block to the inner sink with `deliver_buffer`. A dirty
/// buffer is delivered when the adapter is dropped.
#[derive(Debug)]
pub struct MemoryBufferedOutputStream<Inner: OutputStream> {
    inner: Inner,
    buffer: Vec<u8>,
    dirty: bool,
}

impl<Inner: OutputStream> MemoryBufferedOutputStream<Inner> {

    pub fn new(inner: Inner) -> Self {
        MemoryBufferedOutputStream { inner, buffer: Vec::new(), dirty: false }
    }

    /// The collect buffer, grown to at least `size` bytes. The buffer is
    /// considered dirty from here on.
    pub fn buffer_of_size(&mut self, size: usize) -> &mut [u8] {
        self.dirty = true;
        if self.buffer.len() < size {
            self.buffer.resize(size, 0);
        }
        &mut self.buffer
    }

    /// Push the whole buffer to the inner sink.
    pub fn deliver_buffer(&mut self) -> bool {
        self.dirty = false;
        matches!(self.inner.write(&self.buffer), Ok(written) if written == self.buffer.len())
    }
}

impl<Inner: OutputStream> BaseStream for MemoryBufferedOutputStream<Inner> {
    fn full_size(&self) -> u64 { self.inner.full_size() }
    fn end_reached(&self) -> bool { true }
    fn current_position(&self) -> u64 { self.inner.full_size() }
    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl<Inner: OutputStream> OutputStream for MemoryBufferedOutputStream<Inner> {
    /// Direct writes are not supported; fill the buffer through
    /// [`Self::buffer_of_size`] instead.
    fn write(&mut self, _bytes: &[u8]) -> Result<usize> { Ok(0) }
}

impl<Inner: OutputStream> Drop for MemoryBufferedOutputStream<Inner> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() && self.dirty {
            self.deliver_buffer();
        }
    }
}


/// An output stream whose first bytes form a fixed-size header that can
/// be rewritten until the stream is dropped, while the body flows to the
/// inner sink.
///
/// When the sink is seekable the body streams through directly and the
/// header is written at its real offset on drop. Otherwise the body is
/// buffered too, and drop writes header and body in sequence; the sink
/// must outlive this object either way.
#[derive(Debug)]
pub struct HeaderBodyStream<Inner: OutputStream> {
    header: Vec<u8>,
    sink: Inner,
    initial_position: u64,
    body_buffer: Option<OutputMemStream>,
    position: u64,
}

impl<Inner: OutputStream> HeaderBodyStream<Inner> {

    pub fn new(mut sink: Inner, header_size: usize) -> Self {
        let initial_position = sink.current_position();

        // probe: a sink that cannot even reach its own position cannot
        // seek, and the body has to be buffered
        let seekable = sink.set_position(initial_position);
        let body_buffer = if seekable { None } else { Some(OutputMemStream::new()) };
        if seekable && !sink.set_position(initial_position + header_size as u64) {
            // leave room for the header by other means when the sink only
            // grows through writes
            let _ = sink.write(&vec![0_u8; header_size]);
        }

        HeaderBodyStream {
            header: vec![0_u8; header_size],
            sink,
            initial_position,
            body_buffer,
            position: 0,
        }
    }

    /// The position on the final output stream, including the sink's own
    /// offset and any buffering, as opposed to `current_position` which
    /// is relative to this stream.
    pub fn absolute_position(&self) -> u64 {
        match &self.body_buffer {
            Some(body) => self.header.len() as u64 + self.sink.current_position() + body.full_size(),
            None => self.header.len() as u64 + self.sink.current_position(),
        }
    }
}

impl<Inner: OutputStream> BaseStream for HeaderBodyStream<Inner> {
    fn full_size(&self) -> u64 {
        match &self.body_buffer {
            Some(body) => self.header.len() as u64 + body.full_size(),
            None => self.sink.full_size() - self.initial_position,
        }
    }

    fn end_reached(&self) -> bool { self.position == self.full_size() }
    fn current_position(&self) -> u64 { self.position }

    fn set_position(&mut self, position: u64) -> bool {
        self.position = position;
        match &mut self.body_buffer {
            Some(body) => {
                if position > self.header.len() as u64 {
                    return body.set_position(position - self.header.len() as u64);
                }
                true
            },
            None => self.sink.set_position(self.initial_position + position),
        }
    }
}

impl<Inner: OutputStream> OutputStream for HeaderBodyStream<Inner> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut done = 0_usize;

        if self.position < self.header.len() as u64 {
            let position = self.position as usize;
            let amount = (self.header.len() - position).min(bytes.len());
            self.header[position .. position + amount].copy_from_slice(&bytes[.. amount]);
            self.position += amount as u64;
            done += amount;
        }

        if done < bytes.len() {
            let written = match &mut self.body_buffer {
                Some(body) => body.write(&bytes[done ..])?,
                None => self.sink.write(&bytes[done ..])?,
            };
            done += written;
            self.position += written as u64;
        }

        Ok(done)
    }
}

impl<Inner: OutputStream> Drop for HeaderBodyStream<Inner> {
    fn drop(&mut self) {
        // the final header contents reach the sink only now
        if self.body_buffer.is_none() {
            self.sink.set_position(self.initial_position);
        }
        let _ = self.sink.write(&self.header);
        if let Some(body) = &self.body_buffer {
            let _ = self.sink.write(body.block().as_bytes());
        }
        let size = self.sink.full_size();
        self.sink.set_position(size);
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{MemoryBlockStream, copy_stream};

    fn numbered(count: usize) -> Vec<u8> {
        (0 .. count).map(|index| (index % 251) as u8).collect()
    }

    #[test]
    fn buffered_reads_match_the_source(){
        let data = numbered(100_000);
        let mut buffered =
            BufferedInputStream::with_buffer_size(MemoryBlockStream::new(&data), 4096);

        let mut collected = Vec::new();
        let mut chunk = [0_u8; 777];
        loop {
            let count = buffered.read(&mut chunk).unwrap();
            collected.extend_from_slice(&chunk[.. count]);
            if count < chunk.len() { break; }
        }
        assert_eq!(collected, data);
    }

    #[test]
    fn buffered_seek_matches_a_plain_stream(){
        let data = numbered(50_000);
        let positions = [40_000_u64, 1, 4095, 4096, 4097, 20_000, 0, 39_999];

        for &position in &positions {
            let mut plain = MemoryBlockStream::new(&data);
            let mut buffered =
                BufferedInputStream::with_buffer_size(MemoryBlockStream::new(&data), 4096);

            assert!(plain.set_position(position));
            assert!(buffered.set_position(position), "seek to {}", position);
            assert_eq!(buffered.current_position(), position);

            let mut expected = [0_u8; 100];
            let mut actual = [0_u8; 100];
            let expected_count = plain.read(&mut expected).unwrap();
            let actual_count = buffered.read(&mut actual).unwrap();
            assert_eq!(actual_count, expected_count, "read at {}", position);
            assert_eq!(actual[..], expected[..], "bytes at {}", position);
        }
    }

    #[test]
    fn memory_buffered_slurps_and_maps(){
        let data = numbered(1000);
        let mut source = MemoryBlockStream::new(&data);
        let mut buffered = MemoryBufferedInputStream::new(&mut source, true).unwrap();

        assert_eq!(buffered.full_size(), 1000);
        assert_eq!(buffered.map_bytes().unwrap().len(), 1001); // trailing NUL
        assert_eq!(buffered.map_bytes().unwrap()[1000], 0);

        let mut sink = crate::stream::OutputMemStream::new();
        copy_stream(&mut buffered, &mut sink, 0).unwrap();
        assert_eq!(sink.block().as_bytes(), &data[..]);
    }

    #[test]
    fn write_behind_delivers_on_drop(){
        let mut sink = crate::stream::OutputMemStream::new();
        {
            let mut buffered = MemoryBufferedOutputStream::new(&mut sink);
            buffered.buffer_of_size(5).copy_from_slice(b"later");
            // nothing is delivered yet
        }
        assert_eq!(sink.block().as_bytes(), b"later");

        let mut sink = crate::stream::OutputMemStream::new();
        {
            let mut buffered = MemoryBufferedOutputStream::new(&mut sink);
            buffered.buffer_of_size(3).copy_from_slice(b"now");
            assert!(buffered.deliver_buffer());
            // a clean buffer is not delivered twice
        }
        assert_eq!(sink.block().as_bytes(), b"now");
    }

    #[test]
    fn header_body_over_a_seekable_sink(){
        let mut sink = crate::stream::OutputMemStream::new();
        {
            let mut stream = HeaderBodyStream::new(&mut sink, 4);
            stream.write(b"????").unwrap();        // placeholder header
            stream.write(b"body bytes").unwrap();

            // go back and patch the header before dropping
            assert!(stream.set_position(0));
            stream.write(b"HEAD").unwrap();
        }
        assert_eq!(sink.block().as_bytes(), b"HEADbody bytes");
    }

    #[test]
    fn header_body_buffers_when_the_sink_cannot_seek(){
        struct AppendOnly { bytes: Vec<u8> }

        impl BaseStream for AppendOnly {
            fn full_size(&self) -> u64 { self.bytes.len() as u64 }
            fn end_reached(&self) -> bool { true }
            fn current_position(&self) -> u64 { self.bytes.len() as u64 }
            fn set_position(&mut self, _position: u64) -> bool { false }
        }

        impl OutputStream for AppendOnly {
            fn write(&mut self, bytes: &[u8]) -> Result<usize> {
                self.bytes.extend_from_slice(bytes);
                Ok(bytes.len())
            }
        }

        let mut sink = AppendOnly { bytes: Vec::new() };
        {
            let mut stream = HeaderBodyStream::new(&mut sink, 4);
            stream.write(b"????body").unwrap();
            assert!(stream.set_position(0));
            stream.write(b"HEAD").unwrap();
        }
        assert_eq!(sink.bytes, b"HEADbody");
    }
}
