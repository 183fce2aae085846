
//! A resizable byte buffer with the allocation discipline the stream nodes
//! rely on: growth reserves at least 1.2× the requested size, and shrinking
//! only happens once more than 4 KiB of slack has accumulated.

use crate::encoding;
use crate::error::{Error, Result, PassiveResult};
use zeroize::Zeroize;


/// When releasing data from the block, the allocation is kept as long as
/// the slack stays below this threshold.
pub const MAX_ALLOWED_DELTA: usize = 4096;

/// A memory block is a dynamic array of bytes with many byte array
/// manipulation methods.
///
/// Use `append`, `extract` and `strip_to` to add and remove data, and
/// `look_for` to search a pattern. The base conversion methods turn binary
/// data into text-safe form and back, which is useful for exporting into
/// XML, databases, or anything else that only accepts text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    data: Vec<u8>,
}

impl MemoryBlock {

    /// An empty block without any allocation.
    pub fn new() -> Self {
        MemoryBlock { data: Vec::new() }
    }

    /// A zero-filled block of the given logical size.
    pub fn with_size(size: usize) -> Self {
        MemoryBlock { data: vec![0_u8; size] }
    }

    /// The used size in bytes.
    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// A view of the used bytes.
    pub fn as_bytes(&self) -> &[u8] { &self.data }

    /// A mutable view of the used bytes.
    ///
    /// You will need this when calling a routine that cannot tell
    /// beforehand how much it will produce: reserve with `grow`, let the
    /// routine fill the bytes, then `strip_to` the produced count.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] { &mut self.data }

    /// Consume the block, yielding the underlying storage.
    pub fn into_vec(self) -> Vec<u8> { self.data }

    fn reserve_for(&mut self, wanted: usize) {
        if wanted > self.data.capacity() {
            let target = ((wanted as f32) * 1.2) as usize;
            self.data.reserve(target.max(64) - self.data.len());
        }
    }

    /// Append the given bytes, growing the allocation by at least 1.2× the
    /// required size when it no longer fits.
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() { return; }
        self.reserve_for(self.data.len() + bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Extend the logical size by `count` zeroed bytes without copying
    /// anything in. This reserves room for routines that fill the block
    /// through `as_bytes_mut`.
    pub fn grow(&mut self, count: usize) {
        if count == 0 { return; }
        self.reserve_for(self.data.len() + count);
        self.data.resize(self.data.len() + count, 0);
    }

    /// Copy the first `destination.len()` bytes out of the block, shift the
    /// remaining bytes down and shrink the logical size accordingly.
    ///
    /// Fails with `OutOfRange` when the block holds fewer bytes than
    /// requested. The allocation is only shrunk once the slack exceeds
    /// [`MAX_ALLOWED_DELTA`].
    pub fn extract(&mut self, destination: &mut [u8]) -> PassiveResult {
        let count = destination.len();
        if count > self.data.len() { return Err(Error::OutOfRange); }
        destination.copy_from_slice(&self.data[.. count]);
        self.discard(count)
    }

    /// Like `extract`, but the leading bytes are dropped instead of copied.
    pub fn discard(&mut self, count: usize) -> PassiveResult {
        if count > self.data.len() { return Err(Error::OutOfRange); }
        self.data.copy_within(count .., 0);
        let remaining = self.data.len() - count;
        self.data.truncate(remaining);

        if self.data.capacity() - remaining > MAX_ALLOWED_DELTA {
            let target = (((remaining as f32) * 1.2) as usize).max(64);
            self.data.shrink_to(target);
        }

        Ok(())
    }

    /// The first offset at or after `start` where the pattern matches, if
    /// any. This is an O(M·N) scan, so prefer a dedicated search structure
    /// for large inputs.
    pub fn look_for(&self, pattern: &[u8], start: usize) -> Option<usize> {
        if pattern.is_empty() || start + pattern.len() > self.data.len() { return None; }

        let mut position = start;
        while position + pattern.len() <= self.data.len() {
            match self.data[position ..].iter().position(|&byte| byte == pattern[0]) {
                Some(offset) => {
                    let found = position + offset;
                    if found + pattern.len() > self.data.len() { return None; }
                    if &self.data[found .. found + pattern.len()] == pattern { return Some(found); }
                    position = found + 1;
                },
                None => return None,
            }
        }

        None
    }

    /// Reduce the logical size to at most `size`. The stripped bytes are
    /// not cleared, and the allocation is untouched.
    pub fn strip_to(&mut self, size: usize) {
        if size < self.data.len() { self.data.truncate(size); }
    }

    /// Grow or shrink the allocation to `size` bytes. The logical size is
    /// only changed when it exceeds `size`, or when `set_size_too` asks for
    /// the logical size to follow the allocation.
    pub fn ensure_size(&mut self, size: usize, set_size_too: bool) {
        if size < self.data.len() { self.data.truncate(size); }
        if size > self.data.capacity() { self.data.reserve_exact(size - self.data.len()); }
        else if self.data.capacity() > size.max(64) { self.data.shrink_to(size.max(64)); }
        if set_size_too { self.data.resize(size, 0); }
    }

    /// Zero the contents before releasing them. Mandatory for key material.
    pub fn wipe(&mut self) {
        self.data.zeroize();
        self.data.clear();
    }


    // base conversions: size with the codec's query pass, then run the
    // codec again to fill. a zero-length input yields an empty block.

    pub fn from_base16(input: &[u8]) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::decoded_size_base16(input));
        let written = encoding::decode_base16(input, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    pub fn from_base64(input: &[u8]) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::decoded_size_base64(input));
        let written = encoding::decode_base64(input, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    pub fn from_base85(input: &[u8]) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::decoded_size_base85(input)?);
        let written = encoding::decode_base85(input, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    pub fn to_base16(&self) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::encoded_size_base16(self.len()));
        let written = encoding::encode_base16(&self.data, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    pub fn to_base64(&self) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::encoded_size_base64(self.len()));
        let written = encoding::encode_base64(&self.data, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    pub fn to_base85(&self) -> Result<MemoryBlock> {
        let mut block = MemoryBlock::with_size(encoding::encoded_size_base85(self.len()));
        let written = encoding::encode_base85(&self.data, block.as_bytes_mut())?;
        block.strip_to(written);
        Ok(block)
    }

    /// Replace the contents with the decoded form of the given base16 text.
    pub fn rebuild_from_base16(&mut self, input: &[u8]) -> PassiveResult {
        if input.is_empty() { self.data.clear(); return Ok(()); }
        self.ensure_size(encoding::decoded_size_base16(input), true);
        let written = encoding::decode_base16(input, &mut self.data)?;
        self.strip_to(written);
        Ok(())
    }

    /// Replace the contents with the decoded form of the given base64 text.
    pub fn rebuild_from_base64(&mut self, input: &[u8]) -> PassiveResult {
        if input.is_empty() { self.data.clear(); return Ok(()); }
        self.ensure_size(encoding::decoded_size_base64(input), true);
        let written = encoding::decode_base64(input, &mut self.data)?;
        self.strip_to(written);
        Ok(())
    }

    /// Replace the contents with the decoded form of the given base85 text.
    pub fn rebuild_from_base85(&mut self, input: &[u8]) -> PassiveResult {
        if input.is_empty() { self.data.clear(); return Ok(()); }
        self.ensure_size(encoding::decoded_size_base85(input)?, true);
        let written = encoding::decode_base85(input, &mut self.data)?;
        self.strip_to(written);
        Ok(())
    }
}

impl From<Vec<u8>> for MemoryBlock {
    fn from(data: Vec<u8>) -> Self { MemoryBlock { data } }
}

impl From<&[u8]> for MemoryBlock {
    fn from(bytes: &[u8]) -> Self { MemoryBlock { data: bytes.to_vec() } }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn append_extract(){
        let mut block = MemoryBlock::new();
        block.append(b"hello ");
        block.append(b"world");
        assert_eq!(block.as_bytes(), b"hello world");

        let mut head = [0_u8; 6];
        block.extract(&mut head).unwrap();
        assert_eq!(&head, b"hello ");
        assert_eq!(block.as_bytes(), b"world");

        let mut too_much = [0_u8; 32];
        assert_eq!(block.extract(&mut too_much), Err(Error::OutOfRange));

        block.discard(5).unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn look_for_patterns(){
        let block = MemoryBlock::from(&b"abcabcabd"[..]);
        assert_eq!(block.look_for(b"abd", 0), Some(6));
        assert_eq!(block.look_for(b"abc", 1), Some(3));
        assert_eq!(block.look_for(b"abe", 0), None);
        assert_eq!(block.look_for(b"d", 0), Some(8));
        assert_eq!(block.look_for(b"d", 9), None);
    }

    #[test]
    fn strip_and_grow(){
        let mut block = MemoryBlock::with_size(16);
        block.strip_to(4);
        assert_eq!(block.len(), 4);

        block.grow(12);
        assert_eq!(block.len(), 16);
        assert_eq!(&block.as_bytes()[4 ..], &[0_u8; 12]);

        // stripping to a larger size is a no-op
        block.strip_to(200);
        assert_eq!(block.len(), 16);
    }

    #[test]
    fn shrink_hysteresis(){
        let mut block = MemoryBlock::with_size(3 * MAX_ALLOWED_DELTA);
        let capacity = block.data.capacity();

        // a small extraction keeps the allocation
        block.discard(16).unwrap();
        assert_eq!(block.data.capacity(), capacity);

        // draining most of the block finally shrinks it
        block.discard(block.len() - 8).unwrap();
        assert!(block.data.capacity() < capacity);
    }

    #[test]
    fn base_roundtrip_through_block(){
        let block = MemoryBlock::from(&b"hello world"[..]);
        let coded = block.to_base64().unwrap();
        assert_eq!(coded.as_bytes(), b"aGVsbG8gd29ybGQ=");

        let decoded = MemoryBlock::from_base64(coded.as_bytes()).unwrap();
        assert_eq!(decoded, block);

        let mut rebuilt = MemoryBlock::new();
        rebuilt.rebuild_from_base64(coded.as_bytes()).unwrap();
        assert_eq!(rebuilt, block);

        // empty input is a success that produces an empty block
        assert!(MemoryBlock::from_base85(b"").unwrap().is_empty());
    }

    #[test]
    fn wipe_empties(){
        let mut block = MemoryBlock::from(&b"secret key material"[..]);
        block.wipe();
        assert!(block.is_empty());
    }
}
