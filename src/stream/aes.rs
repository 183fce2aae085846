
//! On-the-fly AES encryption and decryption streams.
//!
//! Both sides run the cipher in CFB mode, so the stream does not have to
//! be a multiple of the cipher block size: the final partial block is
//! emitted truncated to the plaintext length, and the reading side
//! recovers it by zero-padding the short ciphertext block before
//! deciphering. Expect the input stream to read a little ahead of what is
//! asked of it, because the decryption works in blocks.

use crate::crypto::{Aes, OperationMode, SymCipher, MAX_BLOCK_SIZE};
use crate::encoding;
use crate::error::{Error, Result};
use super::{BaseStream, InputStream, OutputStream};
use zeroize::Zeroize;


/// Bulk requests run through the cipher this many bytes at a time.
const BURST_SIZE: usize = 1024;

fn keyed_cipher(key: &[u8], iv: &[u8]) -> Result<(Aes, usize)> {
    if key.len() != iv.len() || key.is_empty()
        || key.len() % 16 != 0 || key.len() > MAX_BLOCK_SIZE {
        return Err(Error::BadLength);
    }

    let mut cipher = Aes::new();
    cipher.set_key(key, Some(iv), iv.len())?;
    Ok((cipher, key.len()))
}

fn keyed_cipher_from_hex(key_hex: &str, iv_hex: &str) -> Result<(Aes, usize)> {
    if key_hex.len() != iv_hex.len() { return Err(Error::BadLength); }

    let mut key = [0_u8; MAX_BLOCK_SIZE];
    let mut iv = [0_u8; MAX_BLOCK_SIZE];
    if encoding::decoded_size_base16(key_hex.as_bytes()) > MAX_BLOCK_SIZE {
        return Err(Error::BadLength);
    }

    let key_length = encoding::decode_base16(key_hex.as_bytes(), &mut key)?;
    let iv_length = encoding::decode_base16(iv_hex.as_bytes(), &mut iv)?;

    let keyed = keyed_cipher(&key[.. key_length], &iv[.. iv_length]);
    key.zeroize();
    iv.zeroize();
    keyed
}


/// An input stream that decrypts AES-CFB data on the fly while reading.
pub struct AesInputStream<Inner: InputStream> {
    inner: Inner,
    crypto: Aes,
    /// Decoded residue of the last deciphered block.
    buffer: [u8; MAX_BLOCK_SIZE],
    /// Index of the first pending byte in `buffer`; at `key_size` the
    /// residue is drained.
    temp_pos: usize,
    key_size: usize,
}

impl<Inner: InputStream> AesInputStream<Inner> {

    /// Decrypt with the given key and initialization vector. Both must
    /// have the same length, a multiple of 16 bytes.
    pub fn new(inner: Inner, key: &[u8], iv: &[u8]) -> Result<Self> {
        let (crypto, key_size) = keyed_cipher(key, iv)?;
        Ok(AesInputStream {
            inner, crypto,
            buffer: [0; MAX_BLOCK_SIZE],
            temp_pos: key_size,
            key_size,
        })
    }

    /// Decrypt with key and initialization vector given as hex strings.
    pub fn with_hex_keys(inner: Inner, key_hex: &str, iv_hex: &str) -> Result<Self> {
        let (crypto, key_size) = keyed_cipher_from_hex(key_hex, iv_hex)?;
        Ok(AesInputStream {
            inner, crypto,
            buffer: [0; MAX_BLOCK_SIZE],
            temp_pos: key_size,
            key_size,
        })
    }
}

impl<Inner: InputStream> std::fmt::Debug for AesInputStream<Inner> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("AesInputStream").field("key_size", &self.key_size).finish_non_exhaustive()
    }
}

impl<Inner: InputStream> BaseStream for AesInputStream<Inner> {
    fn full_size(&self) -> u64 { self.inner.full_size() }

    fn end_reached(&self) -> bool {
        self.inner.end_reached() && self.temp_pos == self.key_size
    }

    fn current_position(&self) -> u64 {
        self.inner.current_position()
            .saturating_sub((self.key_size - self.temp_pos) as u64)
    }

    fn set_position(&mut self, position: u64) -> bool {
        // seeking backward would mean deciphering the stream again
        if position > self.current_position() {
            return self.go_forward(position - self.current_position());
        }
        false
    }
}

impl<Inner: InputStream> InputStream for AesInputStream<Inner> {
    fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        if output.is_empty() { return Ok(0); }
        let key_size = self.key_size;

        // already deciphered residue goes out first
        let staged = (key_size - self.temp_pos).min(output.len());
        output[.. staged].copy_from_slice(&self.buffer[self.temp_pos .. self.temp_pos + staged]);
        if staged == output.len() {
            self.temp_pos += staged;
            return Ok(staged);
        }
        self.temp_pos = key_size;
        let mut position = staged;

        while output.len() - position >= key_size {
            // bulk bursts first, then single blocks
            if output.len() - position >= BURST_SIZE {
                let mut coded = [0_u8; BURST_SIZE];
                let got = self.inner.read(&mut coded)?;

                if got < BURST_SIZE {
                    // the source is drained: zero-pad so the tail still
                    // runs through whole cipher blocks
                    let mut plain = [0_u8; BURST_SIZE];
                    self.crypto.decrypt(&coded, &mut plain, OperationMode::Cfb)?;
                    output[position .. position + got].copy_from_slice(&plain[.. got]);
                    plain.zeroize();
                    return Ok(position + got);
                }

                self.crypto.decrypt(&coded, &mut output[position .. position + BURST_SIZE], OperationMode::Cfb)?;
                position += BURST_SIZE;
                continue;
            }

            let mut coded = [0_u8; MAX_BLOCK_SIZE];
            let got = self.inner.read(&mut coded[.. key_size])?;

            if got < key_size {
                let mut plain = [0_u8; MAX_BLOCK_SIZE];
                self.crypto.decrypt(&coded[.. key_size], &mut plain[.. key_size], OperationMode::Cfb)?;
                output[position .. position + got].copy_from_slice(&plain[.. got]);
                plain.zeroize();
                return Ok(position + got);
            }

            self.crypto.decrypt(&coded[.. key_size], &mut output[position .. position + key_size], OperationMode::Cfb)?;
            position += key_size;
        }

        // don't read ahead unless required
        if position == output.len() { return Ok(position); }
        let wanted = output.len() - position;

        let mut coded = [0_u8; MAX_BLOCK_SIZE];
        let got = self.inner.read(&mut coded[.. key_size])?;

        if got < key_size {
            // final short block of the stream
            self.crypto.decrypt(&coded[.. key_size], &mut self.buffer[.. key_size], OperationMode::Cfb)?;
            let served = got.min(wanted);
            output[position .. position + served].copy_from_slice(&self.buffer[.. served]);

            if got > wanted {
                // part of the deciphered tail stays for the next read
                let residue = got - wanted;
                self.buffer.copy_within(wanted .. got, key_size - residue);
                self.temp_pos = key_size - residue;
            }
            return Ok(position + served);
        }

        self.crypto.decrypt(&coded[.. key_size], &mut self.buffer[.. key_size], OperationMode::Cfb)?;
        output[position ..].copy_from_slice(&self.buffer[.. wanted]);
        self.temp_pos = wanted;
        Ok(output.len())
    }

    fn go_forward(&mut self, amount: u64) -> bool {
        if amount <= (self.key_size - self.temp_pos) as u64 {
            self.temp_pos += amount as usize;
            return true;
        }

        // the skipped region still has to run through the cipher
        let mut remaining = amount - (self.key_size - self.temp_pos) as u64;
        self.temp_pos = self.key_size;

        let mut scratch = [0_u8; MAX_BLOCK_SIZE];
        while remaining > 0 {
            let step = remaining.min(MAX_BLOCK_SIZE as u64) as usize;
            match self.read(&mut scratch[.. step]) {
                Ok(0) => return false,
                Ok(count) => remaining -= count as u64,
                Err(_) => return false,
            }
        }
        true
    }
}

impl<Inner: InputStream> Drop for AesInputStream<Inner> {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}


/// An output stream that encrypts into AES-CFB on the fly while writing.
///
/// The trailing partial block is only emitted when the stream is dropped,
/// truncated to the number of plaintext bytes it holds.
pub struct AesOutputStream<Inner: OutputStream> {
    inner: Inner,
    crypto: Aes,
    /// Plaintext collected towards the next whole block.
    buffer: [u8; MAX_BLOCK_SIZE],
    temp_pos: usize,
    key_size: usize,
}

impl<Inner: OutputStream> AesOutputStream<Inner> {

    /// Encrypt with the given key and initialization vector. Both must
    /// have the same length, a multiple of 16 bytes.
    pub fn new(inner: Inner, key: &[u8], iv: &[u8]) -> Result<Self> {
        let (crypto, key_size) = keyed_cipher(key, iv)?;
        Ok(AesOutputStream {
            inner, crypto,
            buffer: [0; MAX_BLOCK_SIZE],
            temp_pos: 0,
            key_size,
        })
    }

    /// Encrypt with key and initialization vector given as hex strings.
    pub fn with_hex_keys(inner: Inner, key_hex: &str, iv_hex: &str) -> Result<Self> {
        let (crypto, key_size) = keyed_cipher_from_hex(key_hex, iv_hex)?;
        Ok(AesOutputStream {
            inner, crypto,
            buffer: [0; MAX_BLOCK_SIZE],
            temp_pos: 0,
            key_size,
        })
    }

    fn emit_block(&mut self) -> Result<usize> {
        let key_size = self.key_size;
        let mut coded = [0_u8; MAX_BLOCK_SIZE];
        self.crypto.encrypt(&self.buffer[.. key_size], &mut coded[.. key_size], OperationMode::Cfb)?;
        self.inner.write(&coded[.. key_size])
    }
}

impl<Inner: OutputStream> std::fmt::Debug for AesOutputStream<Inner> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("AesOutputStream").field("key_size", &self.key_size).finish_non_exhaustive()
    }
}

impl<Inner: OutputStream> BaseStream for AesOutputStream<Inner> {
    fn full_size(&self) -> u64 {
        self.inner.full_size() + self.temp_pos as u64
    }

    fn end_reached(&self) -> bool { true }
    fn current_position(&self) -> u64 { self.full_size() }
    fn set_position(&mut self, _position: u64) -> bool { false }
}

impl<Inner: OutputStream> OutputStream for AesOutputStream<Inner> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() { return Ok(0); }
        let key_size = self.key_size;

        // top up the pending block first
        let mut position = (key_size - self.temp_pos).min(bytes.len());
        self.buffer[self.temp_pos .. self.temp_pos + position].copy_from_slice(&bytes[.. position]);
        if position == bytes.len() {
            self.temp_pos += position;
            return Ok(position);
        }

        self.temp_pos = 0;
        let written = self.emit_block()?;
        if written < key_size { return Ok(position + written); }

        while bytes.len() - position >= key_size {
            if bytes.len() - position >= BURST_SIZE {
                let mut coded = [0_u8; BURST_SIZE];
                self.crypto.encrypt(&bytes[position .. position + BURST_SIZE], &mut coded, OperationMode::Cfb)?;
                let written = self.inner.write(&coded)?;
                if written < BURST_SIZE { return Ok(position + written); }
                position += BURST_SIZE;
                continue;
            }

            let mut coded = [0_u8; MAX_BLOCK_SIZE];
            self.crypto.encrypt(&bytes[position .. position + key_size], &mut coded[.. key_size], OperationMode::Cfb)?;
            let written = self.inner.write(&coded[.. key_size])?;
            if written < key_size { return Ok(position + written); }
            position += key_size;
        }

        // don't emit a partial block; keep it for later
        if position == bytes.len() { return Ok(position); }

        let rest = bytes.len() - position;
        self.buffer[.. rest].copy_from_slice(&bytes[position ..]);
        self.temp_pos = rest;
        Ok(bytes.len())
    }
}

impl<Inner: OutputStream> Drop for AesOutputStream<Inner> {
    fn drop(&mut self) {
        if self.temp_pos > 0 {
            let temp_pos = self.temp_pos;
            let key_size = self.key_size;

            // zero-pad to a whole block; the wire only carries the
            // ciphertext prefix covering the real plaintext bytes
            self.buffer[temp_pos ..].fill(0);

            let mut coded = [0_u8; MAX_BLOCK_SIZE];
            if self.crypto
                .encrypt(&self.buffer[.. key_size], &mut coded[.. key_size], OperationMode::Cfb)
                .is_ok()
            {
                let _ = self.inner.write(&coded[.. temp_pos.min(key_size)]);
            }
        }
        self.buffer.zeroize();
    }
}
