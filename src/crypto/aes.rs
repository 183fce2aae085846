
//! The Rijndael (AES) block cipher with the full set of block sizes.
//!
//! Unlike the FIPS-197 subset, the cipher accepts block sizes of 16, 24
//! and 32 bytes next to the usual key sizes, with the round count
//! `max(Nk, Nb) + 6` capped at 14 and the wider row shifts the larger
//! states require. The substitution tables are derived at compile time
//! from the field arithmetic instead of being pasted in.
//!
//! Key schedule, chain blocks and scratch are wiped on drop.

use crate::error::{Error, PassiveResult};
use super::{OperationMode, SymCipher, MAX_BLOCK_SIZE, VALID_BLOCK_SIZES, xor_blocks};
use zeroize::Zeroize;


const MAX_COLUMNS: usize = MAX_BLOCK_SIZE / 4;
const MAX_ROUNDS: usize = 14;
const MAX_SCHEDULE_WORDS: usize = MAX_COLUMNS * (MAX_ROUNDS + 1);


/// Multiplication in GF(2^8) modulo the Rijndael polynomial 0x11B.
const fn gf_multiply(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0_u8;
    let mut bit = 0;
    while bit < 8 {
        if b & 1 != 0 { product ^= a; }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 { a ^= 0x1B; }
        b >>= 1;
        bit += 1;
    }
    product
}

const fn gf_inverse(value: u8) -> u8 {
    // x^254 == x^-1 for x != 0, by square-and-multiply
    if value == 0 { return 0; }
    let mut result = 1_u8;
    let mut base = value;
    let mut exponent = 254;
    while exponent > 0 {
        if exponent & 1 != 0 { result = gf_multiply(result, base); }
        base = gf_multiply(base, base);
        exponent >>= 1;
    }
    result
}

const fn substitution_boxes() -> ([u8; 256], [u8; 256]) {
    let mut forward = [0_u8; 256];
    let mut value = 0;
    while value < 256 {
        let inverse = gf_inverse(value as u8);
        forward[value] = inverse
            ^ inverse.rotate_left(1) ^ inverse.rotate_left(2)
            ^ inverse.rotate_left(3) ^ inverse.rotate_left(4)
            ^ 0x63;
        value += 1;
    }

    let mut backward = [0_u8; 256];
    let mut value = 0;
    while value < 256 {
        backward[forward[value] as usize] = value as u8;
        value += 1;
    }

    (forward, backward)
}

const S_BOXES: ([u8; 256], [u8; 256]) = substitution_boxes();
const S_BOX: [u8; 256] = S_BOXES.0;
const INV_S_BOX: [u8; 256] = S_BOXES.1;

const fn round_constants() -> [u8; 30] {
    let mut constants = [0_u8; 30];
    let mut value = 1_u8;
    let mut index = 1;
    while index < 30 {
        constants[index] = value;
        value = gf_multiply(value, 2);
        index += 1;
    }
    constants
}

const ROUND_CONSTANTS: [u8; 30] = round_constants();

/// Row shift offsets per column count; the 256-bit state shifts wider.
const fn row_shifts(columns: usize) -> [usize; 4] {
    if columns == 8 { [0, 1, 3, 4] } else { [0, 1, 2, 3] }
}


/// The Rijndael (AES) cipher, used to encrypt and decrypt with keys and
/// blocks from 128 to 256 bits.
pub struct Aes {
    key_set_up: bool,
    block_size: usize,
    columns: usize,
    rounds: usize,
    key_length: usize,

    /// Expanded key schedule, one four-byte word per state column and
    /// round.
    schedule: [[u8; 4]; MAX_SCHEDULE_WORDS],

    /// The initial chain block, restored by `set_key`.
    chain0: [u8; MAX_BLOCK_SIZE],
    /// The working chain block carried across calls.
    chain: [u8; MAX_BLOCK_SIZE],
}

impl Aes {

    pub fn new() -> Self {
        Aes {
            key_set_up: false,
            block_size: 0,
            columns: 0,
            rounds: 0,
            key_length: 0,
            schedule: [[0; 4]; MAX_SCHEDULE_WORDS],
            chain0: [0; MAX_BLOCK_SIZE],
            chain: [0; MAX_BLOCK_SIZE],
        }
    }

    /// The configured key length in bytes, zero before `set_key`.
    pub fn key_length(&self) -> usize {
        if self.key_set_up { self.key_length } else { 0 }
    }

    fn expand_key(&mut self, key: &[u8]) {
        let key_words = key.len() / 4;
        let total_words = self.columns * (self.rounds + 1);

        for (index, word) in self.schedule[.. key_words].iter_mut().enumerate() {
            word.copy_from_slice(&key[index * 4 .. index * 4 + 4]);
        }

        for index in key_words .. total_words {
            let mut word = self.schedule[index - 1];

            if index % key_words == 0 {
                word.rotate_left(1);
                for byte in &mut word { *byte = S_BOX[*byte as usize]; }
                word[0] ^= ROUND_CONSTANTS[index / key_words];
            }
            else if key_words > 6 && index % key_words == 4 {
                for byte in &mut word { *byte = S_BOX[*byte as usize]; }
            }

            for (byte, previous) in word.iter_mut().zip(&self.schedule[index - key_words]) {
                *byte ^= previous;
            }
            self.schedule[index] = word;
        }
    }

    fn add_round_key(&self, state: &mut [[u8; 4]; MAX_COLUMNS], round: usize) {
        for column in 0 .. self.columns {
            let word = &self.schedule[round * self.columns + column];
            for row in 0 .. 4 { state[column][row] ^= word[row]; }
        }
    }

    fn cipher_block(&self, input: &[u8], output: &mut [u8]) {
        let columns = self.columns;
        let shifts = row_shifts(columns);

        let mut state = [[0_u8; 4]; MAX_COLUMNS];
        for column in 0 .. columns {
            state[column].copy_from_slice(&input[column * 4 .. column * 4 + 4]);
        }

        self.add_round_key(&mut state, 0);

        for round in 1 ..= self.rounds {
            // SubBytes and ShiftRows fused over the byte matrix
            let mut shifted = [[0_u8; 4]; MAX_COLUMNS];
            for column in 0 .. columns {
                for row in 0 .. 4 {
                    shifted[column][row] = S_BOX[state[(column + shifts[row]) % columns][row] as usize];
                }
            }

            if round < self.rounds {
                for column in 0 .. columns {
                    let [a, b, c, d] = shifted[column];
                    state[column] = [
                        gf_multiply(a, 2) ^ gf_multiply(b, 3) ^ c ^ d,
                        a ^ gf_multiply(b, 2) ^ gf_multiply(c, 3) ^ d,
                        a ^ b ^ gf_multiply(c, 2) ^ gf_multiply(d, 3),
                        gf_multiply(a, 3) ^ b ^ c ^ gf_multiply(d, 2),
                    ];
                }
            }
            else { state = shifted; }

            self.add_round_key(&mut state, round);
        }

        for column in 0 .. columns {
            output[column * 4 .. column * 4 + 4].copy_from_slice(&state[column]);
        }
    }

    fn decipher_block(&self, input: &[u8], output: &mut [u8]) {
        let columns = self.columns;
        let shifts = row_shifts(columns);

        let mut state = [[0_u8; 4]; MAX_COLUMNS];
        for column in 0 .. columns {
            state[column].copy_from_slice(&input[column * 4 .. column * 4 + 4]);
        }

        self.add_round_key(&mut state, self.rounds);

        for round in (0 .. self.rounds).rev() {
            // InvShiftRows and InvSubBytes fused
            let mut shifted = [[0_u8; 4]; MAX_COLUMNS];
            for column in 0 .. columns {
                for row in 0 .. 4 {
                    shifted[(column + shifts[row]) % columns][row] = INV_S_BOX[state[column][row] as usize];
                }
            }
            state = shifted;

            self.add_round_key(&mut state, round);

            if round > 0 {
                for column in 0 .. columns {
                    let [a, b, c, d] = state[column];
                    state[column] = [
                        gf_multiply(a, 0x0E) ^ gf_multiply(b, 0x0B) ^ gf_multiply(c, 0x0D) ^ gf_multiply(d, 0x09),
                        gf_multiply(a, 0x09) ^ gf_multiply(b, 0x0E) ^ gf_multiply(c, 0x0B) ^ gf_multiply(d, 0x0D),
                        gf_multiply(a, 0x0D) ^ gf_multiply(b, 0x09) ^ gf_multiply(c, 0x0E) ^ gf_multiply(d, 0x0B),
                        gf_multiply(a, 0x0B) ^ gf_multiply(b, 0x0D) ^ gf_multiply(c, 0x09) ^ gf_multiply(d, 0x0E),
                    ];
                }
            }
        }

        for column in 0 .. columns {
            output[column * 4 .. column * 4 + 4].copy_from_slice(&state[column]);
        }
    }

    /// Encrypt exactly one block of the configured size.
    pub fn encrypt_one_block(&self, input: &[u8], output: &mut [u8]) -> PassiveResult {
        if !self.key_set_up { return Err(Error::NotKeyed); }
        if input.len() != self.block_size || output.len() < self.block_size {
            return Err(Error::BadLength);
        }
        self.cipher_block(input, output);
        Ok(())
    }

    /// Decrypt exactly one block of the configured size.
    pub fn decrypt_one_block(&self, input: &[u8], output: &mut [u8]) -> PassiveResult {
        if !self.key_set_up { return Err(Error::NotKeyed); }
        if input.len() != self.block_size || output.len() < self.block_size {
            return Err(Error::BadLength);
        }
        self.decipher_block(input, output);
        Ok(())
    }

    /// The 16-byte fast path: encrypt one default-sized block.
    pub fn encrypt_default_block(&self, input: &[u8; 16], output: &mut [u8; 16]) -> PassiveResult {
        if !self.key_set_up { return Err(Error::NotKeyed); }
        if self.block_size != 16 { return Err(Error::BadLength); }
        self.cipher_block(input, output);
        Ok(())
    }

    /// The 16-byte fast path: decrypt one default-sized block.
    pub fn decrypt_default_block(&self, input: &[u8; 16], output: &mut [u8; 16]) -> PassiveResult {
        if !self.key_set_up { return Err(Error::NotKeyed); }
        if self.block_size != 16 { return Err(Error::BadLength); }
        self.decipher_block(input, output);
        Ok(())
    }

    fn check_buffers(&self, input: &[u8], output: &[u8]) -> PassiveResult {
        if !self.key_set_up { return Err(Error::NotKeyed); }
        if input.is_empty() || input.len() % self.block_size != 0 || output.len() < input.len() {
            return Err(Error::BadLength);
        }
        Ok(())
    }
}

impl Default for Aes {
    fn default() -> Self { Aes::new() }
}

impl std::fmt::Debug for Aes {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        formatter.debug_struct("Aes")
            .field("key_set_up", &self.key_set_up)
            .field("block_size", &self.block_size)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

impl SymCipher for Aes {

    fn block_size(&self) -> usize {
        if self.key_set_up { self.block_size } else { 0 }
    }

    fn set_key(&mut self, key: &[u8], chain: Option<&[u8]>, block_size: usize) -> PassiveResult {
        if !VALID_BLOCK_SIZES.contains(&key.len()) || !VALID_BLOCK_SIZES.contains(&block_size) {
            return Err(Error::BadLength);
        }
        if let Some(chain) = chain {
            if chain.len() != block_size { return Err(Error::BadLength); }
        }

        self.key_set_up = false;
        self.schedule.zeroize();

        self.block_size = block_size;
        self.columns = block_size / 4;
        self.key_length = key.len();
        self.rounds = ((key.len() / 4).max(self.columns) + 6).min(MAX_ROUNDS);

        self.expand_key(key);

        self.chain0 = [0; MAX_BLOCK_SIZE];
        if let Some(chain) = chain {
            self.chain0[.. chain.len()].copy_from_slice(chain);
        }
        self.chain = self.chain0;

        self.key_set_up = true;
        Ok(())
    }

    fn encrypt(&mut self, input: &[u8], output: &mut [u8], mode: OperationMode) -> PassiveResult {
        self.check_buffers(input, output)?;
        let block = self.block_size;
        let mut scratch = [0_u8; MAX_BLOCK_SIZE];

        for (index, source) in input.chunks_exact(block).enumerate() {
            let target = &mut output[index * block .. index * block + block];

            match mode {
                OperationMode::Ecb => self.cipher_block(source, target),

                OperationMode::Cbc => {
                    xor_blocks(&mut scratch[.. block], source, &self.chain[.. block]);
                    self.cipher_block(&scratch[.. block], target);
                    self.chain[.. block].copy_from_slice(target);
                },

                OperationMode::Cfb => {
                    self.cipher_block(&self.chain[.. block], &mut scratch[.. block]);
                    xor_blocks(target, source, &scratch[.. block]);
                    self.chain[.. block].copy_from_slice(target);
                },
            }
        }

        scratch.zeroize();
        Ok(())
    }

    fn decrypt(&mut self, input: &[u8], output: &mut [u8], mode: OperationMode) -> PassiveResult {
        self.check_buffers(input, output)?;
        let block = self.block_size;
        let mut scratch = [0_u8; MAX_BLOCK_SIZE];

        for (index, source) in input.chunks_exact(block).enumerate() {
            let target = &mut output[index * block .. index * block + block];

            match mode {
                OperationMode::Ecb => self.decipher_block(source, target),

                OperationMode::Cbc => {
                    self.decipher_block(source, &mut scratch[.. block]);
                    xor_blocks(target, &scratch[.. block], &self.chain[.. block]);
                    self.chain[.. block].copy_from_slice(source);
                },

                OperationMode::Cfb => {
                    let chain = self.chain;
                    // the new chain is the ciphertext before it is unmasked
                    self.chain[.. block].copy_from_slice(source);
                    self.cipher_block(&chain[.. block], &mut scratch[.. block]);
                    xor_blocks(target, source, &scratch[.. block]);
                },
            }
        }

        scratch.zeroize();
        Ok(())
    }
}

impl Drop for Aes {
    fn drop(&mut self) {
        self.schedule.zeroize();
        self.chain0.zeroize();
        self.chain.zeroize();
        self.key_set_up = false;
    }
}
