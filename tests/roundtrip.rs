
//! Round-trip properties of the codecs, the cipher and the compressors,
//! plus the literal seed scenarios the crate promises to honour.

use bytepipe::compress::{Compressor, GZip, ZLib};
use bytepipe::crypto::{Aes, OperationMode, SymCipher};
use bytepipe::encoding;
use bytepipe::memory::MemoryBlock;

use rand::prelude::*;


fn random_bytes(rng: &mut impl Rng, length: usize) -> Vec<u8> {
    let mut bytes = vec![0_u8; length];
    rng.fill_bytes(&mut bytes);
    bytes
}


// ------------------------------------------------------------ text codecs

fn roundtrip_base16(data: &[u8]) -> Vec<u8> {
    let mut coded = vec![0_u8; encoding::encoded_size_base16(data.len())];
    let coded_len = encoding::encode_base16(data, &mut coded).unwrap();

    let mut decoded = vec![0_u8; encoding::decoded_size_base16(&coded[.. coded_len])];
    let decoded_len = encoding::decode_base16(&coded[.. coded_len], &mut decoded).unwrap();
    decoded.truncate(decoded_len);
    decoded
}

fn roundtrip_base64(data: &[u8]) -> Vec<u8> {
    let mut coded = vec![0_u8; encoding::encoded_size_base64(data.len())];
    let coded_len = encoding::encode_base64(data, &mut coded).unwrap();

    let mut decoded = vec![0_u8; encoding::decoded_size_base64(&coded[.. coded_len])];
    let decoded_len = encoding::decode_base64(&coded[.. coded_len], &mut decoded).unwrap();
    decoded.truncate(decoded_len);
    decoded
}

fn roundtrip_base85(data: &[u8]) -> Vec<u8> {
    let mut coded = vec![0_u8; encoding::encoded_size_base85(data.len())];
    let coded_len = encoding::encode_base85(data, &mut coded).unwrap();

    let mut decoded = vec![0_u8; encoding::decoded_size_base85(&coded[.. coded_len]).unwrap()];
    let decoded_len = encoding::decode_base85(&coded[.. coded_len], &mut decoded).unwrap();
    decoded.truncate(decoded_len);
    decoded
}

#[test]
fn all_codecs_roundtrip_random_data(){
    let mut rng = rand::rng();

    for _ in 0 .. 50 {
        let length = rng.random_range(0 .. 4096);
        let data = random_bytes(&mut rng, length);

        assert_eq!(roundtrip_base16(&data), data, "base16, length {}", length);
        assert_eq!(roundtrip_base64(&data), data, "base64, length {}", length);
        assert_eq!(roundtrip_base85(&data), data, "base85, length {}", length);
    }
}

#[test]
fn base64_seed_scenario(){
    let mut coded = vec![0_u8; encoding::encoded_size_base64(11)];
    let coded_len = encoding::encode_base64(b"hello world", &mut coded).unwrap();
    assert_eq!(&coded[.. coded_len], b"aGVsbG8gd29ybGQ=");

    let block = MemoryBlock::from_base64(b"aGVsbG8gd29ybGQ=").unwrap();
    assert_eq!(block.as_bytes(), b"hello world");
}

#[test]
fn base85_zero_quad_seed_scenario(){
    let mut coded = vec![0_u8; encoding::encoded_size_base85(8)];
    let coded_len = encoding::encode_base85(&[0_u8; 8], &mut coded).unwrap();
    assert_eq!(&coded[.. coded_len], b"zz");

    let block = MemoryBlock::from_base85(b"zz").unwrap();
    assert_eq!(block.as_bytes(), &[0_u8; 8]);
}

#[test]
fn base16_odd_tail_seed_scenario(){
    let even = MemoryBlock::from_base16(b"91AFC0").unwrap();
    let odd = MemoryBlock::from_base16(b"91AFC").unwrap();
    assert_eq!(even.as_bytes(), &[0x91, 0xAF, 0xC0]);
    assert_eq!(odd, even);
}


// -------------------------------------------------------------------- aes

#[test]
fn aes_roundtrips_for_every_mode(){
    let mut rng = rand::rng();

    for &mode in &[OperationMode::Ecb, OperationMode::Cbc, OperationMode::Cfb] {
        for _ in 0 .. 10 {
            let blocks = rng.random_range(1 .. 64_usize);
            let data = random_bytes(&mut rng, blocks * 16);
            let key = random_bytes(&mut rng, 16);
            let iv = random_bytes(&mut rng, 16);

            let mut cipher = Aes::new();
            cipher.set_key(&key, Some(&iv), 16).unwrap();
            let mut coded = vec![0_u8; data.len()];
            cipher.encrypt(&data, &mut coded, mode).unwrap();

            cipher.set_key(&key, Some(&iv), 16).unwrap();
            let mut decoded = vec![0_u8; data.len()];
            cipher.decrypt(&coded, &mut decoded, mode).unwrap();

            assert_eq!(decoded, data, "{:?}, {} blocks", mode, blocks);
        }
    }
}

#[test]
fn aes_cfb_keystream_seed_scenario(){
    // with key = iv = zeros, encrypting 32 zero bytes must yield the
    // aes-128 keystream under an all-zero chain
    let zero = [0_u8; 16];

    let mut cipher = Aes::new();
    cipher.set_key(&zero, Some(&zero), 16).unwrap();
    let mut coded = [0_u8; 32];
    cipher.encrypt(&[0_u8; 32], &mut coded, OperationMode::Cfb).unwrap();

    let mut stream_cipher = Aes::new();
    stream_cipher.set_key(&zero, None, 16).unwrap();

    let mut first = [0_u8; 16];
    stream_cipher.encrypt(&zero, &mut first, OperationMode::Ecb).unwrap();
    assert_eq!(&coded[.. 16], &first);

    let mut second = [0_u8; 16];
    stream_cipher.encrypt(&first, &mut second, OperationMode::Ecb).unwrap();
    assert_eq!(&coded[16 ..], &second);

    cipher.set_key(&zero, Some(&zero), 16).unwrap();
    let coded_copy = coded;
    let mut decoded = [0_u8; 32];
    cipher.decrypt(&coded_copy, &mut decoded, OperationMode::Cfb).unwrap();
    assert_eq!(decoded, [0_u8; 32]);
}


// ------------------------------------------------------------ compressors

#[test]
fn compressors_roundtrip_every_strength(){
    let mut rng = rand::rng();
    // compressible data: long runs with a sprinkle of noise
    let mut data = vec![0_u8; 1 << 20];
    for chunk in data.chunks_mut(4096) {
        let value = rng.random::<u8>();
        chunk.fill(value);
    }

    let block = MemoryBlock::from(data.clone());

    for strength in 0 ..= 9 {
        let factor = strength as f32 / 9.0;

        let mut zlib = ZLib::new();
        zlib.set_compression_factor(factor);
        let packed = zlib.compress_block(&block).unwrap();
        let unpacked = zlib.decompress_block(&packed).unwrap();
        assert_eq!(unpacked.as_bytes(), &data[..], "zlib, strength {}", strength);

        let mut gzip = GZip::new();
        gzip.set_compression_factor(factor);
        let packed = gzip.compress_block(&block).unwrap();
        let unpacked = gzip.decompress_block(&packed).unwrap();
        assert_eq!(unpacked.as_bytes(), &data[..], "gzip, strength {}", strength);
    }
}

#[test]
fn gzip_metadata_seed_scenario(){
    let mut writer = GZip::new();
    writer.set_file_source_info("t.txt", 1_700_000_000.0);
    let packed = writer.compress_block(&MemoryBlock::from(&b"ABC"[..])).unwrap();

    let mut reader = GZip::new();
    let unpacked = reader.decompress_block(&packed).unwrap();

    assert_eq!(unpacked.as_bytes(), b"ABC");
    assert_eq!(reader.file_name(), "t.txt");
    assert_eq!(reader.file_time(), 1_700_000_000.0);
}

#[test]
fn gzip_fractional_mtime_is_truncated(){
    let mut writer = GZip::new();
    writer.set_file_source_info("frac.bin", 123_456.789);
    let packed = writer.compress_block(&MemoryBlock::from(&b"x"[..])).unwrap();

    let mut reader = GZip::new();
    reader.decompress_block(&packed).unwrap();
    assert_eq!(reader.file_time(), 123_456.0);
}
