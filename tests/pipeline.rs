
//! Assembling stream graphs: buffering equivalence, tee/range/successive
//! semantics, and the encode ∘ compress ∘ encrypt pipeline with its
//! inverse.

use bytepipe::compress::ZLib;
use bytepipe::stream::*;

use rand::prelude::*;


fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0_u8; length];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}


#[test]
fn buffered_stream_is_equivalent_to_the_plain_one(){
    let data = random_bytes(200_000);
    let mut rng = rand::rng();

    let mut plain = MemoryBlockStream::new(&data);
    let mut buffered = BufferedInputStream::with_buffer_size(MemoryBlockStream::new(&data), 1024);

    for _ in 0 .. 200 {
        let position = rng.random_range(0 .. data.len() as u64 - 600);
        assert!(plain.set_position(position));
        assert!(buffered.set_position(position));

        let length = rng.random_range(1 .. 512_usize);
        let mut expected = vec![0_u8; length];
        let mut actual = vec![0_u8; length];

        let expected_count = plain.read(&mut expected).unwrap();
        let actual_count = buffered.read(&mut actual).unwrap();

        assert_eq!(actual_count, expected_count, "at {}", position);
        assert_eq!(actual, expected, "at {}", position);
        assert_eq!(buffered.current_position(), plain.current_position());
    }
}

#[test]
fn positions_stay_monotone_on_sequential_reads(){
    let data = random_bytes(10_000);
    let mut stream = MemoryBlockStream::new(&data);

    let mut last = 0_u64;
    let mut chunk = [0_u8; 97];
    loop {
        let count = stream.read(&mut chunk).unwrap();
        assert!(stream.current_position() >= last);
        last = stream.current_position();
        if count < chunk.len() { break; }
    }
    assert_eq!(last, 10_000);
}

#[test]
fn tee_seed_scenario(){
    // ten bytes into a null sink and a five byte region: the tee reports
    // five written and the null sink is rewound to five
    let mut region = [0_u8; 5];
    let mut tee = TeeStream::new(NullOutputStream::new(), MemoryBlockOutStream::new(&mut region));

    assert_eq!(tee.write(&[0x77; 10]).unwrap(), 5);

    let (null, _fixed) = tee.into_inner();
    assert_eq!(null.current_position(), 5);
}

#[test]
fn range_and_successive_compose(){
    let data = random_bytes(1000);

    // a range over the middle, concatenated with a range over the head
    let middle = RangeInputStream::new(MemoryBlockStream::new(&data), 400, 700);
    let head = RangeInputStream::new(MemoryBlockStream::new(&data), 0, 100);
    let mut joined = SuccessiveStream::new(middle, head);

    assert_eq!(joined.full_size(), 400);

    let mut sink = OutputMemStream::new();
    copy_stream(&mut joined, &mut sink, 0).unwrap();

    let mut expected = data[400 .. 700].to_vec();
    expected.extend_from_slice(&data[.. 100]);
    assert_eq!(sink.block().as_bytes(), &expected[..]);
}

#[test]
fn encode_compress_encrypt_pipeline_inverts(){
    let data = random_bytes(60_000);
    let key = [0x1C_u8; 16];
    let iv = [0xD7_u8; 16];

    // write side: base64-encode, then compress, then encrypt into memory
    let mut sink = OutputMemStream::new();
    {
        let encrypted = AesOutputStream::new(&mut sink, &key, &iv).unwrap();
        let compressed = CompressOutputStream::with_compressor(encrypted, Box::new(ZLib::new()));
        let mut encoded = Base64OutputStream::new(compressed);

        let mut offset = 0;
        for step in [1_usize, 17, 4096, 333].iter().cycle() {
            if offset >= data.len() { break; }
            let end = (offset + step).min(data.len());
            encoded.write(&data[offset .. end]).unwrap();
            offset = end;
        }
        // dropping the pipeline flushes base64 padding, the deflate
        // trailer, and the final short cipher block in that order
    }

    let wire = sink.into_block();

    // read side: decrypt, decompress, base64-decode
    let decrypted = AesInputStream::new(
        MemoryBlockStream::new(wire.as_bytes()), &key, &iv).unwrap();
    let decompressed = DecompressInputStream::with_compressor(decrypted, Box::new(ZLib::new()));
    let mut decoded = Base64InputStream::new(decompressed);

    let mut out = Vec::new();
    let mut chunk = [0_u8; 1021];
    loop {
        let count = decoded.read(&mut chunk).unwrap();
        if count == 0 { break; }
        out.extend_from_slice(&chunk[.. count]);
    }

    assert_eq!(out.len(), data.len());
    assert!(out == data, "pipeline round-trip corrupted the payload");
}

#[test]
fn compress_encrypt_pipeline_with_gzip_default(){
    let data = random_bytes(30_000);
    let key = [0x99_u8; 32];
    let iv = [0x11_u8; 32];

    let mut sink = OutputMemStream::new();
    {
        let encrypted = AesOutputStream::new(&mut sink, &key, &iv).unwrap();
        let mut compressed = CompressOutputStream::new(encrypted);
        compressed.write(&data).unwrap();
    }

    let wire = sink.into_block();

    let decrypted = AesInputStream::new(
        MemoryBlockStream::new(wire.as_bytes()), &key, &iv).unwrap();
    let mut decompressed = DecompressInputStream::new(decrypted);

    let mut out = vec![0_u8; data.len()];
    let mut done = 0;
    while done < out.len() {
        let count = decompressed.read(&mut out[done ..]).unwrap();
        assert!(count > 0, "pipeline drained early at {}", done);
        done += count;
    }
    assert_eq!(out, data);
}

#[test]
fn clone_stream_preserves_contents_and_position(){
    let data = random_bytes(5000);
    let mut source = MemoryBlockStream::new(&data);

    let mut cloned = clone_stream(&mut source).unwrap();
    assert_eq!(source.current_position(), 0);

    let mut sink = OutputMemStream::new();
    copy_stream(&mut cloned, &mut sink, 0).unwrap();
    assert_eq!(sink.block().as_bytes(), &data[..]);
}

#[test]
fn forced_size_caps_the_copy(){
    let data = random_bytes(5000);

    // a non-mappable wrapper so the 4 KiB loop is exercised
    let mut source = BufferedInputStream::with_buffer_size(MemoryBlockStream::new(&data), 512);
    let mut sink = OutputMemStream::new();

    copy_stream(&mut source, &mut sink, 1234).unwrap();
    assert_eq!(sink.block().as_bytes(), &data[.. 1234]);
}
