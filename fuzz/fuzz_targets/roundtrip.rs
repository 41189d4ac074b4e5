#![no_main]
use libfuzzer_sys::fuzz_target;
use lzwpack::{decode, encode, LzwStatus};

/// Run a coder over `inp` in slices of at most `chunk` bytes into `out` slices of `chunk` bytes.
///
/// The flag passed to `step` tells whether all input has been handed out.
fn chunked(
    inp: &[u8],
    chunk: usize,
    mut step: impl FnMut(&[u8], &mut [u8], bool) -> lzwpack::StreamResult,
) -> Vec<u8> {
    let mut inp = inp;
    let mut output = vec![];
    let mut out = vec![0; chunk];
    loop {
        let result = step(&inp[..inp.len().min(chunk)], &mut out, inp.is_empty());
        inp = &inp[result.consumed_in..];
        output.extend_from_slice(&out[..result.consumed_out]);
        match result.status {
            Ok(LzwStatus::Done) => return output,
            Ok(_) => {}
            Err(err) => panic!("{:?}", err),
        }
    }
}

fuzz_target!(|raw: &[u8]| {
    let (sizes, data) = match raw {
        [enc, dec, data @ ..] => ((usize::from(*enc) + 1, usize::from(*dec) + 1), data),
        _ => return,
    };

    let expected = encode::Encoder::new().encode(data).unwrap();

    let mut encoder = encode::Encoder::new();
    let compressed = chunked(data, sizes.0, |inp, out, ended| {
        if ended {
            encoder.finish();
        }
        encoder.encode_bytes(inp, out)
    });
    assert_eq!(compressed, expected);

    let mut decoder = decode::Decoder::new();
    let mut stream = vec![];
    let result = decoder.into_stream(&mut stream).decode_all(compressed.as_slice());
    assert!(result.status.is_ok(), "{:?}", result.status);
    assert_eq!(stream, data);

    let mut decoder = decode::Decoder::new();
    let decompressed = chunked(&compressed, sizes.1, |inp, out, ended| {
        if ended {
            decoder.finish();
        }
        decoder.decode_bytes(inp, out)
    });
    assert_eq!(decompressed, data);
});
