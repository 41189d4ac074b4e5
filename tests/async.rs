use std::{env, fs};

use futures::io::AsyncWriteExt as _;
use lzwpack::{decode, encode};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::compat::{TokioAsyncReadCompatExt as _, TokioAsyncWriteCompatExt as _};

async fn pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("localhost:0")
        .await
        .expect("No loop tcp for testing");
    let addr = listener.local_addr().expect("No address for listener");

    let connect = TcpStream::connect(addr);
    let accept = listener.accept();

    let (a, (b, _)) = tokio::try_join!(connect, accept).expect("Can connect");
    (a, b)
}

async fn assert_send_through(data: &[u8], send: TcpStream, recv: TcpStream) {
    let mut send = send.compat_write();
    let mut recv = BufReader::new(recv).compat();

    let mut encoder = encode::Encoder::new();
    let encode = async {
        let result = encoder.into_async(&mut send).encode_all(data).await;
        // The decoder only ends the stream once its input is closed.
        send.close().await.expect("Could close the sender");
        result
    };

    let mut recv_buffer = vec![];
    let mut decoder = decode::Decoder::new();
    let decode = decoder.into_async(&mut recv_buffer).decode_all(&mut recv);

    let (encode, decode) = tokio::join!(encode, decode);
    encode.status.expect("Could send/encoded data");
    decode.status.expect("Could recv/decode data");

    assert_eq!(recv_buffer, data);
}

#[test]
fn with_streams() {
    let file = env::args().next().unwrap();
    let mut data = fs::read(file).unwrap();
    data.truncate(1 << 20);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .expect("runtime");
    let _enter = rt.enter();

    let (send, recv) = rt.block_on(pair());
    rt.block_on(assert_send_through(&data, send, recv));
}

#[tokio::test]
async fn with_slices() {
    let data = b"TOBEORNOTTOBEORTOBEORNOT#".repeat(64);

    let mut compressed = vec![];
    let mut encoder = encode::Encoder::new();
    let result = encoder
        .into_async(&mut compressed)
        .encode_all(data.as_slice())
        .await;
    assert!(result.status.is_ok());
    assert_eq!(compressed, encode::Encoder::new().encode(&data).unwrap());

    let mut decompressed = vec![];
    let mut decoder = decode::Decoder::new();
    let result = decoder
        .into_async(&mut decompressed)
        .decode_all(compressed.as_slice())
        .await;
    assert!(result.status.is_ok());
    assert_eq!(result.bytes_read, compressed.len());
    assert_eq!(decompressed, data);
}

#[tokio::test]
async fn errors_are_reported() {
    let mut decompressed = vec![];
    let mut decoder = decode::Decoder::new();
    let result = decoder
        .into_async(&mut decompressed)
        .decode_all(&[0x2c, 0x80][..])
        .await;
    let err = result.status.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
