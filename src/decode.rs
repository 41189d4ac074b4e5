//! A module for all decoding needs.
use crate::framing::MsbReader;
use crate::{into_io_error, AllResult, Code, LzwError, LzwStatus, StreamResult};
use crate::{DICT_SIZE, FIRST_CODE, MAX_CODES, MAX_CODE_SIZE};

use std::io::{self, BufRead, Write};
use tracing::{debug, trace};

/// The state for decoding data with an LZW algorithm.
///
/// The decoder mirrors the dictionary growth of the encoder. It needs no hashing since codes
/// arrive in the order they were assigned.
pub struct Decoder {
    state: Box<DecodeState>,
}

/// A decoding stream sink.
///
/// See [`Decoder::into_stream`] on how to create this type.
///
/// [`Decoder::into_stream`]: struct.Decoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

/// An async decoding sink.
///
/// See [`Decoder::into_async`] on how to create this type.
///
/// [`Decoder::into_async`]: struct.Decoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

#[derive(Clone, Copy)]
struct Link {
    prefix: Code,
    byte: u8,
}

struct DecodeState {
    /// The table of learned strings, indexed by `code - FIRST_CODE`.
    table: Table,

    /// The buffer of decoded data.
    buffer: Buffer,

    /// The last code and the first byte of its string.
    last: Option<(Code, u8)>,

    /// The code the next learned string gets.
    next_code: Code,

    /// An escalation marker was read and its successor is still missing.
    escalated: bool,

    /// If the input is complete.
    has_ended: bool,

    /// If the end of the code stream was reached.
    is_done: bool,

    /// The bit buffer and code size.
    bits: MsbReader,
}

struct Buffer {
    bytes: Box<[u8]>,
    read_mark: usize,
    write_mark: usize,
}

struct Table {
    inner: Vec<Link>,
    depths: Vec<u16>,
}

impl Decoder {
    /// Create a new decoder expecting 9 bit codes.
    pub fn new() -> Self {
        Decoder {
            state: Box::new(DecodeState::new()),
        }
    }

    /// Decode some bytes from `inp` and write result to `out`.
    ///
    /// This will consume a prefix of the input buffer and write decoded output into a prefix of
    /// the output buffer. See the respective fields of the return value for the count of
    /// consumed and written bytes. The stream can only end after [`finish`] was called, until
    /// then a partial code word at the end of `inp` is kept for the next call.
    ///
    /// [`finish`]: #method.finish
    pub fn decode_bytes(&mut self, inp: &[u8], out: &mut [u8]) -> StreamResult {
        self.state.advance(inp, out)
    }

    /// Decode a single chunk of LZW encoded data.
    ///
    /// The chunk is treated as the complete code stream.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>, LzwError> {
        let mut output = Vec::with_capacity(data.len() * 2);
        let mut buffer = vec![0; 1 << 12];
        let mut inp = data;

        self.finish();
        loop {
            let result = self.decode_bytes(inp, &mut buffer[..]);
            inp = &inp[result.consumed_in..];
            output.extend_from_slice(&buffer[..result.consumed_out]);

            match result.status? {
                LzwStatus::Done => return Ok(output),
                LzwStatus::Ok | LzwStatus::NoProgress => {}
            }
        }
    }

    /// Construct a decoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream {
            decoder: self,
            writer,
        }
    }

    /// Construct a decoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: futures::io::AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync {
            decoder: self,
            writer,
        }
    }

    /// Mark the input as complete.
    ///
    /// In following calls to `decode_bytes` running out of input ends the stream. Bits left
    /// over at that point must be padding, shorter than a byte.
    pub fn finish(&mut self) {
        self.state.has_ended = true;
    }

    /// Check if the end of the code stream has been reached.
    pub fn has_ended(&self) -> bool {
        self.state.is_done
    }

    /// Forget all learned strings and expect a new stream.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// The size of the code words that are read next.
    pub fn code_size(&self) -> u8 {
        self.state.bits.code_size()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Decode data from a reader.
    ///
    /// This will read data until the reader is exhausted but it will not end the stream. A
    /// code word split at the end of the reader is kept for following calls.
    pub fn decode(&mut self, read: impl BufRead) -> AllResult {
        self.decode_part(read, false)
    }

    /// Decode data from a reader until the end of the stream.
    pub fn decode_all(mut self, read: impl BufRead) -> AllResult {
        self.decode_part(read, true)
    }

    fn decode_part(&mut self, mut read: impl BufRead, finish: bool) -> AllResult {
        let IntoStream { decoder, writer } = self;
        enum Progress {
            Ok,
            Done,
        }

        let mut bytes_read = 0;
        let mut bytes_written = 0;

        let read_bytes = &mut bytes_read;
        let write_bytes = &mut bytes_written;

        let mut outbuf = vec![0; 1 << 16];
        let once = move || {
            let data = read.fill_buf()?;

            if data.is_empty() {
                if finish {
                    decoder.finish();
                } else {
                    return Ok(Progress::Done);
                }
            }

            let result = decoder.decode_bytes(data, &mut outbuf[..]);
            *read_bytes += result.consumed_in;
            *write_bytes += result.consumed_out;
            read.consume(result.consumed_in);

            writer.write_all(&outbuf[..result.consumed_out])?;
            let done = result.status.map_err(into_io_error)?;

            if let LzwStatus::Done = done {
                return Ok(Progress::Done);
            }

            if let LzwStatus::NoProgress = done {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "No more data but the stream has not ended",
                ));
            }

            Ok(Progress::Ok)
        };

        let status = core::iter::repeat_with(once)
            // scan+fuse can be replaced with map_while
            .scan((), |(), result| match result {
                Ok(Progress::Ok) => Some(Ok(())),
                Err(err) => Some(Err(err)),
                Ok(Progress::Done) => None,
            })
            .fuse()
            .collect();

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

#[cfg(feature = "async")]
impl<W: futures::io::AsyncWrite + core::marker::Unpin> IntoAsync<'_, W> {
    /// Decode data from a reader.
    ///
    /// This will read data until the reader is exhausted but it will not end the stream.
    pub async fn decode(&mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.decode_part(read, false).await
    }

    /// Decode data from a reader until the end of the stream.
    pub async fn decode_all(mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.decode_part(read, true).await
    }

    async fn decode_part(
        &mut self,
        read: impl futures::io::AsyncBufRead,
        finish: bool,
    ) -> AllResult {
        use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};

        let IntoAsync { decoder, writer } = self;
        futures::pin_mut!(read);
        let mut read: core::pin::Pin<_> = read;

        let mut bytes_read = 0;
        let mut bytes_written = 0;
        let mut outbuf = vec![0; 1 << 16];

        let status = loop {
            let mut filler = read.as_mut();
            let data = match filler.fill_buf().await {
                Err(err) => break Err(err),
                Ok(data) => data,
            };

            if data.is_empty() {
                if finish {
                    decoder.finish();
                } else {
                    break Ok(());
                }
            }

            let result = decoder.decode_bytes(data, &mut outbuf[..]);
            bytes_read += result.consumed_in;
            bytes_written += result.consumed_out;
            AsyncBufRead::consume(read.as_mut(), result.consumed_in);

            if let Err(err) = writer.write_all(&outbuf[..result.consumed_out]).await {
                break Err(err);
            }

            let done = match result.status {
                Ok(done) => done,
                Err(err) => break Err(into_io_error(err)),
            };

            match done {
                LzwStatus::Done => break writer.flush().await,
                LzwStatus::NoProgress => {
                    break Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "No more data but the stream has not ended",
                    ))
                }
                LzwStatus::Ok => {}
            }
        };

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

impl DecodeState {
    fn new() -> Self {
        DecodeState {
            table: Table::new(),
            buffer: Buffer::new(),
            last: None,
            next_code: FIRST_CODE,
            escalated: false,
            has_ended: false,
            is_done: false,
            bits: MsbReader::new(),
        }
    }

    fn reset(&mut self) {
        self.table.clear();
        self.buffer.clear();
        self.last = None;
        self.next_code = FIRST_CODE;
        self.escalated = false;
        self.has_ended = false;
        self.is_done = false;
        self.bits.reset();
    }

    fn advance(&mut self, mut inp: &[u8], mut out: &mut [u8]) -> StreamResult {
        let o_in = inp.len();
        let o_out = out.len();
        let mut status = Ok(LzwStatus::Ok);

        loop {
            let remain = self.buffer.buffer();
            let consumed = remain.len().min(out.len());
            out[..consumed].copy_from_slice(&remain[..consumed]);
            self.buffer.consume(consumed);
            out = &mut core::mem::take(&mut out)[consumed..];

            if !self.buffer.buffer().is_empty() {
                // No more room in the output buffer.
                break;
            }

            if self.is_done {
                status = Ok(LzwStatus::Done);
                break;
            }

            self.bits.refill_bits(&mut inp);
            let code = match self.bits.read_code() {
                Some(code) => code,
                None if self.has_ended => {
                    if self.escalated || self.bits.holds_partial_code() {
                        status = Err(LzwError::TruncatedCode);
                    } else {
                        self.is_done = true;
                        status = Ok(LzwStatus::Done);
                        debug!(
                            learned = self.table.len(),
                            code_size = self.bits.code_size(),
                            "reached end of code stream"
                        );
                    }
                    break;
                }
                None => break,
            };

            if let Err(err) = self.next_symbol(code) {
                status = Err(err);
                break;
            }
        }

        if let Ok(LzwStatus::Ok) = status {
            if o_in == inp.len() && o_out == out.len() {
                status = Ok(LzwStatus::NoProgress);
            }
        }

        StreamResult {
            consumed_in: o_in - inp.len(),
            consumed_out: o_out - out.len(),
            status,
        }
    }

    /// Interpret one code word read from the stream.
    fn next_symbol(&mut self, code: Code) -> Result<(), LzwError> {
        let (last_code, last_byte) = match self.last {
            Some(last) => last,
            // The first code word of a stream stands for itself.
            None if code < FIRST_CODE => {
                let first = self.buffer.reconstruct(&self.table, code);
                self.last = Some((code, first));
                return Ok(());
            }
            None => return Err(LzwError::NonLiteralStart { code }),
        };

        // Markers may follow each other, each one widens the reads by a bit.
        if code == self.bits.max_code() && self.bits.code_size() < MAX_CODE_SIZE {
            self.bits.bump_code_size();
            self.escalated = true;
            trace!(code_size = self.bits.code_size(), "escalated code size");
            return Ok(());
        }
        self.escalated = false;

        let first = if code < self.next_code {
            self.buffer.reconstruct(&self.table, code)
        } else if code == self.next_code {
            // The encoder learned `last + first(last)` and used it right away.
            self.buffer.reconstruct(&self.table, last_code);
            self.buffer.push(last_byte);
            last_byte
        } else {
            return Err(LzwError::InvalidCode {
                code,
                next_code: self.next_code,
            });
        };

        if usize::from(self.next_code) < MAX_CODES {
            self.table.derive(last_code, first);
            self.next_code += 1;

            if self.table.is_full() {
                debug!(
                    next_code = self.next_code,
                    "dictionary is full, no further strings are learned"
                );
            }
        }

        self.last = Some((code, first));
        Ok(())
    }
}

impl Buffer {
    fn new() -> Self {
        Buffer {
            bytes: vec![0; MAX_CODES].into_boxed_slice(),
            read_mark: 0,
            write_mark: 0,
        }
    }

    fn clear(&mut self) {
        self.read_mark = 0;
        self.write_mark = 0;
    }

    /// Write the string of `code` into the buffer and return its first byte.
    ///
    /// The prefix chain is walked back to front into a slice of the known string length, so
    /// no recursion is involved.
    fn reconstruct(&mut self, table: &Table, code: Code) -> u8 {
        let depth = usize::from(table.depth(code));
        let out = &mut self.bytes[..depth];

        let mut code_iter = code;
        for ch in out[1..].iter_mut().rev() {
            let link = table.at(code_iter);
            *ch = link.byte;
            code_iter = link.prefix;
        }
        debug_assert!(code_iter < FIRST_CODE);
        out[0] = code_iter as u8;

        self.read_mark = 0;
        self.write_mark = depth;
        out[0]
    }

    /// Append one byte to the string in the buffer.
    fn push(&mut self, byte: u8) {
        self.bytes[self.write_mark] = byte;
        self.write_mark += 1;
    }

    fn buffer(&self) -> &[u8] {
        &self.bytes[self.read_mark..self.write_mark]
    }

    fn consume(&mut self, amt: usize) {
        self.read_mark += amt;
    }
}

impl Table {
    fn new() -> Self {
        Table {
            inner: Vec::with_capacity(DICT_SIZE),
            depths: Vec::with_capacity(DICT_SIZE),
        }
    }

    fn clear(&mut self) {
        self.inner.clear();
        self.depths.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn is_full(&self) -> bool {
        self.inner.len() >= DICT_SIZE
    }

    fn at(&self, code: Code) -> Link {
        self.inner[usize::from(code - FIRST_CODE)]
    }

    /// The length of the string denoted by `code`.
    fn depth(&self, code: Code) -> u16 {
        if code < FIRST_CODE {
            1
        } else {
            self.depths[usize::from(code - FIRST_CODE)]
        }
    }

    /// Learn the string `prefix + byte` under the next code.
    fn derive(&mut self, prefix: Code, byte: u8) {
        let depth = self.depth(prefix) + 1;
        self.inner.push(Link { prefix, byte });
        self.depths.push(depth);
    }
}
