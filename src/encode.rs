//! A module for all encoding needs.
use crate::dictionary::{Dictionary, Slot};
use crate::framing::MsbBuffer;
use crate::{into_io_error, AllResult, Code, LzwError, LzwStatus, StreamResult};
use crate::{FIRST_CODE, MAX_CODES, MAX_CODE_SIZE};

use std::io::{self, BufRead, Write};
use tracing::{debug, trace};

/// The state for encoding data with an LZW algorithm.
///
/// One encoder produces one code stream. It owns the whole dictionary, so independent encoders
/// can be used side by side or moved to other threads. Use [`reset`] to start over.
///
/// [`reset`]: #method.reset
pub struct Encoder {
    state: Box<EncodeState>,
}

/// A encoding stream sink.
///
/// See [`Encoder::into_stream`] on how to create this type.
///
/// [`Encoder::into_stream`]: struct.Encoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

/// An async encoding sink.
///
/// See [`Encoder::into_async`] on how to create this type.
///
/// [`Encoder::into_async`]: struct.Encoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

struct EncodeState {
    /// The string table.
    tree: Dictionary,
    /// If the input is complete.
    has_ended: bool,
    /// If the final code and the padding have been buffered.
    is_flushed: bool,
    /// The code corresponding to the currently read characters, none before the first byte.
    current_code: Option<Code>,
    /// A code that was produced but not yet buffered, maybe behind escalation markers.
    pending_code: Option<Code>,
    /// The code assigned to the next new string.
    next_code: Code,
    /// The bit buffer for encoding.
    buffer: MsbBuffer,
}

impl Encoder {
    /// Create a new encoder with an empty dictionary and 9 bit codes.
    pub fn new() -> Self {
        Encoder {
            state: Box::new(EncodeState::new()),
        }
    }

    /// Encode some bytes from `inp` into `out`.
    ///
    /// See [`into_stream`] for high-level functions and [`finish`] for marking the input data
    /// as complete. The last code word is only written once the input is marked as complete.
    ///
    /// [`into_stream`]: #method.into_stream
    /// [`finish`]: #method.finish
    pub fn encode_bytes(&mut self, inp: &[u8], out: &mut [u8]) -> StreamResult {
        self.state.advance(inp, out)
    }

    /// Encode a single chunk of data.
    ///
    /// This method will add an end marker to the encoded chunk, that is the pending code word
    /// and the padding of the last byte.
    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<u8>, LzwError> {
        let mut output = Vec::with_capacity(data.len() / 2 + 8);
        let mut buffer = vec![0; 1 << 12];
        let mut inp = data;

        self.finish();
        loop {
            let result = self.encode_bytes(inp, &mut buffer[..]);
            inp = &inp[result.consumed_in..];
            output.extend_from_slice(&buffer[..result.consumed_out]);

            match result.status? {
                LzwStatus::Done => return Ok(output),
                LzwStatus::Ok | LzwStatus::NoProgress => {}
            }
        }
    }

    /// Construct a encoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream {
            encoder: self,
            writer,
        }
    }

    /// Construct a encoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: futures::io::AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync {
            encoder: self,
            writer,
        }
    }

    /// Mark the encoding as finished.
    ///
    /// In following calls to `encode_bytes` the encoder will write the pending code word and
    /// pad the stream after encoding all of `inp`. It's not recommended, but also not unsound,
    /// to use different byte slices in different calls from this point forward.
    pub fn finish(&mut self) {
        self.state.mark_ended();
    }

    /// Forget all learned strings and start a new stream.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// The size of the code words that are written next.
    pub fn code_size(&self) -> u8 {
        self.state.buffer.code_size()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Encode data from a reader.
    ///
    /// This will drain the supplied reader. It will not write the final code word after all
    /// data has been processed.
    pub fn encode(&mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, false)
    }

    /// Encode data from a reader and finish the stream.
    pub fn encode_all(mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, true)
    }

    fn encode_part(&mut self, mut read: impl BufRead, finish: bool) -> AllResult {
        let IntoStream { encoder, writer } = self;
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
                    encoder.finish();
                } else {
                    return Ok(Progress::Done);
                }
            }

            let result = encoder.encode_bytes(data, &mut outbuf[..]);
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
                    "No more data but the stream was not finished",
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
    /// Encode data from a reader.
    ///
    /// This will drain the supplied reader. It will not write the final code word after all
    /// data has been processed.
    pub async fn encode(&mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.encode_part(read, false).await
    }

    /// Encode data from a reader and finish the stream.
    pub async fn encode_all(mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.encode_part(read, true).await
    }

    async fn encode_part(
        &mut self,
        read: impl futures::io::AsyncBufRead,
        finish: bool,
    ) -> AllResult {
        use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};

        let IntoAsync { encoder, writer } = self;
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
                    encoder.finish();
                } else {
                    break Ok(());
                }
            }

            let result = encoder.encode_bytes(data, &mut outbuf[..]);
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
                        "No more data but the stream was not finished",
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

impl EncodeState {
    fn new() -> Self {
        EncodeState {
            tree: Dictionary::new(),
            has_ended: false,
            is_flushed: false,
            current_code: None,
            pending_code: None,
            next_code: FIRST_CODE,
            buffer: MsbBuffer::new(),
        }
    }

    fn reset(&mut self) {
        self.tree.reset();
        self.has_ended = false;
        self.is_flushed = false;
        self.current_code = None;
        self.pending_code = None;
        self.next_code = FIRST_CODE;
        self.buffer.reset();
    }

    fn advance(&mut self, mut inp: &[u8], mut out: &mut [u8]) -> StreamResult {
        let c_in = inp.len();
        let c_out = out.len();

        loop {
            if self.buffer.push_out(&mut out) {
                break;
            }

            // One marker or code at a time, the buffer only has room for one after `push_out`.
            if let Some(code) = self.pending_code {
                self.write_step(code);
                continue;
            }

            if inp.is_empty() && self.has_ended {
                if !self.is_flushed {
                    if let Some(code) = self.current_code.take() {
                        self.pending_code = Some(code);
                        continue;
                    }
                    self.buffer.buffer_pad();
                    self.is_flushed = true;
                    debug!(
                        learned = self.tree.len(),
                        code_size = self.buffer.code_size(),
                        "finished code stream"
                    );
                }

                break;
            }

            let mut next_code = None;
            let mut bytes = inp.iter();
            while let Some(&byte) = bytes.next() {
                let code = match self.current_code {
                    Some(code) => code,
                    None => {
                        self.current_code = Some(Code::from(byte));
                        continue;
                    }
                };

                match self.tree.lookup_or_reserve(code, byte) {
                    Slot::Known(known) => self.current_code = Some(known),
                    Slot::Vacant(slot) => {
                        self.learn(slot, code, byte);
                        next_code = Some(code);
                        self.current_code = Some(Code::from(byte));
                        break;
                    }
                    Slot::Exhausted => {
                        next_code = Some(code);
                        self.current_code = Some(Code::from(byte));
                        break;
                    }
                }
            }

            inp = bytes.as_slice();
            match next_code {
                // No more bytes, no code produced.
                None => break,
                Some(code) => self.pending_code = Some(code),
            }
        }

        let mut status = Ok(LzwStatus::Ok);
        if self.is_flushed {
            if !self.buffer.flush_out(&mut out) {
                status = Ok(LzwStatus::Done);
            }
        } else if c_in == inp.len() && c_out == out.len() {
            status = Ok(LzwStatus::NoProgress);
        }

        StreamResult {
            consumed_in: c_in - inp.len(),
            consumed_out: c_out - out.len(),
            status,
        }
    }

    fn mark_ended(&mut self) -> bool {
        core::mem::replace(&mut self.has_ended, true)
    }

    /// Assign the next code to `prefix + suffix` if codes are left.
    fn learn(&mut self, slot: usize, prefix: Code, suffix: u8) {
        if usize::from(self.next_code) >= MAX_CODES {
            return;
        }

        self.tree.insert(slot, self.next_code, prefix, suffix);
        self.next_code += 1;

        if self.tree.is_full() {
            debug!(
                next_code = self.next_code,
                "dictionary is full, no further strings are learned"
            );
        }
    }

    /// Buffer the pending code, or an escalation marker if it does not fit the code size yet.
    ///
    /// A learned code can be far larger than every code written before it, so reaching its
    /// size may take several markers in a row.
    fn write_step(&mut self, code: Code) {
        let max_code = self.buffer.max_code();
        if code >= max_code && self.buffer.code_size() < MAX_CODE_SIZE {
            self.buffer.buffer_code(max_code);
            self.buffer.bump_code_size();
            trace!(code, code_size = self.buffer.code_size(), "escalated code size");
        } else {
            self.buffer.buffer_code(code);
            self.pending_code = None;
        }
    }
}
