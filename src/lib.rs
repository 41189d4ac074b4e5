//! # Variable width LZW decoder and encoder
//!
//! This crate provides an [`Encoder`] and a [`Decoder`] for a Lempel-Ziv-Welch code stream
//! whose code words start out with 9 bits and grow up to 15 bits. There is no side channel
//! for the code size: whenever the encoder needs a wider code it first writes the all-ones
//! code of the current width, the escalation marker, and the decoder widens its reads when it
//! sees that marker.
//!
//! Each code word is written as its low byte followed by the `code_size - 8` high bits. All
//! bits are packed with the most significant bit first and the last byte is padded with zeros.
//! Codes `0..256` stand for themselves, learned strings are numbered from [`FIRST_CODE`]. The
//! dictionary is never cleared; once all `1 << MAX_CODE_SIZE` codes are assigned both sides
//! simply stop learning.
//!
//! Exemplary use of the encoder:
//!
//! ```
//! use lzwpack::{encode::Encoder, decode::Decoder};
//! let data = b"TOBEORNOTTOBEORTOBEORNOT";
//!
//! let compressed = Encoder::new().encode(&data[..]).unwrap();
//! let decompressed = Decoder::new().decode(&compressed).unwrap();
//! assert_eq!(decompressed, &data[..]);
//! ```
//!
//! For larger inputs use [`Encoder::into_stream`] and [`Decoder::into_stream`] which work on
//! `BufRead` and `Write` respectively, or the lower level `encode_bytes` and `decode_bytes`
//! which operate on caller provided buffers.
//!
//! [`Encoder`]: encode/struct.Encoder.html
//! [`Decoder`]: decode/struct.Decoder.html
//! [`Encoder::into_stream`]: encode/struct.Encoder.html#method.into_stream
//! [`Decoder::into_stream`]: decode/struct.Decoder.html#method.into_stream
#![forbid(unsafe_code)]

/// The code size every stream starts with.
pub const MIN_CODE_SIZE: u8 = 9;
/// The code size at which no escalation marker is written anymore.
pub const MAX_CODE_SIZE: u8 = 15;
/// The first code assigned to a learned string.
pub const FIRST_CODE: Code = 1 << 8;

pub(crate) const MAX_CODES: usize = 1 << MAX_CODE_SIZE as usize;
/// One dictionary slot for every code that does not denote a literal byte.
pub(crate) const DICT_SIZE: usize = MAX_CODES - FIRST_CODE as usize;

/// Alias for a LZW code point
pub type Code = u16;

mod dictionary;
mod error;
mod framing;

pub mod decode;
pub mod encode;

pub use crate::error::LzwError;

/// The result of a coding operation on a pair of buffer.
#[must_use = "Contains a status with potential error information"]
pub struct StreamResult {
    /// The number of bytes consumed from the input buffer.
    pub consumed_in: usize,
    /// The number of bytes written into the output buffer.
    pub consumed_out: usize,
    /// The status after returning from the write call.
    pub status: Result<LzwStatus, LzwError>,
}

/// The result of coding into an output stream.
#[must_use = "Contains a status with potential error information"]
pub struct AllResult {
    /// The total number of bytes consumed from the reader.
    pub bytes_read: usize,
    /// The total number of bytes written into the writer.
    pub bytes_written: usize,
    /// The possible error that occurred.
    ///
    /// Note that when writing into streams it is not in general possible to recover from an
    /// error.
    pub status: std::io::Result<()>,
}

/// The status after successful coding of an LZW stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzwStatus {
    /// The data was partially coded, more data can be passed.
    Ok,
    /// No more data could be consumed or produced.
    ///
    /// For the decoder this usually means the input is exhausted but `finish` was not called
    /// yet. For both it can mean the output buffer has no room left.
    NoProgress,
    /// The stream has ended and all of its output was handed out.
    Done,
}

/// Map a coding error into the error type of the `std` interfaces.
pub(crate) fn into_io_error(err: LzwError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
}
