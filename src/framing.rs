//! Code word framing on a most significant bit first bit stream.
//!
//! A code word is split into its low byte and the `code_size - 8` remaining high bits. The
//! low byte goes first so that its bits are the same regardless of the current code size.
use crate::{Code, MAX_CODE_SIZE, MIN_CODE_SIZE};

/// The bit buffer of the encoder.
pub(crate) struct MsbBuffer {
    /// The current code length.
    code_size: u8,
    /// The buffer bits, left aligned.
    buffer: u64,
    /// The number of valid buffer bits.
    bits_in_buffer: u8,
}

/// The bit buffer of the decoder.
pub(crate) struct MsbReader {
    /// The current code length.
    code_size: u8,
    /// The buffer bits, left aligned.
    bit_buffer: u64,
    /// The number of valid buffer bits.
    bits: u8,
}

impl MsbBuffer {
    pub(crate) fn new() -> Self {
        MsbBuffer {
            code_size: MIN_CODE_SIZE,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Reset the code size and drop all buffered bits.
    pub(crate) fn reset(&mut self) {
        *self = MsbBuffer::new();
    }

    /// Insert a code word, low byte first, with the current code size.
    pub(crate) fn buffer_code(&mut self, code: Code) {
        self.buffer_bits(code & 0xff, 8);
        self.buffer_bits(code >> 8, self.code_size - 8);
    }

    fn buffer_bits(&mut self, value: Code, count: u8) {
        debug_assert!(count > 0 && count <= 16);
        let mask = (1u64 << count) - 1;
        let shift = 64 - self.bits_in_buffer - count;
        self.buffer |= (u64::from(value) & mask) << shift;
        self.bits_in_buffer += count;
    }

    /// Push bytes if the buffer space is getting small.
    ///
    /// Afterwards there is room for an escalation marker and a code of the bumped size.
    /// Returns `true` if that room could not be made because `out` is full.
    pub(crate) fn push_out(&mut self, out: &mut &mut [u8]) -> bool {
        if self.bits_in_buffer + 2 * self.code_size + 1 < 64 {
            return false;
        }

        self.flush_out(out)
    }

    /// Flush all full bytes, returning if at least one more byte remains.
    pub(crate) fn flush_out(&mut self, out: &mut &mut [u8]) -> bool {
        let want = usize::from(self.bits_in_buffer / 8);
        let count = want.min((*out).len());
        let (bytes, tail) = core::mem::take(out).split_at_mut(count);
        *out = tail;

        for b in bytes {
            *b = ((self.buffer & 0xff00_0000_0000_0000) >> 56) as u8;
            self.buffer <<= 8;
            self.bits_in_buffer -= 8;
        }

        count < want
    }

    /// Pad the buffer to a full byte.
    pub(crate) fn buffer_pad(&mut self) {
        let to_byte = self.bits_in_buffer.wrapping_neg() & 0x7;
        self.bits_in_buffer += to_byte;
    }

    /// Increase the code size by one bit.
    pub(crate) fn bump_code_size(&mut self) {
        debug_assert!(self.code_size < MAX_CODE_SIZE);
        self.code_size += 1;
    }

    /// The all-ones code of the current code size, the escalation marker.
    pub(crate) fn max_code(&self) -> Code {
        (1 << self.code_size) - 1
    }

    pub(crate) fn code_size(&self) -> u8 {
        self.code_size
    }
}

impl MsbReader {
    pub(crate) fn new() -> Self {
        MsbReader {
            code_size: MIN_CODE_SIZE,
            bit_buffer: 0,
            bits: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = MsbReader::new();
    }

    /// Move as many whole bytes from `inp` into the bit buffer as fit.
    pub(crate) fn refill_bits(&mut self, inp: &mut &[u8]) {
        let wish_count = (64 - self.bits) / 8;
        if wish_count == 0 {
            return;
        }

        let mut buffer = [0u8; 8];
        let new_bits = match inp.get(..usize::from(wish_count)) {
            Some(bytes) => {
                buffer[..usize::from(wish_count)].copy_from_slice(bytes);
                *inp = &inp[usize::from(wish_count)..];
                wish_count * 8
            }
            None => {
                let new_bits = inp.len() * 8;
                buffer[..inp.len()].copy_from_slice(inp);
                *inp = &[];
                new_bits as u8
            }
        };
        self.bit_buffer |= u64::from_be_bytes(buffer) >> self.bits;
        self.bits += new_bits;
    }

    /// Take one code word of the current code size, if enough bits are buffered.
    pub(crate) fn read_code(&mut self) -> Option<Code> {
        if self.bits < self.code_size {
            return None;
        }

        let low = self.get_bits(8);
        let high = self.get_bits(self.code_size - 8);
        Some(low | (high << 8))
    }

    fn get_bits(&mut self, count: u8) -> Code {
        let mask = (1 << count) - 1;
        let rotbuf = self.bit_buffer.rotate_left(count.into());
        self.bit_buffer = rotbuf & !mask;
        self.bits -= count;
        (rotbuf & mask) as Code
    }

    /// If the remaining bits still hold a low byte.
    ///
    /// At the end of the stream anything shorter is padding, anything longer is a code word
    /// that was cut short.
    pub(crate) fn holds_partial_code(&self) -> bool {
        self.bits >= 8
    }

    pub(crate) fn bump_code_size(&mut self) {
        debug_assert!(self.code_size < MAX_CODE_SIZE);
        self.code_size += 1;
    }

    /// The all-ones code of the current code size, the escalation marker.
    pub(crate) fn max_code(&self) -> Code {
        (1 << self.code_size) - 1
    }

    pub(crate) fn code_size(&self) -> u8 {
        self.code_size
    }
}
