use crate::Code;
use thiserror::Error;

/// The error kinds of a malformed code stream.
///
/// Encoding can not fail on its own, only the surrounding I/O can.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzwError {
    /// A code word refers to a string the decoder can not know yet.
    ///
    /// Only the code that is about to be assigned may be referenced ahead of time.
    #[error("invalid code {code}, the next assignable code is {next_code}")]
    InvalidCode { code: Code, next_code: Code },
    /// The stream does not start with a literal byte.
    #[error("stream starts with code {code} which is not a literal byte")]
    NonLiteralStart { code: Code },
    /// The stream ended within a code word or right after an escalation marker.
    #[error("stream ends with a truncated code word")]
    TruncatedCode,
}
