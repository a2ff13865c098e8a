/// An error produced while lexing or parsing a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A byte that cannot start any token was encountered.
    #[error("unexpected byte {byte:#04x} on line {line}")]
    UnexpectedByte {
        /// The offending byte.
        byte: u8,
        /// The 1-based line it occurred on.
        line: usize,
    },

    /// A quoted string was never closed before end of line/input.
    #[error("unterminated string starting on line {line}")]
    UnterminatedString {
        /// The line the opening quote was on.
        line: usize,
    },

    /// A numeric literal did not fit `u64` or used invalid digits.
    #[error("invalid numeric literal on line {line}")]
    InvalidNumber {
        /// The line the literal was on.
        line: usize,
    },

    /// The token stream ended where a token was still expected.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What the parser was looking for.
        expected: &'static str,
    },

    /// A token appeared where a different kind was expected.
    #[error("unexpected token on line {line}, expected {expected}")]
    UnexpectedToken {
        /// What the parser was looking for.
        expected: &'static str,
        /// The line the bad token was on.
        line: usize,
    },

    /// A key inside a VM block is not recognized.
    #[error("unknown key \"{key}\" on line {line}")]
    UnknownKey {
        /// The offending key.
        key: String,
        /// The line it appeared on.
        line: usize,
    },
}
