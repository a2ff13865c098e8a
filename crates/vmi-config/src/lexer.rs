//! A small hand-written lexer for the per-VM offset configuration file.
//!
//! The lexer is a pure function from bytes to a token stream: it carries no
//! global state, so two files can be tokenized concurrently from different
//! threads with no interference.

use crate::error::ConfigError;

/// A single lexical token, together with the 1-based line it started on
/// (used for error messages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,

    /// The line the token starts on.
    pub line: usize,
}

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare or quoted identifier/word, e.g. `win_tasks` or `"My VM"`.
    Word(String),

    /// A decimal or `0x`-prefixed hexadecimal integer literal.
    Number(u64),

    /// `{`
    LBrace,

    /// `}`
    RBrace,

    /// `=`
    Equals,

    /// `;`
    Semicolon,
}

/// Tokenizes `input`, stripping `#`-to-end-of-line comments and whitespace.
pub fn lex(input: &str) -> Result<Vec<Token>, ConfigError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < bytes.len() {
        let c = bytes[pos];

        match c {
            b' ' | b'\t' | b'\r' => pos += 1,
            b'\n' => {
                line += 1;
                pos += 1;
            }
            b'#' => {
                // Comments run to end of line; `memchr` finds the newline in
                // one pass over the remainder rather than a byte-at-a-time
                // scan.
                pos = memchr::memchr(b'\n', &bytes[pos..])
                    .map(|offset| pos + offset)
                    .unwrap_or(bytes.len());
            }
            b'{' => {
                tokens.push(Token { kind: TokenKind::LBrace, line });
                pos += 1;
            }
            b'}' => {
                tokens.push(Token { kind: TokenKind::RBrace, line });
                pos += 1;
            }
            b'=' => {
                tokens.push(Token { kind: TokenKind::Equals, line });
                pos += 1;
            }
            b';' => {
                tokens.push(Token { kind: TokenKind::Semicolon, line });
                pos += 1;
            }
            b'"' => {
                let start_line = line;
                let mut end = pos + 1;
                let mut value = String::new();

                loop {
                    if end >= bytes.len() {
                        return Err(ConfigError::UnterminatedString { line: start_line });
                    }

                    match bytes[end] {
                        b'"' => {
                            end += 1;
                            break;
                        }
                        b'\n' => return Err(ConfigError::UnterminatedString { line: start_line }),
                        c => {
                            value.push(c as char);
                            end += 1;
                        }
                    }
                }

                tokens.push(Token { kind: TokenKind::Word(value), line: start_line });
                pos = end;
            }
            c if c.is_ascii_digit() => {
                let start = pos;
                let start_line = line;

                if bytes[pos..].starts_with(b"0x") || bytes[pos..].starts_with(b"0X") {
                    pos += 2;
                    while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
                        pos += 1;
                    }
                    let text = &input[start + 2..pos];
                    let value = u64::from_str_radix(text, 16)
                        .map_err(|_| ConfigError::InvalidNumber { line: start_line })?;
                    tokens.push(Token { kind: TokenKind::Number(value), line: start_line });
                }
                else {
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    let text = &input[start..pos];
                    let value = text
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidNumber { line: start_line })?;
                    tokens.push(Token { kind: TokenKind::Number(value), line: start_line });
                }
            }
            c if is_word_start(c) => {
                let start = pos;
                let start_line = line;

                while pos < bytes.len() && is_word_continue(bytes[pos]) {
                    pos += 1;
                }

                tokens.push(Token {
                    kind: TokenKind::Word(input[start..pos].to_string()),
                    line: start_line,
                });
            }
            _ => return Err(ConfigError::UnexpectedByte { byte: c, line }),
        }
    }

    Ok(tokens)
}

fn is_word_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_word_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_block_with_comment() {
        let tokens = lex("win7 { # a comment\n win_pid = 0x180; }").unwrap();

        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Word("win7".into()),
                TokenKind::LBrace,
                TokenKind::Word("win_pid".into()),
                TokenKind::Equals,
                TokenKind::Number(0x180),
                TokenKind::Semicolon,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn quoted_word_preserves_spaces() {
        let tokens = lex(r#"ostype = "Windows 7";"#).unwrap();
        assert_eq!(
            tokens[2].kind,
            TokenKind::Word("Windows 7".into())
        );
    }

    #[test]
    fn decimal_and_hex_numbers() {
        let tokens = lex("a = 10; b = 0x10;").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Number(10));
        assert_eq!(tokens[6].kind, TokenKind::Number(0x10));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            lex("ostype = \"oops"),
            Err(ConfigError::UnterminatedString { .. })
        ));
    }
}
