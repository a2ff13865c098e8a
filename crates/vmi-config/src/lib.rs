//! Lexer and parser for the per-VM offset configuration file consumed by
//! OS-introspection layers built on top of this core.
//!
//! The file is line-oriented text, keyed by VM name:
//!
//! ```text
//! win7sp1 {
//!     ostype = windows;
//!     win_pid = 0x180;    # EPROCESS.UniqueProcessId
//!     win_pname = 0x2e0;
//! }
//! ```
//!
//! `#` introduces a comment that runs to end of line; strings may be bare
//! words or double-quoted; numbers are decimal or `0x`-prefixed hex.
//!
//! Parsing is a pure function from bytes to a [`ConfigFile`] — there is no
//! global lexer/parser state, unlike the yacc/lex-generated parser this
//! format was originally read by.

mod error;
mod lexer;
mod offsets;
mod parser;

pub use self::{
    error::ConfigError,
    offsets::{ConfigFile, LinuxOffsets, OsType, VmConfig, WindowsOffsets},
    parser::parse,
};
