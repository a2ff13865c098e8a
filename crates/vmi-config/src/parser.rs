use crate::{
    error::ConfigError,
    lexer::{Token, TokenKind},
    offsets::{ConfigFile, OsType, VmConfig},
};

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect_word(&mut self, expected: &'static str) -> Result<String, ConfigError> {
        match self.advance() {
            Some(Token { kind: TokenKind::Word(word), .. }) => Ok(word.clone()),
            Some(token) => Err(ConfigError::UnexpectedToken { expected, line: token.line }),
            None => Err(ConfigError::UnexpectedEof { expected }),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ConfigError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(()),
            Some(token) => Err(ConfigError::UnexpectedToken { expected, line: token.line }),
            None => Err(ConfigError::UnexpectedEof { expected }),
        }
    }

    fn parse_file(&mut self) -> Result<ConfigFile, ConfigError> {
        let mut file = ConfigFile::default();

        while self.peek().is_some() {
            let name = self.expect_word("VM name")?;
            self.expect(TokenKind::LBrace, "{")?;
            let config = self.parse_block()?;
            self.expect(TokenKind::RBrace, "}")?;
            file.insert(name, config);
        }

        Ok(file)
    }

    fn parse_block(&mut self) -> Result<VmConfig, ConfigError> {
        let mut config = VmConfig::default();

        loop {
            match self.peek() {
                Some(Token { kind: TokenKind::RBrace, .. }) | None => break,
                _ => {}
            }

            let key_token = self.peek().cloned().ok_or(ConfigError::UnexpectedEof { expected: "key" })?;
            let key = self.expect_word("key")?;
            self.expect(TokenKind::Equals, "=")?;
            let value = self.advance().cloned().ok_or(ConfigError::UnexpectedEof { expected: "value" })?;
            self.expect(TokenKind::Semicolon, ";")?;

            self.apply_entry(&mut config, &key, &key_token, &value)?;
        }

        Ok(config)
    }

    fn apply_entry(
        &self,
        config: &mut VmConfig,
        key: &str,
        key_token: &Token,
        value: &Token,
    ) -> Result<(), ConfigError> {
        let number = || match &value.kind {
            TokenKind::Number(n) => Ok(*n),
            _ => Err(ConfigError::UnexpectedToken { expected: "number", line: value.line }),
        };

        let word = || match &value.kind {
            TokenKind::Word(w) => Ok(w.clone()),
            _ => Err(ConfigError::UnexpectedToken { expected: "word or string", line: value.line }),
        };

        match key {
            "linux_tasks" => config.linux.tasks = Some(number()?),
            "linux_mm" => config.linux.mm = Some(number()?),
            "linux_name" => config.linux.name = Some(number()?),
            "linux_pid" => config.linux.pid = Some(number()?),
            "linux_pgd" => config.linux.pgd = Some(number()?),
            "linux_addr" => config.linux.addr = Some(number()?),

            "win_ntoskrnl" => config.windows.ntoskrnl = Some(number()?),
            "win_tasks" => config.windows.tasks = Some(number()?),
            "win_pdbase" => config.windows.pdbase = Some(number()?),
            "win_pid" => config.windows.pid = Some(number()?),
            "win_peb" => config.windows.peb = Some(number()?),
            "win_iba" => config.windows.iba = Some(number()?),
            "win_ph" => config.windows.ph = Some(number()?),
            "win_pname" => config.windows.pname = Some(number()?),
            "win_kdvb" => config.windows.kdvb = Some(number()?),
            "win_sysproc" => config.windows.sysproc = Some(number()?),

            "ostype" => {
                let value = word()?;
                config.ostype = Some(match value.to_ascii_lowercase().as_str() {
                    "linux" => OsType::Linux,
                    "windows" => OsType::Windows,
                    _ => {
                        return Err(ConfigError::UnexpectedToken {
                            expected: "\"Linux\" or \"Windows\"",
                            line: key_token.line,
                        });
                    }
                });
            }
            "sysmap" => config.sysmap = Some(word()?),

            other => return Err(ConfigError::UnknownKey { key: other.to_string(), line: key_token.line }),
        }

        Ok(())
    }
}

/// Parses a configuration file's contents into a [`ConfigFile`].
///
/// This is a pure function: no global lexer/parser state is touched, so
/// repeated or concurrent calls never interfere with each other.
pub fn parse(input: &str) -> Result<ConfigFile, ConfigError> {
    let tokens = crate::lexer::lex(input)?;
    Parser::new(&tokens).parse_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_block() {
        let file = parse(
            r#"
            ubuntu2004 {
                ostype = linux;
                sysmap = "/boot/System.map-5.4.0";
                linux_tasks = 0x1c30e80;
                linux_name = 0x550;
                linux_pid = 0x398;
            }
            "#,
        )
        .unwrap();

        let vm = file.get("ubuntu2004").unwrap();
        assert_eq!(vm.ostype, Some(OsType::Linux));
        assert_eq!(vm.sysmap.as_deref(), Some("/boot/System.map-5.4.0"));
        assert_eq!(vm.linux.tasks, Some(0x1c30e80));
        assert_eq!(vm.linux.name, Some(0x550));
        assert_eq!(vm.linux.pid, Some(0x398));
    }

    #[test]
    fn parses_windows_block_with_comments() {
        let file = parse(
            "
            # win7 offsets taken from a public profile
            win7sp1 {
                ostype = windows;
                win_pid = 0x180;   # EPROCESS.UniqueProcessId
                win_pname = 0x2e0;
            }
            ",
        )
        .unwrap();

        let vm = file.get("win7sp1").unwrap();
        assert_eq!(vm.ostype, Some(OsType::Windows));
        assert_eq!(vm.windows.pid, Some(0x180));
        assert_eq!(vm.windows.pname, Some(0x2e0));
    }

    #[test]
    fn multiple_vm_blocks() {
        let file = parse("a { ostype = linux; } b { ostype = windows; }").unwrap();
        assert_eq!(file.get("a").unwrap().ostype, Some(OsType::Linux));
        assert_eq!(file.get("b").unwrap().ostype, Some(OsType::Windows));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = parse("a { bogus_key = 1; }").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));
    }

    #[test]
    fn missing_semicolon_is_an_error() {
        let err = parse("a { win_pid = 0x10 }").unwrap_err();
        assert!(matches!(err, ConfigError::UnexpectedToken { .. }));
    }
}
