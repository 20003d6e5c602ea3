//! Parser for comma-separated column specs.
//!
//! ```text
//! spec  := entry (',' entry)* [';']
//! entry := type ['(' max_size ')'] name ['as' alias] ['key']
//! name  := identifier | 'quoted name'
//! ```
//!
//! Type names accept the aliases of [DataType::from_name]. An `r` prefix on a
//! variable-size type (`rstring`, `rbinary`) keeps values in the blob store
//! even when a max size is given.

use crate::column::ColumnDef;
use crate::data_type::DataType;
use crate::error::{Result, TableError};
use crate::tokenizer::{Spanned, Token, Tokenizer};

pub struct ColumnSpecParser {
    tokens: Vec<Spanned>,
    position: usize,
    started: bool,
}

impl ColumnSpecParser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            position: 0,
            started: false,
        }
    }

    /// Parses the next entry. Returns `Ok(None)` once the input is exhausted.
    pub fn next_def(&mut self) -> Result<Option<ColumnDef>> {
        if self.started {
            match self.current_token() {
                Token::Comma => self.advance(),
                Token::Semicolon => {
                    self.advance();
                    return self.expect_end().map(|()| None);
                }
                Token::Eof => return Ok(None),
                other => return Err(self.error(format!("expected ',' or end, found {other:?}"))),
            }
        } else if self.is_at_end() {
            return Ok(None);
        }
        self.started = true;
        self.parse_column_def().map(Some)
    }

    /// Parses every entry.
    pub fn parse_all(&mut self) -> Result<Vec<ColumnDef>> {
        let mut defs = Vec::new();
        while let Some(def) = self.next_def()? {
            defs.push(def);
        }
        Ok(defs)
    }

    // helpers
    fn current(&self) -> &Spanned {
        &self.tokens[self.position]
    }

    fn current_token(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn expect_end(&self) -> Result<()> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected {:?} after ';'", self.current_token())))
        }
    }

    fn error(&self, message: impl Into<String>) -> TableError {
        TableError::Parse {
            position: self.current().position,
            message: message.into(),
        }
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {expected:?}, found {:?}",
                self.current_token()
            )))
        }
    }

    fn consume_name(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Ident(name) | Token::String(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected column name, found {other:?}"))),
        }
    }

    /// Returns the type and whether it was written with the `r` prefix.
    fn consume_data_type(&mut self) -> Result<(DataType, bool)> {
        let Token::Ident(name) = self.current_token() else {
            return Err(self.error(format!(
                "expected column type, found {:?}",
                self.current_token()
            )));
        };

        let parsed = match DataType::from_name(name) {
            Some(data_type) => Some((data_type, false)),
            None => name
                .strip_prefix(['r', 'R'])
                .and_then(DataType::from_name)
                .filter(|data_type| !data_type.is_fixed())
                .map(|data_type| (data_type, true)),
        };
        match parsed {
            Some(parsed) => {
                self.advance();
                Ok(parsed)
            }
            None => Err(self.error(format!("unknown column type {name:?}"))),
        }
    }

    fn consume_max_size(&mut self) -> Result<usize> {
        self.consume(Token::LeftParen)?;
        let size = match self.current_token() {
            Token::Number(n) => usize::try_from(*n)
                .map_err(|_| self.error(format!("invalid max size {n}")))?,
            other => return Err(self.error(format!("expected max size, found {other:?}"))),
        };
        self.advance();
        self.consume(Token::RightParen)?;
        Ok(size)
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let (data_type, reference) = self.consume_data_type()?;

        let max_size = if matches!(self.current_token(), Token::LeftParen) {
            self.consume_max_size()?
        } else {
            0
        };

        let name = self.consume_name()?;
        let mut def = ColumnDef::new(name, data_type).with_max_size(max_size);

        if matches!(self.current_token(), Token::As) {
            self.advance();
            def = def.with_alias(self.consume_name()?);
        }
        if matches!(self.current_token(), Token::Key) {
            self.advance();
            def = def.key();
        }
        if reference {
            def = def.reference();
        }
        Ok(def)
    }
}

/// Tokenizes and parses `input` in one go.
pub fn parse_column_specs(input: &str) -> Result<Vec<ColumnDef>> {
    let tokens = Tokenizer::new(input).tokenize()?;
    ColumnSpecParser::new(tokens).parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnFlags;

    #[test]
    fn test_parse_specs() {
        let defs = parse_column_specs("int32 id key, string(10) name as n, rstring(40) body;").unwrap();

        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0], ColumnDef::new("id", DataType::Int32).key());
        assert_eq!(
            defs[1],
            ColumnDef::new("name", DataType::Utf8)
                .with_max_size(10)
                .with_alias("n")
        );
        assert_eq!(defs[2].max_size, 40);
        assert!(defs[2].flags.contains(ColumnFlags::REFERENCE));
    }

    #[test]
    fn test_quoted_names() {
        let defs = parse_column_specs("text 'key' as 'the key'").unwrap();
        assert_eq!(defs[0].name, "key");
        assert_eq!(defs[0].alias.as_deref(), Some("the key"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_column_specs("   ").unwrap(), vec![]);
    }

    #[test]
    fn test_reference_prefix_needs_variable_type() {
        let result = parse_column_specs("rint32 id");
        assert!(matches!(result, Err(TableError::Parse { position: 0, .. })));
    }

    #[test]
    fn test_errors_carry_position() {
        let result = parse_column_specs("int32 id, double");
        assert!(matches!(result, Err(TableError::Parse { position: 16, .. })));

        let result = parse_column_specs("int32 id name");
        assert!(matches!(result, Err(TableError::Parse { position: 9, .. })));

        let result = parse_column_specs("string(x) s");
        assert!(matches!(result, Err(TableError::Parse { position: 7, .. })));
    }

    #[test]
    fn test_next_def_is_incremental() {
        let tokens = Tokenizer::new("bool a, bogus b").tokenize().unwrap();
        let mut parser = ColumnSpecParser::new(tokens);

        assert_eq!(
            parser.next_def().unwrap(),
            Some(ColumnDef::new("a", DataType::Bool))
        );
        assert!(parser.next_def().is_err());
    }

    #[test]
    fn test_trailing_tokens_after_semicolon() {
        assert!(parse_column_specs("bool a; bool b").is_err());
    }
}
