use crate::error::{Result, TableError};

/// The smallest meaningful units of a column spec such as
/// `int32 id key, string(10) name as n`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Keywords ---
    /// `AS`, introduces an alias.
    As,
    /// `KEY`, marks a key column.
    Key,

    // --- Identifiers & Literals ---
    /// A type name or a column name (e.g., `int32`, `id`).
    Ident(String),
    /// A non-negative integer literal (e.g., `10`).
    Number(i64),
    /// A quoted name, defined between single quotes (e.g., `'first name'`).
    String(String),

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,

    // --- Special ---
    /// Represents the end of input.
    Eof,
}

/// A token with the character offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// A lexical scanner that converts a column spec string into [Token]s.
pub struct Tokenizer {
    /// The input stored as characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns the tokens, ending with
    /// [Token::Eof].
    ///
    /// # Errors
    /// Returns [TableError::Parse] on an unsupported character, an
    /// unterminated quoted name or a number that does not fit.
    ///
    /// # Example
    /// ```
    /// # use rowtable::tokenizer::{Tokenizer, Token};
    /// let tokens = Tokenizer::new("int32 id").tokenize().unwrap();
    /// assert_eq!(tokens[1].token, Token::Ident("id".into()));
    /// assert_eq!(tokens[1].position, 6);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            let position = self.position;
            let token = self.next_token()?;
            tokens.push(Spanned { token, position });
        }

        tokens.push(Spanned {
            token: Token::Eof,
            position: self.position,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            ';' => {
                self.advance();
                Ok(Token::Semicolon)
            }
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c if c.is_ascii_digit() => self.read_number(),
            '\'' => self.read_string(),
            _ => Err(self.error(format!("character {ch:?} is not supported"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> TableError {
        TableError::Parse {
            position: self.position,
            message: message.into(),
        }
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads an identifier and maps `AS` and `KEY` (any case) to keywords.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "AS" => Token::As,
            "KEY" => Token::Key,
            _ => Token::Ident(ident),
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut number = String::new();

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            number.push(self.current_char());
            self.advance();
        }

        number.parse::<i64>().map(Token::Number).map_err(|e| TableError::Parse {
            position: start,
            message: e.to_string(),
        })
    }

    /// Reads a name enclosed in single quotes, so names may contain spaces
    /// or collide with keywords.
    fn read_string(&mut self) -> Result<Token> {
        let start = self.position;
        self.advance(); // opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != '\'' {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(TableError::Parse {
                position: start,
                message: "unterminated quoted name".into(),
            });
        }
        self.advance(); // closing quote

        Ok(Token::String(string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Tokenizer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(
            tokens("int32 id"),
            vec![
                Token::Ident("int32".into()),
                Token::Ident("id".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_full_entry() {
        assert_eq!(
            tokens("string(10) name AS n key,"),
            vec![
                Token::Ident("string".into()),
                Token::LeftParen,
                Token::Number(10),
                Token::RightParen,
                Token::Ident("name".into()),
                Token::As,
                Token::Ident("n".into()),
                Token::Key,
                Token::Comma,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_name() {
        assert_eq!(
            tokens("utf8 'first name'; "),
            vec![
                Token::Ident("utf8".into()),
                Token::String("first name".into()),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let spanned = Tokenizer::new("  bool  flag").tokenize().unwrap();
        let positions: Vec<usize> = spanned.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![2, 8, 12]);
    }

    #[test]
    fn test_unterminated_string() {
        let result = Tokenizer::new("int32 'open").tokenize();
        assert_eq!(
            result,
            Err(TableError::Parse {
                position: 6,
                message: "unterminated quoted name".into()
            })
        );
    }

    #[test]
    fn test_unsupported_character() {
        let result = Tokenizer::new("int32 id*").tokenize();
        assert!(matches!(result, Err(TableError::Parse { position: 8, .. })));
    }
}
