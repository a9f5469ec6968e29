//! Lexical analysis for console assembly source
//!
//! This module provides the first phase of assembly: converting one source
//! line into a stream of typed tokens. The lexer separates character-level
//! concerns (what is a number? where does a comment start?) from syntactic
//! analysis (is this a valid instruction?).
//!
//! # Architecture
//!
//! 1. **Tokenization** ([`tokenize`]): Converts a line into a [`Token`] vector
//! 2. **Consumption** ([`TokenStream`]): The parser navigates tokens with lookahead
//!
//! Lines are tokenized independently because `.include` splices whole lines
//! from other files; the caller tracks file and line numbers.
//!
//! # Examples
//!
//! ```
//! use vconsole::assembler::lexer::{tokenize, TokenType};
//!
//! let tokens = tokenize("LD R0, #$42 ; load").unwrap();
//!
//! // LD, R0, `,`, #, $42, EOF (whitespace and comments are dropped)
//! assert_eq!(tokens.len(), 6);
//! assert_eq!(tokens[0].token_type, TokenType::Identifier("LD".to_string()));
//! assert_eq!(tokens[3].token_type, TokenType::Hash);
//! assert_eq!(tokens[4].token_type, TokenType::Number(0x42));
//! assert_eq!(tokens[4].column, 8);
//! ```
//!
//! # Token Types
//!
//! - **Identifiers**: Mnemonics, registers, labels (case preserved)
//! - **Directives**: `.org`, `.byte`, ... (lower-cased, without the dot)
//! - **Numbers**: `$FF`, `0xFF`, `%1010`, `0b1010`, `42`, all parsed eagerly
//! - **Literals**: `'A'` character and `"text"` string literals
//! - **Operators**: `:` `,` `#` `=` `[` `]` `+` `-` `<` `>` `*`

use thiserror::Error;

/// Errors produced while scanning a line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerError {
    #[error("invalid digit '{ch}' in number")]
    InvalidDigit { ch: char, column: usize },

    #[error("number prefix without digits")]
    MissingDigits { column: usize },

    #[error("number {value} is too large")]
    NumberTooLarge { value: String, column: usize },

    #[error("unterminated {kind} literal")]
    Unterminated { kind: &'static str, column: usize },

    #[error("character literal must contain exactly one character")]
    BadCharLiteral { column: usize },

    #[error("unknown escape sequence '\\{ch}'")]
    BadEscape { ch: char, column: usize },

    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, column: usize },
}

impl LexerError {
    /// Column (0-indexed) where the error was detected.
    pub fn column(&self) -> usize {
        match *self {
            Self::InvalidDigit { column, .. }
            | Self::MissingDigits { column }
            | Self::NumberTooLarge { column, .. }
            | Self::Unterminated { column, .. }
            | Self::BadCharLiteral { column }
            | Self::BadEscape { column, .. }
            | Self::UnexpectedCharacter { column, .. } => column,
        }
    }
}

/// Classification of lexical tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    /// Mnemonics, register names, labels and symbol references
    Identifier(String),
    /// Directive name after `.`, lower-cased
    Directive(String),
    /// Numeric literal in any radix
    Number(u32),
    /// Character literal value
    Char(u8),
    /// String literal contents with escapes applied
    Str(String),

    /// `:` - label definition suffix, register pair separator
    Colon,
    /// `,` - operand separator
    Comma,
    /// `#` - immediate prefix
    Hash,
    /// `=` - constant assignment
    Equal,
    /// `[` - memory operand open
    LBracket,
    /// `]` - memory operand close
    RBracket,
    Plus,
    Minus,
    /// `<` - low byte prefix
    Less,
    /// `>` - high byte prefix
    Greater,
    /// `*` - current location
    Star,

    /// End of line marker
    Eof,
}

/// A single lexical token with its position in the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,

    /// Column offset within line (0-indexed)
    pub column: usize,

    /// Length in source bytes
    pub length: usize,
}

/// Lexer state for one line
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices();
        let current = chars.next();
        Lexer {
            source,
            chars,
            current,
        }
    }

    fn advance(&mut self) {
        self.current = self.chars.next();
    }

    fn peek(&self) -> Option<char> {
        self.current.map(|(_, ch)| ch)
    }

    /// Character after the current one
    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn column(&self) -> usize {
        match self.current {
            Some((pos, _)) => pos,
            None => self.source.len(),
        }
    }

    fn token(&self, token_type: TokenType, start: usize) -> Token {
        Token {
            token_type,
            column: start,
            length: self.column() - start,
        }
    }

    /// Scans `[A-Za-z0-9_]*` starting at the current character
    fn scan_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    /// Scans the digits of a number in `radix`. The prefix is already consumed.
    fn scan_digits(&mut self, radix: u32, start: usize) -> Result<Token, LexerError> {
        let mut digits = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else if ch.is_ascii_alphanumeric() || ch == '_' {
                return Err(LexerError::InvalidDigit {
                    ch,
                    column: self.column(),
                });
            } else {
                break;
            }
        }

        if digits.is_empty() {
            return Err(LexerError::MissingDigits { column: start });
        }

        let value = u32::from_str_radix(&digits, radix).map_err(|_| LexerError::NumberTooLarge {
            value: self.source[start..self.column()].to_string(),
            column: start,
        })?;
        Ok(self.token(TokenType::Number(value), start))
    }

    /// Scans one possibly escaped character inside a quoted literal
    fn scan_quoted_char(&mut self, kind: &'static str, start: usize) -> Result<char, LexerError> {
        let ch = self
            .peek()
            .ok_or(LexerError::Unterminated { kind, column: start })?;
        self.advance();
        if ch != '\\' {
            return Ok(ch);
        }

        let column = self.column();
        let escaped = self
            .peek()
            .ok_or(LexerError::Unterminated { kind, column: start })?;
        self.advance();
        match escaped {
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            '0' => Ok('\0'),
            '\\' | '\'' | '"' => Ok(escaped),
            ch => Err(LexerError::BadEscape { ch, column }),
        }
    }

    fn scan_char_literal(&mut self, start: usize) -> Result<Token, LexerError> {
        self.advance(); // consume '
        if self.peek() == Some('\'') {
            return Err(LexerError::BadCharLiteral { column: start });
        }
        let ch = self.scan_quoted_char("character", start)?;
        if self.peek() != Some('\'') {
            return Err(match self.peek() {
                None => LexerError::Unterminated {
                    kind: "character",
                    column: start,
                },
                Some(_) => LexerError::BadCharLiteral { column: start },
            });
        }
        self.advance(); // consume closing '

        let value = u8::try_from(u32::from(ch)).map_err(|_| LexerError::BadCharLiteral { column: start })?;
        Ok(self.token(TokenType::Char(value), start))
    }

    fn scan_string(&mut self, start: usize) -> Result<Token, LexerError> {
        self.advance(); // consume "
        let mut text = String::new();
        loop {
            if self.peek() == Some('"') {
                self.advance();
                break;
            }
            text.push(self.scan_quoted_char("string", start)?);
        }
        Ok(self.token(TokenType::Str(text), start))
    }

    /// Get the next token, or `None` at end of line
    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.advance();
        }

        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        let start = self.column();

        let punctuation = match ch {
            ':' => Some(TokenType::Colon),
            ',' => Some(TokenType::Comma),
            '#' => Some(TokenType::Hash),
            '=' => Some(TokenType::Equal),
            '[' => Some(TokenType::LBracket),
            ']' => Some(TokenType::RBracket),
            '+' => Some(TokenType::Plus),
            '-' => Some(TokenType::Minus),
            '<' => Some(TokenType::Less),
            '>' => Some(TokenType::Greater),
            '*' => Some(TokenType::Star),
            _ => None,
        };
        if let Some(token_type) = punctuation {
            self.advance();
            return Ok(Some(self.token(token_type, start)));
        }

        match ch {
            ';' => {
                // Comment runs to end of line
                while self.peek().is_some() {
                    self.advance();
                }
                Ok(None)
            }
            '$' => {
                self.advance();
                self.scan_digits(16, start).map(Some)
            }
            '%' => {
                self.advance();
                self.scan_digits(2, start).map(Some)
            }
            '0' if matches!(self.peek_next(), Some('x' | 'X')) => {
                self.advance();
                self.advance();
                self.scan_digits(16, start).map(Some)
            }
            '0' if matches!(self.peek_next(), Some('b' | 'B')) => {
                self.advance();
                self.advance();
                self.scan_digits(2, start).map(Some)
            }
            '0'..='9' => self.scan_digits(10, start).map(Some),
            '\'' => self.scan_char_literal(start).map(Some),
            '"' => self.scan_string(start).map(Some),
            '.' if self.peek_next().is_some_and(|c| c.is_ascii_alphabetic()) => {
                self.advance();
                let name = self.scan_word().to_ascii_lowercase();
                Ok(Some(self.token(TokenType::Directive(name), start)))
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let word = self.scan_word();
                Ok(Some(self.token(TokenType::Identifier(word), start)))
            }
            _ => Err(LexerError::UnexpectedCharacter { ch, column: start }),
        }
    }
}

/// Tokenize one line of assembly source
///
/// # Returns
/// * `Ok(Vec<Token>)` - Tokens ending with [`TokenType::Eof`]
/// * `Err(LexerError)` - The first lexical error on the line
///
/// # Examples
/// ```
/// use vconsole::assembler::lexer::{tokenize, TokenType};
///
/// let tokens = tokenize(".byte 'A', 0b101").unwrap();
/// assert_eq!(tokens[0].token_type, TokenType::Directive("byte".to_string()));
/// assert_eq!(tokens[1].token_type, TokenType::Char(b'A'));
/// assert_eq!(tokens[3].token_type, TokenType::Number(5));
/// ```
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexerError> {
    let mut lexer = Lexer::new(line);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    tokens.push(Token {
        token_type: TokenType::Eof,
        column: lexer.column(),
        length: 0,
    });
    Ok(tokens)
}

/// Token stream with lookahead capability for parser consumption
pub struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens,
            position: 0,
        }
    }

    /// Peek at the current token without consuming it
    #[must_use]
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Peek ahead n tokens without consuming them. `peek_n(0)` is `peek()`.
    #[must_use]
    pub fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    /// Type of the current token, or `Eof` past the end
    #[must_use]
    pub fn peek_type(&self) -> &TokenType {
        self.peek().map_or(&TokenType::Eof, |token| &token.token_type)
    }

    /// Advance the stream position by one token without returning it
    ///
    /// Returns true if advanced, false if already at end of stream.
    pub fn advance(&mut self) -> bool {
        if self.position < self.tokens.len() {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consume and return the current token, advancing the stream
    pub fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Consumes the current token if it has type `expected`
    pub fn eat(&mut self, expected: &TokenType) -> bool {
        if self.peek_type() == expected {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Returns true at the EOF token or past the end of the stream
    #[must_use = "calling is_eof() without using the result has no effect"]
    pub fn is_eof(&self) -> bool {
        matches!(self.peek_type(), TokenType::Eof)
    }

    /// Column of the current token, for error reporting
    #[must_use]
    pub fn current_column(&self) -> usize {
        match self.peek() {
            Some(token) => token.column,
            None => self.tokens.last().map_or(0, |eof| eof.column),
        }
    }
}
