mod tokens;

pub use tokens::{keyword_to_token, Token, TokenKind};

use crate::error::{Error, Position, Result};

/// AWK lexer that tokenizes source code.
///
/// Columns are tracked in bytes so that positions line up with the raw
/// program buffer the driver reports against.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    last_token_produces_value: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            last_token_produces_value: false,
        }
    }

    /// Tokenize the entire source, returning all tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        // Rough estimate: 1 token per 4 bytes
        let estimated_tokens = self.source.len() / 4 + 1;
        let mut tokens = Vec::with_capacity(estimated_tokens.min(1024));

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let pos = self.position();

        let Some((_, ch)) = self.peek_char() else {
            return Ok(Token::new(TokenKind::Eof, pos));
        };

        let kind = match ch {
            // Newlines are significant in AWK
            '\n' => {
                self.advance();
                TokenKind::Newline
            }

            '"' => self.scan_string()?,

            // Regex or division - depends on context
            '/' if self.last_token_produces_value => {
                self.advance();
                self.either('=', TokenKind::SlashAssign, TokenKind::Slash)
            }
            '/' => self.scan_regex()?,

            '.' if self.peek_next_is_digit() => self.scan_number()?,
            '0'..='9' => self.scan_number()?,

            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(),

            '+' => {
                self.advance();
                if self.eat('+') {
                    TokenKind::Increment
                } else {
                    self.either('=', TokenKind::PlusAssign, TokenKind::Plus)
                }
            }
            '-' => {
                self.advance();
                if self.eat('-') {
                    TokenKind::Decrement
                } else {
                    self.either('=', TokenKind::MinusAssign, TokenKind::Minus)
                }
            }
            '*' => {
                self.advance();
                if self.eat('*') {
                    // ** is a common alias for ^
                    self.either('=', TokenKind::CaretAssign, TokenKind::Caret)
                } else {
                    self.either('=', TokenKind::StarAssign, TokenKind::Star)
                }
            }
            '%' => {
                self.advance();
                self.either('=', TokenKind::PercentAssign, TokenKind::Percent)
            }
            '^' => {
                self.advance();
                self.either('=', TokenKind::CaretAssign, TokenKind::Caret)
            }
            '<' => {
                self.advance();
                self.either('=', TokenKind::LessEqual, TokenKind::Less)
            }
            '>' => {
                self.advance();
                if self.eat('>') {
                    TokenKind::Append
                } else {
                    self.either('=', TokenKind::GreaterEqual, TokenKind::Greater)
                }
            }
            '=' => {
                self.advance();
                self.either('=', TokenKind::Equal, TokenKind::Assign)
            }
            '!' => {
                self.advance();
                if self.eat('~') {
                    TokenKind::NotMatch
                } else {
                    self.either('=', TokenKind::NotEqual, TokenKind::Not)
                }
            }
            '&' => {
                self.advance();
                if !self.eat('&') {
                    return Err(Error::parse("unexpected '&', did you mean '&&'?", pos));
                }
                TokenKind::And
            }
            '|' => {
                self.advance();
                self.either('|', TokenKind::Or, TokenKind::Pipe)
            }

            _ => match single_char_token(ch) {
                Some(kind) => {
                    self.advance();
                    kind
                }
                None => {
                    return Err(Error::parse(format!("unexpected char {:?}", ch), pos));
                }
            },
        };

        self.last_token_produces_value = kind.produces_value();
        Ok(Token::new(kind, pos))
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek_char(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn peek_char_is(&mut self, expected: char) -> bool {
        self.chars.peek().is_some_and(|(_, c)| *c == expected)
    }

    /// Consume the next char if it is `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char_is(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn either(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.eat(next) { matched } else { otherwise }
    }

    fn peek_next_is_digit(&self) -> bool {
        let mut chars = self.chars.clone();
        chars.next(); // skip current
        chars.next().is_some_and(|(_, c)| c.is_ascii_digit())
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += ch.len_utf8();
            }
        }
        result
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some((_, ' ' | '\t' | '\r')) => {
                    self.advance();
                }
                Some((_, '\\')) => {
                    // Line continuation
                    let mut chars = self.chars.clone();
                    chars.next();
                    if chars.peek().is_some_and(|(_, c)| *c == '\n') {
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some((_, '#')) => {
                    while let Some((_, ch)) = self.peek_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self) -> Result<TokenKind> {
        let pos = self.position();
        self.advance(); // opening quote

        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, '\n')) => {}
                    Some((_, c)) => value.push(self.scan_escape(c)),
                    None => return Err(Error::parse("didn't find end quote in string", pos)),
                },
                Some((_, '\n')) | None => {
                    return Err(Error::parse("didn't find end quote in string", pos));
                }
                Some((_, ch)) => value.push(ch),
            }
        }

        Ok(TokenKind::String(value))
    }

    /// Finishes an escape whose first character after the backslash is
    /// `first`, consuming the rest of an octal or hex code.
    fn scan_escape(&mut self, first: char) -> char {
        match first {
            '0'..='7' => {
                let mut code = first.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek_char().and_then(|(_, c)| c.to_digit(8)) {
                        Some(d) => {
                            self.advance();
                            code = code * 8 + d;
                        }
                        None => break,
                    }
                }
                byte_char(code)
            }
            'x' if self.peek_char().is_some_and(|(_, c)| c.is_ascii_hexdigit()) => {
                let mut code = 0;
                for _ in 0..2 {
                    match self.peek_char().and_then(|(_, c)| c.to_digit(16)) {
                        Some(d) => {
                            self.advance();
                            code = code * 16 + d;
                        }
                        None => break,
                    }
                }
                byte_char(code)
            }
            other => unescape_char(other),
        }
    }

    fn scan_regex(&mut self) -> Result<TokenKind> {
        let pos = self.position();
        self.advance(); // opening slash

        let mut pattern = String::new();

        loop {
            match self.advance() {
                Some((_, '/')) => break,
                Some((_, '\\')) => {
                    // "\/" is a literal slash; every other escape is left for the regex engine
                    match self.advance() {
                        Some((_, '/')) => pattern.push('/'),
                        Some((_, ch)) => {
                            pattern.push('\\');
                            pattern.push(ch);
                        }
                        None => return Err(Error::parse("didn't find end slash in regex", pos)),
                    }
                }
                Some((_, '\n')) | None => {
                    return Err(Error::parse("didn't find end slash in regex", pos));
                }
                Some((_, ch)) => pattern.push(ch),
            }
        }

        Ok(TokenKind::Regex(pattern))
    }

    fn scan_number(&mut self) -> Result<TokenKind> {
        let pos = self.position();
        let start = self.chars.peek().map_or(self.source.len(), |(i, _)| *i);

        self.skip_digits();
        if self.eat('.') {
            self.skip_digits();
        }

        // Only treat e/E as an exponent when digits follow, so "1e" lexes as 1 then e
        if let Some((_, 'e' | 'E')) = self.peek_char() {
            let mut ahead = self.chars.clone();
            ahead.next();
            let has_exponent = match ahead.next() {
                Some((_, '+' | '-')) => ahead.next().is_some_and(|(_, c)| c.is_ascii_digit()),
                Some((_, c)) => c.is_ascii_digit(),
                None => false,
            };
            if has_exponent {
                self.advance();
                if let Some((_, '+' | '-')) = self.peek_char() {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        let end = self.chars.peek().map_or(self.source.len(), |(i, _)| *i);
        let text = &self.source[start..end];
        let value: f64 = text
            .parse()
            .map_err(|_| Error::parse(format!("invalid number {:?}", text), pos))?;

        Ok(TokenKind::Number(value))
    }

    fn skip_digits(&mut self) {
        while let Some((_, ch)) = self.peek_char() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.chars.peek().map_or(self.source.len(), |(i, _)| *i);

        while let Some((_, ch)) = self.peek_char() {
            if !(ch.is_ascii_alphanumeric() || ch == '_') {
                break;
            }
            self.advance();
        }

        let end = self.chars.peek().map_or(self.source.len(), |(i, _)| *i);
        let ident = &self.source[start..end];

        keyword_to_token(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    Some(match ch {
        '~' => TokenKind::Match,
        '$' => TokenKind::Dollar,
        '?' => TokenKind::Question,
        ':' => TokenKind::Colon,
        '(' => TokenKind::LeftParen,
        ')' => TokenKind::RightParen,
        '{' => TokenKind::LeftBrace,
        '}' => TokenKind::RightBrace,
        '[' => TokenKind::LeftBracket,
        ']' => TokenKind::RightBracket,
        ';' => TokenKind::Semicolon,
        ',' => TokenKind::Comma,
        _ => return None,
    })
}

/// Value of the escape sequence `\c` in a string literal. Unknown escapes
/// stand for the character itself.
pub(crate) fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\x08',
        'f' => '\x0C',
        'a' => '\x07',
        'v' => '\x0B',
        other => other,
    }
}

/// Process AWK escape sequences in a command-line assignment value.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(first @ '0'..='7') => {
                let mut code = first.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            chars.next();
                            code = code * 8 + d;
                        }
                        None => break,
                    }
                }
                out.push(byte_char(code));
            }
            Some('x') if chars.peek().is_some_and(char::is_ascii_hexdigit) => {
                let mut code = 0;
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            chars.next();
                            code = code * 16 + d;
                        }
                        None => break,
                    }
                }
                out.push(byte_char(code));
            }
            Some(next) => out.push(unescape_char(next)),
            None => out.push('\\'),
        }
    }
    out
}

/// Character for a numeric escape; codes above a byte wrap like a C char.
fn byte_char(code: u32) -> char {
    char::from((code & 0xff) as u8)
}
