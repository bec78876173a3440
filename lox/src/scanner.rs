use crate::opcodes::Line;

/// Hand-written scanner producing one token per call with a single character of lookahead.
///
/// `start` and `current` are byte offsets into `source`; every token's lexeme is the slice
/// between them. Past the end of input the scanner keeps returning `Eof` tokens.
pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: Line,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
            finished: false,
        }
    }

    pub fn scan_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        self.start = self.current;

        let c = match self.advance() {
            None => return self.make_token(TokenType::Eof),
            Some(c) => c,
        };

        if is_alpha(c) {
            return self.identifier();
        }

        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            '(' => self.make_token(TokenType::LeftParen),
            ')' => self.make_token(TokenType::RightParen),
            '{' => self.make_token(TokenType::LeftBrace),
            '}' => self.make_token(TokenType::RightBrace),
            ';' => self.make_token(TokenType::SemiColon),
            ',' => self.make_token(TokenType::Comma),
            '.' => self.make_token(TokenType::Dot),
            '-' => self.make_token(TokenType::Minus),
            '+' => self.make_token(TokenType::Plus),
            '/' => self.make_token(TokenType::Slash),
            '*' => self.make_token(TokenType::Star),
            '!' => self.make_token_if('=', TokenType::BangEqual, TokenType::Bang),
            '=' => self.make_token_if('=', TokenType::EqualEqual, TokenType::Equal),
            '<' => self.make_token_if('=', TokenType::LessEqual, TokenType::Less),
            '>' => self.make_token_if('=', TokenType::GreaterEqual, TokenType::Greater),
            '"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    fn consume_if(&mut self, c: char) -> bool {
        let is_match = self.peek() == Some(c);
        if is_match {
            self.current += c.len_utf8();
        }

        is_match
    }

    fn make_token_if(&mut self, c: char, matched: TokenType, otherwise: TokenType) -> Token<'a> {
        if self.consume_if(c) {
            self.make_token(matched)
        } else {
            self.make_token(otherwise)
        }
    }

    fn make_token(&self, kind: TokenType) -> Token<'a> {
        Token {
            line: self.line,
            kind,
            lexeme: &self.source[self.start..self.current],
        }
    }

    fn error_token(&self, msg: &'static str) -> Token<'a> {
        Token {
            line: self.line,
            kind: TokenType::Error,
            lexeme: msg,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    // The newline is left for the next iteration so it gets counted.
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.advance().is_none() {
            return self.error_token("Unterminated string.");
        }

        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token<'a> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let is_fraction =
            self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit());

        if is_fraction {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        self.make_token(TokenType::Number)
    }

    fn identifier(&mut self) -> Token<'a> {
        while matches!(self.peek(), Some(c) if is_alpha(c) || c.is_ascii_digit()) {
            self.advance();
        }

        let kind = self.identifier_type();
        self.make_token(kind)
    }

    fn identifier_type(&self) -> TokenType {
        let ident = &self.source[self.start..self.current];
        let mut chars = ident.chars();

        match chars.next() {
            Some('a') => self.check_keyword(1, "nd", TokenType::And),
            Some('c') => self.check_keyword(1, "lass", TokenType::Class),
            Some('e') => self.check_keyword(1, "lse", TokenType::Else),
            Some('f') => match chars.next() {
                Some('a') => self.check_keyword(2, "lse", TokenType::False),
                Some('o') => self.check_keyword(2, "r", TokenType::For),
                Some('u') => self.check_keyword(2, "n", TokenType::Fun),
                _ => TokenType::Identifier,
            },
            Some('i') => self.check_keyword(1, "f", TokenType::If),
            Some('n') => self.check_keyword(1, "il", TokenType::Nil),
            Some('o') => self.check_keyword(1, "r", TokenType::Or),
            Some('p') => self.check_keyword(1, "rint", TokenType::Print),
            Some('r') => self.check_keyword(1, "eturn", TokenType::Return),
            Some('s') => self.check_keyword(1, "uper", TokenType::Super),
            Some('t') => match chars.next() {
                Some('h') => self.check_keyword(2, "is", TokenType::This),
                Some('r') => self.check_keyword(2, "ue", TokenType::True),
                _ => TokenType::Identifier,
            },
            Some('v') => self.check_keyword(1, "ar", TokenType::Var),
            Some('w') => self.check_keyword(1, "hile", TokenType::While),
            _ => TokenType::Identifier,
        }
    }

    /// Keywords are ASCII, so `offset` counts bytes as well as characters.
    fn check_keyword(&self, offset: usize, rest: &str, kind: TokenType) -> TokenType {
        if &self.source[self.start + offset..self.current] == rest {
            kind
        } else {
            TokenType::Identifier
        }
    }
}

/// Yields every token up to and including the first `Eof`.
impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let token = self.scan_token();
        if token.kind == TokenType::Eof {
            self.finished = true;
        }

        Some(token)
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub line: Line,
    pub kind: TokenType,
    /// Source slice of the token, or the message for `TokenType::Error`.
    pub lexeme: &'a str,
}

impl Token<'_> {
    /// Stand-in for the parser's token slots before the first `advance`.
    pub fn placeholder() -> Self {
        Token {
            kind: TokenType::Eof,
            line: 0,
            lexeme: "",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    SemiColon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Error,
    Eof,
}
