//! Source text to token stream.


use crate::diagnostic::ErrorHandler;
use crate::span::Span;
use crate::syntax::token::{Token, TokenKind};
use crate::types::TypeContext;

/// Scan `source` into tokens, reporting lexical errors to `handler`.
///
/// The returned stream always ends with an `EndOfFile` token. Callers check
/// `handler.has_error()` before parsing.
pub fn scan(source: &str, context: &TypeContext, handler: &mut ErrorHandler) -> Vec<Token> {
    Scanner::new(source, context, handler).tokenize()
}

pub(crate) struct Scanner<'src, 'h> {
    source: &'src [u8],
    text: &'src str,
    context: &'src TypeContext,
    handler: &'h mut ErrorHandler,
    pos: usize,
    line: u32,
}

impl<'src, 'h> Scanner<'src, 'h> {
    pub(crate) fn new(
        source: &'src str,
        context: &'src TypeContext,
        handler: &'h mut ErrorHandler,
    ) -> Self {
        Self {
            source: source.as_bytes(),
            text: source,
            context,
            handler,
            pos: 0,
            line: 1,
        }
    }

    pub(crate) fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.kind == TokenKind::EndOfFile;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(TokenKind::EndOfFile, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit()
                || (ch == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                if let Some(tok) = self.scan_number() {
                    return tok;
                }
                continue;
            }

            if ch == b'"' {
                if let Some(tok) = self.scan_string() {
                    return tok;
                }
                continue;
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None: error recorded, keep scanning
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                if self.source[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }

            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let start = self.pos;
                let start_line = self.line;
                self.pos += 2;
                loop {
                    match self.peek() {
                        None => {
                            self.handler.error(
                                Span::new(start as u32, self.pos as u32, start_line),
                                "Unterminated block comment",
                            );
                            break;
                        }
                        Some(b'*') if self.peek_at(1) == Some(b'/') => {
                            self.pos += 2;
                            break;
                        }
                        Some(c) => {
                            if c == b'\n' {
                                self.line += 1;
                            }
                            self.pos += 1;
                        }
                    }
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let word = &self.text[start..self.pos];

        let kind = match TokenKind::from_keyword(word) {
            Some(kind) => kind,
            None if self.context.is_alias(word) => TokenKind::TypeSpecifier,
            None => TokenKind::Identifier,
        };
        self.make_token(kind, start, self.pos)
    }

    fn scan_number(&mut self) -> Option<Token> {
        let start = self.pos;

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return self.invalid_number(start, "Hexadecimal literal has no digits");
            }
            if matches!(self.peek(), Some(b'u') | Some(b'U')) {
                self.pos += 1;
            }
            return self.finish_number(start);
        }

        let mut is_float = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exponent_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == exponent_start {
                return self.invalid_number(start, "Exponent has no digits");
            }
        }

        match self.peek() {
            Some(b'f') | Some(b'F') if is_float => self.pos += 1,
            Some(b'u') | Some(b'U') if !is_float => self.pos += 1,
            _ => {}
        }
        self.finish_number(start)
    }

    fn finish_number(&mut self, start: usize) -> Option<Token> {
        if self.peek().is_some_and(is_ident_continue) {
            while self.peek().is_some_and(is_ident_continue) {
                self.pos += 1;
            }
            return self.invalid_number(start, "Invalid numeric literal");
        }
        Some(self.make_token(TokenKind::Number, start, self.pos))
    }

    fn invalid_number(&mut self, start: usize, message: &str) -> Option<Token> {
        let span = Span::new(start as u32, self.pos as u32, self.line);
        let lexeme = &self.text[start..self.pos];
        self.handler
            .error(span, format!("{} '{}'", message, lexeme));
        None
    }

    fn scan_string(&mut self) -> Option<Token> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    self.handler.error(
                        Span::new(start as u32, self.pos as u32, self.line),
                        "Unterminated string literal",
                    );
                    return None;
                }
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        let end = self.pos.min(self.source.len());
        Some(self.make_token(TokenKind::String, start, end))
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Token> {
        let ch = self.source[self.pos];
        let next = self.peek_at(1);
        let third = self.peek_at(2);

        let (kind, len) = match (ch, next, third) {
            (b'<', Some(b'<'), Some(b'=')) => (TokenKind::ShiftLeftEqual, 3),
            (b'>', Some(b'>'), Some(b'=')) => (TokenKind::ShiftRightEqual, 3),
            (b'<', Some(b'<'), _) => (TokenKind::ShiftLeft, 2),
            (b'>', Some(b'>'), _) => (TokenKind::ShiftRight, 2),
            (b'<', Some(b'='), _) => (TokenKind::LessEqual, 2),
            (b'>', Some(b'='), _) => (TokenKind::GreaterEqual, 2),
            (b'=', Some(b'='), _) => (TokenKind::EqualEqual, 2),
            (b'!', Some(b'='), _) => (TokenKind::NotEqual, 2),
            (b'+', Some(b'+'), _) => (TokenKind::PlusPlus, 2),
            (b'+', Some(b'='), _) => (TokenKind::PlusEqual, 2),
            (b'-', Some(b'-'), _) => (TokenKind::MinusMinus, 2),
            (b'-', Some(b'='), _) => (TokenKind::MinusEqual, 2),
            (b'*', Some(b'='), _) => (TokenKind::StarEqual, 2),
            (b'/', Some(b'='), _) => (TokenKind::SlashEqual, 2),
            (b'%', Some(b'='), _) => (TokenKind::PercentEqual, 2),
            (b'&', Some(b'&'), _) => (TokenKind::AmpersandAmpersand, 2),
            (b'&', Some(b'='), _) => (TokenKind::AmpersandEqual, 2),
            (b'|', Some(b'|'), _) => (TokenKind::PipePipe, 2),
            (b'|', Some(b'='), _) => (TokenKind::PipeEqual, 2),
            (b'^', Some(b'='), _) => (TokenKind::CaretEqual, 2),
            (b'(', _, _) => (TokenKind::LeftParen, 1),
            (b')', _, _) => (TokenKind::RightParen, 1),
            (b'{', _, _) => (TokenKind::LeftBrace, 1),
            (b'}', _, _) => (TokenKind::RightBrace, 1),
            (b'[', _, _) => (TokenKind::LeftSquareBracket, 1),
            (b']', _, _) => (TokenKind::RightSquareBracket, 1),
            (b',', _, _) => (TokenKind::Comma, 1),
            (b':', _, _) => (TokenKind::Colon, 1),
            (b';', _, _) => (TokenKind::Semicolon, 1),
            (b'?', _, _) => (TokenKind::Question, 1),
            (b'~', _, _) => (TokenKind::Tilde, 1),
            (b'!', _, _) => (TokenKind::Not, 1),
            (b'=', _, _) => (TokenKind::Equal, 1),
            (b'<', _, _) => (TokenKind::Less, 1),
            (b'>', _, _) => (TokenKind::Greater, 1),
            (b'+', _, _) => (TokenKind::Plus, 1),
            (b'-', _, _) => (TokenKind::Minus, 1),
            (b'*', _, _) => (TokenKind::Star, 1),
            (b'/', _, _) => (TokenKind::Slash, 1),
            (b'%', _, _) => (TokenKind::Percent, 1),
            (b'&', _, _) => (TokenKind::Ampersand, 1),
            (b'|', _, _) => (TokenKind::Pipe, 1),
            (b'^', _, _) => (TokenKind::Caret, 1),
            _ => {
                // Skip the whole UTF-8 character so the error names it.
                let width = self.text[start..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.pos += width;
                let span = Span::new(start as u32, self.pos as u32, self.line);
                let text = &self.text[start..self.pos];
                self.handler
                    .error(span, format!("Unexpected character '{}'", text));
                return None;
            }
        };

        self.pos += len;
        Some(self.make_token(kind, start, self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn make_token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
        Token::new(
            kind,
            &self.text[start..end],
            Span::new(start as u32, end as u32, self.line),
        )
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
