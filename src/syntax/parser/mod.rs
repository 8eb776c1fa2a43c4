//! Recursive descent parser for snippets.
//!
//! Errors are reported to the [`ErrorHandler`] and the parser resynchronises
//! at the next statement boundary, so one pass collects every grammatical
//! error of a snippet.

mod expr;
mod stmt;
#[cfg(test)]
mod tests;

use crate::diagnostic::ErrorHandler;
use crate::span::{Span, Spanned};
use crate::syntax::ast::{Expr, NodeId, Stmt};
use crate::syntax::token::{Token, TokenKind};

/// Bounds recursion so deeply nested input is reported, not a stack overflow.
const MAX_NESTING_DEPTH: u32 = 64;

/// Marker for a recorded parse error; the diagnostic is already in the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

pub(super) type PResult<T> = Result<T, ParseError>;

/// Parse a single expression spanning the whole token stream.
pub fn parse_expression(tokens: Vec<Token>, handler: &mut ErrorHandler) -> Option<Expr> {
    let mut parser = Parser::new(tokens, handler);
    let expr = parser.parse_expr().ok()?;
    if !parser.at(TokenKind::EndOfFile) {
        parser.error_at_current("Expected end of expression");
        return None;
    }
    Some(expr)
}

/// Parse a function-body style list of declarations and statements.
pub fn parse_block_item_list(
    tokens: Vec<Token>,
    handler: &mut ErrorHandler,
) -> Vec<Spanned<Stmt>> {
    let mut parser = Parser::new(tokens, handler);
    let mut items = Vec::new();
    while !parser.at(TokenKind::EndOfFile) {
        match parser.parse_block_item() {
            Ok(item) => items.push(item),
            Err(ParseError) => parser.synchronize(),
        }
    }
    items
}

pub(crate) struct Parser<'h> {
    tokens: Vec<Token>,
    pos: usize,
    handler: &'h mut ErrorHandler,
    depth: u32,
    next_id: u32,
}

impl<'h> Parser<'h> {
    pub(crate) fn new(mut tokens: Vec<Token>, handler: &'h mut ErrorHandler) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EndOfFile) {
            let end = tokens.last().map_or(Span::dummy(), |t| t.span);
            tokens.push(Token::new(
                TokenKind::EndOfFile,
                "",
                Span::new(end.end, end.end, end.line),
            ));
        }
        Self {
            tokens,
            pos: 0,
            handler,
            depth: 0,
            next_id: 0,
        }
    }

    fn enter_nesting(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            let message = format!("Nesting depth exceeded (maximum {} levels)", MAX_NESTING_DEPTH);
            self.error_at_current(&message);
            return Err(ParseError);
        }
        Ok(())
    }

    fn exit_nesting(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Skip tokens until a likely statement start.
    fn synchronize(&mut self) {
        if !self.at(TokenKind::EndOfFile) {
            self.advance();
        }
        while !self.at(TokenKind::EndOfFile) {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek() {
                TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Print
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::ForEachSynapse
                | TokenKind::TypeSpecifier
                | TokenKind::TypeQualifier
                | TokenKind::LeftBrace
                | TokenKind::RightBrace => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- Helpers ---

    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::EndOfFile, |t| t.kind)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        self.previous().span
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Span> {
        if self.at(kind) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            self.error_at_current(&format!("Expected {} {}", kind.description(), context));
            Err(ParseError)
        }
    }

    fn expect_identifier(&mut self, context: &str) -> PResult<Spanned<String>> {
        if self.at(TokenKind::Identifier) {
            let tok = self.advance();
            Ok(Spanned::new(tok.lexeme, tok.span))
        } else {
            self.error_at_current(&format!("Expected identifier {}", context));
            Err(ParseError)
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        let tok = self.tokens[self.pos].clone();
        self.handler.error_at(&tok, msg);
    }
}
