use crate::span::Spanned;
use crate::syntax::ast::*;
use crate::syntax::token::TokenKind;

use super::{PResult, ParseError, Parser};

impl Parser<'_> {
    /// block-item := declaration | statement
    pub(super) fn parse_block_item(&mut self) -> PResult<Spanned<Stmt>> {
        if matches!(
            self.peek(),
            TokenKind::TypeSpecifier | TokenKind::TypeQualifier
        ) {
            self.parse_declaration()
        } else {
            self.parse_statement()
        }
    }

    fn parse_declaration(&mut self) -> PResult<Spanned<Stmt>> {
        let start = self.current_span();
        let ty = self.parse_declaration_specifiers()?;

        let mut declarators = Vec::new();
        loop {
            let decl_start = self.current_span();
            let pointer = self.parse_pointer();
            let name = self.expect_identifier("in declaration")?;
            let init = if self.eat(TokenKind::Equal) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let span = decl_start.merge(self.prev_span());
            declarators.push(Declarator {
                id: self.fresh_id(),
                name: name.node,
                pointer,
                init,
                span,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::Semicolon, "after declaration")?;
        Ok(Spanned::new(
            Stmt::VarDeclaration { ty, declarators },
            start.merge(self.prev_span()),
        ))
    }

    fn parse_statement(&mut self) -> PResult<Spanned<Stmt>> {
        self.enter_nesting()?;
        let result = self.parse_statement_inner();
        self.exit_nesting();
        result
    }

    fn parse_statement_inner(&mut self) -> PResult<Spanned<Stmt>> {
        let start = self.current_span();

        let stmt = match self.peek() {
            TokenKind::LeftBrace => return self.parse_compound(),
            TokenKind::If => {
                self.advance();
                let condition = self.parse_condition("if")?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.eat(TokenKind::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                }
            }
            TokenKind::While => {
                self.advance();
                let condition = self.parse_condition("while")?;
                let body = Box::new(self.parse_statement()?);
                Stmt::While { condition, body }
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(TokenKind::While, "after 'do' body")?;
                let condition = self.parse_condition("do-while")?;
                self.expect(TokenKind::Semicolon, "after 'do-while' condition")?;
                Stmt::Do { body, condition }
            }
            TokenKind::For => {
                self.advance();
                self.parse_for()?
            }
            TokenKind::Switch => {
                self.advance();
                let condition = self.parse_condition("switch")?;
                let body = Box::new(self.parse_statement()?);
                Stmt::Switch { condition, body }
            }
            TokenKind::Case => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Colon, "after 'case' value")?;
                let body = Box::new(self.parse_statement()?);
                Stmt::Labelled {
                    label: Label::Case(value),
                    body,
                }
            }
            TokenKind::Default => {
                self.advance();
                self.expect(TokenKind::Colon, "after 'default'")?;
                let body = Box::new(self.parse_statement()?);
                Stmt::Labelled {
                    label: Label::Default,
                    body,
                }
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after 'break'")?;
                Stmt::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "after 'continue'")?;
                Stmt::Continue
            }
            TokenKind::Print => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "after value")?;
                Stmt::Print(value)
            }
            TokenKind::ForEachSynapse => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                Stmt::ForEachSynapse { body }
            }
            TokenKind::TypeSpecifier | TokenKind::TypeQualifier => {
                self.error_at_current("Declarations are only allowed as block items");
                return Err(ParseError);
            }
            _ => return self.parse_expression_statement(),
        };

        Ok(Spanned::new(stmt, start.merge(self.prev_span())))
    }

    fn parse_compound(&mut self) -> PResult<Spanned<Stmt>> {
        let start = self.expect(TokenKind::LeftBrace, "to open block")?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at(TokenKind::EndOfFile) {
            match self.parse_block_item() {
                Ok(item) => items.push(item),
                Err(ParseError) => self.synchronize(),
            }
        }
        self.expect(TokenKind::RightBrace, "after block")?;
        Ok(Spanned::new(
            Stmt::Compound(items),
            start.merge(self.prev_span()),
        ))
    }

    fn parse_condition(&mut self, keyword: &str) -> PResult<Expr> {
        self.expect(TokenKind::LeftParen, &format!("after '{}'", keyword))?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RightParen, &format!("after '{}' condition", keyword))?;
        Ok(condition)
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::LeftParen, "after 'for'")?;

        let init = match self.peek() {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::TypeSpecifier | TokenKind::TypeQualifier => {
                Some(Box::new(self.parse_declaration()?))
            }
            _ => Some(Box::new(self.parse_expression_statement()?)),
        };

        let condition = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon, "after loop condition")?;

        let increment = if self.at(TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::RightParen, "after for clauses")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            condition,
            increment,
            body,
        })
    }

    fn parse_expression_statement(&mut self) -> PResult<Spanned<Stmt>> {
        let start = self.current_span();
        if self.eat(TokenKind::Semicolon) {
            return Ok(Spanned::new(Stmt::Expression(None), start));
        }
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "after expression")?;
        Ok(Spanned::new(
            Stmt::Expression(Some(expr)),
            start.merge(self.prev_span()),
        ))
    }
}
