use crate::span::Span;
use crate::syntax::ast::*;
use crate::syntax::token::TokenKind;

use super::{PResult, ParseError, Parser};

impl Parser<'_> {
    /// expression := assignment
    pub(super) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn make_expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.fresh_id(),
            kind,
            span,
        }
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let target = self.parse_conditional()?;

        let op = match self.peek() {
            TokenKind::Equal => AssignOp::Assign,
            TokenKind::StarEqual => AssignOp::Compound(BinaryOp::Mul),
            TokenKind::SlashEqual => AssignOp::Compound(BinaryOp::Div),
            TokenKind::PercentEqual => AssignOp::Compound(BinaryOp::Rem),
            TokenKind::PlusEqual => AssignOp::Compound(BinaryOp::Add),
            TokenKind::MinusEqual => AssignOp::Compound(BinaryOp::Sub),
            TokenKind::ShiftLeftEqual => AssignOp::Compound(BinaryOp::Shl),
            TokenKind::ShiftRightEqual => AssignOp::Compound(BinaryOp::Shr),
            TokenKind::AmpersandEqual => AssignOp::Compound(BinaryOp::BitAnd),
            TokenKind::CaretEqual => AssignOp::Compound(BinaryOp::BitXor),
            TokenKind::PipeEqual => AssignOp::Compound(BinaryOp::BitOr),
            _ => return Ok(target),
        };

        if !is_lvalue(&target) {
            self.error_at_current("Invalid assignment target");
            return Err(ParseError);
        }

        self.advance();
        self.enter_nesting()?;
        let value = self.parse_assignment();
        self.exit_nesting();
        let value = value?;
        let span = target.span.merge(value.span);
        Ok(self.make_expr(
            ExprKind::Assignment {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> PResult<Expr> {
        let condition = self.parse_binary(0)?;
        if !self.eat(TokenKind::Question) {
            return Ok(condition);
        }

        self.enter_nesting()?;
        let branches = self.parse_conditional_branches();
        self.exit_nesting();
        let (then_branch, else_branch) = branches?;
        let span = condition.span.merge(else_branch.span);
        Ok(self.make_expr(
            ExprKind::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ))
    }

    fn parse_conditional_branches(&mut self) -> PResult<(Expr, Expr)> {
        let then_branch = self.parse_expr()?;
        self.expect(TokenKind::Colon, "in conditional expression")?;
        let else_branch = self.parse_conditional()?;
        Ok((then_branch, else_branch))
    }

    /// Precedence climbing over the binary operators, logical-or upwards.
    fn parse_binary(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op = match binary_op(self.peek()) {
                Some(op) => op,
                None => break,
            };

            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }

            self.advance(); // consume operator
            let rhs = self.parse_binary(r_bp)?;
            let span = lhs.span.merge(rhs.span);
            lhs = self.make_expr(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        self.enter_nesting()?;
        let result = self.parse_unary_inner();
        self.exit_nesting();
        result
    }

    fn parse_unary_inner(&mut self) -> PResult<Expr> {
        let start = self.current_span();

        let inc_dec = match self.peek() {
            TokenKind::PlusPlus => Some(IncDec::Increment),
            TokenKind::MinusMinus => Some(IncDec::Decrement),
            _ => None,
        };
        if let Some(op) = inc_dec {
            self.advance();
            let target = self.parse_unary()?;
            let span = start.merge(target.span);
            return Ok(self.make_expr(
                ExprKind::PrefixIncDec {
                    op,
                    target: Box::new(target),
                },
                span,
            ));
        }

        let unary = match self.peek() {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Ampersand => Some(UnaryOp::AddressOf),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(self.make_expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        // Cast: '(' type-name ')' cast-expression
        if self.at(TokenKind::LeftParen)
            && matches!(
                self.peek_at(1),
                TokenKind::TypeSpecifier | TokenKind::TypeQualifier
            )
        {
            self.advance();
            let ty = self.parse_type_name()?;
            self.expect(TokenKind::RightParen, "after cast type")?;
            let expr = self.parse_unary()?;
            let span = start.merge(expr.span);
            return Ok(self.make_expr(
                ExprKind::Cast {
                    ty,
                    expr: Box::new(expr),
                },
                span,
            ));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LeftSquareBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RightSquareBracket, "after subscript")?;
                    let span = expr.span.merge(self.prev_span());
                    expr = self.make_expr(
                        ExprKind::Subscript {
                            array: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.prev_span());
                    expr = self.make_expr(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.at(TokenKind::PlusPlus) {
                        IncDec::Increment
                    } else {
                        IncDec::Decrement
                    };
                    self.advance();
                    let span = expr.span.merge(self.prev_span());
                    expr = self.make_expr(
                        ExprKind::PostfixIncDec {
                            op,
                            target: Box::new(expr),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.at(TokenKind::RightParen) {
            loop {
                args.push(self.parse_assignment()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_span();

        match self.peek() {
            TokenKind::Number => {
                let lexeme = self.current().lexeme.clone();
                self.advance();
                let ty = number_literal_type(&lexeme);
                Ok(self.make_expr(ExprKind::Literal(Literal::Number { lexeme, ty }), start))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                Ok(self.make_expr(ExprKind::Literal(Literal::Bool(value)), start))
            }
            TokenKind::String => {
                let tok = self.advance();
                Ok(self.make_expr(ExprKind::Literal(Literal::String(tok.lexeme)), start))
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                Ok(self.make_expr(ExprKind::Identifier(tok.lexeme), start))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RightParen, "after expression")?;
                let span = start.merge(self.prev_span());
                Ok(self.make_expr(ExprKind::Grouping(Box::new(inner)), span))
            }
            _ => {
                self.error_at_current("Expect expression");
                Err(ParseError)
            }
        }
    }

    /// type-name := qualifiers/specifiers [ '*' [ 'const' ] ]
    pub(super) fn parse_type_name(&mut self) -> PResult<TypeSpec> {
        let mut ty = self.parse_declaration_specifiers()?;
        ty.pointer = self.parse_pointer();
        ty.span = ty.span.merge(self.prev_span());
        Ok(ty)
    }

    pub(super) fn parse_declaration_specifiers(&mut self) -> PResult<TypeSpec> {
        let start = self.current_span();
        let mut specifiers = Vec::new();
        let mut is_const = false;
        loop {
            match self.peek() {
                TokenKind::TypeSpecifier => specifiers.push(self.advance().lexeme),
                TokenKind::TypeQualifier => {
                    self.advance();
                    is_const = true;
                }
                _ => break,
            }
        }
        if specifiers.is_empty() {
            self.error_at_current("Expected type specifier");
            return Err(ParseError);
        }
        Ok(TypeSpec {
            specifiers,
            is_const,
            pointer: None,
            span: start.merge(self.prev_span()),
        })
    }

    pub(super) fn parse_pointer(&mut self) -> Option<PointerSpec> {
        if !self.eat(TokenKind::Star) {
            return None;
        }
        let is_const = self.eat(TokenKind::TypeQualifier);
        Some(PointerSpec { is_const })
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::PipePipe => BinaryOp::LogicalOr,
        TokenKind::AmpersandAmpersand => BinaryOp::LogicalAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::NotEqual => BinaryOp::Ne,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::ShiftLeft => BinaryOp::Shl,
        TokenKind::ShiftRight => BinaryOp::Shr,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        _ => return None,
    })
}

fn is_lvalue(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Identifier(_) | ExprKind::Subscript { .. } => true,
        ExprKind::Unary {
            op: UnaryOp::Deref, ..
        } => true,
        ExprKind::Grouping(inner) => is_lvalue(inner),
        _ => false,
    }
}
