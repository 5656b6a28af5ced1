//! Expression parsing: precedence climbing over the operator tiers
//! `or` < `and` < comparison < additive < multiplicative < unary < postfix.
//! All tiers are left-associative except unary; a comparison accepts only a
//! single operator, so `a < b < c` fails to parse.

use super::{ParseResult, Parser};
use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{ParseError, ParseErrorKind};
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::Or) {
            let right = self.parse_and()?;
            left = self.alloc_expr(Expr::Binary { op: BinaryOp::Or, left, right });
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_comparison()?;
        while self.eat(TokenKind::And) {
            let right = self.parse_comparison()?;
            left = self.alloc_expr(Expr::Binary { op: BinaryOp::And, left, right });
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<&'a Expr<'a>> {
        let left = self.parse_additive()?;
        if let Some(op) = comparison_op(self.peek().kind) {
            self.advance();
            let right = self.parse_additive()?;
            if comparison_op(self.peek().kind).is_some() {
                return Err(self.error_here("a single comparison; comparisons cannot be chained"));
            }
            return Ok(self.alloc_expr(Expr::Binary { op, left, right }));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.alloc_expr(Expr::Binary { op, left, right });
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.alloc_expr(Expr::Binary { op, left, right });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<&'a Expr<'a>> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.alloc_expr(Expr::Unary { op: UnaryOp::Negate, operand }))
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.alloc_expr(Expr::Unary { op: UnaryOp::Not, operand }))
            }
            // try/error parse as prefixes here; the analyzer restricts them
            // to the positions where they are meaningful.
            TokenKind::Try => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.alloc_expr(Expr::Try(operand)))
            }
            TokenKind::Error => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.alloc_expr(Expr::ErrorValue(operand)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    let callee = match expr {
                        Expr::Variable(name) => *name,
                        _ => {
                            let token = self.peek();
                            return Err(ParseError {
                                kind: ParseErrorKind::InvalidCallTarget,
                                line: token.line,
                                col: token.col,
                            });
                        }
                    };
                    self.advance(); // consume "("
                    let args = self.parse_call_args()?;
                    expr = self.alloc_expr(Expr::Call { callee, args });
                }
                TokenKind::LBracket => {
                    self.advance(); // consume "["
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = self.alloc_expr(Expr::Index { target: expr, index });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> ParseResult<&'a [&'a Expr<'a>]> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(self.alloc_expr_slice(args))
    }

    fn parse_primary(&mut self) -> ParseResult<&'a Expr<'a>> {
        let token = self.peek();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                Ok(self.alloc_expr(Expr::IntLiteral(token.lexeme)))
            }
            TokenKind::Float => {
                self.advance();
                Ok(self.alloc_expr(Expr::FloatLiteral(token.lexeme)))
            }
            TokenKind::StrLit => {
                self.advance();
                Ok(self.alloc_expr(Expr::StringLiteral(token.lexeme)))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.alloc_expr(Expr::BoolLiteral(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.alloc_expr(Expr::BoolLiteral(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.alloc_expr(Expr::NullLiteral))
            }
            TokenKind::Name => {
                self.advance();
                Ok(self.alloc_expr(Expr::Variable(token.lexeme)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(self.alloc_expr(Expr::ArrayLiteral(self.alloc_expr_slice(elements))))
            }
            _ => Err(self.error_here("an expression")),
        }
    }
}

fn comparison_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::NotEq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::LtEq => Some(BinaryOp::LtEq),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::GtEq => Some(BinaryOp::GtEq),
        _ => None,
    }
}
