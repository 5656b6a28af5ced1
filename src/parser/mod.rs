//! Recursive-descent parser producing the arena-allocated AST.
//!
//! Statement dispatch is by leading keyword. Blocks carry no bracketing
//! tokens: after a block header the parser records the column of the first
//! inner statement as the block's anchor, and the block extends while
//! statement columns stay at or beyond it (the column-dedent rule). A token
//! from the caller-supplied stop set also ends a block, which is how `else`
//! terminates `then` bodies.

mod expr;
#[cfg(test)]
mod tests;

use crate::arena::Arena;
use crate::ast::{Block, ElseIf, Expr, Param, Program, Stmt, Type};
use crate::error::{ParseError, ParseErrorKind};
use crate::token::{Token, TokenKind};

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,
    arena: &'a Arena,
}

impl<'a> Parser<'a> {
    /// `tokens` must be a stream produced by the lexer, ending in `Eof`.
    pub fn new(tokens: &'a [Token<'a>], arena: &'a Arena) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Parser { tokens, current: 0, arena }
    }

    pub fn parse_program(&mut self) -> ParseResult<Program<'a>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(TokenKind::Eof) {
                break;
            }
            let stmt = self.parse_statement()?;
            let block_stmt = ends_with_block(&stmt);
            stmts.push(stmt);
            if !block_stmt {
                self.expect_line_end()?;
            }
        }
        Ok(Program { stmts: self.arena.alloc_slice(stmts) })
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement(&mut self) -> ParseResult<Stmt<'a>> {
        match self.peek().kind {
            TokenKind::Set => self.parse_set(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::Loop => {
                let col = self.peek().col;
                self.advance();
                self.parse_loop(col, false)
            }
            TokenKind::Parallel => self.parse_parallel(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Break => self.parse_break(),
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            _ => {
                let expr = self.parse_expr()?;
                Ok(Stmt::ExprStmt { expr })
            }
        }
    }

    /// A `set` statement begins one of four constructs, disambiguated by
    /// one-token lookahead after the name: `to` (assignment), `as` + type
    /// (typed declaration), `with` or `as fn` (function definition), or a
    /// `[` (index assignment).
    fn parse_set(&mut self) -> ParseResult<Stmt<'a>> {
        let set_col = self.peek().col;
        self.advance(); // consume "set"
        let name = self.expect(TokenKind::Name, "a name")?.lexeme;

        if self.check(TokenKind::LBracket) {
            self.advance(); // consume "["
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket, "']'")?;
            let target = self.alloc_expr(Expr::Index {
                target: self.alloc_expr(Expr::Variable(name)),
                index,
            });
            self.expect(TokenKind::To, "'to'")?;
            let value = self.parse_expr()?;
            return Ok(Stmt::IndexAssign { target, value });
        }

        match self.peek().kind {
            TokenKind::To => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Stmt::SetAssign { name, value })
            }
            TokenKind::With | TokenKind::Returns => self.parse_function_tail(name, set_col),
            TokenKind::As => {
                self.advance();
                if self.eat(TokenKind::Fn) {
                    self.parse_function_tail(name, set_col)
                } else {
                    let ty = self.parse_type()?;
                    self.expect(TokenKind::To, "'to'")?;
                    let value = self.parse_expr()?;
                    Ok(Stmt::TypedAssign { name, ty, value })
                }
            }
            _ => Err(self.error_here("'to', 'as', or 'with'")),
        }
    }

    /// Parameter list, optional return type, and body of a function
    /// definition. The leading `set <name>` has already been consumed.
    fn parse_function_tail(&mut self, name: &'a str, set_col: u32) -> ParseResult<Stmt<'a>> {
        let mut params = Vec::new();
        if self.eat(TokenKind::With) {
            loop {
                let pname = self.expect(TokenKind::Name, "a parameter name")?.lexeme;
                self.expect(TokenKind::As, "'as'")?;
                let ty = self.parse_type()?;
                params.push(Param { name: pname, ty });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let return_type = if self.eat(TokenKind::Returns) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block(set_col, &[])?;
        Ok(Stmt::FunctionDef {
            name,
            params: self.arena.alloc_slice(params),
            return_type,
            body,
        })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt<'a>> {
        self.advance(); // consume "return"
        let value = if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(Stmt::Return { value })
    }

    fn parse_break(&mut self) -> ParseResult<Stmt<'a>> {
        self.advance(); // consume "break"
        let value = if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(Stmt::Break { value })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt<'a>> {
        let if_col = self.peek().col;
        self.advance(); // consume "if"
        let condition = self.parse_expr()?;
        self.expect(TokenKind::Then, "'then'")?;
        let then_body = self.parse_block(if_col, &[TokenKind::Else])?;

        let mut else_ifs = Vec::new();
        let mut else_body = None;
        loop {
            self.skip_newlines();
            // An else arm belongs to this if only when it sits at the same
            // column; a dedented else closes an outer if instead.
            if !(self.check(TokenKind::Else) && self.peek().col == if_col) {
                break;
            }
            self.advance(); // consume "else"
            if self.eat(TokenKind::If) {
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Then, "'then'")?;
                let body = self.parse_block(if_col, &[TokenKind::Else])?;
                else_ifs.push(ElseIf { condition, body });
            } else {
                else_body = Some(self.parse_block(if_col, &[])?);
                break;
            }
        }

        Ok(Stmt::If {
            condition,
            then_body,
            else_ifs: self.arena.alloc_slice(else_ifs),
            else_body,
        })
    }

    /// Body of `loop while` / `loop for`; the `loop` keyword has been
    /// consumed and `header_col` is the column of the statement head
    /// (`loop`, or `parallel` when prefixed).
    fn parse_loop(&mut self, header_col: u32, parallel: bool) -> ParseResult<Stmt<'a>> {
        if self.eat(TokenKind::While) {
            let condition = self.parse_expr()?;
            let body = self.parse_block(header_col, &[])?;
            Ok(Stmt::WhileLoop { condition, body, parallel })
        } else if self.eat(TokenKind::For) {
            let variable = self.expect(TokenKind::Name, "a loop variable")?.lexeme;
            self.expect(TokenKind::In, "'in'")?;
            let iterable = self.parse_for_iterable()?;
            let body = self.parse_block(header_col, &[])?;
            Ok(Stmt::ForLoop { variable, iterable, body, parallel })
        } else {
            Err(self.error_here("'while' or 'for'"))
        }
    }

    /// The iterable of a `for` is the one position where a range is legal.
    fn parse_for_iterable(&mut self) -> ParseResult<&'a Expr<'a>> {
        let start = self.parse_expr()?;
        match self.peek().kind {
            TokenKind::DotDot | TokenKind::DotDotEq => {
                let inclusive = self.peek().kind == TokenKind::DotDotEq;
                self.advance();
                let end = self.parse_expr()?;
                Ok(self.alloc_expr(Expr::Range { start, end, inclusive }))
            }
            _ => Ok(start),
        }
    }

    fn parse_parallel(&mut self) -> ParseResult<Stmt<'a>> {
        let col = self.peek().col;
        self.advance(); // consume "parallel"
        if self.eat(TokenKind::Loop) {
            self.parse_loop(col, true)
        } else {
            let body = self.parse_block(col, &[])?;
            Ok(Stmt::ParallelBlock { body })
        }
    }

    fn parse_try(&mut self) -> ParseResult<Stmt<'a>> {
        let try_col = self.peek().col;
        self.advance(); // consume "try"
        let try_expr = self.parse_expr()?;
        if self.eat(TokenKind::Catch) {
            let catch_var = if self.check(TokenKind::Name) {
                Some(self.advance().lexeme)
            } else {
                None
            };
            let catch_body = self.parse_block(try_col, &[])?;
            Ok(Stmt::TryCatch { try_expr, catch_var, catch_body })
        } else {
            // A bare `try f()` statement propagates the error upward.
            let expr = self.alloc_expr(Expr::Try(try_expr));
            Ok(Stmt::ExprStmt { expr })
        }
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Parse a block anchored at the column of its first statement. The
    /// block ends at a token with a smaller column, `eof`, or a stop token.
    fn parse_block(&mut self, header_col: u32, stops: &[TokenKind]) -> ParseResult<Block<'a>> {
        self.skip_newlines();
        if self.check(TokenKind::Eof) {
            return Err(self.error_here("an indented block"));
        }
        let anchor = self.peek().col;
        if anchor <= header_col {
            return Err(self.error_here("an indented block"));
        }

        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            let tok = self.peek();
            if tok.kind == TokenKind::Eof || tok.col < anchor || stops.contains(&tok.kind) {
                break;
            }
            let stmt = self.parse_statement()?;
            let block_stmt = ends_with_block(&stmt);
            stmts.push(stmt);
            if !block_stmt {
                self.expect_line_end()?;
            }
        }
        Ok(self.arena.alloc_slice(stmts))
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// `T`, `[N]T`, `[]T`, or `T!E`.
    fn parse_type(&mut self) -> ParseResult<Type<'a>> {
        let base = self.parse_type_base()?;
        if self.eat(TokenKind::Bang) {
            let err = self.parse_type_base()?;
            return Ok(Type::ErrorUnion {
                ok: self.arena.alloc(base),
                err: self.arena.alloc(err),
            });
        }
        Ok(base)
    }

    fn parse_type_base(&mut self) -> ParseResult<Type<'a>> {
        match self.peek().kind {
            kind if kind.is_type_keyword() => {
                self.advance();
                Ok(primitive_type(kind))
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(TokenKind::RBracket) {
                    let elem = self.parse_type_base()?;
                    Ok(Type::Slice { elem: self.arena.alloc(elem) })
                } else {
                    let len_tok = self.expect(TokenKind::Int, "an array length")?;
                    let len = len_tok.lexeme.parse::<usize>().map_err(|_| ParseError {
                        kind: ParseErrorKind::UnexpectedToken {
                            expected: "an array length",
                            found: len_tok.lexeme.to_string(),
                        },
                        line: len_tok.line,
                        col: len_tok.col,
                    })?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let elem = self.parse_type_base()?;
                    Ok(Type::Array { len, elem: self.arena.alloc(elem) })
                }
            }
            _ => Err(self.error_here("a type")),
        }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    pub(crate) fn peek(&self) -> Token<'a> {
        self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, expected: &'static str) -> ParseResult<Token<'a>> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_line_end(&mut self) -> ParseResult<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.error_here("a newline")),
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    pub(crate) fn error_here(&self, expected: &'static str) -> ParseError {
        let token = self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEof { expected }
        } else {
            ParseErrorKind::UnexpectedToken { expected, found: describe(token) }
        };
        ParseError { kind, line: token.line, col: token.col }
    }

    pub(crate) fn alloc_expr(&self, expr: Expr<'a>) -> &'a Expr<'a> {
        self.arena.alloc(expr)
    }

    pub(crate) fn alloc_expr_slice(&self, exprs: Vec<&'a Expr<'a>>) -> &'a [&'a Expr<'a>] {
        self.arena.alloc_slice(exprs)
    }
}

/// Block-carrying statements consume their own trailing newlines; simple
/// statements must end their line.
fn ends_with_block(stmt: &Stmt<'_>) -> bool {
    matches!(
        stmt,
        Stmt::FunctionDef { .. }
            | Stmt::If { .. }
            | Stmt::WhileLoop { .. }
            | Stmt::ForLoop { .. }
            | Stmt::ParallelBlock { .. }
            | Stmt::TryCatch { .. }
    )
}

fn primitive_type(kind: TokenKind) -> Type<'static> {
    match kind {
        TokenKind::I8 => Type::I8,
        TokenKind::I16 => Type::I16,
        TokenKind::I32 => Type::I32,
        TokenKind::I64 => Type::I64,
        TokenKind::U8 => Type::U8,
        TokenKind::U16 => Type::U16,
        TokenKind::U32 => Type::U32,
        TokenKind::U64 => Type::U64,
        TokenKind::F32 => Type::F32,
        TokenKind::F64 => Type::F64,
        TokenKind::Bool => Type::Bool,
        TokenKind::Str => Type::Str,
        TokenKind::Void => Type::Void,
        _ => unreachable!("not a type keyword: {:?}", kind),
    }
}

fn describe(token: Token<'_>) -> String {
    match token.kind {
        TokenKind::Newline => "newline".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::StrLit => format!("\"{}\"", token.lexeme),
        _ => token.lexeme.to_string(),
    }
}
