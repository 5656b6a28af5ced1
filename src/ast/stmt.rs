use super::types::Type;

/// A block is a sequence of statements allocated in the parse arena.
pub type Block<'a> = &'a [Stmt<'a>];

/// Root of a parse: the top-level statement list.
#[derive(Debug)]
pub struct Program<'a> {
    pub stmts: Block<'a>,
}

/// One function parameter: `name as type`.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    pub name: &'a str,
    pub ty: Type<'a>,
}

/// One `else if` arm of an if cascade.
#[derive(Debug)]
pub struct ElseIf<'a> {
    pub condition: &'a Expr<'a>,
    pub body: Block<'a>,
}

/// Statement AST. The tree is strictly a tree: every child slot is an
/// arena reference and nothing is shared.
#[derive(Debug)]
pub enum Stmt<'a> {
    /// `set x to 41` — declaration on first use, reassignment after.
    SetAssign { name: &'a str, value: &'a Expr<'a> },

    /// `set x as i32 to 41` — always a declaration.
    TypedAssign { name: &'a str, ty: Type<'a>, value: &'a Expr<'a> },

    /// `set xs[0] to 41` — the target is always an `Expr::Index`.
    IndexAssign { target: &'a Expr<'a>, value: &'a Expr<'a> },

    /// `set add with a as i32, b as i32 returns i32` + body.
    FunctionDef {
        name: &'a str,
        params: &'a [Param<'a>],
        return_type: Option<Type<'a>>,
        body: Block<'a>,
    },

    /// `return` or `return x`.
    Return { value: Option<&'a Expr<'a>> },

    /// `if c then` + body, `else if`s, optional `else` body.
    If {
        condition: &'a Expr<'a>,
        then_body: Block<'a>,
        else_ifs: &'a [ElseIf<'a>],
        else_body: Option<Block<'a>>,
    },

    /// `loop while c` + body. `parallel` is carried so the analyzer can
    /// reject it with a dedicated message.
    WhileLoop { condition: &'a Expr<'a>, body: Block<'a>, parallel: bool },

    /// `loop for x in e` + body; `e` may be a range.
    ForLoop {
        variable: &'a str,
        iterable: &'a Expr<'a>,
        body: Block<'a>,
        parallel: bool,
    },

    /// `parallel` + body of zero-argument calls.
    ParallelBlock { body: Block<'a> },

    /// `break`; the value slot parses but is rejected by the analyzer.
    Break { value: Option<&'a Expr<'a>> },

    /// `continue`.
    Continue,

    /// `try e catch err` + catch body. Statement-level; yields no value.
    TryCatch {
        try_expr: &'a Expr<'a>,
        catch_var: Option<&'a str>,
        catch_body: Block<'a>,
    },

    /// An expression in statement position (a call or a bare `try`).
    ExprStmt { expr: &'a Expr<'a> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Expression AST. Number literals keep their lexeme slice; the value is
/// never evaluated by the compiler, only re-spelled into the C output.
#[derive(Debug)]
pub enum Expr<'a> {
    IntLiteral(&'a str),
    FloatLiteral(&'a str),
    /// Raw body without the surrounding quotes; escapes uninterpreted.
    StringLiteral(&'a str),
    BoolLiteral(bool),
    NullLiteral,
    Variable(&'a str),
    Binary { op: BinaryOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    Unary { op: UnaryOp, operand: &'a Expr<'a> },
    /// The callee is always a bare name; there are no first-class functions.
    Call { callee: &'a str, args: &'a [&'a Expr<'a>] },
    ArrayLiteral(&'a [&'a Expr<'a>]),
    Index { target: &'a Expr<'a>, index: &'a Expr<'a> },
    /// Only legal as the iterable of a `for`.
    Range { start: &'a Expr<'a>, end: &'a Expr<'a>, inclusive: bool },
    /// `try e` — placement-checked by the analyzer.
    Try(&'a Expr<'a>),
    /// `error e` — constructs the err side of an error union.
    ErrorValue(&'a Expr<'a>),
}
