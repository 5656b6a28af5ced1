mod stmt;
mod types;

pub use stmt::{BinaryOp, Block, ElseIf, Expr, Param, Program, Stmt, UnaryOp};
pub use types::Type;
