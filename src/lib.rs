//! Compiler core for the Lim programming language.
//!
//! Lim is a small statically-typed systems language whose surface syntax
//! uses natural-language keywords (`set … to …`, `loop while`,
//! `try … catch`). This crate turns one source file into a free-standing
//! C11 translation unit through a strict pipeline:
//!
//! ```text
//! source → lexer → tokens → parser → AST → analyzer ✓ → C source
//! ```
//!
//! The lexer preserves significant newlines and attaches 1-indexed columns
//! to every token; the parser delimits blocks by column (no INDENT/DEDENT
//! tokens) and allocates the whole AST in one arena; the analyzer checks and
//! never transforms; the generator emits helper typedefs (slice descriptors,
//! error unions, array-return wrappers, a thread-runner shim) on demand,
//! deduplicated by structural key. [`compile`] wires the stages together and
//! drives the host C compiler.

pub mod analysis;
pub mod arena;
pub mod ast;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;

pub use analysis::{analyze, Analysis};
pub use arena::Arena;
pub use codegen::generate;
pub use compile::{build_with_cc, compile_and_run, compile_to_c, compile_to_dir};
pub use error::CompileError;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};
