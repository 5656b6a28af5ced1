//! Error types for every stage of the pipeline.
//!
//! Each stage has its own error with a structured kind; all of them render
//! to a single diagnostic line with a 1-indexed `line:col` position where
//! one is available. The pipeline is fail-fast: the first error aborts the
//! compilation and no partial output is written.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    UnexpectedCharacter(char),
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LexErrorKind::UnexpectedCharacter(c) => {
                write!(f, "lex error at {}:{}: unexpected character '{}'", self.line, self.col, c)
            }
            LexErrorKind::UnterminatedString => {
                write!(f, "lex error at {}:{}: unterminated string literal", self.line, self.col)
            }
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken { expected: &'static str, found: String },
    UnexpectedEof { expected: &'static str },
    InvalidCallTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => write!(
                f,
                "syntax error at {}:{}: expected {}, found '{}'",
                self.line, self.col, expected, found
            ),
            ParseErrorKind::UnexpectedEof { expected } => write!(
                f,
                "syntax error at {}:{}: unexpected end of input, expected {}",
                self.line, self.col, expected
            ),
            ParseErrorKind::InvalidCallTarget => write!(
                f,
                "syntax error at {}:{}: calls require a function name as the callee",
                self.line, self.col
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Semantic rule violations (§4.4 of the language rules).
///
/// The payloads are pre-rendered strings so the error type does not borrow
/// from the AST arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    UndefinedVariable { name: String },
    UndefinedFunction { name: String },
    DuplicateFunction { name: String },
    AlreadyDefined { name: String },
    NestedFunction { name: String },
    TypeMismatch { expected: String, found: String },
    NotNumeric { found: String },
    NotBoolean { found: String },
    OperandMismatch { left: String, right: String },
    ArrayReassignment { name: String },
    EmptyArrayLiteral,
    NotIndexable { found: String },
    IndexNotInteger { found: String },
    NullNotAllowed { expected: String },
    CannotInferType { name: String },
    ErrorUnionSidesEqual { ty: String },
    ErrorUnionInvalidSide { side: String },
    SliceOfArray { elem: String },
    BreakOutsideLoop,
    ContinueOutsideLoop,
    BreakWithValue,
    ReturnOutsideFunction,
    MissingReturnValue { function: String, expected: String },
    UnexpectedReturnValue { function: String },
    MissingReturn { function: String },
    MixedReturns { function: String },
    CannotInferReturn { function: String },
    TryOutsidePosition,
    TryNotErrorUnion { found: String },
    TryOutsideErrorFunction,
    TryErrorMismatch { expected: String, found: String },
    ErrorValueOutsidePosition,
    ParallelWhile,
    ParallelBlockStatement,
    ParallelCallWithArgs { name: String },
    WrongArgCount { function: String, expected: usize, found: usize },
    RangeOutsideFor,
    RangeEndpointNotInteger { found: String },
    RangeEndpointMismatch { start: String, end: String },
    InvalidExpressionStatement,
    PrintUnsupported { found: String },
    MainWithParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind) -> Self {
        SemanticError { kind }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SemanticErrorKind::*;
        match &self.kind {
            UndefinedVariable { name } => write!(f, "undefined variable '{}'", name),
            UndefinedFunction { name } => write!(f, "call to undefined function '{}'", name),
            DuplicateFunction { name } => write!(f, "function '{}' is defined more than once", name),
            AlreadyDefined { name } => {
                write!(f, "'{}' is already defined in an enclosing scope", name)
            }
            NestedFunction { name } => {
                write!(f, "function '{}' must be declared at the top level", name)
            }
            TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            NotNumeric { found } => write!(f, "expected a numeric operand, found {}", found),
            NotBoolean { found } => write!(f, "expected a bool operand, found {}", found),
            OperandMismatch { left, right } => {
                write!(f, "operands must have the same type, found {} and {}", left, right)
            }
            ArrayReassignment { name } => write!(
                f,
                "cannot reassign array '{}'; arrays are element-assignable only",
                name
            ),
            EmptyArrayLiteral => write!(f, "array literals require at least one element"),
            NotIndexable { found } => write!(f, "{} cannot be indexed", found),
            IndexNotInteger { found } => write!(f, "array index must be an integer, found {}", found),
            NullNotAllowed { expected } => {
                write!(f, "null is only assignable to str, not {}", expected)
            }
            CannotInferType { name } => write!(f, "cannot infer a type for '{}'", name),
            ErrorUnionSidesEqual { ty } => write!(
                f,
                "error union sides must differ, found {} on both sides",
                ty
            ),
            ErrorUnionInvalidSide { side } => write!(
                f,
                "{} cannot be a side of an error union",
                side
            ),
            SliceOfArray { elem } => write!(f, "slice elements cannot be arrays, found {}", elem),
            BreakOutsideLoop => write!(f, "break outside of a loop"),
            ContinueOutsideLoop => write!(f, "continue outside of a loop"),
            BreakWithValue => write!(f, "break does not take a value"),
            ReturnOutsideFunction => write!(f, "return outside of a function"),
            MissingReturnValue { function, expected } => write!(
                f,
                "function '{}' must return a value of type {}",
                function, expected
            ),
            UnexpectedReturnValue { function } => {
                write!(f, "void function '{}' cannot return a value", function)
            }
            MissingReturn { function } => write!(
                f,
                "function '{}' does not return on every path",
                function
            ),
            MixedReturns { function } => write!(
                f,
                "function '{}' mixes bare returns with value returns",
                function
            ),
            CannotInferReturn { function } => write!(
                f,
                "cannot infer the return type of '{}'; annotate it with returns",
                function
            ),
            TryOutsidePosition => write!(
                f,
                "try is only allowed as an assignment value, a return value, or an expression statement"
            ),
            TryNotErrorUnion { found } => {
                write!(f, "try requires an error union operand, found {}", found)
            }
            TryOutsideErrorFunction => write!(
                f,
                "try can only propagate inside a function returning an error union"
            ),
            TryErrorMismatch { expected, found } => write!(
                f,
                "try propagates error type {}, but the enclosing function returns {}",
                found, expected
            ),
            ErrorValueOutsidePosition => write!(
                f,
                "error values are only allowed where an error union is expected"
            ),
            ParallelWhile => write!(f, "parallel is not supported on while loops"),
            ParallelBlockStatement => write!(
                f,
                "parallel blocks may only contain zero-argument function calls"
            ),
            ParallelCallWithArgs { name } => write!(
                f,
                "call to '{}' in a parallel block must take no arguments",
                name
            ),
            WrongArgCount { function, expected, found } => write!(
                f,
                "function '{}' takes {} argument(s), found {}",
                function, expected, found
            ),
            RangeOutsideFor => write!(f, "ranges are only allowed as the iterable of a for loop"),
            RangeEndpointNotInteger { found } => {
                write!(f, "range endpoints must be integers, found {}", found)
            }
            RangeEndpointMismatch { start, end } => write!(
                f,
                "range endpoints must have the same type, found {} and {}",
                start, end
            ),
            InvalidExpressionStatement => {
                write!(f, "only calls may be used as expression statements")
            }
            PrintUnsupported { found } => write!(f, "print does not support values of type {}", found),
            MainWithParams => write!(f, "main does not take parameters"),
        }
    }
}

impl std::error::Error for SemanticError {}

/// A construct the code generator cannot lower. Reaching one of these is a
/// symptom of an analyzer gap; the analyzer is expected to reject the
/// program first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError {
    pub construct: String,
}

impl CodegenError {
    pub fn unsupported(construct: impl Into<String>) -> Self {
        CodegenError { construct: construct.into() }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code generation does not support {}", self.construct)
    }
}

impl std::error::Error for CodegenError {}

/// Top-level error for one compilation, aggregating every stage plus the
/// host-compiler and runtime failures of the driver.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Semantic(#[from] SemanticError),
    #[error("{0}")]
    Codegen(#[from] CodegenError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("host C compiler failed: {0}")]
    HostCompiler(String),
    #[error("generated program failed: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_renders_position() {
        let err = LexError {
            kind: LexErrorKind::UnexpectedCharacter('@'),
            line: 2,
            col: 7,
        };
        assert_eq!(err.to_string(), "lex error at 2:7: unexpected character '@'");
    }

    #[test]
    fn parse_error_renders_expected_and_found() {
        let err = ParseError {
            kind: ParseErrorKind::UnexpectedToken { expected: "'to'", found: "as".into() },
            line: 1,
            col: 9,
        };
        assert_eq!(err.to_string(), "syntax error at 1:9: expected 'to', found 'as'");
    }

    #[test]
    fn semantic_error_is_single_line() {
        let err = SemanticError::new(SemanticErrorKind::TypeMismatch {
            expected: "i32".into(),
            found: "str".into(),
        });
        assert!(!err.to_string().contains('\n'));
    }

    #[test]
    fn compile_error_wraps_stage_errors() {
        let lex = LexError { kind: LexErrorKind::UnterminatedString, line: 4, col: 1 };
        let err: CompileError = lex.into();
        assert_eq!(err.to_string(), "lex error at 4:1: unterminated string literal");
    }
}
