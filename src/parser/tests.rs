use super::Parser;
use crate::arena::Arena;
use crate::ast::{BinaryOp, Expr, Program, Stmt, Type};
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::Lexer;

fn parse_err(source: &str) -> ParseError {
    let arena = Arena::new();
    let tokens = Lexer::new(source).tokenize().unwrap();
    Parser::new(&tokens, &arena).parse_program().unwrap_err()
}

fn assert_parses(source: &str) {
    let arena = Arena::new();
    let tokens = Lexer::new(source).tokenize().unwrap();
    let result = Parser::new(&tokens, &arena).parse_program();
    assert!(result.is_ok(), "should parse: {:?}", result.err());
}

macro_rules! parsed {
    ($program:ident, $source:expr) => {
        let arena = Arena::new();
        let tokens = Lexer::new($source).tokenize().unwrap();
        let $program: Program = Parser::new(&tokens, &arena).parse_program().unwrap();
    };
}

#[test]
fn set_assign() {
    parsed!(program, "set age to 41");
    assert_eq!(program.stmts.len(), 1);
    match &program.stmts[0] {
        Stmt::SetAssign { name, value } => {
            assert_eq!(*name, "age");
            assert!(matches!(value, Expr::IntLiteral("41")));
        }
        other => panic!("expected SetAssign, got {:?}", other),
    }
}

#[test]
fn typed_assign_with_array_type() {
    parsed!(program, "set xs as [3]i32 to [1, 2, 3]");
    match &program.stmts[0] {
        Stmt::TypedAssign { name, ty, value } => {
            assert_eq!(*name, "xs");
            assert!(matches!(ty, Type::Array { len: 3, elem: Type::I32 }));
            assert!(matches!(value, Expr::ArrayLiteral(elems) if elems.len() == 3));
        }
        other => panic!("expected TypedAssign, got {:?}", other),
    }
}

#[test]
fn typed_assign_with_slice_and_error_union_types() {
    parsed!(program, "set s as []u8 to bytes");
    assert!(matches!(
        program.stmts[0],
        Stmt::TypedAssign { ty: Type::Slice { elem: Type::U8 }, .. }
    ));

    parsed!(program2, "set r as i32!str to f()");
    assert!(matches!(
        program2.stmts[0],
        Stmt::TypedAssign { ty: Type::ErrorUnion { ok: Type::I32, err: Type::Str }, .. }
    ));
}

#[test]
fn index_assign() {
    parsed!(program, "set xs[0] to 5");
    match &program.stmts[0] {
        Stmt::IndexAssign { target, value } => {
            assert!(matches!(target, Expr::Index { target: Expr::Variable("xs"), .. }));
            assert!(matches!(value, Expr::IntLiteral("5")));
        }
        other => panic!("expected IndexAssign, got {:?}", other),
    }
}

#[test]
fn function_def_with_params_and_return_type() {
    parsed!(program, "set add with a as i32, b as i32 returns i32\n    return a + b");
    match &program.stmts[0] {
        Stmt::FunctionDef { name, params, return_type, body } => {
            assert_eq!(*name, "add");
            assert_eq!(params.len(), 2);
            assert_eq!(params[0].name, "a");
            assert_eq!(params[1].ty, Type::I32);
            assert_eq!(*return_type, Some(Type::I32));
            assert_eq!(body.len(), 1);
            assert!(matches!(body[0], Stmt::Return { value: Some(_) }));
        }
        other => panic!("expected FunctionDef, got {:?}", other),
    }
}

#[test]
fn function_def_as_fn_form() {
    parsed!(program, "set show as fn\n    print(1)");
    match &program.stmts[0] {
        Stmt::FunctionDef { name, params, return_type, .. } => {
            assert_eq!(*name, "show");
            assert!(params.is_empty());
            assert!(return_type.is_none());
        }
        other => panic!("expected FunctionDef, got {:?}", other),
    }
}

#[test]
fn function_def_returns_only() {
    parsed!(program, "set answer returns i32\n    return 42");
    assert!(matches!(
        program.stmts[0],
        Stmt::FunctionDef { params, return_type: Some(Type::I32), .. } if params.is_empty()
    ));
}

#[test]
fn function_body_ends_at_top_level_declaration() {
    parsed!(program, "set f as fn\n    print(1)\nset x to 2");
    assert_eq!(program.stmts.len(), 2);
    assert!(matches!(program.stmts[0], Stmt::FunctionDef { body, .. } if body.len() == 1));
    assert!(matches!(program.stmts[1], Stmt::SetAssign { name: "x", .. }));
}

#[test]
fn if_else_if_else_cascade() {
    parsed!(
        program,
        "if a then\n    print(1)\nelse if b then\n    print(2)\nelse\n    print(3)"
    );
    match &program.stmts[0] {
        Stmt::If { then_body, else_ifs, else_body, .. } => {
            assert_eq!(then_body.len(), 1);
            assert_eq!(else_ifs.len(), 1);
            assert!(else_body.is_some());
        }
        other => panic!("expected If, got {:?}", other),
    }
}

#[test]
fn dedented_else_attaches_to_outer_if() {
    parsed!(
        program,
        "if a then\n    if b then\n        print(1)\nelse\n    print(2)"
    );
    match &program.stmts[0] {
        Stmt::If { then_body, else_body, .. } => {
            // The inner if keeps no else; the dedented one is the outer's.
            assert!(matches!(then_body[0], Stmt::If { else_body: None, .. }));
            assert!(else_body.is_some());
        }
        other => panic!("expected If, got {:?}", other),
    }
}

#[test]
fn aligned_else_attaches_to_inner_if() {
    parsed!(
        program,
        "if a then\n    if b then\n        print(1)\n    else\n        print(2)"
    );
    match &program.stmts[0] {
        Stmt::If { then_body, else_body, .. } => {
            assert!(matches!(then_body[0], Stmt::If { else_body: Some(_), .. }));
            assert!(else_body.is_none());
        }
        other => panic!("expected If, got {:?}", other),
    }
}

#[test]
fn while_loop() {
    parsed!(program, "loop while i < 3\n    set i to i + 1");
    match &program.stmts[0] {
        Stmt::WhileLoop { condition, body, parallel } => {
            assert!(matches!(condition, Expr::Binary { op: BinaryOp::Lt, .. }));
            assert_eq!(body.len(), 1);
            assert!(!parallel);
        }
        other => panic!("expected WhileLoop, got {:?}", other),
    }
}

#[test]
fn for_loop_over_ranges() {
    parsed!(program, "loop for i in 0..10\n    print(i)");
    assert!(matches!(
        program.stmts[0],
        Stmt::ForLoop { iterable: Expr::Range { inclusive: false, .. }, parallel: false, .. }
    ));

    parsed!(program2, "loop for i in 0..=10\n    print(i)");
    assert!(matches!(
        program2.stmts[0],
        Stmt::ForLoop { iterable: Expr::Range { inclusive: true, .. }, .. }
    ));
}

#[test]
fn parallel_loop_and_block() {
    parsed!(program, "parallel loop for i in 0..4\n    work(i)");
    assert!(matches!(program.stmts[0], Stmt::ForLoop { parallel: true, .. }));

    parsed!(program2, "parallel\n    show_a()\n    show_b()");
    assert!(matches!(program2.stmts[0], Stmt::ParallelBlock { body } if body.len() == 2));
}

#[test]
fn parallel_while_parses_for_the_analyzer_to_reject() {
    parsed!(program, "parallel loop while x\n    work()");
    assert!(matches!(program.stmts[0], Stmt::WhileLoop { parallel: true, .. }));
}

#[test]
fn try_catch_with_binding() {
    parsed!(program, "try fail() catch err\n    print(err)");
    match &program.stmts[0] {
        Stmt::TryCatch { try_expr, catch_var, catch_body } => {
            assert!(matches!(try_expr, Expr::Call { callee: "fail", .. }));
            assert_eq!(*catch_var, Some("err"));
            assert_eq!(catch_body.len(), 1);
        }
        other => panic!("expected TryCatch, got {:?}", other),
    }
}

#[test]
fn bare_try_statement_propagates() {
    parsed!(program, "try poke()");
    assert!(matches!(
        program.stmts[0],
        Stmt::ExprStmt { expr: Expr::Try(Expr::Call { callee: "poke", .. }) }
    ));
}

#[test]
fn try_parses_as_assignment_value() {
    parsed!(program, "set v to try fetch()");
    assert!(matches!(
        program.stmts[0],
        Stmt::SetAssign { value: Expr::Try(_), .. }
    ));
}

#[test]
fn error_value_parses_in_return() {
    parsed!(program, "set fail returns i32!str\n    return error \"boom\"");
    match &program.stmts[0] {
        Stmt::FunctionDef { body, .. } => {
            assert!(matches!(
                body[0],
                Stmt::Return { value: Some(Expr::ErrorValue(Expr::StringLiteral("boom"))) }
            ));
        }
        other => panic!("expected FunctionDef, got {:?}", other),
    }
}

#[test]
fn precedence_groups_multiplication_first() {
    parsed!(program, "set x to 1 + 2 * 3");
    match &program.stmts[0] {
        Stmt::SetAssign { value, .. } => match value {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected Add at the top, got {:?}", other),
        },
        other => panic!("expected SetAssign, got {:?}", other),
    }
}

#[test]
fn unary_is_right_associative() {
    parsed!(program, "set x to not not a");
    assert!(matches!(
        program.stmts[0],
        Stmt::SetAssign { value: Expr::Unary { operand: Expr::Unary { .. }, .. }, .. }
    ));
}

#[test]
fn comparison_chains_are_a_parse_error() {
    let err = parse_err("set x to a < b < c");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn call_target_must_be_a_name() {
    let err = parse_err("set x to f()(1)");
    assert_eq!(err.kind, ParseErrorKind::InvalidCallTarget);
}

#[test]
fn empty_array_literal_parses() {
    // Rejection is the analyzer's job, not the parser's.
    assert_parses("set xs to []");
}

#[test]
fn range_outside_for_is_a_parse_error() {
    let err = parse_err("set x to 1..3");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn block_must_be_indented() {
    let err = parse_err("if a then\nprint(1)");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
}

#[test]
fn missing_block_at_eof() {
    let err = parse_err("if a then");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof { .. }));
}

#[test]
fn errors_carry_position() {
    let err = parse_err("set x as\nset y to 1");
    assert_eq!(err.line, 1);
    assert!(err.col > 1);
}

#[test]
fn statements_are_line_delimited() {
    let err = parse_err("set x to 1 set y to 2");
    assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { expected: "a newline", .. }));
}
