use super::analyze;
use crate::arena::Arena;
use crate::ast::Type;
use crate::error::{SemanticError, SemanticErrorKind};
use crate::lexer::Lexer;
use crate::parser::Parser;

fn analyze_err(source: &str) -> SemanticError {
    let arena = Arena::new();
    let tokens = Lexer::new(source).tokenize().unwrap();
    let program = Parser::new(&tokens, &arena).parse_program().unwrap();
    analyze(&program, &arena).err().expect("expected a semantic error")
}

fn assert_analyzes(source: &str) {
    let arena = Arena::new();
    let tokens = Lexer::new(source).tokenize().unwrap();
    let program = Parser::new(&tokens, &arena).parse_program().unwrap();
    if let Err(err) = analyze(&program, &arena) {
        panic!("should analyze, got: {}", err);
    }
}

#[test]
fn declaration_then_reassignment() {
    assert_analyzes("set x to 1\nset x to 2");
}

#[test]
fn reassignment_must_keep_the_type() {
    let err = analyze_err("set x to 1\nset x to \"s\"");
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn reassignment_reaches_outer_scopes() {
    assert_analyzes("set x to 1\nif true then\n    set x to 2");
}

#[test]
fn typed_declaration_refuses_shadowing() {
    let err = analyze_err("set x to 1\nif true then\n    set x as i32 to 2");
    assert!(matches!(err.kind, SemanticErrorKind::AlreadyDefined { .. }), "{}", err);
}

#[test]
fn branch_locals_do_not_escape() {
    let err = analyze_err("if true then\n    set x to 1\nprint(x)");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedVariable { .. }), "{}", err);
}

#[test]
fn arrays_cannot_be_reassigned() {
    let err = analyze_err("set xs to [1, 2]\nset xs to [3, 4]");
    assert!(matches!(err.kind, SemanticErrorKind::ArrayReassignment { .. }), "{}", err);
}

#[test]
fn array_elements_can_be_assigned() {
    assert_analyzes("set xs to [1, 2]\nset xs[0] to 9");
}

#[test]
fn empty_array_literal_is_rejected() {
    let err = analyze_err("set xs to []");
    assert!(matches!(err.kind, SemanticErrorKind::EmptyArrayLiteral), "{}", err);
}

#[test]
fn single_element_array_succeeds() {
    assert_analyzes("set xs to [1]");
}

#[test]
fn array_elements_must_agree_with_the_first() {
    let err = analyze_err("set xs to [1, \"two\"]");
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn null_is_assignable_only_to_str() {
    assert_analyzes("set s as str to null");
    let err = analyze_err("set n as i32 to null");
    assert!(matches!(err.kind, SemanticErrorKind::NullNotAllowed { .. }), "{}", err);
}

#[test]
fn null_cannot_be_inferred() {
    let err = analyze_err("set s to null");
    assert!(matches!(err.kind, SemanticErrorKind::CannotInferType { .. }), "{}", err);
}

#[test]
fn conditions_must_be_bool() {
    let err = analyze_err("if 1 then\n    print(1)");
    assert!(matches!(err.kind, SemanticErrorKind::NotBoolean { .. }), "{}", err);
    let err = analyze_err("loop while 1\n    print(1)");
    assert!(matches!(err.kind, SemanticErrorKind::NotBoolean { .. }), "{}", err);
}

#[test]
fn arithmetic_requires_matching_concrete_types() {
    let err = analyze_err("set x as i32 to 1\nset y as i64 to 2\nset z to x + y");
    assert!(matches!(err.kind, SemanticErrorKind::OperandMismatch { .. }), "{}", err);
}

#[test]
fn int_and_float_literals_do_not_mix() {
    let err = analyze_err("set z to 1 + 2.5");
    assert!(matches!(err.kind, SemanticErrorKind::OperandMismatch { .. }), "{}", err);
}

#[test]
fn literals_adopt_the_concrete_operand_type() {
    assert_analyzes("set x as i64 to 2\nset y to x + 1\nset z as i64 to y");
}

#[test]
fn logical_operators_require_bool() {
    let err = analyze_err("set b to 1 and true");
    assert!(matches!(err.kind, SemanticErrorKind::NotBoolean { .. }), "{}", err);
}

#[test]
fn unary_operators_check_their_operand() {
    let err = analyze_err("set b to not 1");
    assert!(matches!(err.kind, SemanticErrorKind::NotBoolean { .. }), "{}", err);
    let err = analyze_err("set x to -true");
    assert!(matches!(err.kind, SemanticErrorKind::NotNumeric { .. }), "{}", err);
}

#[test]
fn comparisons_require_equal_types() {
    let err = analyze_err("set b to 1 == \"one\"");
    assert!(matches!(err.kind, SemanticErrorKind::OperandMismatch { .. }), "{}", err);
    assert_analyzes("set b to 1 < 2\nset c as bool to b");
}

#[test]
fn break_and_continue_need_a_loop() {
    let err = analyze_err("break");
    assert!(matches!(err.kind, SemanticErrorKind::BreakOutsideLoop), "{}", err);
    let err = analyze_err("continue");
    assert!(matches!(err.kind, SemanticErrorKind::ContinueOutsideLoop), "{}", err);
    assert_analyzes("loop while true\n    break");
}

#[test]
fn break_does_not_take_a_value() {
    let err = analyze_err("loop while true\n    break 1");
    assert!(matches!(err.kind, SemanticErrorKind::BreakWithValue), "{}", err);
}

#[test]
fn undefined_names_are_reported() {
    let err = analyze_err("print(x)");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedVariable { .. }), "{}", err);
    let err = analyze_err("set x to f()");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedFunction { .. }), "{}", err);
}

#[test]
fn duplicate_functions_are_reported() {
    let err = analyze_err("set f as fn\n    print(1)\nset f as fn\n    print(2)");
    assert!(matches!(err.kind, SemanticErrorKind::DuplicateFunction { .. }), "{}", err);
}

#[test]
fn functions_must_be_top_level() {
    let err = analyze_err("set f as fn\n    set g as fn\n        print(1)");
    assert!(matches!(err.kind, SemanticErrorKind::NestedFunction { .. }), "{}", err);
}

#[test]
fn functions_do_not_close_over_script_variables() {
    let err = analyze_err("set x to 1\nset f as fn\n    print(x)");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedVariable { .. }), "{}", err);
}

#[test]
fn call_arguments_are_checked() {
    let source = "set add with a as i32, b as i32 returns i32\n    return a + b\n";
    let err = analyze_err(&format!("{}set x to add(1)", source));
    assert!(matches!(err.kind, SemanticErrorKind::WrongArgCount { .. }), "{}", err);
    let err = analyze_err(&format!("{}set x to add(1, \"two\")", source));
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
    assert_analyzes(&format!("{}set x to add(1, 2)", source));
}

#[test]
fn return_type_is_inferred_from_return_sites() {
    let arena = Arena::new();
    let tokens = Lexer::new("set f as fn\n    return 1").tokenize().unwrap();
    let program = Parser::new(&tokens, &arena).parse_program().unwrap();
    let analysis = analyze(&program, &arena).unwrap();
    assert_eq!(analysis.return_type_of("f"), Type::I32);
}

#[test]
fn functions_without_returns_are_void() {
    let arena = Arena::new();
    let tokens = Lexer::new("set f as fn\n    print(1)").tokenize().unwrap();
    let program = Parser::new(&tokens, &arena).parse_program().unwrap();
    let analysis = analyze(&program, &arena).unwrap();
    assert_eq!(analysis.return_type_of("f"), Type::Void);
}

#[test]
fn mixed_bare_and_value_returns_are_rejected() {
    let err = analyze_err("set f as fn\n    if true then\n        return 1\n    return");
    assert!(matches!(err.kind, SemanticErrorKind::MixedReturns { .. }), "{}", err);
}

#[test]
fn conflicting_inferred_returns_are_rejected() {
    let err = analyze_err(
        "set f as fn\n    if true then\n        return 1.5\n    return \"s\"",
    );
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn non_void_functions_must_cover_returns() {
    let err = analyze_err("set f returns i32\n    loop while true\n        return 1");
    assert!(matches!(err.kind, SemanticErrorKind::MissingReturn { .. }), "{}", err);
}

#[test]
fn if_cascades_count_as_coverage() {
    assert_analyzes(
        "set sign with x as i32 returns i32\n    if x < 0 then\n        return -1\n    else if x == 0 then\n        return 0\n    else\n        return 1",
    );
}

#[test]
fn if_without_else_does_not_cover() {
    let err = analyze_err("set f with x as i32 returns i32\n    if x < 0 then\n        return -1");
    assert!(matches!(err.kind, SemanticErrorKind::MissingReturn { .. }), "{}", err);
}

#[test]
fn void_functions_cannot_return_values() {
    let err = analyze_err("set f returns void\n    return 1");
    assert!(matches!(err.kind, SemanticErrorKind::UnexpectedReturnValue { .. }), "{}", err);
}

#[test]
fn value_returning_functions_need_the_value() {
    let err = analyze_err("set f returns i32\n    return");
    assert!(matches!(err.kind, SemanticErrorKind::MissingReturnValue { .. }), "{}", err);
}

#[test]
fn return_at_top_level_is_rejected() {
    let err = analyze_err("return 1");
    assert!(matches!(err.kind, SemanticErrorKind::ReturnOutsideFunction), "{}", err);
}

#[test]
fn try_in_arithmetic_has_a_specific_message() {
    let err = analyze_err(
        "set f returns i32!str\n    return 1\nset g returns i32!str\n    set x to 1 + try f()\n    return x",
    );
    assert!(matches!(err.kind, SemanticErrorKind::TryOutsidePosition), "{}", err);
    assert!(err.to_string().contains("assignment value"));
}

#[test]
fn try_requires_an_error_union_operand() {
    let err = analyze_err(
        "set f returns i32\n    return 1\nset g returns i32!str\n    set x to try f()\n    return x",
    );
    assert!(matches!(err.kind, SemanticErrorKind::TryNotErrorUnion { .. }), "{}", err);
}

#[test]
fn try_propagation_needs_a_matching_enclosing_union() {
    let err = analyze_err(
        "set f returns i32!str\n    return 1\nset x to try f()",
    );
    assert!(matches!(err.kind, SemanticErrorKind::TryOutsideErrorFunction), "{}", err);

    let err = analyze_err(
        "set f returns i32!str\n    return 1\nset g returns i32!i64\n    set x to try f()\n    return x",
    );
    assert!(matches!(err.kind, SemanticErrorKind::TryErrorMismatch { .. }), "{}", err);
}

#[test]
fn try_propagation_in_matching_function_is_accepted() {
    assert_analyzes(
        "set f returns i32!str\n    return 1\nset g returns i32!str\n    set x to try f()\n    return x",
    );
}

#[test]
fn try_catch_needs_no_enclosing_union() {
    assert_analyzes(
        "set fail returns i32!str\n    return error \"boom\"\ntry fail() catch err\n    print(err)",
    );
}

#[test]
fn catch_variable_is_scoped_and_shadow_checked() {
    let err = analyze_err(
        "set fail returns i32!str\n    return error \"boom\"\nset err to 1\ntry fail() catch err\n    print(err)",
    );
    assert!(matches!(err.kind, SemanticErrorKind::AlreadyDefined { .. }), "{}", err);
}

#[test]
fn error_values_need_an_error_union_context() {
    let err = analyze_err("set x to error \"boom\"");
    assert!(matches!(err.kind, SemanticErrorKind::ErrorValueOutsidePosition), "{}", err);
}

#[test]
fn plain_return_of_the_error_side_is_accepted() {
    assert_analyzes("set fail returns i32!str\n    return \"boom\"");
}

#[test]
fn error_union_sides_must_differ() {
    let err = analyze_err("set f returns i32!i32\n    return 1");
    assert!(matches!(err.kind, SemanticErrorKind::ErrorUnionSidesEqual { .. }), "{}", err);
}

#[test]
fn error_union_sides_cannot_be_arrays() {
    let err = analyze_err("set f returns [2]i32!str\n    return [1, 2]");
    assert!(matches!(err.kind, SemanticErrorKind::ErrorUnionInvalidSide { .. }), "{}", err);
}

#[test]
fn slices_of_arrays_are_refused() {
    let err = analyze_err("set s as [][2]i32 to x");
    assert!(matches!(err.kind, SemanticErrorKind::SliceOfArray { .. }), "{}", err);
}

#[test]
fn slices_bind_from_arrays_and_slices() {
    assert_analyzes("set xs to [1, 2, 3]\nset s as []i32 to xs\nset t as []i32 to s");
    let err = analyze_err("set xs to [1, 2, 3]\nset s as []i64 to xs");
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn parallel_while_is_refused() {
    let err = analyze_err("parallel loop while true\n    print(1)");
    assert!(matches!(err.kind, SemanticErrorKind::ParallelWhile), "{}", err);
}

#[test]
fn parallel_for_is_accepted() {
    assert_analyzes("parallel loop for i in 0..4\n    print(i)");
}

#[test]
fn parallel_blocks_admit_only_zero_argument_calls() {
    let err = analyze_err("parallel\n    set x to 1");
    assert!(matches!(err.kind, SemanticErrorKind::ParallelBlockStatement), "{}", err);

    let err = analyze_err(
        "set f with x as i32 returns void\n    print(x)\nparallel\n    f(1)",
    );
    assert!(matches!(err.kind, SemanticErrorKind::ParallelCallWithArgs { .. }), "{}", err);

    let err = analyze_err("parallel\n    missing()");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedFunction { .. }), "{}", err);

    assert_analyzes("set show as fn\n    print(1)\nparallel\n    show()");
}

#[test]
fn range_endpoints_must_be_matching_integers() {
    let err = analyze_err("loop for i in 0.5..2\n    print(i)");
    assert!(matches!(err.kind, SemanticErrorKind::RangeEndpointNotInteger { .. }), "{}", err);

    let err = analyze_err(
        "set a as i64 to 1\nset b as i32 to 5\nloop for i in a..b\n    print(i)",
    );
    assert!(matches!(err.kind, SemanticErrorKind::RangeEndpointMismatch { .. }), "{}", err);

    assert_analyzes("loop for i in 0..10\n    print(i)");
}

#[test]
fn loop_variables_follow_the_anti_shadowing_rule() {
    let err = analyze_err("set i to 1\nloop for i in 0..3\n    print(i)");
    assert!(matches!(err.kind, SemanticErrorKind::AlreadyDefined { .. }), "{}", err);
}

#[test]
fn loop_variables_are_bound_in_the_body_only() {
    let err = analyze_err("loop for i in 0..3\n    print(i)\nprint(i)");
    assert!(matches!(err.kind, SemanticErrorKind::UndefinedVariable { .. }), "{}", err);
}

#[test]
fn for_over_arrays_binds_the_element_type() {
    assert_analyzes("set nums to [1, 2, 3]\nloop for n in nums\n    print(n)");
}

#[test]
fn print_checks_arity_and_type() {
    let err = analyze_err("print(1, 2)");
    assert!(matches!(err.kind, SemanticErrorKind::WrongArgCount { .. }), "{}", err);
    let err = analyze_err("set xs to [1, 2]\nprint(xs)");
    assert!(matches!(err.kind, SemanticErrorKind::PrintUnsupported { .. }), "{}", err);
}

#[test]
fn len_works_on_arrays_and_slices() {
    assert_analyzes("set xs to [1, 2]\nset n to len(xs)\nset m as i64 to n");
    let err = analyze_err("set n to len(1)");
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn bare_expressions_are_not_statements() {
    let err = analyze_err("set x to 1\nx + 1");
    assert!(matches!(err.kind, SemanticErrorKind::InvalidExpressionStatement), "{}", err);
}

#[test]
fn error_union_reassignment_wraps_either_side() {
    assert_analyzes(
        "set fail returns i32!str\n    return error \"x\"\nset r to fail()\nset r to 5\nset r to \"oops\"\nset r to fail()",
    );
}

#[test]
fn index_assignment_checks_the_element_type() {
    let err = analyze_err("set xs to [1, 2]\nset xs[0] to \"s\"");
    assert!(matches!(err.kind, SemanticErrorKind::TypeMismatch { .. }), "{}", err);
}

#[test]
fn indexing_requires_an_integer_index() {
    let err = analyze_err("set xs to [1, 2]\nset y to xs[true]");
    assert!(matches!(err.kind, SemanticErrorKind::IndexNotInteger { .. }), "{}", err);
}

#[test]
fn indexing_requires_an_indexable_target() {
    let err = analyze_err("set x to 1\nset y to x[0]");
    assert!(matches!(err.kind, SemanticErrorKind::NotIndexable { .. }), "{}", err);
}
