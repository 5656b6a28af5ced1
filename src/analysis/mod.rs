//! Semantic analyzer: scoping, typing, control-flow, and error-handling
//! rules. The analyzer is a checker only — it never mutates the tree — and
//! reports the first failure it finds.
//!
//! Untyped number literals are modelled as placeholder kinds
//! ([`ExprType::IntLit`] / [`ExprType::FloatLit`]) and resolved against the
//! concrete type expected at each assignment, argument, and return position,
//! falling back to `i32`/`f64` when no expectation exists.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::ast::{Block, Expr, Param, Program, Stmt, Type};
use crate::error::{SemanticError, SemanticErrorKind};
use crate::scope::ScopeStack;

type SemResult<T> = Result<T, SemanticError>;

/// One registered function: parameters plus the declared return type
/// (`None` when it is inferred).
#[derive(Clone, Copy)]
pub struct Signature<'a> {
    pub params: &'a [Param<'a>],
    pub declared_return: Option<Type<'a>>,
}

/// Analysis artifact consumed by the code generator: the signature table and
/// the resolved return type of every function, inferred ones included.
pub struct Analysis<'a> {
    pub signatures: HashMap<&'a str, Signature<'a>>,
    pub return_types: HashMap<&'a str, Type<'a>>,
}

impl<'a> Analysis<'a> {
    pub fn return_type_of(&self, name: &str) -> Type<'a> {
        self.return_types.get(name).copied().unwrap_or(Type::Void)
    }
}

/// Run all semantic checks over `program`. The arena is used to allocate
/// types synthesized during checking (array literal types and the like).
pub fn analyze<'a>(program: &Program<'a>, arena: &'a Arena) -> SemResult<Analysis<'a>> {
    let mut analyzer = Analyzer::new(arena);
    analyzer.collect_signatures(program)?;
    analyzer.resolve_return_types(program)?;
    analyzer.check_program(program)?;
    Ok(Analysis {
        signatures: analyzer.signatures,
        return_types: analyzer.return_types,
    })
}

/// The pseudo-type of an expression: a concrete type, an unresolved integer
/// or float literal, or `null` (which has no intrinsic type).
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExprType<'a> {
    Concrete(Type<'a>),
    IntLit,
    FloatLit,
    Null,
}

struct Analyzer<'a> {
    arena: &'a Arena,
    signatures: HashMap<&'a str, Signature<'a>>,
    return_types: HashMap<&'a str, Type<'a>>,
    scopes: ScopeStack<'a>,
    loop_depth: usize,
    current_fn: Option<&'a str>,
}

fn fail<T>(kind: SemanticErrorKind) -> SemResult<T> {
    Err(SemanticError::new(kind))
}

impl<'a> Analyzer<'a> {
    fn new(arena: &'a Arena) -> Self {
        Analyzer {
            arena,
            signatures: HashMap::new(),
            return_types: HashMap::new(),
            scopes: ScopeStack::new(),
            loop_depth: 0,
            current_fn: None,
        }
    }

    // =========================================================================
    // Pass 1: signature collection and return-type resolution
    // =========================================================================

    fn collect_signatures(&mut self, program: &Program<'a>) -> SemResult<()> {
        for stmt in program.stmts {
            if let Stmt::FunctionDef { name, params, return_type, .. } = stmt {
                if self.signatures.contains_key(name) {
                    return fail(SemanticErrorKind::DuplicateFunction { name: name.to_string() });
                }
                if *name == "main" && !params.is_empty() {
                    return fail(SemanticErrorKind::MainWithParams);
                }
                for param in *params {
                    self.check_type_wellformed(&param.ty)?;
                }
                if let Some(ret) = return_type {
                    self.check_type_wellformed(ret)?;
                }
                self.signatures.insert(
                    name,
                    Signature { params, declared_return: *return_type },
                );
            }
        }
        Ok(())
    }

    /// Resolve every function's return type up front: the declared type when
    /// present, otherwise the unified type of all `return` sites. The result
    /// table is the single source the body checks and the code generator
    /// consume.
    fn resolve_return_types(&mut self, program: &Program<'a>) -> SemResult<()> {
        for stmt in program.stmts {
            if let Stmt::FunctionDef { name, return_type: Some(ret), .. } = stmt {
                self.return_types.insert(name, *ret);
            }
        }
        for stmt in program.stmts {
            if let Stmt::FunctionDef { name, params, return_type: None, body } = stmt {
                let ret = self.infer_function_return(name, params, body)?;
                self.return_types.insert(name, ret);
            }
        }
        Ok(())
    }

    fn infer_function_return(
        &mut self,
        name: &'a str,
        params: &'a [Param<'a>],
        body: Block<'a>,
    ) -> SemResult<Type<'a>> {
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_fn = self.current_fn.replace(name);
        self.scopes.push_scope();
        for param in params {
            self.scopes.bind(param.name, param.ty);
        }

        let mut seen = ReturnSites::default();
        let result = self.scan_returns(body, &mut seen);
        self.scopes = saved_scopes;
        self.current_fn = saved_fn;
        result?;

        if seen.bare && seen.value.is_some() {
            return fail(SemanticErrorKind::MixedReturns { function: name.to_string() });
        }
        match seen.value {
            Some(ty) => Ok(ty),
            None if seen.bare || !seen.any => Ok(Type::Void),
            None => fail(SemanticErrorKind::CannotInferReturn { function: name.to_string() }),
        }
    }

    /// Walk a body for `return` sites, tracking declarations so the returned
    /// expressions can be typed. This deliberately skips the full rule set —
    /// the main checking pass applies it afterwards.
    fn scan_returns(&mut self, body: Block<'a>, seen: &mut ReturnSites<'a>) -> SemResult<()> {
        for stmt in body {
            match stmt {
                Stmt::SetAssign { name, value } => {
                    if !self.scopes.is_visible(name) {
                        let ty = self.declare_value_type(name, value)?;
                        self.scopes.bind(name, ty);
                    }
                }
                Stmt::TypedAssign { name, ty, value: _ } => {
                    self.scopes.bind(name, *ty);
                }
                Stmt::Return { value } => {
                    seen.any = true;
                    match value {
                        None => seen.bare = true,
                        Some(v) => {
                            let ty = match v {
                                // `return try f()` makes the function's
                                // union the same as f's.
                                Expr::Try(inner) => {
                                    let et = self.infer_expr(inner, None)?;
                                    let ty = self.concrete_type(et, "try operand")?;
                                    if !matches!(ty, Type::ErrorUnion { .. }) {
                                        return fail(SemanticErrorKind::TryNotErrorUnion {
                                            found: ty.to_string(),
                                        });
                                    }
                                    ty
                                }
                                Expr::ErrorValue(_) => {
                                    return fail(SemanticErrorKind::CannotInferReturn {
                                        function: self.current_fn.unwrap_or("").to_string(),
                                    });
                                }
                                _ => {
                                    let et = self.infer_expr(v, None)?;
                                    self.concrete_type(et, "return value")?
                                }
                            };
                            match seen.value {
                                None => seen.value = Some(ty),
                                Some(prev) if prev == ty => {}
                                Some(prev) => {
                                    return fail(SemanticErrorKind::TypeMismatch {
                                        expected: prev.to_string(),
                                        found: ty.to_string(),
                                    });
                                }
                            }
                        }
                    }
                }
                Stmt::If { then_body, else_ifs, else_body, .. } => {
                    self.scan_nested(then_body, None, seen)?;
                    for else_if in *else_ifs {
                        self.scan_nested(else_if.body, None, seen)?;
                    }
                    if let Some(body) = else_body {
                        self.scan_nested(body, None, seen)?;
                    }
                }
                Stmt::WhileLoop { body, .. } => self.scan_nested(body, None, seen)?,
                Stmt::ForLoop { variable, iterable, body, .. } => {
                    let var_ty = self.for_variable_type(iterable)?;
                    self.scan_nested(body, Some((*variable, var_ty)), seen)?;
                }
                Stmt::TryCatch { catch_var, catch_body, try_expr } => {
                    let bind = match catch_var {
                        Some(var) => {
                            let (_, err) = self.expect_error_union(try_expr)?;
                            Some((*var, err))
                        }
                        None => None,
                    };
                    self.scan_nested(catch_body, bind, seen)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn scan_nested(
        &mut self,
        body: Block<'a>,
        bind: Option<(&'a str, Type<'a>)>,
        seen: &mut ReturnSites<'a>,
    ) -> SemResult<()> {
        self.scopes.push_scope();
        if let Some((name, ty)) = bind {
            self.scopes.bind(name, ty);
        }
        let result = self.scan_returns(body, seen);
        self.scopes.pop_scope();
        result
    }

    // =========================================================================
    // Pass 2: full checking
    // =========================================================================

    fn check_program(&mut self, program: &Program<'a>) -> SemResult<()> {
        self.scopes.push_scope();
        for stmt in program.stmts {
            if let Stmt::FunctionDef { name, params, body, .. } = stmt {
                self.check_function(name, params, body)?;
            } else {
                self.check_stmt(stmt)?;
            }
        }
        self.scopes.pop_scope();
        Ok(())
    }

    fn check_function(
        &mut self,
        name: &'a str,
        params: &'a [Param<'a>],
        body: Block<'a>,
    ) -> SemResult<()> {
        // Functions do not close over the top-level script scope.
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_fn = self.current_fn.replace(name);
        let saved_depth = std::mem::take(&mut self.loop_depth);

        self.scopes.push_scope();
        let mut result = Ok(());
        for param in params {
            if self.scopes.is_visible(param.name) {
                result = fail(SemanticErrorKind::AlreadyDefined { name: param.name.to_string() });
                break;
            }
            self.scopes.bind(param.name, param.ty);
        }
        if result.is_ok() {
            result = body.iter().try_for_each(|stmt| self.check_stmt(stmt));
        }

        self.scopes = saved_scopes;
        self.current_fn = saved_fn;
        self.loop_depth = saved_depth;
        result?;

        let ret = self.return_types.get(name).copied().unwrap_or(Type::Void);
        if ret != Type::Void && !covers_return(body) {
            return fail(SemanticErrorKind::MissingReturn { function: name.to_string() });
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt<'a>) -> SemResult<()> {
        match stmt {
            Stmt::SetAssign { name, value } => {
                if let Some(declared) = self.scopes.lookup(name) {
                    if matches!(declared, Type::Array { .. }) {
                        return fail(SemanticErrorKind::ArrayReassignment { name: name.to_string() });
                    }
                    self.check_assigned_value(declared, value)
                } else {
                    let ty = self.declare_value_type(name, value)?;
                    self.scopes.bind(name, ty);
                    Ok(())
                }
            }
            Stmt::TypedAssign { name, ty, value } => {
                if self.scopes.is_visible(name) {
                    return fail(SemanticErrorKind::AlreadyDefined { name: name.to_string() });
                }
                self.check_type_wellformed(ty)?;
                if *ty == Type::Void {
                    return fail(SemanticErrorKind::TypeMismatch {
                        expected: "a value type".to_string(),
                        found: "void".to_string(),
                    });
                }
                self.check_assigned_value(*ty, value)?;
                self.scopes.bind(name, *ty);
                Ok(())
            }
            Stmt::IndexAssign { target, value } => {
                let elem = match self.infer_expr(target, None)? {
                    ExprType::Concrete(ty) => ty,
                    other => {
                        return fail(SemanticErrorKind::NotIndexable {
                            found: self.describe(other),
                        })
                    }
                };
                let et = self.infer_expr(value, Some(elem))?;
                self.coerce(et, elem)?;
                Ok(())
            }
            Stmt::FunctionDef { name, .. } => {
                fail(SemanticErrorKind::NestedFunction { name: name.to_string() })
            }
            Stmt::Return { value } => {
                let Some(fname) = self.current_fn else {
                    return fail(SemanticErrorKind::ReturnOutsideFunction);
                };
                let ret = self.return_types.get(fname).copied().unwrap_or(Type::Void);
                self.check_return_value(fname, ret, *value)
            }
            Stmt::If { condition, then_body, else_ifs, else_body } => {
                self.check_condition(condition)?;
                self.check_block(then_body, None)?;
                for else_if in *else_ifs {
                    self.check_condition(else_if.condition)?;
                    self.check_block(else_if.body, None)?;
                }
                if let Some(body) = else_body {
                    self.check_block(body, None)?;
                }
                Ok(())
            }
            Stmt::WhileLoop { condition, body, parallel } => {
                if *parallel {
                    return fail(SemanticErrorKind::ParallelWhile);
                }
                self.check_condition(condition)?;
                self.loop_depth += 1;
                let result = self.check_block(body, None);
                self.loop_depth -= 1;
                result
            }
            Stmt::ForLoop { variable, iterable, body, parallel: _ } => {
                if self.scopes.is_visible(variable) {
                    return fail(SemanticErrorKind::AlreadyDefined { name: variable.to_string() });
                }
                let var_ty = self.for_variable_type(iterable)?;
                self.loop_depth += 1;
                let result = self.check_block(body, Some((*variable, var_ty)));
                self.loop_depth -= 1;
                result
            }
            Stmt::ParallelBlock { body } => {
                for stmt in *body {
                    let Stmt::ExprStmt { expr: Expr::Call { callee, args } } = stmt else {
                        return fail(SemanticErrorKind::ParallelBlockStatement);
                    };
                    if !self.signatures.contains_key(callee) {
                        return fail(SemanticErrorKind::UndefinedFunction {
                            name: callee.to_string(),
                        });
                    }
                    if !args.is_empty() {
                        return fail(SemanticErrorKind::ParallelCallWithArgs {
                            name: callee.to_string(),
                        });
                    }
                }
                Ok(())
            }
            Stmt::Break { value } => {
                if self.loop_depth == 0 {
                    return fail(SemanticErrorKind::BreakOutsideLoop);
                }
                if value.is_some() {
                    return fail(SemanticErrorKind::BreakWithValue);
                }
                Ok(())
            }
            Stmt::Continue => {
                if self.loop_depth == 0 {
                    return fail(SemanticErrorKind::ContinueOutsideLoop);
                }
                Ok(())
            }
            Stmt::TryCatch { try_expr, catch_var, catch_body } => {
                let (_, err) = self.expect_error_union(try_expr)?;
                let bind = match catch_var {
                    Some(var) => {
                        if self.scopes.is_visible(var) {
                            return fail(SemanticErrorKind::AlreadyDefined {
                                name: var.to_string(),
                            });
                        }
                        Some((*var, err))
                    }
                    None => None,
                };
                self.check_block(catch_body, bind)
            }
            Stmt::ExprStmt { expr } => match expr {
                Expr::Call { .. } => {
                    self.infer_expr(expr, None)?;
                    Ok(())
                }
                Expr::Try(inner) => {
                    self.check_try_propagation(inner)?;
                    Ok(())
                }
                _ => fail(SemanticErrorKind::InvalidExpressionStatement),
            },
        }
    }

    fn check_block(
        &mut self,
        body: Block<'a>,
        bind: Option<(&'a str, Type<'a>)>,
    ) -> SemResult<()> {
        self.scopes.push_scope();
        if let Some((name, ty)) = bind {
            self.scopes.bind(name, ty);
        }
        let result = body.iter().try_for_each(|stmt| self.check_stmt(stmt));
        self.scopes.pop_scope();
        result
    }

    fn check_condition(&mut self, condition: &Expr<'a>) -> SemResult<()> {
        let et = self.infer_expr(condition, Some(Type::Bool))?;
        match et {
            ExprType::Concrete(Type::Bool) => Ok(()),
            other => fail(SemanticErrorKind::NotBoolean { found: self.describe(other) }),
        }
    }

    /// Type the value of a `set` declaration (no declared type to check
    /// against): literals default, `null` cannot be inferred.
    fn declare_value_type(&mut self, name: &str, value: &Expr<'a>) -> SemResult<Type<'a>> {
        let ty = match value {
            Expr::Try(inner) => self.check_try_propagation(inner)?,
            Expr::ErrorValue(_) => {
                return fail(SemanticErrorKind::ErrorValueOutsidePosition);
            }
            _ => {
                let et = self.infer_expr(value, None)?;
                match et {
                    ExprType::Null => {
                        return fail(SemanticErrorKind::CannotInferType { name: name.to_string() })
                    }
                    other => self.concrete_type(other, "assignment value")?,
                }
            }
        };
        if ty == Type::Void {
            return fail(SemanticErrorKind::TypeMismatch {
                expected: "a value".to_string(),
                found: "void".to_string(),
            });
        }
        Ok(ty)
    }

    /// Check a value against a known target type: a reassignment or a typed
    /// declaration. Handles `try`, `error`, slice binding, and error-union
    /// routing.
    fn check_assigned_value(&mut self, target: Type<'a>, value: &Expr<'a>) -> SemResult<()> {
        match value {
            Expr::Try(inner) => {
                let ok = self.check_try_propagation(inner)?;
                // At a return position the target is the whole union; the
                // unwrapped value re-wraps through its ok side.
                let accepted = match target {
                    Type::ErrorUnion { ok: target_ok, .. } => ok == *target_ok,
                    other => ok == other,
                };
                if !accepted {
                    return fail(SemanticErrorKind::TypeMismatch {
                        expected: target.to_string(),
                        found: ok.to_string(),
                    });
                }
                Ok(())
            }
            Expr::ErrorValue(inner) => {
                let Type::ErrorUnion { err, .. } = target else {
                    return fail(SemanticErrorKind::ErrorValueOutsidePosition);
                };
                let et = self.infer_expr(inner, Some(*err))?;
                self.coerce(et, *err)?;
                Ok(())
            }
            _ => match target {
                // `set s as []T to e` accepts arrays of T and slices of T.
                Type::Slice { elem } => {
                    let et = self.infer_expr(value, Some(target))?;
                    match et {
                        ExprType::Concrete(Type::Array { elem: e, .. })
                        | ExprType::Concrete(Type::Slice { elem: e })
                            if e == elem =>
                        {
                            Ok(())
                        }
                        other => fail(SemanticErrorKind::TypeMismatch {
                            expected: target.to_string(),
                            found: self.describe(other),
                        }),
                    }
                }
                // An error-union target wraps an RHS of either side's type.
                Type::ErrorUnion { ok, err } => {
                    let et = self.infer_expr(value, Some(*ok))?;
                    if let ExprType::Concrete(found) = et {
                        if found == target {
                            return Ok(());
                        }
                    }
                    if self.coerce(et, *ok).is_ok() || self.coerce(et, *err).is_ok() {
                        Ok(())
                    } else {
                        fail(SemanticErrorKind::TypeMismatch {
                            expected: target.to_string(),
                            found: self.describe(et),
                        })
                    }
                }
                _ => {
                    let et = self.infer_expr(value, Some(target))?;
                    self.coerce(et, target)?;
                    Ok(())
                }
            },
        }
    }

    fn check_return_value(
        &mut self,
        fname: &str,
        ret: Type<'a>,
        value: Option<&Expr<'a>>,
    ) -> SemResult<()> {
        match (ret, value) {
            (Type::Void, None) => Ok(()),
            (Type::Void, Some(_)) => {
                fail(SemanticErrorKind::UnexpectedReturnValue { function: fname.to_string() })
            }
            (expected, None) => fail(SemanticErrorKind::MissingReturnValue {
                function: fname.to_string(),
                expected: expected.to_string(),
            }),
            (expected, Some(value)) => self.check_assigned_value(expected, value),
        }
    }

    /// `try e` in a propagating position: `e` must be an error union and the
    /// enclosing function must return a union with the same error side.
    /// Returns the ok type.
    fn check_try_propagation(&mut self, inner: &Expr<'a>) -> SemResult<Type<'a>> {
        let (ok, err) = self.expect_error_union(inner)?;
        let Some(fname) = self.current_fn else {
            return fail(SemanticErrorKind::TryOutsideErrorFunction);
        };
        match self.return_types.get(fname).copied() {
            Some(Type::ErrorUnion { err: fn_err, .. }) => {
                if *fn_err != err {
                    return fail(SemanticErrorKind::TryErrorMismatch {
                        expected: fn_err.to_string(),
                        found: err.to_string(),
                    });
                }
                Ok(ok)
            }
            _ => fail(SemanticErrorKind::TryOutsideErrorFunction),
        }
    }

    fn expect_error_union(&mut self, expr: &Expr<'a>) -> SemResult<(Type<'a>, Type<'a>)> {
        let et = self.infer_expr(expr, None)?;
        let ty = self.concrete_type(et, "try operand")?;
        match ty {
            Type::ErrorUnion { ok, err } => Ok((*ok, *err)),
            other => fail(SemanticErrorKind::TryNotErrorUnion { found: other.to_string() }),
        }
    }

    fn for_variable_type(&mut self, iterable: &Expr<'a>) -> SemResult<Type<'a>> {
        match iterable {
            Expr::Range { start, end, .. } => {
                let st = self.infer_expr(start, None)?;
                let et = self.infer_expr(end, None)?;
                self.range_endpoint_type(st, et)
            }
            _ => {
                let et = self.infer_expr(iterable, None)?;
                let ty = self.concrete_type(et, "for iterable")?;
                match ty {
                    Type::Array { elem, .. } | Type::Slice { elem } => Ok(*elem),
                    other => fail(SemanticErrorKind::TypeMismatch {
                        expected: "an array, a slice, or a range".to_string(),
                        found: other.to_string(),
                    }),
                }
            }
        }
    }

    /// Range endpoints must be integers of one concrete type; bare literals
    /// default to `i32`.
    fn range_endpoint_type(&self, start: ExprType<'a>, end: ExprType<'a>) -> SemResult<Type<'a>> {
        let concrete = |et: ExprType<'a>| -> SemResult<Option<Type<'a>>> {
            match et {
                ExprType::Concrete(ty) if ty.is_integer() => Ok(Some(ty)),
                ExprType::IntLit => Ok(None),
                other => fail(SemanticErrorKind::RangeEndpointNotInteger {
                    found: self.describe(other),
                }),
            }
        };
        match (concrete(start)?, concrete(end)?) {
            (Some(a), Some(b)) if a == b => Ok(a),
            (Some(a), Some(b)) => fail(SemanticErrorKind::RangeEndpointMismatch {
                start: a.to_string(),
                end: b.to_string(),
            }),
            (Some(t), None) | (None, Some(t)) => Ok(t),
            (None, None) => Ok(Type::I32),
        }
    }

    // =========================================================================
    // Expression typing
    // =========================================================================

    /// Compute the pseudo-type of `expr`. `expected` is a resolution hint
    /// propagated into literal positions; it never suppresses errors, and
    /// callers still validate the result against their expectation.
    fn infer_expr(
        &mut self,
        expr: &Expr<'a>,
        expected: Option<Type<'a>>,
    ) -> SemResult<ExprType<'a>> {
        match expr {
            Expr::IntLiteral(_) => Ok(ExprType::IntLit),
            Expr::FloatLiteral(_) => Ok(ExprType::FloatLit),
            Expr::StringLiteral(_) => Ok(ExprType::Concrete(Type::Str)),
            Expr::BoolLiteral(_) => Ok(ExprType::Concrete(Type::Bool)),
            Expr::NullLiteral => Ok(ExprType::Null),
            Expr::Variable(name) => match self.scopes.lookup(name) {
                Some(ty) => Ok(ExprType::Concrete(ty)),
                None => fail(SemanticErrorKind::UndefinedVariable { name: name.to_string() }),
            },
            Expr::Binary { op, left, right } => {
                if op.is_logical() {
                    for side in [left, right] {
                        let et = self.infer_expr(side, Some(Type::Bool))?;
                        if et != ExprType::Concrete(Type::Bool) {
                            return fail(SemanticErrorKind::NotBoolean {
                                found: self.describe(et),
                            });
                        }
                    }
                    Ok(ExprType::Concrete(Type::Bool))
                } else if op.is_comparison() {
                    let lt = self.infer_expr(left, None)?;
                    let rt = self.infer_expr(right, None)?;
                    self.combine_operands(lt, rt)?;
                    Ok(ExprType::Concrete(Type::Bool))
                } else {
                    let lt = self.infer_expr(left, expected)?;
                    let rt = self.infer_expr(right, expected)?;
                    let combined = self.combine_operands(lt, rt)?;
                    match combined {
                        ExprType::Concrete(ty) if !ty.is_numeric() => {
                            fail(SemanticErrorKind::NotNumeric { found: ty.to_string() })
                        }
                        other => Ok(other),
                    }
                }
            }
            Expr::Unary { op, operand } => match op {
                crate::ast::UnaryOp::Negate => {
                    let et = self.infer_expr(operand, expected)?;
                    match et {
                        ExprType::Concrete(ty) if !ty.is_numeric() => {
                            fail(SemanticErrorKind::NotNumeric { found: ty.to_string() })
                        }
                        ExprType::Null => {
                            fail(SemanticErrorKind::NotNumeric { found: "null".to_string() })
                        }
                        other => Ok(other),
                    }
                }
                crate::ast::UnaryOp::Not => {
                    let et = self.infer_expr(operand, Some(Type::Bool))?;
                    if et != ExprType::Concrete(Type::Bool) {
                        return fail(SemanticErrorKind::NotBoolean { found: self.describe(et) });
                    }
                    Ok(ExprType::Concrete(Type::Bool))
                }
            },
            Expr::Call { callee, args } => self.infer_call(callee, args),
            Expr::ArrayLiteral(elements) => {
                if elements.is_empty() {
                    return fail(SemanticErrorKind::EmptyArrayLiteral);
                }
                let hint = match expected {
                    Some(Type::Array { elem, .. }) | Some(Type::Slice { elem }) => Some(*elem),
                    _ => None,
                };
                let first = self.infer_expr(elements[0], hint)?;
                let elem_ty = match hint {
                    Some(h) => self.coerce(first, h)?,
                    None => self.concrete_type(first, "array element")?,
                };
                for element in &elements[1..] {
                    let et = self.infer_expr(element, Some(elem_ty))?;
                    self.coerce(et, elem_ty)?;
                }
                Ok(ExprType::Concrete(Type::Array {
                    len: elements.len(),
                    elem: self.arena.alloc(elem_ty),
                }))
            }
            Expr::Index { target, index } => {
                let tt = self.infer_expr(target, None)?;
                let target_ty = self.concrete_type(tt, "index target")?;
                let elem = match target_ty {
                    Type::Array { elem, .. } | Type::Slice { elem } => *elem,
                    other => {
                        return fail(SemanticErrorKind::NotIndexable { found: other.to_string() })
                    }
                };
                let it = self.infer_expr(index, None)?;
                match it {
                    ExprType::IntLit => {}
                    ExprType::Concrete(ty) if ty.is_integer() => {}
                    other => {
                        return fail(SemanticErrorKind::IndexNotInteger {
                            found: self.describe(other),
                        })
                    }
                }
                Ok(ExprType::Concrete(elem))
            }
            Expr::Range { .. } => fail(SemanticErrorKind::RangeOutsideFor),
            Expr::Try(_) => fail(SemanticErrorKind::TryOutsidePosition),
            Expr::ErrorValue(_) => fail(SemanticErrorKind::ErrorValueOutsidePosition),
        }
    }

    fn infer_call(&mut self, callee: &'a str, args: &[&'a Expr<'a>]) -> SemResult<ExprType<'a>> {
        match callee {
            "print" => {
                if args.len() != 1 {
                    return fail(SemanticErrorKind::WrongArgCount {
                        function: "print".to_string(),
                        expected: 1,
                        found: args.len(),
                    });
                }
                let et = self.infer_expr(args[0], None)?;
                let ty = self.concrete_type(et, "print argument")?;
                if !(ty.is_numeric() || ty == Type::Bool || ty == Type::Str) {
                    return fail(SemanticErrorKind::PrintUnsupported { found: ty.to_string() });
                }
                Ok(ExprType::Concrete(Type::Void))
            }
            "len" => {
                if args.len() != 1 {
                    return fail(SemanticErrorKind::WrongArgCount {
                        function: "len".to_string(),
                        expected: 1,
                        found: args.len(),
                    });
                }
                let et = self.infer_expr(args[0], None)?;
                let ty = self.concrete_type(et, "len argument")?;
                match ty {
                    Type::Array { .. } | Type::Slice { .. } => Ok(ExprType::Concrete(Type::I64)),
                    other => fail(SemanticErrorKind::TypeMismatch {
                        expected: "an array or a slice".to_string(),
                        found: other.to_string(),
                    }),
                }
            }
            _ => {
                let Some(sig) = self.signatures.get(callee).copied() else {
                    return fail(SemanticErrorKind::UndefinedFunction {
                        name: callee.to_string(),
                    });
                };
                if args.len() != sig.params.len() {
                    return fail(SemanticErrorKind::WrongArgCount {
                        function: callee.to_string(),
                        expected: sig.params.len(),
                        found: args.len(),
                    });
                }
                for (arg, param) in args.iter().zip(sig.params) {
                    let et = self.infer_expr(arg, Some(param.ty))?;
                    self.coerce(et, param.ty)?;
                }
                match self.return_types.get(callee).copied() {
                    Some(ret) => Ok(ExprType::Concrete(ret)),
                    None => fail(SemanticErrorKind::CannotInferReturn {
                        function: callee.to_string(),
                    }),
                }
            }
        }
    }

    /// Unify two operand pseudo-types: concretes must match, a literal
    /// placeholder adopts a matching concrete side, two placeholders of the
    /// same class stay pending.
    fn combine_operands(
        &self,
        left: ExprType<'a>,
        right: ExprType<'a>,
    ) -> SemResult<ExprType<'a>> {
        use ExprType::*;
        match (left, right) {
            (Concrete(a), Concrete(b)) if a == b => Ok(Concrete(a)),
            (Concrete(a), IntLit) | (IntLit, Concrete(a)) if a.is_integer() => Ok(Concrete(a)),
            (Concrete(a), FloatLit) | (FloatLit, Concrete(a)) if a.is_float() => Ok(Concrete(a)),
            (IntLit, IntLit) => Ok(IntLit),
            (FloatLit, FloatLit) => Ok(FloatLit),
            (l, r) => fail(SemanticErrorKind::OperandMismatch {
                left: self.describe(l),
                right: self.describe(r),
            }),
        }
    }

    /// Resolve a pseudo-type at a position expecting `target`.
    fn coerce(&self, et: ExprType<'a>, target: Type<'a>) -> SemResult<Type<'a>> {
        match et {
            ExprType::Concrete(ty) if ty == target => Ok(target),
            ExprType::IntLit if target.is_integer() => Ok(target),
            ExprType::FloatLit if target.is_float() => Ok(target),
            ExprType::Null if target == Type::Str => Ok(Type::Str),
            ExprType::Null => fail(SemanticErrorKind::NullNotAllowed {
                expected: target.to_string(),
            }),
            other => fail(SemanticErrorKind::TypeMismatch {
                expected: target.to_string(),
                found: self.describe(other),
            }),
        }
    }

    /// Resolve a pseudo-type with no expectation: literals fall back to
    /// `i32`/`f64`.
    fn concrete_type(&self, et: ExprType<'a>, what: &str) -> SemResult<Type<'a>> {
        match et {
            ExprType::Concrete(ty) => Ok(ty),
            ExprType::IntLit => Ok(Type::I32),
            ExprType::FloatLit => Ok(Type::F64),
            ExprType::Null => fail(SemanticErrorKind::CannotInferType { name: what.to_string() }),
        }
    }

    fn describe(&self, et: ExprType<'a>) -> String {
        match et {
            ExprType::Concrete(ty) => ty.to_string(),
            ExprType::IntLit => "an integer literal".to_string(),
            ExprType::FloatLit => "a float literal".to_string(),
            ExprType::Null => "null".to_string(),
        }
    }

    fn check_type_wellformed(&self, ty: &Type<'a>) -> SemResult<()> {
        match ty {
            Type::ErrorUnion { ok, err } => {
                if **ok == **err {
                    return fail(SemanticErrorKind::ErrorUnionSidesEqual { ty: ok.to_string() });
                }
                for side in [ok, err] {
                    if matches!(side, Type::Array { .. } | Type::ErrorUnion { .. }) {
                        return fail(SemanticErrorKind::ErrorUnionInvalidSide {
                            side: side.to_string(),
                        });
                    }
                    self.check_type_wellformed(side)?;
                }
                Ok(())
            }
            Type::Slice { elem } => {
                if matches!(elem, Type::Array { .. }) {
                    return fail(SemanticErrorKind::SliceOfArray { elem: elem.to_string() });
                }
                self.check_type_wellformed(elem)
            }
            Type::Array { elem, .. } => self.check_type_wellformed(elem),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
struct ReturnSites<'a> {
    any: bool,
    bare: bool,
    value: Option<Type<'a>>,
}

/// Syntactic return coverage: the last statement is a `return`, or an
/// if/else cascade whose every branch covers. Loops do not count.
fn covers_return(body: Block<'_>) -> bool {
    match body.last() {
        Some(Stmt::Return { .. }) => true,
        Some(Stmt::If { then_body, else_ifs, else_body: Some(else_body), .. }) => {
            covers_return(then_body)
                && else_ifs.iter().all(|else_if| covers_return(else_if.body))
                && covers_return(else_body)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests;
