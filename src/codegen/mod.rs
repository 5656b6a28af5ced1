//! C code generator: emits one C11 translation unit for an analyzed
//! program.
//!
//! Helper types (slice descriptors, error unions, array-return wrappers)
//! materialise lazily into named typedefs registered under a structural key,
//! so two occurrences of the same structural type share one definition.
//! Function bodies are generated into side buffers first; the final unit is
//! then assembled as preamble, runner shim, typedef block, prototypes,
//! function definitions in source order, and a synthesised `main` when the
//! source has none.

use std::collections::HashSet;
use std::fmt::Write;

use crate::analysis::Analysis;
use crate::arena::Arena;
use crate::ast::{BinaryOp, Block, Expr, Param, Program, Stmt, Type, UnaryOp};
use crate::error::CodegenError;
use crate::scope::ScopeStack;

type GenResult<T> = Result<T, CodegenError>;

const PREAMBLE: &str = "\
#include <stdio.h>
#include <stdint.h>
#include <inttypes.h>
#include <stdbool.h>
#include <string.h>
#include <stddef.h>
#include <pthread.h>
";

const PAR_RUNNER: &str = "\
static void* __1im_par_runner(void* arg) {
    void (*fn)(void) = (void (*)(void))arg;
    fn();
    return NULL;
}
";

/// Generate the C translation unit for `program`. Deterministic: the same
/// program produces byte-identical output.
pub fn generate<'a>(
    program: &Program<'a>,
    analysis: &'a Analysis<'a>,
    arena: &'a Arena,
) -> GenResult<String> {
    let mut generator = CodeGenerator::new(analysis, arena);
    generator.run(program)
}

/// Which side of an error union a value routes through.
enum UnionSide {
    Ok,
    Err,
    Whole,
}

struct CodeGenerator<'a> {
    analysis: &'a Analysis<'a>,
    arena: &'a Arena,
    /// Helper typedef/constructor blocks in first-materialisation order.
    helpers: Vec<String>,
    helper_keys: HashSet<String>,
    needs_runner: bool,
    vars: ScopeStack<'a>,
    current_fn: Option<&'a str>,
    tmp: u32,
}

impl<'a> CodeGenerator<'a> {
    fn new(analysis: &'a Analysis<'a>, arena: &'a Arena) -> Self {
        CodeGenerator {
            analysis,
            arena,
            helpers: Vec::new(),
            helper_keys: HashSet::new(),
            needs_runner: false,
            vars: ScopeStack::new(),
            current_fn: None,
            tmp: 0,
        }
    }

    fn run(&mut self, program: &Program<'a>) -> GenResult<String> {
        let functions: Vec<_> = program
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::FunctionDef { name, params, body, .. } => Some((*name, *params, *body)),
                _ => None,
            })
            .collect();
        let has_main = functions.iter().any(|(name, ..)| *name == "main");
        let top_level: Vec<&Stmt<'a>> = program
            .stmts
            .iter()
            .filter(|stmt| !matches!(stmt, Stmt::FunctionDef { .. }))
            .collect();
        if has_main && !top_level.is_empty() {
            return Err(CodegenError::unsupported(
                "top-level statements alongside a main function",
            ));
        }

        // Prototypes first; they materialise the helper types used in
        // signatures.
        let mut prototypes = String::new();
        for (name, params, _) in &functions {
            if *name == "main" {
                continue;
            }
            let signature = self.function_signature(name, params)?;
            writeln!(prototypes, "{};", signature).unwrap();
        }

        let mut definitions = String::new();
        for (name, params, body) in &functions {
            definitions.push_str(&self.emit_function(name, params, body)?);
        }

        let mut main = String::new();
        if !has_main {
            self.vars = ScopeStack::new();
            self.vars.push_scope();
            self.current_fn = None;
            writeln!(main, "int main(void) {{").unwrap();
            for stmt in &top_level {
                main.push_str(&self.emit_stmt(stmt, 1)?);
            }
            writeln!(main, "    return 0;").unwrap();
            writeln!(main, "}}").unwrap();
        }

        let mut out = String::new();
        out.push_str(PREAMBLE);
        out.push('\n');
        if self.needs_runner {
            out.push_str(PAR_RUNNER);
            out.push('\n');
        }
        for helper in &self.helpers {
            out.push_str(helper);
            out.push('\n');
        }
        if !prototypes.is_empty() {
            out.push_str(&prototypes);
            out.push('\n');
        }
        out.push_str(&definitions);
        out.push_str(&main);
        Ok(out)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn function_signature(&mut self, name: &'a str, params: &'a [Param<'a>]) -> GenResult<String> {
        let ret = self.analysis.return_type_of(name);
        let ret_c = match ret {
            Type::Array { len, elem } => self.ensure_array_return(len, *elem)?,
            other => self.c_type(other)?,
        };
        let mut rendered = Vec::new();
        for param in params {
            rendered.push(self.param_decl(param)?);
        }
        let params_c = if rendered.is_empty() {
            "void".to_string()
        } else {
            rendered.join(", ")
        };
        Ok(format!("{} {}({})", ret_c, name, params_c))
    }

    fn param_decl(&mut self, param: &Param<'a>) -> GenResult<String> {
        match param.ty {
            // Array parameters keep their dimensions.
            Type::Array { .. } => {
                let (base, dims) = self.array_dims(param.ty)?;
                Ok(format!("{} {}{}", base, param.name, dims))
            }
            other => Ok(format!("{} {}", self.c_type(other)?, param.name)),
        }
    }

    fn emit_function(
        &mut self,
        name: &'a str,
        params: &'a [Param<'a>],
        body: &Block<'a>,
    ) -> GenResult<String> {
        let mut out = String::new();
        let signature = if name == "main" {
            "int main(void)".to_string()
        } else {
            self.function_signature(name, params)?
        };

        self.vars = ScopeStack::new();
        self.vars.push_scope();
        for param in params {
            self.vars.bind(param.name, param.ty);
        }
        self.current_fn = Some(name);

        writeln!(out, "{} {{", signature).unwrap();
        for stmt in *body {
            out.push_str(&self.emit_stmt(stmt, 1)?);
        }
        writeln!(out, "}}").unwrap();
        out.push('\n');

        self.current_fn = None;
        Ok(out)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn emit_stmt(&mut self, stmt: &Stmt<'a>, indent: usize) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let mut out = String::new();
        match stmt {
            Stmt::SetAssign { name, value } => {
                if let Some(declared) = self.vars.lookup(name) {
                    out.push_str(&self.emit_reassign(name, declared, value, indent)?);
                } else {
                    let ty = self.declared_type(value)?;
                    self.vars.bind(name, ty);
                    out.push_str(&self.emit_declaration(name, ty, value, indent)?);
                }
            }
            Stmt::TypedAssign { name, ty, value } => {
                self.vars.bind(name, *ty);
                out.push_str(&self.emit_declaration(name, *ty, value, indent)?);
            }
            Stmt::IndexAssign { target, value } => {
                let Expr::Index { target: base, index } = target else {
                    return Err(CodegenError::unsupported("a non-index assignment target"));
                };
                let lhs = self.emit_index(base, index)?;
                let rhs = self.emit_expr(value)?;
                writeln!(out, "{}{} = {};", ind, lhs, rhs).unwrap();
            }
            Stmt::FunctionDef { .. } => {
                return Err(CodegenError::unsupported("a nested function definition"));
            }
            Stmt::Return { value } => {
                out.push_str(&self.emit_return(*value, indent)?);
            }
            Stmt::If { condition, then_body, else_ifs, else_body } => {
                let cond = self.emit_expr(condition)?;
                writeln!(out, "{}if ({}) {{", ind, cond).unwrap();
                out.push_str(&self.emit_block(then_body, indent + 1)?);
                for else_if in *else_ifs {
                    let cond = self.emit_expr(else_if.condition)?;
                    writeln!(out, "{}}} else if ({}) {{", ind, cond).unwrap();
                    out.push_str(&self.emit_block(&else_if.body, indent + 1)?);
                }
                if let Some(body) = else_body {
                    writeln!(out, "{}}} else {{", ind).unwrap();
                    out.push_str(&self.emit_block(body, indent + 1)?);
                }
                writeln!(out, "{}}}", ind).unwrap();
            }
            Stmt::WhileLoop { condition, body, .. } => {
                let cond = self.emit_expr(condition)?;
                writeln!(out, "{}while ({}) {{", ind, cond).unwrap();
                out.push_str(&self.emit_block(body, indent + 1)?);
                writeln!(out, "{}}}", ind).unwrap();
            }
            Stmt::ForLoop { variable, iterable, body, parallel } => {
                out.push_str(&self.emit_for(variable, iterable, body, *parallel, indent)?);
            }
            Stmt::ParallelBlock { body } => {
                out.push_str(&self.emit_parallel_block(body, indent)?);
            }
            Stmt::Break { .. } => writeln!(out, "{}break;", ind).unwrap(),
            Stmt::Continue => writeln!(out, "{}continue;", ind).unwrap(),
            Stmt::TryCatch { try_expr, catch_var, catch_body } => {
                out.push_str(&self.emit_try_catch(try_expr, *catch_var, catch_body, indent)?);
            }
            Stmt::ExprStmt { expr } => match expr {
                Expr::Call { callee: "print", args } => {
                    out.push_str(&self.emit_print(args[0], indent)?);
                }
                Expr::Call { .. } => {
                    let call = self.emit_expr(expr)?;
                    writeln!(out, "{}{};", ind, call).unwrap();
                }
                Expr::Try(inner) => {
                    // Propagate, discarding the success value.
                    let (prelude, _) = self.emit_try_propagation(inner, indent)?;
                    out.push_str(&prelude);
                }
                _ => return Err(CodegenError::unsupported("an expression statement")),
            },
        }
        Ok(out)
    }

    fn emit_block(&mut self, body: &Block<'a>, indent: usize) -> GenResult<String> {
        self.vars.push_scope();
        let mut out = String::new();
        let mut result = Ok(());
        for stmt in *body {
            match self.emit_stmt(stmt, indent) {
                Ok(text) => out.push_str(&text),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.vars.pop_scope();
        result.map(|_| out)
    }

    /// Declaration type of a `set` first occurrence, mirroring the
    /// analyzer's defaults.
    fn declared_type(&mut self, value: &Expr<'a>) -> GenResult<Type<'a>> {
        match value {
            Expr::Try(inner) => match self.expr_type(inner)? {
                Type::ErrorUnion { ok, .. } => Ok(*ok),
                other => Err(CodegenError::unsupported(format!("try over {}", other))),
            },
            _ => self.expr_type(value),
        }
    }

    fn emit_declaration(
        &mut self,
        name: &'a str,
        ty: Type<'a>,
        value: &Expr<'a>,
        indent: usize,
    ) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let mut out = String::new();
        match ty {
            Type::Slice { elem } => {
                let slice_c = self.c_type(ty)?;
                match value {
                    // A literal RHS gets a sibling backing array feeding the
                    // descriptor.
                    Expr::ArrayLiteral(elements) => {
                        let elem_c = self.c_type(*elem)?;
                        let backing = self.fresh("backing");
                        let init = self.emit_array_init(elements)?;
                        writeln!(
                            out,
                            "{}{} {}[{}] = {};",
                            ind,
                            elem_c,
                            backing,
                            elements.len(),
                            init
                        )
                        .unwrap();
                        writeln!(
                            out,
                            "{}{} {} = {{ {}, {} }};",
                            ind,
                            slice_c,
                            name,
                            backing,
                            elements.len()
                        )
                        .unwrap();
                    }
                    _ => match self.expr_type(value)? {
                        Type::Array { len, .. } => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} {} = {{ {}, {} }};", ind, slice_c, name, rhs, len)
                                .unwrap();
                        }
                        _ => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} {} = {};", ind, slice_c, name, rhs).unwrap();
                        }
                    },
                }
            }
            Type::Array { .. } => {
                let (base, dims) = self.array_dims(ty)?;
                match value {
                    Expr::ArrayLiteral(elements) => {
                        let init = self.emit_array_init(elements)?;
                        writeln!(out, "{}{} {}{} = {};", ind, base, name, dims, init).unwrap();
                    }
                    Expr::Variable(src) => {
                        writeln!(out, "{}{} {}{};", ind, base, name, dims).unwrap();
                        writeln!(out, "{}memcpy({}, {}, sizeof {});", ind, name, src, name)
                            .unwrap();
                    }
                    Expr::Call { .. } => {
                        let rhs = self.emit_expr(value)?;
                        writeln!(out, "{}{} {}{};", ind, base, name, dims).unwrap();
                        writeln!(out, "{}memcpy({}, {}.value, sizeof {});", ind, name, rhs, name)
                            .unwrap();
                    }
                    _ => {
                        return Err(CodegenError::unsupported(
                            "this array initialiser".to_string(),
                        ))
                    }
                }
            }
            Type::ErrorUnion { .. } => {
                let union_c = self.c_type(ty)?;
                match value {
                    Expr::Try(inner) => {
                        let (prelude, tmp) = self.emit_try_propagation(inner, indent)?;
                        out.push_str(&prelude);
                        writeln!(
                            out,
                            "{}{} {} = {}_ok({}.value);",
                            ind, union_c, name, union_c, tmp
                        )
                        .unwrap();
                    }
                    Expr::ErrorValue(inner) => {
                        let rhs = self.emit_expr(inner)?;
                        writeln!(out, "{}{} {} = {}_err({});", ind, union_c, name, union_c, rhs)
                            .unwrap();
                    }
                    _ => match self.union_side(ty, value)? {
                        UnionSide::Whole => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} {} = {};", ind, union_c, name, rhs).unwrap();
                        }
                        UnionSide::Ok => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} {} = {}_ok({});", ind, union_c, name, union_c, rhs)
                                .unwrap();
                        }
                        UnionSide::Err => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} {} = {}_err({});", ind, union_c, name, union_c, rhs)
                                .unwrap();
                        }
                    },
                }
            }
            _ => match value {
                Expr::Try(inner) => {
                    let (prelude, tmp) = self.emit_try_propagation(inner, indent)?;
                    out.push_str(&prelude);
                    let ty_c = self.c_type(ty)?;
                    writeln!(out, "{}{} {} = {}.value;", ind, ty_c, name, tmp).unwrap();
                }
                _ => {
                    let ty_c = self.c_type(ty)?;
                    let rhs = self.emit_expr(value)?;
                    writeln!(out, "{}{} {} = {};", ind, ty_c, name, rhs).unwrap();
                }
            },
        }
        Ok(out)
    }

    fn emit_reassign(
        &mut self,
        name: &'a str,
        declared: Type<'a>,
        value: &Expr<'a>,
        indent: usize,
    ) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let mut out = String::new();
        match declared {
            // Reassigning an error-union variable re-wraps the RHS through
            // the constructor picked by its concrete type.
            Type::ErrorUnion { .. } => {
                let union_c = self.c_type(declared)?;
                match value {
                    Expr::Try(inner) => {
                        let (prelude, tmp) = self.emit_try_propagation(inner, indent)?;
                        out.push_str(&prelude);
                        writeln!(out, "{}{} = {}_ok({}.value);", ind, name, union_c, tmp).unwrap();
                    }
                    Expr::ErrorValue(inner) => {
                        let rhs = self.emit_expr(inner)?;
                        writeln!(out, "{}{} = {}_err({});", ind, name, union_c, rhs).unwrap();
                    }
                    _ => match self.union_side(declared, value)? {
                        UnionSide::Whole => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} = {};", ind, name, rhs).unwrap();
                        }
                        UnionSide::Ok => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} = {}_ok({});", ind, name, union_c, rhs).unwrap();
                        }
                        UnionSide::Err => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}{} = {}_err({});", ind, name, union_c, rhs).unwrap();
                        }
                    },
                }
            }
            _ => match value {
                Expr::Try(inner) => {
                    let (prelude, tmp) = self.emit_try_propagation(inner, indent)?;
                    out.push_str(&prelude);
                    writeln!(out, "{}{} = {}.value;", ind, name, tmp).unwrap();
                }
                _ => {
                    let rhs = self.emit_expr(value)?;
                    writeln!(out, "{}{} = {};", ind, name, rhs).unwrap();
                }
            },
        }
        Ok(out)
    }

    fn emit_return(&mut self, value: Option<&'a Expr<'a>>, indent: usize) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let mut out = String::new();
        let ret = self
            .current_fn
            .map(|name| self.analysis.return_type_of(name))
            .unwrap_or(Type::Void);

        if self.current_fn == Some("main") {
            match value {
                Some(value) => {
                    let rhs = self.emit_expr(value)?;
                    writeln!(out, "{}return {};", ind, rhs).unwrap();
                }
                None => writeln!(out, "{}return 0;", ind).unwrap(),
            }
            return Ok(out);
        }

        match (ret, value) {
            (Type::Void, _) | (_, None) => writeln!(out, "{}return;", ind).unwrap(),
            (Type::ErrorUnion { .. }, Some(value)) => {
                let union_c = self.c_type(ret)?;
                match value {
                    Expr::Try(inner) => {
                        let inner_ty = self.expr_type(inner)?;
                        let inner_c = self.c_type(inner_ty)?;
                        let tmp = self.fresh("try");
                        let call = self.emit_expr(inner)?;
                        writeln!(out, "{}{} {} = {};", ind, inner_c, tmp, call).unwrap();
                        writeln!(out, "{}if (!{}.ok) {{", ind, tmp).unwrap();
                        writeln!(out, "{}    return {}_err({}.err);", ind, union_c, tmp).unwrap();
                        writeln!(out, "{}}}", ind).unwrap();
                        writeln!(out, "{}return {}_ok({}.value);", ind, union_c, tmp).unwrap();
                    }
                    Expr::ErrorValue(inner) => {
                        let rhs = self.emit_expr(inner)?;
                        writeln!(out, "{}return {}_err({});", ind, union_c, rhs).unwrap();
                    }
                    _ => match self.union_side(ret, value)? {
                        UnionSide::Whole => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}return {};", ind, rhs).unwrap();
                        }
                        UnionSide::Ok => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}return {}_ok({});", ind, union_c, rhs).unwrap();
                        }
                        UnionSide::Err => {
                            let rhs = self.emit_expr(value)?;
                            writeln!(out, "{}return {}_err({});", ind, union_c, rhs).unwrap();
                        }
                    },
                }
            }
            (Type::Array { len, elem }, Some(value)) => {
                let wrapper = self.ensure_array_return(len, *elem)?;
                match value {
                    Expr::Variable(src) => {
                        let tmp = self.fresh("ret");
                        writeln!(out, "{}{} {};", ind, wrapper, tmp).unwrap();
                        writeln!(
                            out,
                            "{}memcpy({}.value, {}, sizeof {}.value);",
                            ind, tmp, src, tmp
                        )
                        .unwrap();
                        writeln!(out, "{}return {};", ind, tmp).unwrap();
                    }
                    Expr::ArrayLiteral(elements) => {
                        let tmp = self.fresh("ret");
                        let init = self.emit_array_init(elements)?;
                        writeln!(out, "{}{} {} = {{ {} }};", ind, wrapper, tmp, init).unwrap();
                        writeln!(out, "{}return {};", ind, tmp).unwrap();
                    }
                    Expr::Call { .. } => {
                        let rhs = self.emit_expr(value)?;
                        writeln!(out, "{}return {};", ind, rhs).unwrap();
                    }
                    _ => {
                        return Err(CodegenError::unsupported(
                            "this array return expression".to_string(),
                        ))
                    }
                }
            }
            (_, Some(value)) => {
                let rhs = self.emit_expr(value)?;
                writeln!(out, "{}return {};", ind, rhs).unwrap();
            }
        }
        Ok(out)
    }

    /// `try e` in propagating position: evaluate into a fresh temp, return
    /// the enclosing union's `_err` on failure. Returns the emitted prelude
    /// and the temp's name (whose `.value` holds the success value).
    fn emit_try_propagation(
        &mut self,
        inner: &Expr<'a>,
        indent: usize,
    ) -> GenResult<(String, String)> {
        let ind = "    ".repeat(indent);
        let inner_ty = self.expr_type(inner)?;
        let inner_c = self.c_type(inner_ty)?;
        let outer = self
            .current_fn
            .map(|name| self.analysis.return_type_of(name))
            .unwrap_or(Type::Void);
        let Type::ErrorUnion { .. } = outer else {
            return Err(CodegenError::unsupported(
                "try outside a function returning an error union",
            ));
        };
        let outer_c = self.c_type(outer)?;
        let tmp = self.fresh("try");
        let call = self.emit_expr(inner)?;
        let mut out = String::new();
        writeln!(out, "{}{} {} = {};", ind, inner_c, tmp, call).unwrap();
        writeln!(out, "{}if (!{}.ok) {{", ind, tmp).unwrap();
        writeln!(out, "{}    return {}_err({}.err);", ind, outer_c, tmp).unwrap();
        writeln!(out, "{}}}", ind).unwrap();
        Ok((out, tmp))
    }

    fn emit_try_catch(
        &mut self,
        try_expr: &Expr<'a>,
        catch_var: Option<&'a str>,
        catch_body: &Block<'a>,
        indent: usize,
    ) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let union_ty = self.expr_type(try_expr)?;
        let Type::ErrorUnion { err, .. } = union_ty else {
            return Err(CodegenError::unsupported("catch over a non error union"));
        };
        let union_c = self.c_type(union_ty)?;
        let tmp = self.fresh("try");
        let call = self.emit_expr(try_expr)?;

        let mut out = String::new();
        writeln!(out, "{}{{", ind).unwrap();
        writeln!(out, "{}    {} {} = {};", ind, union_c, tmp, call).unwrap();
        writeln!(out, "{}    if (!{}.ok) {{", ind, tmp).unwrap();
        self.vars.push_scope();
        if let Some(var) = catch_var {
            let err_c = self.c_type(*err)?;
            writeln!(out, "{}        {} {} = {}.err;", ind, err_c, var, tmp).unwrap();
            self.vars.bind(var, *err);
        }
        let body = self.emit_block(catch_body, indent + 2);
        self.vars.pop_scope();
        out.push_str(&body?);
        writeln!(out, "{}    }}", ind).unwrap();
        writeln!(out, "{}}}", ind).unwrap();
        Ok(out)
    }

    fn emit_for(
        &mut self,
        variable: &'a str,
        iterable: &Expr<'a>,
        body: &Block<'a>,
        parallel: bool,
        indent: usize,
    ) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let mut out = String::new();

        if let Expr::Range { start, end, inclusive } = iterable {
            let var_ty = self.range_type(start, end)?;
            let c_ty = if var_ty.is_wide_integer() { "int64_t" } else { "int32_t" };
            let cmp = if *inclusive { "<=" } else { "<" };
            let start_c = self.emit_expr(start)?;
            let end_c = self.emit_expr(end)?;
            if parallel {
                writeln!(out, "{}#pragma omp parallel for", ind).unwrap();
            }
            writeln!(
                out,
                "{}for ({} {} = {}; {} {} {}; {}++) {{",
                ind, c_ty, variable, start_c, variable, cmp, end_c, variable
            )
            .unwrap();
            self.vars.push_scope();
            self.vars.bind(variable, var_ty);
            let body_text = self.emit_block(body, indent + 1);
            self.vars.pop_scope();
            out.push_str(&body_text?);
            writeln!(out, "{}}}", ind).unwrap();
            return Ok(out);
        }

        let iter_ty = self.expr_type(iterable)?;
        let idx = self.fresh("i");
        writeln!(out, "{}{{", ind).unwrap();
        match iter_ty {
            Type::Slice { elem } => {
                let slice_c = self.c_type(iter_ty)?;
                let elem_c = self.c_type(*elem)?;
                let it = self.fresh("it");
                let src = self.emit_expr(iterable)?;
                writeln!(out, "{}    {} {} = {};", ind, slice_c, it, src).unwrap();
                if parallel {
                    writeln!(out, "{}    #pragma omp parallel for", ind).unwrap();
                }
                writeln!(
                    out,
                    "{}    for (size_t {} = 0; {} < {}.len; {}++) {{",
                    ind, idx, idx, it, idx
                )
                .unwrap();
                writeln!(out, "{}        {} {} = {}.data[{}];", ind, elem_c, variable, it, idx)
                    .unwrap();
                self.vars.push_scope();
                self.vars.bind(variable, *elem);
                let body_text = self.emit_block(body, indent + 2);
                self.vars.pop_scope();
                out.push_str(&body_text?);
                writeln!(out, "{}    }}", ind).unwrap();
            }
            Type::Array { len, elem } => {
                let elem_c = self.c_type(*elem)?;
                let source = match iterable {
                    Expr::Variable(name) => (*name).to_string(),
                    Expr::ArrayLiteral(elements) => {
                        let it = self.fresh("it");
                        let init = self.emit_array_init(elements)?;
                        writeln!(out, "{}    {} {}[{}] = {};", ind, elem_c, it, len, init)
                            .unwrap();
                        it
                    }
                    Expr::Call { .. } => {
                        let it = self.fresh("it");
                        let wrapper = self.ensure_array_return(len, *elem)?;
                        let call = self.emit_expr(iterable)?;
                        writeln!(out, "{}    {} {} = {};", ind, wrapper, it, call).unwrap();
                        format!("{}.value", it)
                    }
                    _ => {
                        return Err(CodegenError::unsupported(
                            "this for-loop iterable".to_string(),
                        ))
                    }
                };
                if parallel {
                    writeln!(out, "{}    #pragma omp parallel for", ind).unwrap();
                }
                writeln!(
                    out,
                    "{}    for (size_t {} = 0; {} < {}; {}++) {{",
                    ind, idx, idx, len, idx
                )
                .unwrap();
                writeln!(out, "{}        {} {} = {}[{}];", ind, elem_c, variable, source, idx)
                    .unwrap();
                self.vars.push_scope();
                self.vars.bind(variable, *elem);
                let body_text = self.emit_block(body, indent + 2);
                self.vars.pop_scope();
                out.push_str(&body_text?);
                writeln!(out, "{}    }}", ind).unwrap();
            }
            other => {
                return Err(CodegenError::unsupported(format!("iterating over {}", other)))
            }
        }
        writeln!(out, "{}}}", ind).unwrap();
        Ok(out)
    }

    fn emit_parallel_block(&mut self, body: &Block<'a>, indent: usize) -> GenResult<String> {
        self.needs_runner = true;
        let ind = "    ".repeat(indent);
        let mut targets = Vec::new();
        for stmt in *body {
            let Stmt::ExprStmt { expr: Expr::Call { callee, .. } } = stmt else {
                return Err(CodegenError::unsupported(
                    "a non-call statement in a parallel block",
                ));
            };
            targets.push(*callee);
        }
        let n = targets.len();
        let threads = self.fresh("threads");
        let fns = self.fresh("fns");
        let casts: Vec<String> = targets
            .iter()
            .map(|target| format!("(void (*)(void)){}", target))
            .collect();

        let mut out = String::new();
        writeln!(out, "{}{{", ind).unwrap();
        writeln!(out, "{}    pthread_t {}[{}];", ind, threads, n).unwrap();
        writeln!(
            out,
            "{}    void (*{}[{}])(void) = {{ {} }};",
            ind,
            fns,
            n,
            casts.join(", ")
        )
        .unwrap();
        for i in 0..n {
            writeln!(
                out,
                "{}    pthread_create(&{}[{}], NULL, __1im_par_runner, (void*){}[{}]);",
                ind, threads, i, fns, i
            )
            .unwrap();
        }
        for i in 0..n {
            writeln!(out, "{}    pthread_join({}[{}], NULL);", ind, threads, i).unwrap();
        }
        writeln!(out, "{}}}", ind).unwrap();
        Ok(out)
    }

    fn emit_print(&mut self, arg: &Expr<'a>, indent: usize) -> GenResult<String> {
        let ind = "    ".repeat(indent);
        let ty = self.expr_type(arg)?;
        let value = self.emit_expr(arg)?;
        let mut out = String::new();
        match ty {
            Type::I8 | Type::I16 | Type::I32 => {
                writeln!(out, "{}printf(\"%d\\n\", (int32_t){});", ind, value).unwrap()
            }
            Type::I64 => {
                writeln!(out, "{}printf(\"%\" PRId64 \"\\n\", {});", ind, value).unwrap()
            }
            Type::U8 | Type::U16 | Type::U32 => {
                writeln!(out, "{}printf(\"%u\\n\", (uint32_t){});", ind, value).unwrap()
            }
            Type::U64 => {
                writeln!(out, "{}printf(\"%\" PRIu64 \"\\n\", {});", ind, value).unwrap()
            }
            Type::F32 | Type::F64 => {
                writeln!(out, "{}printf(\"%f\\n\", (double){});", ind, value).unwrap()
            }
            Type::Bool => writeln!(
                out,
                "{}printf(\"%s\\n\", ({}) ? \"true\" : \"false\");",
                ind, value
            )
            .unwrap(),
            Type::Str => writeln!(out, "{}printf(\"%s\\n\", {});", ind, value).unwrap(),
            other => return Err(CodegenError::unsupported(format!("printing {}", other))),
        }
        Ok(out)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn emit_expr(&mut self, expr: &Expr<'a>) -> GenResult<String> {
        match expr {
            Expr::IntLiteral(text) | Expr::FloatLiteral(text) => Ok((*text).to_string()),
            Expr::StringLiteral(text) => Ok(format!("\"{}\"", text)),
            Expr::BoolLiteral(true) => Ok("true".to_string()),
            Expr::BoolLiteral(false) => Ok("false".to_string()),
            Expr::NullLiteral => Ok("NULL".to_string()),
            Expr::Variable(name) => Ok((*name).to_string()),
            Expr::Binary { op, left, right } => {
                let lhs = self.emit_expr(left)?;
                let rhs = self.emit_expr(right)?;
                Ok(format!("({} {} {})", lhs, c_operator(*op), rhs))
            }
            Expr::Unary { op, operand } => {
                let value = self.emit_expr(operand)?;
                match op {
                    UnaryOp::Negate => Ok(format!("(-{})", value)),
                    UnaryOp::Not => Ok(format!("(!{})", value)),
                }
            }
            Expr::Call { callee: "len", args } => {
                let ty = self.expr_type(args[0])?;
                match ty {
                    Type::Array { len, .. } => Ok(format!("(int64_t){}", len)),
                    Type::Slice { .. } => {
                        let target = self.emit_expr(args[0])?;
                        Ok(format!("(int64_t){}.len", target))
                    }
                    other => Err(CodegenError::unsupported(format!("len of {}", other))),
                }
            }
            Expr::Call { callee, args } => {
                let mut rendered = Vec::new();
                for arg in *args {
                    rendered.push(self.emit_expr(arg)?);
                }
                Ok(format!("{}({})", callee, rendered.join(", ")))
            }
            Expr::ArrayLiteral(elements) => {
                // Compound literal; declarations special-case brace init.
                let ty = self.expr_type(expr)?;
                let Type::Array { len, elem } = ty else {
                    return Err(CodegenError::unsupported("this array literal"));
                };
                let elem_c = self.c_type(*elem)?;
                let init = self.emit_array_init(elements)?;
                Ok(format!("(({}[{}]){})", elem_c, len, init))
            }
            Expr::Index { target, index } => self.emit_index(target, index),
            Expr::Range { .. } => Err(CodegenError::unsupported("a range outside a for loop")),
            Expr::Try(_) => Err(CodegenError::unsupported(
                "try outside an assignment, return, or expression statement",
            )),
            Expr::ErrorValue(_) => Err(CodegenError::unsupported(
                "an error value outside an error-union position",
            )),
        }
    }

    fn emit_index(&mut self, target: &Expr<'a>, index: &Expr<'a>) -> GenResult<String> {
        let target_ty = self.expr_type(target)?;
        let target_c = self.emit_expr(target)?;
        let index_c = self.emit_expr(index)?;
        match target_ty {
            Type::Slice { .. } => Ok(format!("{}.data[{}]", target_c, index_c)),
            Type::Array { .. } => {
                // Calls return the wrapper struct; append .value to decay.
                if matches!(target, Expr::Call { .. }) {
                    Ok(format!("{}.value[{}]", target_c, index_c))
                } else {
                    Ok(format!("{}[{}]", target_c, index_c))
                }
            }
            other => Err(CodegenError::unsupported(format!("indexing {}", other))),
        }
    }

    fn emit_array_init(&mut self, elements: &[&'a Expr<'a>]) -> GenResult<String> {
        let mut rendered = Vec::new();
        for element in elements {
            match element {
                Expr::ArrayLiteral(inner) => rendered.push(self.emit_array_init(inner)?),
                _ => rendered.push(self.emit_expr(element)?),
            }
        }
        Ok(format!("{{ {} }}", rendered.join(", ")))
    }

    // =========================================================================
    // Typing (consumes the analyzer's tables; programs reaching codegen are
    // well-typed)
    // =========================================================================

    fn expr_type(&mut self, expr: &Expr<'a>) -> GenResult<Type<'a>> {
        match expr {
            Expr::IntLiteral(_) => Ok(Type::I32),
            Expr::FloatLiteral(_) => Ok(Type::F64),
            Expr::StringLiteral(_) | Expr::NullLiteral => Ok(Type::Str),
            Expr::BoolLiteral(_) => Ok(Type::Bool),
            Expr::Variable(name) => self
                .vars
                .lookup(name)
                .ok_or_else(|| CodegenError::unsupported(format!("unknown variable '{}'", name))),
            Expr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    Ok(Type::Bool)
                } else if !is_literal(left) {
                    self.expr_type(left)
                } else {
                    self.expr_type(right)
                }
            }
            Expr::Unary { op: UnaryOp::Not, .. } => Ok(Type::Bool),
            Expr::Unary { op: UnaryOp::Negate, operand } => self.expr_type(operand),
            Expr::Call { callee: "print", .. } => Ok(Type::Void),
            Expr::Call { callee: "len", .. } => Ok(Type::I64),
            Expr::Call { callee, .. } => Ok(self.analysis.return_type_of(callee)),
            Expr::ArrayLiteral(elements) => {
                let elem = self.expr_type(elements[0])?;
                Ok(Type::Array { len: elements.len(), elem: self.arena.alloc(elem) })
            }
            Expr::Index { target, .. } => match self.expr_type(target)? {
                Type::Array { elem, .. } | Type::Slice { elem } => Ok(*elem),
                other => Err(CodegenError::unsupported(format!("indexing {}", other))),
            },
            Expr::Try(inner) => match self.expr_type(inner)? {
                Type::ErrorUnion { ok, .. } => Ok(*ok),
                other => Err(CodegenError::unsupported(format!("try over {}", other))),
            },
            Expr::ErrorValue(_) => {
                Err(CodegenError::unsupported("a free-standing error value"))
            }
            Expr::Range { .. } => {
                Err(CodegenError::unsupported("a range outside a for loop"))
            }
        }
    }

    /// Which constructor a value routes through when assigned into an error
    /// union. Literal classes pick the matching side, `ok` first.
    fn union_side(&mut self, union: Type<'a>, value: &Expr<'a>) -> GenResult<UnionSide> {
        let Type::ErrorUnion { ok, err } = union else {
            return Err(CodegenError::unsupported("routing into a non error union"));
        };
        match value {
            Expr::IntLiteral(_) => {
                if ok.is_integer() {
                    Ok(UnionSide::Ok)
                } else {
                    Ok(UnionSide::Err)
                }
            }
            Expr::FloatLiteral(_) => {
                if ok.is_float() {
                    Ok(UnionSide::Ok)
                } else {
                    Ok(UnionSide::Err)
                }
            }
            Expr::NullLiteral => {
                if *ok == Type::Str {
                    Ok(UnionSide::Ok)
                } else {
                    Ok(UnionSide::Err)
                }
            }
            _ => {
                let found = self.expr_type(value)?;
                if found == union {
                    Ok(UnionSide::Whole)
                } else if found == *ok {
                    Ok(UnionSide::Ok)
                } else if found == *err {
                    Ok(UnionSide::Err)
                } else {
                    Err(CodegenError::unsupported(format!(
                        "assigning {} into {}",
                        found, union
                    )))
                }
            }
        }
    }

    /// Induction type of a range loop: endpoints pick the width, literals
    /// default to i32.
    fn range_type(&mut self, start: &Expr<'a>, end: &Expr<'a>) -> GenResult<Type<'a>> {
        if !is_literal(start) {
            self.expr_type(start)
        } else if !is_literal(end) {
            self.expr_type(end)
        } else {
            Ok(Type::I32)
        }
    }

    // =========================================================================
    // Helper-type registry
    // =========================================================================

    fn c_type(&mut self, ty: Type<'a>) -> GenResult<String> {
        match ty {
            Type::I8 => Ok("int8_t".to_string()),
            Type::I16 => Ok("int16_t".to_string()),
            Type::I32 => Ok("int32_t".to_string()),
            Type::I64 => Ok("int64_t".to_string()),
            Type::U8 => Ok("uint8_t".to_string()),
            Type::U16 => Ok("uint16_t".to_string()),
            Type::U32 => Ok("uint32_t".to_string()),
            Type::U64 => Ok("uint64_t".to_string()),
            Type::F32 => Ok("float".to_string()),
            Type::F64 => Ok("double".to_string()),
            Type::Bool => Ok("bool".to_string()),
            Type::Str => Ok("const char*".to_string()),
            Type::Void => Ok("void".to_string()),
            Type::Slice { elem } => self.ensure_slice(*elem),
            Type::ErrorUnion { ok, err } => self.ensure_error_union(*ok, *err),
            Type::Array { .. } => Err(CodegenError::unsupported(
                "an array value outside a declaration",
            )),
        }
    }

    fn ensure_slice(&mut self, elem: Type<'a>) -> GenResult<String> {
        let name = format!("slice_{}", type_key(&elem));
        if self.helper_keys.insert(name.clone()) {
            let elem_c = self.c_type(elem)?;
            let mut def = String::new();
            writeln!(def, "typedef struct {{").unwrap();
            writeln!(def, "    {}* data;", elem_c).unwrap();
            writeln!(def, "    size_t len;").unwrap();
            writeln!(def, "}} {};", name).unwrap();
            self.helpers.push(def);
        }
        Ok(name)
    }

    fn ensure_error_union(&mut self, ok: Type<'a>, err: Type<'a>) -> GenResult<String> {
        let name = format!("err_{}_{}", type_key(&ok), type_key(&err));
        if self.helper_keys.insert(name.clone()) {
            let ok_c = self.c_type(ok)?;
            let err_c = self.c_type(err)?;
            let mut def = String::new();
            writeln!(def, "typedef struct {{").unwrap();
            writeln!(def, "    bool ok;").unwrap();
            writeln!(def, "    {} value;", ok_c).unwrap();
            writeln!(def, "    {} err;", err_c).unwrap();
            writeln!(def, "}} {};", name).unwrap();
            writeln!(def).unwrap();
            writeln!(def, "static inline {} {}_ok({} value) {{", name, name, ok_c).unwrap();
            writeln!(def, "    {} r = {{0}};", name).unwrap();
            writeln!(def, "    r.ok = true;").unwrap();
            writeln!(def, "    r.value = value;").unwrap();
            writeln!(def, "    return r;").unwrap();
            writeln!(def, "}}").unwrap();
            writeln!(def).unwrap();
            writeln!(def, "static inline {} {}_err({} err) {{", name, name, err_c).unwrap();
            writeln!(def, "    {} r = {{0}};", name).unwrap();
            writeln!(def, "    r.err = err;").unwrap();
            writeln!(def, "    return r;").unwrap();
            writeln!(def, "}}").unwrap();
            self.helpers.push(def);
        }
        Ok(name)
    }

    fn ensure_array_return(&mut self, len: usize, elem: Type<'a>) -> GenResult<String> {
        let name = format!("arrret_{}_{}", len, type_key(&elem));
        if self.helper_keys.insert(name.clone()) {
            let elem_c = self.c_type(elem)?;
            let mut def = String::new();
            writeln!(def, "typedef struct {{").unwrap();
            writeln!(def, "    {} value[{}];", elem_c, len).unwrap();
            writeln!(def, "}} {};", name).unwrap();
            self.helpers.push(def);
        }
        Ok(name)
    }

    /// Base element type and dimension suffix of an array declarator.
    fn array_dims(&mut self, ty: Type<'a>) -> GenResult<(String, String)> {
        let mut dims = String::new();
        let mut current = ty;
        loop {
            match current {
                Type::Array { len, elem } => {
                    write!(dims, "[{}]", len).unwrap();
                    current = *elem;
                }
                other => return Ok((self.c_type(other)?, dims)),
            }
        }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        self.tmp += 1;
        format!("__{}{}", prefix, self.tmp)
    }
}

fn is_literal(expr: &Expr<'_>) -> bool {
    matches!(expr, Expr::IntLiteral(_) | Expr::FloatLiteral(_))
}

fn c_operator(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::LtEq => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::GtEq => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

/// Structural key of a type, shared by typedef naming and registry lookup.
fn type_key(ty: &Type<'_>) -> String {
    match ty {
        Type::I8 => "i8".to_string(),
        Type::I16 => "i16".to_string(),
        Type::I32 => "i32".to_string(),
        Type::I64 => "i64".to_string(),
        Type::U8 => "u8".to_string(),
        Type::U16 => "u16".to_string(),
        Type::U32 => "u32".to_string(),
        Type::U64 => "u64".to_string(),
        Type::F32 => "f32".to_string(),
        Type::F64 => "f64".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Str => "str".to_string(),
        Type::Void => "void".to_string(),
        Type::Array { len, elem } => format!("arr{}_{}", len, type_key(elem)),
        Type::Slice { elem } => format!("slice_{}", type_key(elem)),
        Type::ErrorUnion { ok, err } => format!("err_{}_{}", type_key(ok), type_key(err)),
    }
}
