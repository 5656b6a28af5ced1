//! Compilation pipeline: Lim source → C source → executable.
//!
//! The pipeline is strictly staged and fail-fast: lexing, parsing, analysis,
//! and generation each abort the run on their first error, and no partial
//! output is written.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, info};

use crate::analysis::analyze;
use crate::arena::Arena;
use crate::codegen::generate;
use crate::error::CompileError;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Compile Lim source text to a single C translation unit.
pub fn compile_to_c(source: &str) -> Result<String, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    debug!("lexed {} tokens", tokens.len());
    let arena = Arena::new();
    let mut parser = Parser::new(&tokens, &arena);
    let program = parser.parse_program()?;
    debug!("parsed {} top-level statements", program.stmts.len());
    let analysis = analyze(&program, &arena)?;
    debug!("analysis passed, {} function(s)", analysis.signatures.len());
    let unit = generate(&program, &analysis, &arena)?;
    Ok(unit)
}

/// Compile the file at `source_path` and write `<dir>/codegen/<stem>.c`.
/// Returns the path of the written C file.
pub fn compile_to_dir(source_path: &Path) -> Result<PathBuf, CompileError> {
    let source = fs::read_to_string(source_path)?;
    let unit = compile_to_c(&source)?;

    let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    let codegen_dir = dir.join("codegen");
    fs::create_dir_all(&codegen_dir)?;
    let stem = source_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let c_path = codegen_dir.join(format!("{}.c", stem));
    fs::write(&c_path, unit)?;
    info!("wrote {}", c_path.display());
    Ok(c_path)
}

/// Compile, build with the host C compiler, and run the produced binary
/// inheriting stdio. Returns the child's exit code.
pub fn compile_and_run(source_path: &Path) -> Result<i32, CompileError> {
    let c_path = compile_to_dir(source_path)?;
    let binary = build_with_cc(&c_path)?;
    run_binary(&binary)
}

/// Invoke `cc` on an emitted C file, producing a sibling executable.
pub fn build_with_cc(c_path: &Path) -> Result<PathBuf, CompileError> {
    let dir = c_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = c_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    info!("compiling {}.c with cc", stem);
    let output = Command::new("cc")
        .args([
            "-o",
            &stem,
            &format!("{}.c", stem),
            "-O3",
            "-march=native",
            "-pthread",
        ])
        .current_dir(dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("{}", stderr);
        let line = stderr
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("unknown error")
            .to_string();
        return Err(CompileError::HostCompiler(line));
    }
    Ok(dir.join(stem))
}

fn run_binary(binary: &Path) -> Result<i32, CompileError> {
    info!("running {}", binary.display());
    let status = Command::new(binary).status()?;
    match status.code() {
        Some(code) => Ok(code),
        None => Err(CompileError::Runtime("terminated by signal".to_string())),
    }
}
