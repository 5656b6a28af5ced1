//! limc entry point.
//!
//! Compiles a Lim source file to C, builds it with the host C compiler, runs
//! the produced binary inheriting stdio, and exits with its status code. Any
//! pipeline failure prints a single diagnostic line and exits with 1.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Lim source file to compile
    source: PathBuf,

    /// Stop after writing the generated C file
    #[arg(long)]
    emit_c: bool,

    /// Log pipeline progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { log::Level::Debug } else { log::Level::Warn };
    simple_logger::init_with_level(level).unwrap();

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    if cli.emit_c {
        let c_path = limc::compile_to_dir(&cli.source)?;
        println!("{}", c_path.display());
        return Ok(0);
    }
    Ok(limc::compile_and_run(&cli.source)?)
}
