
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::codegen::Emitter;
use crate::parser::Parser as SourceParser;
use crate::vm::Vm;

#[derive(Parser)]
#[command(name = "vsm", version, about = "Compiler and stack VM for a small C-like language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a source file to out.vsm in the current directory, then run it
    Compile { source: PathBuf },
    /// Load and run an assembled .vsm program
    Run { program: PathBuf },
}

pub fn main() -> i32 {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Compile { source } => compile_and_run(&source),
        Command::Run { program } => run_program(&program),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vsm: {e:#}");
            1
        }
    }
}

fn compile_and_run(source: &Path) -> anyhow::Result<i32> {
    let src = fs::read_to_string(source)
        .with_context(|| format!("reading {}", source.display()))?;
    let prog = SourceParser::new(&src).parse_program()?;

    let out = fs::File::create("out.vsm").context("creating out.vsm")?;
    let mut emitter = Emitter::new(BufWriter::new(out));
    emitter.emit_program(&prog)?;

    run_program(Path::new("out.vsm"))
}

fn run_program(path: &Path) -> anyhow::Result<i32> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut vm = Vm::new();
    vm.load(BufReader::new(file))?;
    Ok(vm.run())
}
