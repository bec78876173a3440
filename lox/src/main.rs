use std::{path::PathBuf, process};

use clap::Parser;

use lox::{
    repl::{repl, run_file},
    Config,
};

/// Bytecode interpreter for Lox expressions.
#[derive(Parser, Debug)]
#[command(name = "lox", version)]
struct Args {
    /// Script to run. Starts an interactive prompt when omitted.
    path: Option<PathBuf>,

    /// Print the disassembled bytecode before running it.
    #[arg(long)]
    print_code: bool,

    /// Print the stack and each instruction as it executes.
    #[arg(long = "trace")]
    trace_execution: bool,
}

fn main() {
    lox::init_logging();

    let args = Args::parse();
    let config = Config::default()
        .with_print_code(args.print_code)
        .with_trace_execution(args.trace_execution);

    match args.path {
        Some(path) => {
            if let Err(err) = run_file(&path, config) {
                eprintln!("{}", err);
                process::exit(err.exit_code());
            }
        }
        None => repl(config),
    }
}
