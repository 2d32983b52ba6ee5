// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! CLI driver: REPL when run with no arguments, or a one-shot file
//! interpreter when given a single path.

use loxvm::{InterpretResult, Vm};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Compile error exit status, matching the source's `EX_DATAERR`-ish
/// convention.
const EXIT_COMPILE_ERROR: u8 = 65;
/// Runtime error exit status.
const EXIT_RUNTIME_ERROR: u8 = 70;
/// I/O error (file not found / unreadable) exit status.
const EXIT_IO_ERROR: u8 = 74;
/// Usage error (wrong number of arguments) exit status.
const EXIT_USAGE_ERROR: u8 = 64;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.as_slice() {
        [_] => repl(),
        [_, path] => run_file(path),
        _ => {
            eprintln!("Usage: loxvm [path]");
            ExitCode::from(EXIT_USAGE_ERROR)
        }
    }
}

/// Read one line at a time from stdin, interpreting each as its own
/// program. Errors are printed (by `interpret`'s own error paths) but
/// never stop the loop.
fn repl() -> ExitCode {
    let mut vm = Vm::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            return ExitCode::from(EXIT_IO_ERROR);
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS, // EOF (Ctrl-D)
            Ok(_) => {
                vm.interpret(&line);
            }
            Err(_) => return ExitCode::from(EXIT_IO_ERROR),
        }
    }
}

/// Read `path` into memory and interpret it once.
fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Could not read file \"{path}\": {error}");
            return ExitCode::from(EXIT_IO_ERROR);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        InterpretResult::Ok => ExitCode::SUCCESS,
        InterpretResult::CompileError => ExitCode::from(EXIT_COMPILE_ERROR),
        InterpretResult::RuntimeError => ExitCode::from(EXIT_RUNTIME_ERROR),
    }
}
