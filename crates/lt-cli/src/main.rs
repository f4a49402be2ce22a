// Copyright (C) 2026 The Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_derive::Parser;
use lt_edict::Format;
use lt_tree::Ltv;
use lt_vm::{run_workers, BuiltinTable, EnvState, Environment, Runtime};
use tracing::{error, info};

/// Run a program written in one of the declared front-end formats.
#[derive(Parser, Debug)]
#[command(name = "lt-cli", about = "Run a LisTree/edict program to completion")]
struct Args {
    /// Front-end format the source is written in: asm, edict, xml, json,
    /// yaml, lisp, or massoc.
    #[arg(value_name = "format")]
    format: String,

    /// Path to the source file. Reads stdin when omitted.
    #[arg(value_name = "path")]
    path: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,

    #[arg(
        long,
        value_name = "threads",
        help = "Number of worker threads to run the program on",
        default_value = "1"
    )]
    threads: usize,
}

fn read_source(path: &Option<PathBuf>) -> io::Result<Vec<u8>> {
    match path {
        Some(p) => fs::read(p),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("unable to configure logging");
    }

    let Some(format) = Format::parse_token(&args.format) else {
        error!(format = %args.format, "unrecognised front-end format");
        return ExitCode::FAILURE;
    };

    let source = match read_source(&args.path) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to read source");
            return ExitCode::FAILURE;
        }
    };

    let bytecode = match format.compile(&source) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "compile failed");
            return ExitCode::FAILURE;
        }
    };

    let root = Ltv::none();
    let mut env = Environment::new(root);
    env.lambda_push(bytecode);

    let runtime = Runtime::new(BuiltinTable::with_defaults());
    let broken = std::sync::Arc::new(std::sync::Mutex::new(false));
    let broken_flag = broken.clone();
    run_workers(runtime.clone(), args.threads.max(1), move |finished| {
        report(&finished, &broken_flag);
    });

    runtime.enqueue(env);
    runtime.wait_idle();

    if *broken.lock().expect("report mutex poisoned") {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report(env: &Environment, broken: &std::sync::Mutex<bool>) {
    match &env.state {
        EnvState::Complete => {
            for value in env.operand_stack() {
                let bytes = value.bytes().unwrap_or_default();
                println!("{}", String::from_utf8_lossy(&bytes));
            }
        }
        EnvState::Thrown => {
            error!("environment ended with an uncaught exception");
            *broken.lock().expect("report mutex poisoned") = true;
        }
        EnvState::Broken(reason) => {
            error!(%reason, "environment broke");
            *broken.lock().expect("report mutex poisoned") = true;
        }
        EnvState::Runnable => {
            info!("environment still runnable at report time");
        }
    }
}
