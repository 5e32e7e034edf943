//! The `tawk` command: assemble the program, configure, parse, run.

pub mod cli;
pub mod config;
pub mod profile;
pub mod report;
pub mod source;

use std::io::{self, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::funcs::extensions;
use crate::interpreter::exec_program;
use crate::parser::parse_program;

use cli::Command;
use config::RuntimeConfig;

/// Runs the command line `args` (program name first) and returns the
/// process exit status. Errors are reported on stderr.
pub fn run(args: &[String]) -> i32 {
    let (binary, rest) = match args.split_first() {
        Some((binary, rest)) => (binary.as_str(), rest),
        None => ("tawk", args),
    };
    match execute(binary, rest) {
        Ok(status) => {
            debug!(status, "exiting");
            status
        }
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    }
}

fn execute(binary: &str, args: &[String]) -> Result<i32> {
    let options = match cli::parse_args(args)? {
        Command::Help => {
            print!("{}", cli::help_text());
            return Ok(0);
        }
        Command::Version => {
            println!("tawk {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Command::Run(options) => options,
    };

    let (spec, args) = source::select(options.prog_files.clone(), options.args.clone())?;
    let src = source::assemble(&spec)?;
    debug!(bytes = src.len(), "assembled program source");

    let funcs = extensions();
    let RuntimeConfig { mut parse, exec } = config::build(&funcs, &options, binary, args)?;
    debug!(vars = exec.vars.len(), args = exec.args.len(), "built runtime config");

    let program = match parse_program(&src, &mut parse) {
        Ok(program) => program,
        Err(Error::Parse(err)) => {
            let message = err.to_string();
            report::show_source_line(&mut io::stderr().lock(), &src, err.position, &message)?;
            return Err(Error::Parse(err));
        }
        Err(err) => return Err(err),
    };

    if options.debug {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", program)?;
    }

    profile::run_profiled(
        options.cpu_profile.as_deref(),
        options.mem_profile.as_deref(),
        || exec_program(&program, exec),
    )
}
