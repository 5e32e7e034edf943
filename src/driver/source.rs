//! Assembling the program text from `-f` files or an inline argument.

use std::fs::File;
use std::io::{self, Read};

use tracing::trace;

use crate::error::{Error, Result};

use super::cli::USAGE;

/// Where the program text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// `-f` paths in order; `-` is standard input
    Files(Vec<String>),
    /// The first positional argument
    Inline(String),
}

/// Picks the program source and returns it with the remaining program
/// arguments. With `-f` files every positional is an argument; otherwise
/// the first positional is the program.
pub fn select(prog_files: Vec<String>, mut args: Vec<String>) -> Result<(SourceSpec, Vec<String>)> {
    if !prog_files.is_empty() {
        return Ok((SourceSpec::Files(prog_files), args));
    }
    if args.is_empty() {
        return Err(Error::usage(USAGE));
    }
    let program = args.remove(0);
    Ok((SourceSpec::Inline(program), args))
}

pub fn assemble(spec: &SourceSpec) -> Result<Vec<u8>> {
    assemble_with_stdin(spec, &mut io::stdin().lock())
}

/// Builds the source buffer. Each file's bytes are followed by exactly one
/// newline; an inline program is used as is.
pub fn assemble_with_stdin<R: Read + ?Sized>(spec: &SourceSpec, stdin: &mut R) -> Result<Vec<u8>> {
    let paths = match spec {
        SourceSpec::Inline(program) => return Ok(program.as_bytes().to_vec()),
        SourceSpec::Files(paths) => paths,
    };

    let mut src = Vec::new();
    for path in paths {
        let before = src.len();
        if path == "-" {
            stdin.read_to_end(&mut src).map_err(|e| Error::file(path, e))?;
        } else {
            let mut file = File::open(path).map_err(|e| Error::file(path, e))?;
            file.read_to_end(&mut src).map_err(|e| Error::file(path, e))?;
        }
        trace!(path = %path, bytes = src.len() - before, "read program fragment");
        src.push(b'\n');
    }
    Ok(src)
}
