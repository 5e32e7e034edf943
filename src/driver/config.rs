//! Parse-time and execution-time configuration built from the command line.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};
use crate::funcs::FunctionTable;
use crate::interpreter::ExecConfig;
use crate::parser::ParseConfig;

use super::cli::Options;

/// Both configuration records, borrowing one function table so the parser
/// and the interpreter agree on the native function names.
pub struct RuntimeConfig<'a> {
    pub parse: ParseConfig<'a>,
    pub exec: ExecConfig<'a>,
}

/// Splits a `-v` operand on its first `=`.
pub fn parse_assignment(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Err(Error::usage("-v flag must be in format name=value")),
    }
}

/// ARGV[0]: the base name of the path the binary was invoked as.
pub fn program_name(binary: &str) -> String {
    Path::new(binary)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary.to_string())
}

pub fn build<'a>(funcs: &'a FunctionTable, options: &Options, binary: &str, args: Vec<String>) -> Result<RuntimeConfig<'a>> {
    let mut parse = ParseConfig::new(funcs);
    parse.debug_types = options.debug_types;

    let mut exec = ExecConfig::new(funcs);
    exec.argv0 = program_name(binary);
    exec.args = args;
    exec.vars.push(("FS".to_string(), options.field_sep.clone()));
    for arg in &options.assignments {
        exec.vars.push(parse_assignment(arg)?);
    }

    if let Some(path) = &options.input_file {
        let file = File::open(path).map_err(|e| Error::file(path, e))?;
        exec.stdin = Some(Box::new(BufReader::new(file)));
    }

    Ok(RuntimeConfig { parse, exec })
}
