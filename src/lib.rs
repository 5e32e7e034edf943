//! tawk - an AWK command-line driver with native functions
//!
//! The crate is two layers. The engine (`lexer`, `parser`, `ast`, `value`,
//! `interpreter`) parses and runs AWK programs; the `driver` turns a
//! command line into a run: it assembles the program text, builds the
//! parse and execution configuration, reports parse errors against the
//! source line, and optionally profiles the run.
//!
//! # Example
//!
//! ```
//! use tawk::{exec_program, extensions, parse_program, ExecConfig, ParseConfig};
//!
//! let funcs = extensions();
//! let mut parse_config = ParseConfig::new(&funcs);
//! let program = parse_program(b"{ print $2, repeat(\"-\", 3) }", &mut parse_config)?;
//!
//! let mut output = Vec::new();
//! let mut config = ExecConfig::new(&funcs);
//! config.stdin = Some(Box::new(&b"a b\nc d\n"[..]));
//! config.output = Some(Box::new(&mut output));
//! let status = exec_program(&program, config)?;
//!
//! assert_eq!(status, 0);
//! assert_eq!(output, b"b ---\nd ---\n");
//! # Ok::<(), tawk::Error>(())
//! ```
//!
//! # Parse errors
//!
//! ```
//! use tawk::{parse_program, FunctionTable, ParseConfig, Position};
//!
//! let funcs = FunctionTable::new();
//! let err = parse_program(b"BEGIN { x*; }", &mut ParseConfig::new(&funcs)).unwrap_err();
//! let parse_err = err.as_parse_error().unwrap();
//!
//! assert_eq!(parse_err.position, Position::new(1, 11));
//! assert_eq!(err.to_string(), "parse error at 1:11: expected expression instead of ;");
//! ```

pub mod ast;
pub mod driver;
pub mod error;
pub mod format;
pub mod funcs;
pub mod interpreter;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use error::{Error, ParseError, Position, Result};
pub use funcs::{extensions, Arity, FunctionTable, NativeFunc, ValueKind};
pub use interpreter::{exec_program, ExecConfig};
pub use parser::{parse_program, ParseConfig};
pub use value::Value;
