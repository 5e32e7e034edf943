//! Command-line flag scanning.

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const USAGE: &str = "usage: tawk [-F fs] [-v var=value] [-f progfile | 'prog'] [file ...]";

const HELP: &str = "\
Options:
  -F fs              field separator (default \" \")
  -v var=value       assign a variable before BEGIN (repeatable)
  -f progfile        load AWK source from progfile, - for stdin (repeatable)
  -i file            read program input from file instead of stdin
  -d                 print the parsed program to stderr
  -dt                print inferred variable types to stderr
  -cpuprofile file   write a CPU profile to file
  -memprofile file   write a heap snapshot to file
  -version           print the version and exit
  -h, -help          print this help and exit";

/// What the command line asks for.
#[derive(Debug, PartialEq)]
pub enum Command {
    Run(Options),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub prog_files: Vec<String>,
    pub field_sep: String,
    /// Raw `-v` operands, split later
    pub assignments: Vec<String>,
    pub input_file: Option<String>,
    pub debug: bool,
    pub debug_types: bool,
    pub cpu_profile: Option<PathBuf>,
    pub mem_profile: Option<PathBuf>,
    /// Everything after the flags: the program text (unless `-f` was given)
    /// and the program's arguments
    pub args: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prog_files: Vec::new(),
            field_sep: " ".to_string(),
            assignments: Vec::new(),
            input_file: None,
            debug: false,
            debug_types: false,
            cpu_profile: None,
            mem_profile: None,
            args: Vec::new(),
        }
    }
}

pub fn help_text() -> String {
    format!("{}\n\n{}\n", USAGE, HELP)
}

/// Flags whose value may be glued on: `-F:`, `-vx=1`
const ATTACHED: &[char] = &['F', 'f', 'v', 'i'];

/// Scans `args` (without the program name). Flags take one or two dashes
/// and `-flag value` or `-flag=value`; scanning stops at `--` or the first
/// positional argument.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut options = Options::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if arg == "--" {
            i += 1;
            break;
        }
        if arg == "-" || !arg.starts_with('-') {
            break;
        }
        let body = arg.strip_prefix("--").unwrap_or(&arg[1..]);
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        match name {
            "h" | "help" => return Ok(Command::Help),
            "version" => return Ok(Command::Version),
            "d" | "dt" => {
                if inline.is_some() {
                    return Err(Error::usage(format!("flag -{} does not take a value", name)));
                }
                if name == "d" {
                    options.debug = true;
                } else {
                    options.debug_types = true;
                }
            }
            "F" | "f" | "v" | "i" | "cpuprofile" | "memprofile" => {
                let value = match inline {
                    Some(value) => value.to_string(),
                    None => {
                        i += 1;
                        args.get(i)
                            .cloned()
                            .ok_or_else(|| Error::usage(format!("flag needs an argument: -{}", name)))?
                    }
                };
                set_value(&mut options, name, value);
            }
            _ => match body.chars().next() {
                Some(flag) if ATTACHED.contains(&flag) && body.len() > 1 => {
                    set_value(&mut options, &body[..1], body[1..].to_string());
                }
                _ => return Err(Error::usage(format!("flag provided but not defined: -{}", name))),
            },
        }
        i += 1;
    }

    options.args = args[i.min(args.len())..].to_vec();
    Ok(Command::Run(options))
}

fn set_value(options: &mut Options, name: &str, value: String) {
    match name {
        "F" => options.field_sep = value,
        "f" => options.prog_files.push(value),
        "v" => options.assignments.push(value),
        "i" => options.input_file = Some(value),
        "cpuprofile" => options.cpu_profile = Some(PathBuf::from(value)),
        _ => options.mem_profile = Some(PathBuf::from(value)),
    }
}
