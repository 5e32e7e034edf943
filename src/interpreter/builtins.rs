use std::collections::HashMap;
use std::io::Write;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::trace;

use crate::ast::{Expr, FunctionDef, VarType};
use crate::error::{Error, Position, Result};
use crate::format::sprintf;
use crate::funcs::builtin_arity;
use crate::value::Value;

use super::stmt::StmtResult;
use super::{seed_state, Frame, Interpreter, Local, MAX_CALL_DEPTH};

impl<'a> Interpreter<'a> {
    /// Calls a builtin, then a function defined in the program, then a
    /// native function.
    pub(crate) fn call_function(&mut self, name: &str, args: &[Expr], position: Position) -> Result<Value> {
        // builtins that look at their argument expressions
        match name {
            "sub" | "gsub" => return self.call_sub(name == "gsub", args),
            "split" => return self.call_split(args),
            "length" => return self.call_length(args),
            "match" => return self.call_match(args),
            _ => {}
        }

        if builtin_arity(name).is_some() {
            let values = self.eval_args(args)?;
            return self.call_builtin(name, &values).map_err(|e| e.at(position));
        }

        if let Some(func) = self.functions.get(name).copied() {
            return self.call_user_function(func, args, position);
        }

        let funcs = self.funcs;
        if let Some(native) = funcs.get(name) {
            let values = self.eval_args(args)?;
            return Ok(native.call(&values));
        }

        Err(Error::runtime_at(format!("undefined function {}", name), position))
    }

    fn call_builtin(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let num = |i: usize| args.get(i).map_or(0.0, Value::to_number);

        let value = match name {
            "atan2" => Value::Number(num(0).atan2(num(1))),
            "cos" => Value::Number(num(0).cos()),
            "sin" => Value::Number(num(0).sin()),
            "exp" => Value::Number(num(0).exp()),
            "log" => Value::Number(num(0).ln()),
            "sqrt" => Value::Number(num(0).sqrt()),
            "int" => Value::Number(num(0).trunc()),
            "rand" => Value::Number(self.next_random()),
            "srand" => {
                let previous = self.rand_seed;
                let seed = match args.first() {
                    Some(seed) => seed.to_number(),
                    None => SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map_or(0.0, |d| d.as_secs() as f64),
                };
                self.rand_seed = seed;
                self.rand_state = seed_state(seed);
                Value::Number(previous)
            }
            "index" => {
                let s = self.arg_string(args, 0);
                let t = self.arg_string(args, 1);
                let pos = if t.is_empty() {
                    0
                } else {
                    s.find(&t).map_or(0, |i| s[..i].chars().count() + 1)
                };
                Value::Number(pos as f64)
            }
            "substr" => {
                let s = self.arg_string(args, 0);
                Value::Str(substr(&s, num(1), args.get(2).map(Value::to_number)))
            }
            "sprintf" => {
                let format = self.arg_string(args, 0);
                Value::Str(sprintf(&format, args.get(1..).unwrap_or_default())?)
            }
            "tolower" => Value::Str(self.arg_string(args, 0).to_lowercase()),
            "toupper" => Value::Str(self.arg_string(args, 0).to_uppercase()),
            "system" => {
                let cmd = self.arg_string(args, 0);
                self.flush_all()?;
                let status = Command::new("sh").arg("-c").arg(&cmd).status();
                let code = match status {
                    Ok(status) => status.code().unwrap_or(-1),
                    Err(err) => {
                        trace!(%cmd, %err, "system failed to start");
                        -1
                    }
                };
                Value::Number(code as f64)
            }
            "close" => {
                let name = self.arg_string(args, 0);
                Value::Number(self.close_stream(&name) as f64)
            }
            "fflush" => {
                let status = match args.first() {
                    None => {
                        self.flush_all()?;
                        0
                    }
                    Some(name) => {
                        let name = self.to_output_string(name, false);
                        self.flush_stream(&name)?
                    }
                };
                Value::Number(status as f64)
            }
            _ => return Err(Error::runtime(format!("unhandled builtin {}", name))),
        };
        Ok(value)
    }

    fn arg_string(&self, args: &[Value], i: usize) -> String {
        args.get(i)
            .map(|v| self.to_output_string(v, false))
            .unwrap_or_default()
    }

    fn call_length(&mut self, args: &[Expr]) -> Result<Value> {
        let Some(arg) = args.first() else {
            return Ok(Value::Number(self.record.chars().count() as f64));
        };
        if let Expr::Var(name, _) = arg {
            if self.is_array(name) {
                let len = self.array(name).map_or(0, HashMap::len);
                return Ok(Value::Number(len as f64));
            }
        }
        let value = self.eval_expr(arg)?;
        Ok(Value::Number(self.to_output_string(&value, false).chars().count() as f64))
    }

    /// match(s, re): sets RSTART and RLENGTH in characters.
    fn call_match(&mut self, args: &[Expr]) -> Result<Value> {
        let (Some(subject), Some(pattern)) = (args.first(), args.get(1)) else {
            return Ok(Value::Number(0.0));
        };
        let subject = self.eval_expr(subject)?;
        let subject = self.to_output_string(&subject, false);
        let re = self.regex_operand(pattern)?;

        match re.find(&subject) {
            Some(m) => {
                self.rstart = (subject[..m.start()].chars().count() + 1) as f64;
                self.rlength = m.as_str().chars().count() as f64;
            }
            None => {
                self.rstart = 0.0;
                self.rlength = -1.0;
            }
        }
        Ok(Value::Number(self.rstart))
    }

    /// split(s, a[, sep]): replaces the contents of `a` with the pieces of
    /// `s` under keys 1..n and returns n.
    fn call_split(&mut self, args: &[Expr]) -> Result<Value> {
        let (Some(subject), Some(Expr::Var(array, _))) = (args.first(), args.get(1)) else {
            return Err(Error::runtime("split: second argument must be an array name"));
        };
        let subject = self.eval_expr(subject)?;
        let subject = self.to_output_string(&subject, false);

        let pieces: Vec<String> = match args.get(2) {
            Some(Expr::Regex(pattern, _)) => {
                let re = self.get_regex(pattern)?;
                split_regex(&re, &subject)
            }
            Some(sep) => {
                let sep = self.eval_expr(sep)?;
                let sep = self.to_output_string(&sep, false);
                self.split_with(&subject, &sep)?
            }
            None => {
                let fs = self.fs.clone();
                self.split_with(&subject, &fs)?
            }
        };

        self.delete_element(array, None);
        let count = pieces.len();
        for (i, piece) in pieces.into_iter().enumerate() {
            self.set_element(array, (i + 1).to_string(), Value::strnum(piece));
        }
        Ok(Value::Number(count as f64))
    }

    /// Field-splitting rules: " " splits on blanks, another single
    /// character splits on itself, anything longer is a regex.
    fn split_with(&mut self, subject: &str, sep: &str) -> Result<Vec<String>> {
        if subject.is_empty() {
            return Ok(Vec::new());
        }
        if sep == " " {
            return Ok(subject
                .split([' ', '\t', '\n'])
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect());
        }
        if sep.is_empty() {
            return Ok(subject.chars().map(String::from).collect());
        }
        if sep.chars().count() == 1 && sep != "\\" {
            return Ok(subject.split(sep).map(String::from).collect());
        }
        let re = self.get_regex(sep)?;
        Ok(split_regex(&re, subject))
    }

    /// sub and gsub. The target is $0 unless a third argument names a
    /// variable, field or element; any other third argument is evaluated
    /// but left alone.
    fn call_sub(&mut self, global: bool, args: &[Expr]) -> Result<Value> {
        let (Some(pattern), Some(replacement)) = (args.first(), args.get(1)) else {
            return Ok(Value::Number(0.0));
        };
        let re = self.regex_operand(pattern)?;
        let replacement = self.eval_expr(replacement)?;
        let replacement = self.to_output_string(&replacement, false);

        let lvalue = match args.get(2) {
            None => Some(super::expr::LValue::Field(0)),
            Some(target @ (Expr::Var(..) | Expr::Field(..) | Expr::ArrayAccess { .. } | Expr::Group(..))) => {
                Some(self.resolve_lvalue(target)?)
            }
            Some(other) => {
                self.eval_expr(other)?;
                None
            }
        };
        let Some(lvalue) = lvalue else {
            return Ok(Value::Number(0.0));
        };

        let current = self.read_lvalue(&lvalue);
        let current = self.to_output_string(&current, false);
        let (result, count) = substitute(&re, &replacement, &current, global);
        if count > 0 {
            self.write_lvalue(lvalue, Value::Str(result))?;
        }
        Ok(Value::Number(count as f64))
    }

    fn call_user_function(&mut self, func: &'a FunctionDef, args: &[Expr], position: Position) -> Result<Value> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(Error::runtime_at(
                format!("calling {} exceeds maximum call depth of {}", func.name, MAX_CALL_DEPTH),
                position,
            ));
        }
        trace!(function = %func.name, depth = self.frames.len() + 1, "call");

        let mut locals = Vec::with_capacity(func.params.len());
        for i in 0..func.params.len() {
            let wants_array = func.param_types.get(i) == Some(&VarType::Array);
            let local = match args.get(i) {
                Some(Expr::Var(name, _)) if wants_array || self.is_array(name) => Local::Ref(self.array_slot(name)),
                Some(arg) => Local::Scalar(self.eval_expr(arg)?),
                None if wants_array => Local::Array(HashMap::new()),
                None => Local::Scalar(Value::Uninitialized),
            };
            locals.push(local);
        }

        self.frames.push(Frame { func, locals });
        let result = self.execute_block(&func.body);
        self.frames.pop();

        match result? {
            StmtResult::Return(value) => Ok(value),
            _ => Ok(Value::Uninitialized),
        }
    }

    /// xorshift64* scaled to [0, 1)
    fn next_random(&mut self) -> f64 {
        let mut x = self.rand_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rand_state = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(crate) fn flush_all(&mut self) -> Result<()> {
        self.output.flush()?;
        for file in self.output_files.values_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn flush_stream(&mut self, name: &str) -> Result<i32> {
        if name == "/dev/stdout" || name == "-" {
            self.output.flush()?;
            return Ok(0);
        }
        match self.output_files.get_mut(name) {
            Some(file) => {
                file.flush()?;
                Ok(0)
            }
            None => Ok(-1),
        }
    }

    /// Closes an output or getline stream by name: 0 for files, the exit
    /// status for commands, -1 if nothing by that name is open.
    fn close_stream(&mut self, name: &str) -> i32 {
        let status = if let Some(file) = self.output_files.remove(name) {
            file.close()
        } else if let Some(input) = self.input_files.remove(name) {
            input.close()
        } else {
            return -1;
        };
        status.unwrap_or(-1)
    }
}

fn substr(s: &str, start: f64, len: Option<f64>) -> String {
    let count = s.chars().count() as f64;
    let first = start.round();
    let end = match len {
        Some(len) => first + len.round(),
        None => f64::INFINITY,
    };
    let first = first.max(1.0);
    let end = end.min(count + 1.0);
    if end <= first {
        return String::new();
    }
    s.chars()
        .skip(first as usize - 1)
        .take((end - first) as usize)
        .collect()
}

fn split_regex(re: &Regex, subject: &str) -> Vec<String> {
    if subject.is_empty() {
        return Vec::new();
    }
    re.split(subject).map(String::from).collect()
}

/// Replaces the first (or every) match of `re` in `target`. In the
/// replacement `&` is the matched text, `\&` a literal ampersand and `\\`
/// a backslash.
fn substitute(re: &Regex, replacement: &str, target: &str, global: bool) -> (String, usize) {
    let mut out = String::with_capacity(target.len());
    let mut last = 0;
    let mut count = 0;
    let mut prev_end = None;

    for m in re.find_iter(target) {
        // an empty match right after a non-empty one doesn't count
        if m.is_empty() && prev_end == Some(m.start()) {
            continue;
        }
        out.push_str(&target[last..m.start()]);
        expand_replacement(replacement, m.as_str(), &mut out);
        last = m.end();
        count += 1;
        prev_end = (!m.is_empty()).then_some(m.end());
        if !global {
            break;
        }
    }
    out.push_str(&target[last..]);
    (out, count)
}

fn expand_replacement(replacement: &str, matched: &str, out: &mut String) {
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str(matched),
            '\\' => match chars.peek() {
                Some('&') => {
                    chars.next();
                    out.push('&');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            c => out.push(c),
        }
    }
}
