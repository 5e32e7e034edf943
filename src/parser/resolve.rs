//! Call resolution: every call must name a builtin, a function defined in
//! the program or a native function, with an acceptable argument count.

use std::collections::HashMap;

use crate::ast::{walk_block, walk_expr, walk_pattern, Expr, Program, Visitor};
use crate::error::{Error, Result};
use crate::funcs::{builtin_arity, FunctionTable};

pub(super) fn check_calls(program: &Program, funcs: &FunctionTable) -> Result<()> {
    let mut defined: HashMap<&str, usize> = HashMap::new();
    for func in &program.functions {
        let name = func.name.as_str();
        if builtin_arity(name).is_some() {
            return Err(Error::parse(
                format!("can't define function {}; it's a builtin function", name),
                func.position,
            ));
        }
        if funcs.contains(name) {
            return Err(Error::parse(
                format!("can't define function {}; it's a native function", name),
                func.position,
            ));
        }
        if defined.insert(name, func.params.len()).is_some() {
            return Err(Error::parse(
                format!("function {} already defined", name),
                func.position,
            ));
        }
    }

    let mut checker = CallChecker {
        funcs,
        defined,
        error: None,
    };
    for func in &program.functions {
        walk_block(&mut checker, &func.body);
    }
    for rule in &program.rules {
        if let Some(pattern) = &rule.pattern {
            walk_pattern(&mut checker, pattern);
        }
        if let Some(action) = &rule.action {
            walk_block(&mut checker, action);
        }
    }

    match checker.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct CallChecker<'a> {
    funcs: &'a FunctionTable,
    defined: HashMap<&'a str, usize>,
    error: Option<Error>,
}

impl CallChecker<'_> {
    fn check(&self, name: &str, args: usize) -> std::result::Result<(), String> {
        if let Some(arity) = builtin_arity(name) {
            if !arity.accepts(args) {
                return Err(format!(
                    "wrong number of arguments to {}: expected {}, got {}",
                    name, arity, args
                ));
            }
            return Ok(());
        }
        if let Some(&params) = self.defined.get(name) {
            // Missing arguments are fine: extra parameters act as locals.
            if args > params {
                return Err(format!("too many arguments in call to {}", name));
            }
            return Ok(());
        }
        if let Some(native) = self.funcs.get(name) {
            if !native.arity.accepts(args) {
                return Err(format!(
                    "wrong number of arguments to {}: expected {}, got {}",
                    name, native.arity, args
                ));
            }
            return Ok(());
        }
        Err(format!("undefined function {}", name))
    }
}

impl Visitor for CallChecker<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.error.is_some() {
            return;
        }
        if let Expr::Call {
            name,
            args,
            position,
        } = expr
        {
            if let Err(message) = self.check(name, args.len()) {
                self.error = Some(Error::parse(message, *position));
                return;
            }
        }
        walk_expr(self, expr);
    }
}
