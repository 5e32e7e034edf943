//! Variable type inference.
//!
//! Works out which names are arrays and which are scalars, for globals and
//! for each function's parameters. Array-ness flows both ways through calls
//! (a parameter used as an array makes the caller's argument an array, and
//! an array argument makes the parameter one), so the walk repeats until
//! nothing changes. Mixing the two uses of one name is an error.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

use crate::ast::*;
use crate::error::{Error, Position, Result};
use crate::funcs::{FunctionTable, ValueKind};

/// Inferred types, printed by `-dt`.
#[derive(Debug, Default)]
pub struct TypeReport {
    pub globals: Vec<(String, VarType)>,
    /// (function, parameter, type) in definition order
    pub locals: Vec<(String, String, VarType)>,
}

impl TypeReport {
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for (name, ty) in &self.globals {
            writeln!(w, "global {}: {}", name, ty)?;
        }
        for (func, name, ty) in &self.locals {
            writeln!(w, "local {}.{}: {}", func, name, ty)?;
        }
        w.flush()
    }
}

pub(super) fn infer(program: &mut Program, funcs: &FunctionTable) -> Result<TypeReport> {
    let mut inference = Inference {
        funcs,
        user: program
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect(),
        params: program.functions.iter().map(|f| f.params.clone()).collect(),
        globals: BTreeMap::new(),
        locals: program
            .functions
            .iter()
            .map(|f| vec![Slot::default(); f.params.len()])
            .collect(),
        current: None,
        changed: false,
        error: None,
    };

    loop {
        inference.changed = false;
        for (i, func) in program.functions.iter().enumerate() {
            inference.current = Some(i);
            walk_block(&mut inference, &func.body);
        }
        inference.current = None;
        for rule in &program.rules {
            if let Some(pattern) = &rule.pattern {
                walk_pattern(&mut inference, pattern);
            }
            if let Some(action) = &rule.action {
                walk_block(&mut inference, action);
            }
        }
        if let Some(err) = inference.error.take() {
            return Err(err);
        }
        if !inference.changed {
            break;
        }
    }

    let mut report = TypeReport {
        globals: inference
            .globals
            .iter()
            .map(|(name, slot)| (name.clone(), slot.ty))
            .collect(),
        locals: Vec::new(),
    };
    for (func, slots) in program.functions.iter_mut().zip(&inference.locals) {
        func.param_types = slots.iter().map(|s| s.ty).collect();
        for (name, slot) in func.params.iter().zip(slots) {
            report.locals.push((func.name.clone(), name.clone(), slot.ty));
        }
    }
    Ok(report)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Slot {
    ty: VarType,
    /// used as a scalar somewhere, even if its kind is still unknown
    scalar: bool,
}

impl Slot {
    fn is_scalar(&self) -> bool {
        self.scalar || matches!(self.ty, VarType::Number | VarType::String)
    }
}

fn special_slot(name: &str) -> Slot {
    let ty = match name {
        "NR" | "NF" | "FNR" | "RSTART" | "RLENGTH" | "ARGC" => VarType::Number,
        "FS" | "OFS" | "ORS" | "RS" | "SUBSEP" | "CONVFMT" | "OFMT" | "FILENAME" => VarType::String,
        "ARGV" | "ENVIRON" => VarType::Array,
        _ => VarType::Unknown,
    };
    Slot {
        ty,
        scalar: matches!(ty, VarType::Number | VarType::String),
    }
}

enum Place {
    Global(String),
    Local(usize, usize),
}

struct Inference<'a> {
    funcs: &'a FunctionTable,
    user: HashMap<String, usize>,
    params: Vec<Vec<String>>,
    globals: BTreeMap<String, Slot>,
    locals: Vec<Vec<Slot>>,
    current: Option<usize>,
    changed: bool,
    error: Option<Error>,
}

impl Inference<'_> {
    fn place(&self, name: &str) -> Place {
        if let Some(f) = self.current {
            if let Some(i) = self.params[f].iter().position(|p| p == name) {
                return Place::Local(f, i);
            }
        }
        Place::Global(name.to_string())
    }

    fn slot(&mut self, place: &Place) -> &mut Slot {
        match place {
            Place::Global(name) => self
                .globals
                .entry(name.clone())
                .or_insert_with(|| special_slot(name)),
            Place::Local(f, i) => &mut self.locals[*f][*i],
        }
    }

    fn fail(&mut self, message: String, position: Position) {
        if self.error.is_none() {
            self.error = Some(Error::parse(message, position));
        }
    }

    fn mark_array(&mut self, place: &Place, name: &str, position: Position) {
        let slot = *self.slot(place);
        if slot.is_scalar() {
            self.fail(format!("can't use scalar {} as array", name), position);
        } else if slot.ty != VarType::Array {
            self.slot(place).ty = VarType::Array;
            self.changed = true;
        }
    }

    fn mark_scalar(&mut self, place: &Place, name: &str, position: Position) {
        let slot = *self.slot(place);
        if slot.ty == VarType::Array {
            self.fail(format!("can't use array {} as scalar", name), position);
        } else if !slot.scalar {
            self.slot(place).scalar = true;
            self.changed = true;
        }
    }

    fn use_array(&mut self, name: &str, position: Position) {
        let place = self.place(name);
        self.mark_array(&place, name, position);
    }

    fn use_scalar(&mut self, name: &str, position: Position) {
        let place = self.place(name);
        self.mark_scalar(&place, name, position);
    }

    /// A scalar assignment; the first concrete kind a name receives sticks.
    fn assign(&mut self, name: &str, kind: VarType, position: Position) {
        let place = self.place(name);
        self.mark_scalar(&place, name, position);
        if self.error.is_some() {
            return;
        }
        let slot = self.slot(&place);
        if slot.ty == VarType::Unknown && matches!(kind, VarType::Number | VarType::String) {
            slot.ty = kind;
            self.changed = true;
        }
    }

    fn var_type(&self, name: &str) -> VarType {
        match self.place(name) {
            Place::Global(name) => self
                .globals
                .get(&name)
                .copied()
                .unwrap_or_else(|| special_slot(&name))
                .ty,
            Place::Local(f, i) => self.locals[f][i].ty,
        }
    }

    /// Static kind of an expression's value, when it has one.
    fn kind_of(&self, expr: &Expr) -> VarType {
        match expr {
            Expr::Number(..) => VarType::Number,
            Expr::String(..) => VarType::String,
            Expr::Var(name, _) => match self.var_type(name) {
                VarType::Array => VarType::Unknown,
                ty => ty,
            },
            Expr::Binary {
                op: BinaryOp::Concat,
                ..
            } => VarType::String,
            Expr::Binary { .. }
            | Expr::Unary { .. }
            | Expr::PreIncrement(..)
            | Expr::PreDecrement(..)
            | Expr::PostIncrement(..)
            | Expr::PostDecrement(..)
            | Expr::InArray { .. }
            | Expr::Match { .. }
            | Expr::Getline { .. }
            | Expr::Regex(..) => VarType::Number,
            Expr::Assign { op, value, .. } => match op {
                AssignOp::Assign => self.kind_of(value),
                _ => VarType::Number,
            },
            Expr::Ternary {
                then_expr,
                else_expr,
                ..
            } => {
                let then_kind = self.kind_of(then_expr);
                if then_kind == self.kind_of(else_expr) {
                    then_kind
                } else {
                    VarType::Unknown
                }
            }
            Expr::Call { name, .. } => self.call_kind(name),
            Expr::Group(inner, _) => self.kind_of(inner),
            Expr::Field(..) | Expr::ArrayAccess { .. } => VarType::Unknown,
        }
    }

    fn call_kind(&self, name: &str) -> VarType {
        match name {
            "sprintf" | "substr" | "tolower" | "toupper" => VarType::String,
            _ if self.user.contains_key(name) => VarType::Unknown,
            _ => match self.funcs.get(name).map(|f| f.returns) {
                Some(ValueKind::String) => VarType::String,
                // every other builtin returns a number
                _ => VarType::Number,
            },
        }
    }

    fn visit_call(&mut self, name: &str, args: &[Expr]) {
        if let Some(&callee) = self.user.get(name) {
            for (i, arg) in args.iter().enumerate() {
                let Expr::Var(var, position) = arg else {
                    self.visit_expr(arg);
                    let param = Place::Local(callee, i);
                    let param_name = self.params[callee][i].clone();
                    self.mark_scalar(&param, &param_name, arg.position());
                    continue;
                };
                self.link_argument(var, *position, callee, i);
            }
            return;
        }

        match (name, args) {
            ("split", [target, array, rest @ ..]) => {
                self.visit_expr(target);
                match array {
                    Expr::Var(var, position) => self.use_array(var, *position),
                    other => self.fail(
                        "split: second argument must be an array name".to_string(),
                        other.position(),
                    ),
                }
                rest.iter().for_each(|e| self.visit_expr(e));
            }
            // length(arr) is allowed, so a bare name says nothing
            ("length", [Expr::Var(..)]) => {}
            _ => args.iter().for_each(|e| self.visit_expr(e)),
        }
    }

    /// An operand of arithmetic: a bare name there holds a number.
    fn numeric_operand(&mut self, expr: &Expr) {
        self.visit_expr(expr);
        let mut inner = expr;
        while let Expr::Group(e, _) = inner {
            inner = e;
        }
        if let Expr::Var(name, position) = inner {
            self.assign(name, VarType::Number, *position);
        }
    }

    /// Unifies a bare-name argument with the callee's parameter.
    fn link_argument(&mut self, var: &str, position: Position, callee: usize, index: usize) {
        let param = Place::Local(callee, index);
        let param_name = self.params[callee][index].clone();
        let param_slot = *self.slot(&param);
        let arg = self.place(var);

        if param_slot.ty == VarType::Array {
            self.mark_array(&arg, var, position);
        } else if param_slot.is_scalar() {
            self.mark_scalar(&arg, var, position);
        }

        let arg_slot = *self.slot(&arg);
        if arg_slot.ty == VarType::Array {
            self.mark_array(&param, &param_name, position);
        } else if arg_slot.is_scalar() {
            self.mark_scalar(&param, &param_name, position);
        }
    }
}

impl Visitor for Inference<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if self.error.is_some() {
            return;
        }
        match stmt {
            Stmt::ForIn {
                var,
                array,
                body,
                position,
            } => {
                self.use_array(array, *position);
                self.assign(var, VarType::String, *position);
                self.visit_stmt(body);
            }
            Stmt::Delete {
                array,
                index,
                position,
            } => {
                self.use_array(array, *position);
                index.iter().for_each(|e| self.visit_expr(e));
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if self.error.is_some() {
            return;
        }
        match expr {
            Expr::Var(name, position) => self.use_scalar(name, *position),
            Expr::ArrayAccess {
                array,
                indices,
                position,
            } => {
                self.use_array(array, *position);
                indices.iter().for_each(|e| self.visit_expr(e));
            }
            Expr::InArray {
                key,
                array,
                position,
            } => {
                self.use_array(array, *position);
                key.iter().for_each(|e| self.visit_expr(e));
            }
            Expr::Assign {
                target, op, value, ..
            } => {
                self.visit_expr(value);
                match target.as_ref() {
                    Expr::Var(name, position) => {
                        let kind = match op {
                            AssignOp::Assign => self.kind_of(value),
                            _ => VarType::Number,
                        };
                        self.assign(name, kind, *position);
                    }
                    other => self.visit_expr(other),
                }
            }
            Expr::PreIncrement(target, _)
            | Expr::PreDecrement(target, _)
            | Expr::PostIncrement(target, _)
            | Expr::PostDecrement(target, _) => match target.as_ref() {
                Expr::Var(name, position) => self.assign(name, VarType::Number, *position),
                other => self.visit_expr(other),
            },
            Expr::Getline {
                var,
                input,
                position,
            } => {
                if let Some(var) = var {
                    self.assign(var, VarType::Unknown, *position);
                }
                if let Some(GetlineInput::File(e) | GetlineInput::Pipe(e)) = input {
                    self.visit_expr(e);
                }
            }
            Expr::Binary {
                left,
                op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow,
                right,
                ..
            } => {
                self.numeric_operand(left);
                self.numeric_operand(right);
            }
            Expr::Unary {
                op: UnaryOp::Neg | UnaryOp::Pos,
                operand,
                ..
            } => self.numeric_operand(operand),
            Expr::Call { name, args, .. } => self.visit_call(name, args),
            _ => walk_expr(self, expr),
        }
    }
}
