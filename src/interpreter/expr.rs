use std::cmp::Ordering;
use std::io::Write;

use crate::ast::*;
use crate::error::{Error, Position, Result};
use crate::value::{compare_values, Value};

use super::io::InputSource;
use super::{Interpreter, MAX_FIELD};

/// A resolved assignment target. Subscripts and field indexes are
/// evaluated once, so `a[i++] += 1` bumps `i` a single time.
pub(super) enum LValue<'e> {
    Var(&'e str),
    Field(usize),
    Element(&'e str, String),
}

impl Interpreter<'_> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n, _) => Ok(Value::Number(*n)),

            Expr::String(s, _) => Ok(Value::Str(s.clone())),

            // a bare regex tests $0
            Expr::Regex(pattern, _) => {
                let re = self.get_regex(pattern)?;
                Ok(Value::from_bool(re.is_match(&self.record)))
            }

            Expr::Var(name, _) => Ok(self.get_var(name)),

            Expr::Field(index, position) => {
                let index = self.field_index(index, *position)?;
                Ok(self.get_field(index))
            }

            Expr::ArrayAccess { array, indices, .. } => {
                let values = self.eval_args(indices)?;
                let key = self.array_key(&values);
                Ok(self.touch_element(array, &key))
            }

            Expr::Binary {
                left,
                op,
                right,
                position,
            } => self.eval_binary(left, *op, right, *position),

            Expr::Unary { op, operand, .. } => {
                let value = self.eval_expr(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Pos => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::from_bool(!value.is_truthy()),
                })
            }

            Expr::Assign {
                target,
                op,
                value,
                position,
            } => self.eval_assign(target, *op, value, *position),

            Expr::PreIncrement(target, _) => self.increment(target, 1.0, true),
            Expr::PreDecrement(target, _) => self.increment(target, -1.0, true),
            Expr::PostIncrement(target, _) => self.increment(target, 1.0, false),
            Expr::PostDecrement(target, _) => self.increment(target, -1.0, false),

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.eval_expr(then_expr)
                } else {
                    self.eval_expr(else_expr)
                }
            }

            Expr::Call {
                name,
                args,
                position,
            } => self.call_function(name, args, *position),

            Expr::InArray { key, array, .. } => {
                let values = self.eval_args(key)?;
                let key = self.array_key(&values);
                Ok(Value::from_bool(self.has_element(array, &key)))
            }

            Expr::Match {
                expr,
                pattern,
                negated,
                ..
            } => {
                let value = self.eval_expr(expr)?;
                let subject = self.to_output_string(&value, false);
                let re = self.regex_operand(pattern)?;
                Ok(Value::from_bool(re.is_match(&subject) != *negated))
            }

            Expr::Getline {
                var,
                input,
                position,
            } => self.eval_getline(var.as_deref(), input.as_ref(), *position),

            Expr::Group(inner, _) => self.eval_expr(inner),
        }
    }

    /// A regex from a literal `/re/` or from the string value of any
    /// other expression.
    pub(crate) fn regex_operand(&mut self, expr: &Expr) -> Result<regex::Regex> {
        match expr {
            Expr::Regex(pattern, _) => self.get_regex(pattern),
            other => {
                let value = self.eval_expr(other)?;
                let pattern = self.to_output_string(&value, false);
                self.get_regex(&pattern)
            }
        }
    }

    pub(crate) fn field_index(&mut self, expr: &Expr, position: Position) -> Result<usize> {
        let n = self.eval_expr(expr)?.to_number() as i64;
        if n < 0 {
            return Err(Error::runtime_at(format!("attempt to access field {}", n), position));
        }
        if n as usize > MAX_FIELD {
            return Err(Error::runtime_at(format!("field index {} too large", n), position));
        }
        Ok(n as usize)
    }

    fn eval_binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr, position: Position) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let result = self.eval_expr(left)?.is_truthy() && self.eval_expr(right)?.is_truthy();
                return Ok(Value::from_bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval_expr(left)?.is_truthy() || self.eval_expr(right)?.is_truthy();
                return Ok(Value::from_bool(result));
            }
            _ => {}
        }

        let l = self.eval_expr(left)?;
        let r = self.eval_expr(right)?;

        match op {
            BinaryOp::Concat => {
                let mut s = self.to_output_string(&l, false);
                s.push_str(&self.to_output_string(&r, false));
                Ok(Value::Str(s))
            }
            BinaryOp::Lt => Ok(Value::from_bool(self.compare(&l, &r) == Ordering::Less)),
            BinaryOp::Le => Ok(Value::from_bool(self.compare(&l, &r) != Ordering::Greater)),
            BinaryOp::Gt => Ok(Value::from_bool(self.compare(&l, &r) == Ordering::Greater)),
            BinaryOp::Ge => Ok(Value::from_bool(self.compare(&l, &r) != Ordering::Less)),
            BinaryOp::Eq => Ok(Value::from_bool(self.compare(&l, &r) == Ordering::Equal)),
            BinaryOp::Ne => Ok(Value::from_bool(self.compare(&l, &r) != Ordering::Equal)),
            _ => arithmetic(op, l.to_number(), r.to_number(), position).map(Value::Number),
        }
    }

    /// Numeric when neither side is a string; otherwise compares the string
    /// forms, converting numbers with CONVFMT.
    fn compare(&self, l: &Value, r: &Value) -> Ordering {
        if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
            self.to_output_string(l, false).cmp(&self.to_output_string(r, false))
        } else {
            compare_values(l, r)
        }
    }

    fn eval_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, position: Position) -> Result<Value> {
        let rhs = self.eval_expr(value)?;
        let lvalue = self.resolve_lvalue(target)?;

        let result = match op {
            AssignOp::Assign => rhs,
            _ => {
                let current = self.read_lvalue(&lvalue).to_number();
                let op = match op {
                    AssignOp::AddAssign => BinaryOp::Add,
                    AssignOp::SubAssign => BinaryOp::Sub,
                    AssignOp::MulAssign => BinaryOp::Mul,
                    AssignOp::DivAssign => BinaryOp::Div,
                    AssignOp::ModAssign => BinaryOp::Mod,
                    _ => BinaryOp::Pow,
                };
                Value::Number(arithmetic(op, current, rhs.to_number(), position)?)
            }
        };

        self.write_lvalue(lvalue, result.clone())?;
        Ok(result)
    }

    fn increment(&mut self, target: &Expr, delta: f64, prefix: bool) -> Result<Value> {
        let lvalue = self.resolve_lvalue(target)?;
        let old = self.read_lvalue(&lvalue).to_number();
        self.write_lvalue(lvalue, Value::Number(old + delta))?;
        Ok(Value::Number(if prefix { old + delta } else { old }))
    }

    pub(super) fn resolve_lvalue<'e>(&mut self, expr: &'e Expr) -> Result<LValue<'e>> {
        match expr {
            Expr::Var(name, _) => Ok(LValue::Var(name)),
            Expr::Field(index, position) => Ok(LValue::Field(self.field_index(index, *position)?)),
            Expr::ArrayAccess { array, indices, .. } => {
                let values = self.eval_args(indices)?;
                Ok(LValue::Element(array, self.array_key(&values)))
            }
            Expr::Group(inner, _) => self.resolve_lvalue(inner),
            other => Err(Error::runtime_at("assignment to a non-variable", other.position())),
        }
    }

    pub(super) fn read_lvalue(&mut self, lvalue: &LValue<'_>) -> Value {
        match lvalue {
            LValue::Var(name) => self.get_var(name),
            LValue::Field(index) => self.get_field(*index),
            LValue::Element(array, key) => self.touch_element(array, key),
        }
    }

    pub(super) fn write_lvalue(&mut self, lvalue: LValue<'_>, value: Value) -> Result<()> {
        match lvalue {
            LValue::Var(name) => return self.set_var(name, value),
            LValue::Field(index) => {
                let text = self.to_output_string(&value, false);
                self.set_field(index, text);
            }
            LValue::Element(array, key) => self.set_element(array, key, value),
        }
        Ok(())
    }

    /// All getline forms. Returns 1 for a record, 0 at end of input and -1
    /// when the source can't be opened or read.
    fn eval_getline(&mut self, var: Option<&str>, input: Option<&GetlineInput>, position: Position) -> Result<Value> {
        let (name, is_command) = match input {
            None => {
                let Some(record) = self.next_main_record()? else {
                    return Ok(Value::Number(0.0));
                };
                self.nr += 1.0;
                self.fnr += 1.0;
                self.store_getline(var, record)?;
                return Ok(Value::Number(1.0));
            }
            Some(GetlineInput::File(expr)) => (self.eval_expr(expr)?, false),
            Some(GetlineInput::Pipe(expr)) => (self.eval_expr(expr)?, true),
        };
        let name = self.to_output_string(&name, false);

        if !self.input_files.contains_key(&name) {
            // commands may write to our stdout
            if is_command {
                self.output.flush()?;
            }
            let opened = if is_command {
                InputSource::open_command(&name)
            } else {
                InputSource::open_file(&name)
            };
            match opened {
                Ok(source) => {
                    self.input_files.insert(name.clone(), source);
                }
                Err(err) => {
                    tracing::debug!(%name, %err, line = position.line, "getline source failed to open");
                    return Ok(Value::Number(-1.0));
                }
            }
        }

        let record = match self.input_files.get_mut(&name) {
            Some(source) => source.reader.read_record(&self.rs),
            None => return Ok(Value::Number(-1.0)),
        };
        match record {
            Ok(Some(record)) => {
                if is_command {
                    self.nr += 1.0;
                }
                self.store_getline(var, record)?;
                Ok(Value::Number(1.0))
            }
            Ok(None) => Ok(Value::Number(0.0)),
            Err(_) => Ok(Value::Number(-1.0)),
        }
    }

    fn store_getline(&mut self, var: Option<&str>, record: String) -> Result<()> {
        match var {
            Some(name) => self.set_var(name, Value::strnum(record))?,
            None => self.set_record(record),
        }
        Ok(())
    }
}

fn arithmetic(op: BinaryOp, l: f64, r: f64, position: Position) -> Result<f64> {
    Ok(match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return Err(Error::runtime_at("division by zero", position));
            }
            l / r
        }
        BinaryOp::Mod => {
            if r == 0.0 {
                return Err(Error::runtime_at("division by zero in %", position));
            }
            l % r
        }
        _ => l.powf(r),
    })
}
