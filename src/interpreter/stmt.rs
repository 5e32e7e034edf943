use std::io::Write;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::format::sprintf;
use crate::value::Value;

use super::{Interpreter, OutputFile};

/// Result of executing a statement
pub enum StmtResult {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Interpreter<'_> {
    pub(crate) fn execute_block(&mut self, block: &Block) -> Result<StmtResult> {
        for stmt in &block.statements {
            match self.execute_stmt(stmt)? {
                StmtResult::Normal if !self.unwinding() => continue,
                StmtResult::Normal => return Ok(StmtResult::Normal),
                other => return Ok(other),
            }
        }
        Ok(StmtResult::Normal)
    }

    /// Runs a loop body. `None` means keep looping; `Some` carries what the
    /// loop itself should return.
    fn loop_body(&mut self, body: &Stmt) -> Result<Option<StmtResult>> {
        match self.execute_stmt(body)? {
            StmtResult::Normal | StmtResult::Continue if !self.unwinding() => Ok(None),
            StmtResult::Normal | StmtResult::Continue | StmtResult::Break => Ok(Some(StmtResult::Normal)),
            ret @ StmtResult::Return(_) => Ok(Some(ret)),
        }
    }

    pub(crate) fn execute_stmt(&mut self, stmt: &Stmt) -> Result<StmtResult> {
        match stmt {
            Stmt::Empty => Ok(StmtResult::Normal),

            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(StmtResult::Normal)
            }

            Stmt::Print { args, output, .. } => {
                self.execute_print(args, output.as_ref())?;
                Ok(StmtResult::Normal)
            }

            Stmt::Printf {
                format,
                args,
                output,
                position,
            } => {
                let format = self.eval_expr(format)?.to_string_val();
                let values = self.eval_args(args)?;
                let text = sprintf(&format, &values).map_err(|e| e.at(*position))?;
                self.write_output(output.as_ref(), &text)?;
                Ok(StmtResult::Normal)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.execute_stmt(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute_stmt(else_stmt)
                } else {
                    Ok(StmtResult::Normal)
                }
            }

            Stmt::While { condition, body, .. } => {
                while self.eval_expr(condition)?.is_truthy() {
                    if let Some(result) = self.loop_body(body)? {
                        return Ok(result);
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::DoWhile { body, condition, .. } => {
                loop {
                    if let Some(result) = self.loop_body(body)? {
                        return Ok(result);
                    }
                    if !self.eval_expr(condition)?.is_truthy() {
                        break;
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.execute_stmt(init)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !self.eval_expr(condition)?.is_truthy() {
                            break;
                        }
                    }
                    if let Some(result) = self.loop_body(body)? {
                        return Ok(result);
                    }
                    if let Some(update) = update {
                        self.eval_expr(update)?;
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::ForIn {
                var, array, body, ..
            } => {
                // Iterate over a snapshot; the body may add or delete keys.
                for key in self.array_keys(array) {
                    if !self.has_element(array, &key) {
                        continue;
                    }
                    self.set_var(var, Value::strnum(key))?;
                    if let Some(result) = self.loop_body(body)? {
                        return Ok(result);
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::Block(block) => self.execute_block(block),

            Stmt::Break { .. } => Ok(StmtResult::Break),

            Stmt::Continue { .. } => Ok(StmtResult::Continue),

            Stmt::Next { .. } => {
                self.should_next = true;
                Ok(StmtResult::Normal)
            }

            Stmt::Nextfile { .. } => {
                self.should_nextfile = true;
                Ok(StmtResult::Normal)
            }

            Stmt::Exit { code, .. } => {
                if let Some(code) = code {
                    self.exit_code = self.eval_expr(code)?.to_number() as i32;
                }
                self.should_exit = true;
                Ok(StmtResult::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Uninitialized,
                };
                Ok(StmtResult::Return(value))
            }

            Stmt::Delete { array, index, .. } => {
                if index.is_empty() {
                    self.delete_element(array, None);
                } else {
                    let values = self.eval_args(index)?;
                    let key = self.array_key(&values);
                    self.delete_element(array, Some(&key));
                }
                Ok(StmtResult::Normal)
            }
        }
    }

    fn execute_print(&mut self, args: &[Expr], redirect: Option<&OutputRedirect>) -> Result<()> {
        let mut line = if args.is_empty() {
            self.record.clone()
        } else {
            let mut parts = Vec::with_capacity(args.len());
            for arg in args {
                let value = self.eval_expr(arg)?;
                parts.push(self.to_output_string(&value, true));
            }
            parts.join(&self.ofs)
        };
        line.push_str(&self.ors);
        self.write_output(redirect, &line)
    }

    pub(crate) fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval_expr(arg)).collect()
    }

    /// Writes to the main output or to a redirect target, opening the
    /// target on first use. Later writes to the same name reuse the stream.
    fn write_output(&mut self, redirect: Option<&OutputRedirect>, text: &str) -> Result<()> {
        let (target, append, pipe) = match redirect {
            None => return Ok(self.output.write_all(text.as_bytes())?),
            Some(OutputRedirect::Truncate(expr)) => (expr, false, false),
            Some(OutputRedirect::Append(expr)) => (expr, true, false),
            Some(OutputRedirect::Pipe(expr)) => (expr, false, true),
        };
        let name = self.eval_expr(target)?.to_string_val();

        if !pipe && (name == "/dev/stdout" || name == "-") {
            return Ok(self.output.write_all(text.as_bytes())?);
        }

        if !self.output_files.contains_key(&name) {
            let opened = if pipe {
                // the command may write to our stdout too
                self.output.flush()?;
                OutputFile::open_pipe(&name)
            } else {
                OutputFile::open_file(&name, append)
            };
            let file = opened.map_err(|e| {
                let what = if pipe { "open pipe" } else { "open file" };
                Error::runtime_at(format!("can't {} {}: {}", what, name, e), target.position())
            })?;
            self.output_files.insert(name.clone(), file);
        }

        if let Some(file) = self.output_files.get_mut(&name) {
            file.write_all(text.as_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::funcs::FunctionTable;
    use crate::interpreter::{exec_program, ExecConfig};
    use crate::parser::{parse_program, ParseConfig};

    fn run(src: &str) -> String {
        let funcs = FunctionTable::new();
        let mut config = ParseConfig::new(&funcs);
        let program = parse_program(src.as_bytes(), &mut config).unwrap();
        let mut output = Vec::new();
        {
            let mut exec = ExecConfig::new(&funcs);
            exec.stdin = Some(Box::new(&b""[..]));
            exec.output = Some(Box::new(&mut output));
            exec_program(&program, exec).unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_return_from_nested_loops() {
        let out = run(
            "function find(n,   i, j) { for (i = 1; i < 10; i++) for (j = 1; j < 10; j++) if (i * j == n) return i \"x\" j }
             BEGIN { print find(12) }",
        );
        assert_eq!(out, "2x6\n");
    }

    #[test]
    fn test_exit_stops_loop() {
        let out = run("BEGIN { while (1) { n++; if (n == 3) exit; print n } }");
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn test_for_in_delete_during_loop() {
        let out = run("BEGIN { a[1]; a[2]; a[3]; for (k in a) { delete a[3]; print k } }");
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn test_ors_and_ofs() {
        let out = run("BEGIN { OFS = \"-\"; ORS = \"|\"; print 1, 2; print \"x\" }");
        assert_eq!(out, "1-2|x|");
    }

    #[test]
    fn test_redirect_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path = path.to_string_lossy().replace('\\', "/");
        let out = run(&format!(
            "BEGIN {{ f = \"{p}\"; print \"one\" > f; print \"two\" > f; close(f); print \"three\" >> f; close(f); while ((getline line < f) > 0) print \"got\", line }}",
            p = path
        ));
        assert_eq!(out, "got one\ngot two\ngot three\n");
    }

    #[test]
    fn test_print_to_stdout_name() {
        let out = run("BEGIN { print \"a\" > \"/dev/stdout\"; printf \"%s\\n\", \"b\" > \"-\" }");
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn test_pipe_output_closes_with_status() {
        let out = run("BEGIN { print \"x\" | \"cat > /dev/null; exit 3\"; print close(\"cat > /dev/null; exit 3\") }");
        assert_eq!(out, "3\n");
    }
}
