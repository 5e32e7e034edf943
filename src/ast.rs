use std::fmt::{self, Write as _};

use crate::error::Position;
use crate::value::format_number;

/// A complete AWK program
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub rules: Vec<Rule>,
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A pattern-action rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Option<Pattern>,
    pub action: Option<Block>,
    pub position: Position,
}

/// Pattern types that can trigger a rule
#[derive(Debug, Clone)]
pub enum Pattern {
    /// BEGIN - runs before any input
    Begin,
    /// END - runs after all input
    End,
    /// Expression that evaluates to true/false
    Expr(Expr),
    /// Regex pattern: /pattern/
    Regex(String),
    /// Range pattern: /start/,/end/
    Range {
        start: Box<Pattern>,
        end: Box<Pattern>,
    },
}

/// User-defined function
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Inferred kind of each parameter, filled in after parsing
    pub param_types: Vec<VarType>,
    pub body: Block,
    pub position: Position,
}

/// What a variable was inferred to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarType {
    #[default]
    Unknown,
    Number,
    String,
    Array,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarType::Unknown => "unknown",
            VarType::Number => "number",
            VarType::String => "string",
            VarType::Array => "array",
        })
    }
}

/// A block of statements
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub position: Position,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, position: Position) -> Self {
        Self {
            statements,
            position,
        }
    }
}

/// Statement types
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression statement (e.g., function call, assignment)
    Expr(Expr),

    /// Print statement: print expr, expr, ...
    Print {
        args: Vec<Expr>,
        output: Option<OutputRedirect>,
        position: Position,
    },

    /// Printf statement: printf format, expr, ...
    Printf {
        format: Expr,
        args: Vec<Expr>,
        output: Option<OutputRedirect>,
        position: Position,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        position: Position,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        position: Position,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        position: Position,
    },

    /// For loop (C-style)
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        position: Position,
    },

    /// For-in loop (array iteration)
    ForIn {
        var: String,
        array: String,
        body: Box<Stmt>,
        position: Position,
    },

    Block(Block),

    Break { position: Position },

    Continue { position: Position },

    /// Skip to next record
    Next { position: Position },

    /// Skip to next file
    Nextfile { position: Position },

    Exit {
        code: Option<Expr>,
        position: Position,
    },

    Return {
        value: Option<Expr>,
        position: Position,
    },

    /// delete array[index], or the whole array when `index` is empty
    Delete {
        array: String,
        index: Vec<Expr>,
        position: Position,
    },

    /// Empty statement (just a semicolon)
    Empty,
}

/// Output redirection for print/printf
#[derive(Debug, Clone)]
pub enum OutputRedirect {
    /// > file
    Truncate(Expr),
    /// >> file
    Append(Expr),
    /// | command
    Pipe(Expr),
}

/// Input source for getline
#[derive(Debug, Clone)]
pub enum GetlineInput {
    /// < file
    File(Box<Expr>),
    /// command |
    Pipe(Box<Expr>),
}

/// Expression types
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64, Position),

    String(String, Position),

    Regex(String, Position),

    Var(String, Position),

    /// Field access: $expr
    Field(Box<Expr>, Position),

    /// Array access: arr[index] or arr[i,j]
    ArrayAccess {
        array: String,
        indices: Vec<Expr>,
        position: Position,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        position: Position,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        position: Position,
    },

    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
        position: Position,
    },

    PreIncrement(Box<Expr>, Position),

    PreDecrement(Box<Expr>, Position),

    PostIncrement(Box<Expr>, Position),

    PostDecrement(Box<Expr>, Position),

    /// cond ? then : else
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        position: Position,
    },

    /// Call to a builtin, a user-defined function or a native function
    Call {
        name: String,
        args: Vec<Expr>,
        position: Position,
    },

    /// Array membership: (key) in array
    InArray {
        key: Vec<Expr>,
        array: String,
        position: Position,
    },

    /// expr ~ /regex/ or expr !~ /regex/
    Match {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        position: Position,
    },

    /// Getline as expression (returns status)
    Getline {
        var: Option<String>,
        input: Option<GetlineInput>,
        position: Position,
    },

    /// Grouping parentheses (for precedence)
    Group(Box<Expr>, Position),
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::Number(_, pos)
            | Expr::String(_, pos)
            | Expr::Regex(_, pos)
            | Expr::Var(_, pos)
            | Expr::Field(_, pos)
            | Expr::ArrayAccess { position: pos, .. }
            | Expr::Binary { position: pos, .. }
            | Expr::Unary { position: pos, .. }
            | Expr::Assign { position: pos, .. }
            | Expr::PreIncrement(_, pos)
            | Expr::PreDecrement(_, pos)
            | Expr::PostIncrement(_, pos)
            | Expr::PostDecrement(_, pos)
            | Expr::Ternary { position: pos, .. }
            | Expr::Call { position: pos, .. }
            | Expr::InArray { position: pos, .. }
            | Expr::Match { position: pos, .. }
            | Expr::Getline { position: pos, .. }
            | Expr::Group(_, pos) => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    // Logical
    And,
    Or,

    // String
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Concat => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // -x
    Pos, // +x
    Not, // !x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,    // =
    AddAssign, // +=
    SubAssign, // -=
    MulAssign, // *=
    DivAssign, // /=
    ModAssign, // %=
    PowAssign, // ^=
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
            AssignOp::PowAssign => "^=",
        }
    }
}

// ===== Traversal =====

/// Read-only AST traversal. Override the hooks you care about and call the
/// matching `walk_*` function to keep descending.
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_block<V: Visitor + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.statements {
        v.visit_stmt(stmt);
    }
}

pub fn walk_pattern<V: Visitor + ?Sized>(v: &mut V, pattern: &Pattern) {
    match pattern {
        Pattern::Expr(expr) => v.visit_expr(expr),
        Pattern::Range { start, end } => {
            walk_pattern(v, start);
            walk_pattern(v, end);
        }
        Pattern::Begin | Pattern::End | Pattern::Regex(_) => {}
    }
}

fn walk_redirect<V: Visitor + ?Sized>(v: &mut V, redirect: &Option<OutputRedirect>) {
    if let Some(OutputRedirect::Truncate(e) | OutputRedirect::Append(e) | OutputRedirect::Pipe(e)) =
        redirect
    {
        v.visit_expr(e);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(expr) => v.visit_expr(expr),
        Stmt::Print { args, output, .. } => {
            args.iter().for_each(|a| v.visit_expr(a));
            walk_redirect(v, output);
        }
        Stmt::Printf {
            format,
            args,
            output,
            ..
        } => {
            v.visit_expr(format);
            args.iter().for_each(|a| v.visit_expr(a));
            walk_redirect(v, output);
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            v.visit_expr(condition);
            v.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                v.visit_stmt(else_branch);
            }
        }
        Stmt::While {
            condition, body, ..
        }
        | Stmt::DoWhile {
            body, condition, ..
        } => {
            v.visit_expr(condition);
            v.visit_stmt(body);
        }
        Stmt::For {
            init,
            condition,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                v.visit_stmt(init);
            }
            if let Some(condition) = condition {
                v.visit_expr(condition);
            }
            if let Some(update) = update {
                v.visit_expr(update);
            }
            v.visit_stmt(body);
        }
        Stmt::ForIn { body, .. } => v.visit_stmt(body),
        Stmt::Block(block) => walk_block(v, block),
        Stmt::Exit { code: value, .. } | Stmt::Return { value, .. } => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        Stmt::Delete { index, .. } => index.iter().for_each(|e| v.visit_expr(e)),
        Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::Next { .. }
        | Stmt::Nextfile { .. }
        | Stmt::Empty => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Number(..) | Expr::String(..) | Expr::Regex(..) | Expr::Var(..) => {}
        Expr::Field(inner, _)
        | Expr::PreIncrement(inner, _)
        | Expr::PreDecrement(inner, _)
        | Expr::PostIncrement(inner, _)
        | Expr::PostDecrement(inner, _)
        | Expr::Group(inner, _) => v.visit_expr(inner),
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::ArrayAccess { indices, .. } => indices.iter().for_each(|e| v.visit_expr(e)),
        Expr::InArray { key, .. } => key.iter().for_each(|e| v.visit_expr(e)),
        Expr::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        Expr::Assign { target, value, .. } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            v.visit_expr(condition);
            v.visit_expr(then_expr);
            v.visit_expr(else_expr);
        }
        Expr::Call { args, .. } => args.iter().for_each(|e| v.visit_expr(e)),
        Expr::Match { expr, pattern, .. } => {
            v.visit_expr(expr);
            v.visit_expr(pattern);
        }
        Expr::Getline { input, .. } => match input {
            Some(GetlineInput::File(e) | GetlineInput::Pipe(e)) => v.visit_expr(e),
            None => {}
        },
    }
}

// ===== Printing =====
//
// The -d debug dump prints the program back as AWK source. Binary
// operations are fully parenthesized so the tree shape is visible.

const INDENT: &str = "    ";

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for func in &self.functions {
            if !first {
                f.write_char('\n')?;
            }
            first = false;
            write!(f, "function {}({}) ", func.name, func.params.join(", "))?;
            fmt_block(f, &func.body, 0)?;
            f.write_char('\n')?;
        }
        for rule in &self.rules {
            if !first {
                f.write_char('\n')?;
            }
            first = false;
            if let Some(pattern) = &rule.pattern {
                write!(f, "{}", pattern)?;
                if rule.action.is_some() {
                    f.write_char(' ')?;
                }
            }
            if let Some(action) = &rule.action {
                fmt_block(f, action, 0)?;
            }
            f.write_char('\n')?;
        }
        Ok(())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Begin => f.write_str("BEGIN"),
            Pattern::End => f.write_str("END"),
            Pattern::Expr(expr) => write!(f, "{}", expr),
            Pattern::Regex(re) => fmt_regex(f, re),
            Pattern::Range { start, end } => write!(f, "{}, {}", start, end),
        }
    }
}

fn fmt_block(f: &mut fmt::Formatter<'_>, block: &Block, indent: usize) -> fmt::Result {
    f.write_str("{\n")?;
    for stmt in &block.statements {
        fmt_stmt(f, stmt, indent + 1)?;
    }
    write!(f, "{}}}", INDENT.repeat(indent))
}

/// Bodies of control statements always print as braced blocks.
fn fmt_body(f: &mut fmt::Formatter<'_>, body: &Stmt, indent: usize) -> fmt::Result {
    match body {
        Stmt::Block(block) => fmt_block(f, block, indent),
        other => {
            f.write_str("{\n")?;
            fmt_stmt(f, other, indent + 1)?;
            write!(f, "{}}}", INDENT.repeat(indent))
        }
    }
}

fn fmt_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, indent: usize) -> fmt::Result {
    let pad = INDENT.repeat(indent);
    f.write_str(&pad)?;
    match stmt {
        Stmt::Expr(expr) => write!(f, "{}", expr)?,
        Stmt::Print { args, output, .. } => {
            f.write_str("print")?;
            if !args.is_empty() {
                write!(f, " {}", CommaList(args))?;
            }
            fmt_redirect(f, output)?;
        }
        Stmt::Printf {
            format,
            args,
            output,
            ..
        } => {
            write!(f, "printf {}", format)?;
            for arg in args {
                write!(f, ", {}", arg)?;
            }
            fmt_redirect(f, output)?;
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            write!(f, "if ({}) ", condition)?;
            fmt_body(f, then_branch, indent)?;
            if let Some(else_branch) = else_branch {
                f.write_str(" else ")?;
                fmt_body(f, else_branch, indent)?;
            }
        }
        Stmt::While {
            condition, body, ..
        } => {
            write!(f, "while ({}) ", condition)?;
            fmt_body(f, body, indent)?;
        }
        Stmt::DoWhile {
            body, condition, ..
        } => {
            f.write_str("do ")?;
            fmt_body(f, body, indent)?;
            write!(f, " while ({})", condition)?;
        }
        Stmt::For {
            init,
            condition,
            update,
            body,
            ..
        } => {
            f.write_str("for (")?;
            if let Some(Stmt::Expr(init)) = init.as_deref() {
                write!(f, "{}", init)?;
            }
            f.write_str("; ")?;
            if let Some(condition) = condition {
                write!(f, "{}", condition)?;
            }
            f.write_str("; ")?;
            if let Some(update) = update {
                write!(f, "{}", update)?;
            }
            f.write_str(") ")?;
            fmt_body(f, body, indent)?;
        }
        Stmt::ForIn {
            var, array, body, ..
        } => {
            write!(f, "for ({} in {}) ", var, array)?;
            fmt_body(f, body, indent)?;
        }
        Stmt::Block(block) => fmt_block(f, block, indent)?,
        Stmt::Break { .. } => f.write_str("break")?,
        Stmt::Continue { .. } => f.write_str("continue")?,
        Stmt::Next { .. } => f.write_str("next")?,
        Stmt::Nextfile { .. } => f.write_str("nextfile")?,
        Stmt::Exit { code, .. } => {
            f.write_str("exit")?;
            if let Some(code) = code {
                write!(f, " {}", code)?;
            }
        }
        Stmt::Return { value, .. } => {
            f.write_str("return")?;
            if let Some(value) = value {
                write!(f, " {}", value)?;
            }
        }
        Stmt::Delete { array, index, .. } => {
            write!(f, "delete {}", array)?;
            if !index.is_empty() {
                write!(f, "[{}]", CommaList(index))?;
            }
        }
        Stmt::Empty => f.write_char(';')?,
    }
    f.write_char('\n')
}

fn fmt_redirect(f: &mut fmt::Formatter<'_>, redirect: &Option<OutputRedirect>) -> fmt::Result {
    match redirect {
        Some(OutputRedirect::Truncate(e)) => write!(f, " > {}", e),
        Some(OutputRedirect::Append(e)) => write!(f, " >> {}", e),
        Some(OutputRedirect::Pipe(e)) => write!(f, " | {}", e),
        None => Ok(()),
    }
}

fn fmt_regex(f: &mut fmt::Formatter<'_>, re: &str) -> fmt::Result {
    write!(f, "/{}/", re.replace('/', "\\/"))
}

struct CommaList<'a>(&'a [Expr]);

impl fmt::Display for CommaList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n, _) => f.write_str(&format_number(*n, "%.6g")),
            Expr::String(s, _) => {
                f.write_char('"')?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            }
            Expr::Regex(re, _) => fmt_regex(f, re),
            Expr::Var(name, _) => f.write_str(name),
            Expr::Field(index, _) => write!(f, "${}", index),
            Expr::ArrayAccess { array, indices, .. } => {
                write!(f, "{}[{}]", array, CommaList(indices))
            }
            Expr::Binary {
                left,
                op: BinaryOp::Concat,
                right,
                ..
            } => write!(f, "({} {})", left, right),
            Expr::Binary {
                left, op, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Unary { op, operand, .. } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    UnaryOp::Not => "!",
                };
                write!(f, "{}{}", symbol, operand)
            }
            Expr::Assign {
                target, op, value, ..
            } => write!(f, "{} {} {}", target, op.symbol(), value),
            Expr::PreIncrement(e, _) => write!(f, "++{}", e),
            Expr::PreDecrement(e, _) => write!(f, "--{}", e),
            Expr::PostIncrement(e, _) => write!(f, "{}++", e),
            Expr::PostDecrement(e, _) => write!(f, "{}--", e),
            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => write!(f, "({} ? {} : {})", condition, then_expr, else_expr),
            Expr::Call { name, args, .. } => write!(f, "{}({})", name, CommaList(args)),
            Expr::InArray { key, array, .. } if key.len() == 1 => {
                write!(f, "({} in {})", key[0], array)
            }
            Expr::InArray { key, array, .. } => write!(f, "(({}) in {})", CommaList(key), array),
            Expr::Match {
                expr,
                pattern,
                negated,
                ..
            } => {
                let op = if *negated { "!~" } else { "~" };
                write!(f, "({} {} {})", expr, op, pattern)
            }
            Expr::Getline { var, input, .. } => {
                if let Some(GetlineInput::Pipe(cmd)) = input {
                    write!(f, "{} | ", cmd)?;
                }
                f.write_str("getline")?;
                if let Some(var) = var {
                    write!(f, " {}", var)?;
                }
                if let Some(GetlineInput::File(file)) = input {
                    write!(f, " < {}", file)?;
                }
                Ok(())
            }
            Expr::Group(inner, _) => write!(f, "({})", inner),
        }
    }
}
