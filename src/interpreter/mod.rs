mod builtins;
mod expr;
mod io;
mod stmt;

use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};

use regex::Regex;
use tracing::{debug, trace};

use crate::ast::*;
use crate::error::{Error, Result};
use crate::funcs::FunctionTable;
use crate::lexer::unescape;
use crate::value::{format_number, Value};

use io::{InputSource, OutputFile, RecordReader};

/// Execution-time settings.
pub struct ExecConfig<'a> {
    /// Native functions callable from the program; must be the table the
    /// program was parsed with.
    pub funcs: &'a FunctionTable,
    /// ARGV[0]
    pub argv0: String,
    /// ARGV[1..]: input files and `name=value` operands
    pub args: Vec<String>,
    /// Assignments applied in order before BEGIN
    pub vars: Vec<(String, String)>,
    /// Replaces the process's standard input
    pub stdin: Option<Box<dyn Read + 'a>>,
    /// Replaces the process's standard output
    pub output: Option<Box<dyn Write + 'a>>,
}

impl<'a> ExecConfig<'a> {
    pub fn new(funcs: &'a FunctionTable) -> Self {
        Self {
            funcs,
            argv0: "tawk".to_string(),
            args: Vec::new(),
            vars: Vec::new(),
            stdin: None,
            output: None,
        }
    }
}

/// Runs a parsed program to completion and returns its exit status.
pub fn exec_program<'a>(program: &'a Program, config: ExecConfig<'a>) -> Result<i32> {
    let mut interpreter = Interpreter::new(program, config)?;
    interpreter.run()
}

/// Deepest allowed nesting of user function calls
const MAX_CALL_DEPTH: usize = 1000;

/// Highest field number a program may address or set NF to
pub(crate) const MAX_FIELD: usize = 1 << 20;

/// A function parameter's storage
enum Local {
    Scalar(Value),
    Array(HashMap<String, Value>),
    /// An array passed by the caller
    Ref(ArraySlot),
}

/// Where an array lives
#[derive(Clone)]
enum ArraySlot {
    Global(String),
    /// (frame depth, parameter index)
    Local(usize, usize),
}

struct Frame<'a> {
    func: &'a FunctionDef,
    locals: Vec<Local>,
}

/// The AWK interpreter runtime
pub struct Interpreter<'a> {
    program: &'a Program,
    funcs: &'a FunctionTable,
    functions: HashMap<&'a str, &'a FunctionDef>,

    /// Global scalars, including ARGC
    globals: HashMap<String, Value>,
    /// Global arrays, including ARGV and ENVIRON
    arrays: HashMap<String, HashMap<String, Value>>,
    /// Active user function calls
    frames: Vec<Frame<'a>>,

    fs: String,
    ofs: String,
    rs: String,
    ors: String,
    ofmt: String,
    convfmt: String,
    subsep: String,

    /// Current record ($0)
    record: String,
    /// Current fields ($1, $2, ...)
    fields: Vec<String>,
    nr: f64,
    fnr: f64,
    filename: String,
    rstart: f64,
    rlength: f64,

    should_exit: bool,
    exit_code: i32,
    should_next: bool,
    should_nextfile: bool,

    output: BufWriter<Box<dyn Write + 'a>>,
    output_files: HashMap<String, OutputFile>,
    input_files: HashMap<String, InputSource<'a>>,

    /// Main input: the open operand, if any
    input: Option<RecordReader<'a>>,
    stdin: Option<Box<dyn Read + 'a>>,
    /// Next ARGV index to look at for input operands
    next_arg: usize,
    opened_operand: bool,

    regex_cache: HashMap<String, Regex>,
    range_active: Vec<bool>,

    rand_seed: f64,
    rand_state: u64,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, config: ExecConfig<'a>) -> Result<Self> {
        let functions = program
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        let mut argv = HashMap::new();
        argv.insert("0".to_string(), Value::strnum(config.argv0));
        for (i, arg) in config.args.iter().enumerate() {
            argv.insert((i + 1).to_string(), Value::strnum(arg.clone()));
        }
        let environ = std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    Value::strnum(v.to_string_lossy().into_owned()),
                )
            })
            .collect();

        let mut arrays = HashMap::new();
        arrays.insert("ARGV".to_string(), argv);
        arrays.insert("ENVIRON".to_string(), environ);

        let mut globals = HashMap::new();
        globals.insert("ARGC".to_string(), Value::Number((config.args.len() + 1) as f64));

        let output: Box<dyn Write + 'a> = match config.output {
            Some(output) => output,
            None => Box::new(std::io::stdout()),
        };

        let mut interpreter = Self {
            program,
            funcs: config.funcs,
            functions,
            globals,
            arrays,
            frames: Vec::new(),
            fs: " ".to_string(),
            ofs: " ".to_string(),
            rs: "\n".to_string(),
            ors: "\n".to_string(),
            ofmt: "%.6g".to_string(),
            convfmt: "%.6g".to_string(),
            subsep: "\x1c".to_string(),
            record: String::new(),
            fields: Vec::new(),
            nr: 0.0,
            fnr: 0.0,
            filename: String::new(),
            rstart: 0.0,
            rlength: -1.0,
            should_exit: false,
            exit_code: 0,
            should_next: false,
            should_nextfile: false,
            output: BufWriter::new(output),
            output_files: HashMap::new(),
            input_files: HashMap::new(),
            input: None,
            stdin: config.stdin,
            next_arg: 1,
            opened_operand: false,
            regex_cache: HashMap::new(),
            range_active: vec![false; program.rules.len()],
            rand_seed: 0.0,
            rand_state: seed_state(0.0),
        };

        for (name, value) in config.vars {
            interpreter.assign_operand(&name, &value)?;
        }
        Ok(interpreter)
    }

    /// Runs BEGIN, the main input loop and END, then flushes all output.
    pub fn run(&mut self) -> Result<i32> {
        let result = self.run_rules();
        let flushed = self.close_all();
        result?;
        flushed?;
        debug!(status = self.exit_code, records = self.nr, "program finished");
        Ok(self.exit_code)
    }

    fn run_rules(&mut self) -> Result<()> {
        let program = self.program;

        for rule in &program.rules {
            if let (Some(Pattern::Begin), Some(action)) = (&rule.pattern, &rule.action) {
                self.execute_block(action)?;
                if self.should_exit {
                    break;
                }
            }
        }

        let reads_input = program
            .rules
            .iter()
            .any(|r| !matches!(r.pattern, Some(Pattern::Begin)));
        if reads_input && !self.should_exit {
            self.main_loop()?;
        }

        // exit in BEGIN or a main rule still runs END; exit in END stops it
        self.should_exit = false;
        for rule in &program.rules {
            if let (Some(Pattern::End), Some(action)) = (&rule.pattern, &rule.action) {
                self.execute_block(action)?;
                if self.should_exit {
                    break;
                }
            }
        }
        Ok(())
    }

    fn main_loop(&mut self) -> Result<()> {
        let program = self.program;
        let has_main_rules = program
            .rules
            .iter()
            .any(|r| !matches!(r.pattern, Some(Pattern::Begin | Pattern::End)));

        while let Some(record) = self.next_main_record()? {
            self.nr += 1.0;
            self.fnr += 1.0;
            self.set_record(record);
            if !has_main_rules {
                continue;
            }

            for (idx, rule) in program.rules.iter().enumerate() {
                if matches!(rule.pattern, Some(Pattern::Begin | Pattern::End)) {
                    continue;
                }
                if !self.rule_matches(rule.pattern.as_ref(), idx)? {
                    continue;
                }
                match &rule.action {
                    Some(action) => {
                        self.execute_block(action)?;
                    }
                    None => {
                        let line = format!("{}{}", self.record, self.ors);
                        self.output.write_all(line.as_bytes())?;
                    }
                }
                if self.should_next || self.should_nextfile || self.should_exit {
                    break;
                }
            }

            self.should_next = false;
            if self.should_nextfile {
                self.should_nextfile = false;
                self.input = None;
            }
            if self.should_exit {
                break;
            }
        }
        Ok(())
    }

    fn rule_matches(&mut self, pattern: Option<&Pattern>, idx: usize) -> Result<bool> {
        let Some(pattern) = pattern else {
            return Ok(true);
        };
        match pattern {
            Pattern::Begin | Pattern::End => Ok(false),
            Pattern::Range { start, end } => {
                if self.range_active[idx] {
                    if self.rule_matches(Some(end.as_ref()), idx)? {
                        self.range_active[idx] = false;
                    }
                    return Ok(true);
                }
                if !self.rule_matches(Some(start.as_ref()), idx)? {
                    return Ok(false);
                }
                // the end pattern may close the range on the same record
                if !self.rule_matches(Some(end.as_ref()), idx)? {
                    self.range_active[idx] = true;
                }
                Ok(true)
            }
            Pattern::Expr(expr) => Ok(self.eval_expr(expr)?.is_truthy()),
            Pattern::Regex(re) => {
                let re = self.get_regex(re)?;
                Ok(re.is_match(&self.record))
            }
        }
    }

    // ===== Main input =====

    /// The next record from ARGV operands, or stdin when there are none.
    pub(crate) fn next_main_record(&mut self) -> Result<Option<String>> {
        loop {
            if self.input.is_none() && !self.open_next_input()? {
                return Ok(None);
            }
            if let Some(input) = self.input.as_mut() {
                match input.read_record(&self.rs)? {
                    Some(record) => return Ok(Some(record)),
                    None => self.input = None,
                }
            }
        }
    }

    fn open_next_input(&mut self) -> Result<bool> {
        loop {
            let argc = self.get_var("ARGC").to_number();
            if (self.next_arg as f64) >= argc {
                break;
            }
            let key = self.next_arg.to_string();
            self.next_arg += 1;

            let Some(arg) = self.arrays.get("ARGV").and_then(|a| a.get(&key)) else {
                continue;
            };
            let arg = arg.to_string_val();
            if arg.is_empty() {
                continue;
            }
            if let Some((name, value)) = split_assignment(&arg) {
                self.assign_operand(name, value)?;
                continue;
            }

            trace!(file = %arg, "opening input");
            self.input = Some(if arg == "-" {
                self.stdin_reader()
            } else {
                let file = std::fs::File::open(&arg)
                    .map_err(|_| Error::runtime(format!("can't open file {}", arg)))?;
                RecordReader::new(BufReader::new(file))
            });
            self.opened_operand = true;
            self.filename = arg;
            self.fnr = 0.0;
            return Ok(true);
        }

        if self.opened_operand {
            return Ok(false);
        }
        self.opened_operand = true;
        self.input = Some(self.stdin_reader());
        self.fnr = 0.0;
        Ok(true)
    }

    fn stdin_reader(&mut self) -> RecordReader<'a> {
        match self.stdin.take() {
            Some(stdin) => RecordReader::new(BufReader::new(stdin)),
            None => RecordReader::new(BufReader::new(std::io::stdin())),
        }
    }

    /// `name=value` from -v or an ARGV operand; the value gets escape
    /// processing and is a strnum.
    fn assign_operand(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_var(name, Value::strnum(unescape(value)))
    }

    // ===== Records and fields =====

    pub(crate) fn set_record(&mut self, record: String) {
        self.record = record;
        self.split_record();
    }

    fn split_record(&mut self) {
        self.fields.clear();
        if self.record.is_empty() {
            return;
        }

        if self.fs == " " {
            self.fields
                .extend(self.record.split([' ', '\t', '\n']).filter(|s| !s.is_empty()).map(String::from));
            return;
        }

        let record = std::mem::take(&mut self.record);
        // In paragraph mode newline separates fields whatever FS is.
        if self.rs.is_empty() {
            for line in record.split('\n') {
                let fields = self.split_text(line);
                self.fields.extend(fields);
            }
        } else {
            self.fields = self.split_text(&record);
        }
        self.record = record;
    }

    /// Splits `text` on a non-default FS.
    fn split_text(&mut self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.fs.chars().count() == 1 && self.fs != "\\" {
            return text.split(self.fs.as_str()).map(String::from).collect();
        }
        let fs = self.fs.clone();
        match self.get_regex(&fs) {
            Ok(re) => re.split(text).map(String::from).collect(),
            // an FS that isn't a valid regex splits literally
            Err(_) => text.split(fs.as_str()).map(String::from).collect(),
        }
    }

    pub(crate) fn get_field(&self, index: usize) -> Value {
        if index == 0 {
            Value::strnum(self.record.clone())
        } else {
            self.fields
                .get(index - 1)
                .map(|f| Value::strnum(f.clone()))
                .unwrap_or(Value::Uninitialized)
        }
    }

    pub(crate) fn set_field(&mut self, index: usize, value: String) {
        if index == 0 {
            self.set_record(value);
            return;
        }
        if self.fields.len() < index {
            self.fields.resize(index, String::new());
        }
        self.fields[index - 1] = value;
        self.rebuild_record();
    }

    fn set_nf(&mut self, nf: f64) -> Result<()> {
        if nf > MAX_FIELD as f64 {
            return Err(Error::runtime(format!("NF set to too large a value: {}", nf)));
        }
        let nf = if nf > 0.0 { nf as usize } else { 0 };
        self.fields.resize(nf, String::new());
        self.rebuild_record();
        Ok(())
    }

    fn rebuild_record(&mut self) {
        self.record = self.fields.join(&self.ofs);
    }

    // ===== Variables =====

    fn local_index(&self, name: &str) -> Option<usize> {
        self.frames
            .last()
            .and_then(|frame| frame.func.params.iter().position(|p| p == name))
    }

    pub(crate) fn get_var(&self, name: &str) -> Value {
        if let Some(i) = self.local_index(name) {
            return match self.frames.last().map(|f| &f.locals[i]) {
                Some(Local::Scalar(value)) => value.clone(),
                _ => Value::Uninitialized,
            };
        }
        match name {
            "NF" => Value::Number(self.fields.len() as f64),
            "NR" => Value::Number(self.nr),
            "FNR" => Value::Number(self.fnr),
            "FS" => Value::Str(self.fs.clone()),
            "OFS" => Value::Str(self.ofs.clone()),
            "RS" => Value::Str(self.rs.clone()),
            "ORS" => Value::Str(self.ors.clone()),
            "OFMT" => Value::Str(self.ofmt.clone()),
            "CONVFMT" => Value::Str(self.convfmt.clone()),
            "SUBSEP" => Value::Str(self.subsep.clone()),
            "FILENAME" => Value::Str(self.filename.clone()),
            "RSTART" => Value::Number(self.rstart),
            "RLENGTH" => Value::Number(self.rlength),
            _ => self.globals.get(name).cloned().unwrap_or_default(),
        }
    }

    pub(crate) fn set_var(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(i) = self.local_index(name) {
            if let Some(frame) = self.frames.last_mut() {
                frame.locals[i] = Local::Scalar(value);
            }
            return Ok(());
        }
        match name {
            "NF" => self.set_nf(value.to_number())?,
            "NR" => self.nr = value.to_number(),
            "FNR" => self.fnr = value.to_number(),
            "FS" => self.fs = self.to_output_string(&value, false),
            "OFS" => self.ofs = self.to_output_string(&value, false),
            "RS" => self.rs = self.to_output_string(&value, false),
            "ORS" => self.ors = self.to_output_string(&value, false),
            "OFMT" => self.ofmt = self.to_output_string(&value, false),
            "CONVFMT" => self.convfmt = self.to_output_string(&value, false),
            "SUBSEP" => self.subsep = self.to_output_string(&value, false),
            "FILENAME" => self.filename = self.to_output_string(&value, false),
            "RSTART" => self.rstart = value.to_number(),
            "RLENGTH" => self.rlength = value.to_number(),
            _ => {
                self.globals.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// String form of a value: OFMT for output, CONVFMT otherwise.
    pub(crate) fn to_output_string(&self, value: &Value, output: bool) -> String {
        match value {
            Value::Number(n) => format_number(*n, if output { &self.ofmt } else { &self.convfmt }),
            other => other.to_string_val(),
        }
    }

    // ===== Arrays =====

    fn array_slot(&self, name: &str) -> ArraySlot {
        if let Some(i) = self.local_index(name) {
            let depth = self.frames.len() - 1;
            return match &self.frames[depth].locals[i] {
                Local::Ref(slot) => slot.clone(),
                _ => ArraySlot::Local(depth, i),
            };
        }
        ArraySlot::Global(name.to_string())
    }

    fn array(&self, name: &str) -> Option<&HashMap<String, Value>> {
        match self.array_slot(name) {
            ArraySlot::Global(name) => self.arrays.get(&name),
            ArraySlot::Local(depth, i) => match &self.frames[depth].locals[i] {
                Local::Array(map) => Some(map),
                _ => None,
            },
        }
    }

    fn array_mut(&mut self, name: &str) -> &mut HashMap<String, Value> {
        match self.array_slot(name) {
            ArraySlot::Global(name) => self.arrays.entry(name).or_default(),
            ArraySlot::Local(depth, i) => {
                let local = &mut self.frames[depth].locals[i];
                if !matches!(local, Local::Array(_)) {
                    *local = Local::Array(HashMap::new());
                }
                match local {
                    Local::Array(map) => map,
                    _ => unreachable!("local was just made an array"),
                }
            }
        }
    }

    pub(crate) fn is_array(&self, name: &str) -> bool {
        match self.local_index(name) {
            Some(i) => self
                .frames
                .last()
                .is_some_and(|f| matches!(f.locals[i], Local::Array(_) | Local::Ref(_))),
            None => self.arrays.contains_key(name),
        }
    }

    /// Reading a missing element creates it, as in other AWKs.
    pub(crate) fn touch_element(&mut self, array: &str, key: &str) -> Value {
        self.array_mut(array)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    pub(crate) fn set_element(&mut self, array: &str, key: String, value: Value) {
        self.array_mut(array).insert(key, value);
    }

    pub(crate) fn has_element(&self, array: &str, key: &str) -> bool {
        self.array(array).is_some_and(|a| a.contains_key(key))
    }

    pub(crate) fn delete_element(&mut self, array: &str, key: Option<&str>) {
        let array = self.array_mut(array);
        match key {
            Some(key) => {
                array.remove(key);
            }
            None => array.clear(),
        }
    }

    /// Keys in a stable order: numeric keys ascending, then the rest.
    pub(crate) fn array_keys(&self, array: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .array(array)
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });
        keys
    }

    pub(crate) fn array_key(&self, indices: &[Value]) -> String {
        let parts: Vec<String> = indices
            .iter()
            .map(|v| self.to_output_string(v, false))
            .collect();
        parts.join(&self.subsep)
    }

    // ===== Regexes =====

    pub(crate) fn get_regex(&mut self, pattern: &str) -> Result<Regex> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        self.regex_cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    // ===== Control flow =====

    /// True while `next`, `nextfile` or `exit` unwinds the current rule.
    pub(crate) fn unwinding(&self) -> bool {
        self.should_exit || self.should_next || self.should_nextfile
    }

    fn close_all(&mut self) -> Result<()> {
        self.output.flush()?;
        for (_, file) in self.output_files.drain() {
            file.close()?;
        }
        for (_, input) in self.input_files.drain() {
            input.close()?;
        }
        Ok(())
    }
}

/// Splits an operand like `name=value`; the name must be an identifier.
fn split_assignment(arg: &str) -> Option<(&str, &str)> {
    let (name, value) = arg.split_once('=')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, value))
}

fn seed_state(seed: f64) -> u64 {
    // splitmix64 of the seed bits, never zero for xorshift
    let mut z = seed.to_bits().wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) | 1
}
