//! Function namespaces: the AWK builtins known to the parser, and the table of
//! native functions the host injects into both parsing and execution.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(want) => n == want,
            Arity::AtLeast(min) => n >= min,
            Arity::Range(min, max) => (min..=max).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
        }
    }
}

/// Static result type of a native function, used by type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    String,
}

/// A host function callable from AWK code.
pub struct NativeFunc {
    pub arity: Arity,
    pub returns: ValueKind,
    pub body: Box<dyn Fn(&[Value]) -> Value>,
}

impl NativeFunc {
    pub fn new(arity: Arity, returns: ValueKind, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            arity,
            returns,
            body: Box::new(body),
        }
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl fmt::Debug for NativeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunc")
            .field("arity", &self.arity)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Native functions by name. Built once and lent to both the parser and the
/// interpreter so they agree on what is callable.
#[derive(Debug, Default)]
pub struct FunctionTable {
    funcs: BTreeMap<String, NativeFunc>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `func` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, func: NativeFunc) -> &mut Self {
        self.funcs.insert(name.into(), func);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunc> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

/// The native functions the `tawk` binary ships with.
pub fn extensions() -> FunctionTable {
    let mut table = FunctionTable::new();
    table
        .register(
            "sum",
            NativeFunc::new(Arity::AtLeast(1), ValueKind::Number, |args| {
                Value::Number(args.iter().map(Value::to_number).sum())
            }),
        )
        .register(
            "repeat",
            NativeFunc::new(Arity::Exact(2), ValueKind::String, |args| {
                let s = args.first().map(Value::to_string_val).unwrap_or_default();
                let n = args.get(1).map_or(0.0, Value::to_number);
                if n <= 0.0 || n.is_nan() {
                    return Value::Str(String::new());
                }
                Value::Str(s.repeat(n as usize))
            }),
        )
        .register(
            "isodate",
            NativeFunc::new(Arity::Exact(1), ValueKind::String, |args| {
                Value::Str(isodate(args.first().map_or(0.0, Value::to_number)))
            }),
        );
    table
}

/// Formats Unix milliseconds as an RFC 3339 UTC timestamp, dropping the
/// sub-second part.
fn isodate(ms: f64) -> String {
    let secs = (ms / 1000.0).floor() as i64;
    let days = secs.div_euclid(86_400);
    let day_secs = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        day_secs / 3600,
        (day_secs % 3600) / 60,
        day_secs % 60
    )
}

/// Proleptic Gregorian date for a count of days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// AWK builtin functions and the argument counts the parser accepts for them.
pub(crate) const BUILTINS: &[(&str, Arity)] = &[
    ("atan2", Arity::Exact(2)),
    ("close", Arity::Exact(1)),
    ("cos", Arity::Exact(1)),
    ("exp", Arity::Exact(1)),
    ("fflush", Arity::Range(0, 1)),
    ("gsub", Arity::Range(2, 3)),
    ("index", Arity::Exact(2)),
    ("int", Arity::Exact(1)),
    ("length", Arity::Range(0, 1)),
    ("log", Arity::Exact(1)),
    ("match", Arity::Exact(2)),
    ("rand", Arity::Exact(0)),
    ("sin", Arity::Exact(1)),
    ("split", Arity::Range(2, 3)),
    ("sprintf", Arity::AtLeast(1)),
    ("sqrt", Arity::Exact(1)),
    ("srand", Arity::Range(0, 1)),
    ("sub", Arity::Range(2, 3)),
    ("substr", Arity::Range(2, 3)),
    ("system", Arity::Exact(1)),
    ("tolower", Arity::Exact(1)),
    ("toupper", Arity::Exact(1)),
];

pub(crate) fn builtin_arity(name: &str) -> Option<Arity> {
    BUILTINS
        .binary_search_by(|(n, _)| (*n).cmp(name))
        .ok()
        .map(|i| BUILTINS[i].1)
}
