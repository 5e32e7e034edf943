use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use crate::format::sprintf;

/// AWK value type with dynamic typing and automatic coercion
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Never assigned - acts as "" or 0 depending on context
    #[default]
    Uninitialized,
    Number(f64),
    /// A string constant or the result of a string operation
    Str(String),
    /// Input that looks like a number ("strnum"): fields, getline results,
    /// ARGV, ENVIRON and command-line assignments. Compares numerically.
    StrNum(String, f64),
}

impl Value {
    /// Wraps text that came from outside the program, detecting strnums.
    #[inline]
    pub fn strnum(s: String) -> Self {
        match looks_numeric(&s) {
            Some(n) => Value::StrNum(s, n),
            None => Value::Str(s),
        }
    }

    #[inline]
    pub fn from_bool(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    /// Truth in boolean context. Strings are true when non-empty, numbers
    /// and strnums when non-zero.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Uninitialized => false,
            Value::Number(n) | Value::StrNum(_, n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    #[inline]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Uninitialized => 0.0,
            Value::Number(n) | Value::StrNum(_, n) => *n,
            Value::Str(s) => parse_leading_number(s),
        }
    }

    /// String form using the default conversion format.
    #[inline]
    pub fn to_string_val(&self) -> String {
        self.to_string_with_format("%.6g")
    }

    #[inline]
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::Uninitialized => Cow::Borrowed(""),
            Value::Number(n) => Cow::Owned(format_number(*n, "%.6g")),
            Value::Str(s) | Value::StrNum(s, _) => Cow::Borrowed(s),
        }
    }

    /// String form using `format` (CONVFMT or OFMT) for non-integral numbers.
    pub fn to_string_with_format(&self, format: &str) -> String {
        match self {
            Value::Uninitialized => String::new(),
            Value::Number(n) => format_number(*n, format),
            Value::Str(s) | Value::StrNum(s, _) => s.clone(),
        }
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    fn compares_as_number(&self) -> bool {
        matches!(self, Value::Number(_) | Value::StrNum(..) | Value::Uninitialized)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// AWK comparison: numeric when both sides are numbers, strnums or unset,
/// otherwise by string.
#[inline]
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    if left.compares_as_number() && right.compares_as_number() {
        let l = left.to_number();
        let r = right.to_number();
        l.partial_cmp(&r).unwrap_or(Ordering::Equal)
    } else {
        left.as_str().cmp(&right.as_str())
    }
}

/// Numeric prefix of `s`, or 0:
/// "42abc" -> 42.0, "  3.14  " -> 3.14, "abc" -> 0.0
pub fn parse_leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let end = numeric_prefix_len(s.as_bytes());
    if end == 0 {
        return 0.0;
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Length of the longest prefix of `b` that reads as a decimal number.
fn numeric_prefix_len(b: &[u8]) -> usize {
    let mut i = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let int_start = i;
    while b.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let mut digits = i - int_start;
    if b.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while b.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(b.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if b.get(j).is_some_and(u8::is_ascii_digit) {
            while b.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            i = j;
        }
    }
    i
}

/// The number `s` spells, if the whole string (minus surrounding blanks)
/// is a number.
fn looks_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\n');
    if trimmed.is_empty() {
        return None;
    }
    if numeric_prefix_len(trimmed.as_bytes()) != trimmed.len() {
        return None;
    }
    trimmed.parse().ok()
}

/// Converts a number to its AWK string form. Integral values print as
/// integers; everything else goes through `format`.
pub fn format_number(n: f64, format: &str) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e16 {
        return format!("{}", n as i64);
    }
    let args = [Value::Number(n)];
    // an unusable OFMT/CONVFMT falls back to the default
    sprintf(format, &args)
        .or_else(|_| sprintf("%.6g", &args))
        .unwrap_or_default()
}
