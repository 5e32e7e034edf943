//! printf-style formatting shared by `printf`, `sprintf` and number-to-string
//! conversion (OFMT / CONVFMT).

use crate::error::{Error, Result};
use crate::value::Value;

/// Widest field width or precision a format may ask for
const MAX_WIDTH: usize = 1 << 20;

#[derive(Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    alt: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Formats `args` according to `format`. Missing arguments behave as
/// uninitialized values; surplus arguments are ignored. A width or precision
/// beyond `MAX_WIDTH` is an error.
pub fn sprintf(format: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(format.len() + 16);
    let mut chars = format.chars().peekable();
    let mut args = args.iter();
    let empty = Value::Uninitialized;

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alt = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }

        if chars.peek() == Some(&'*') {
            chars.next();
            let w = args.next().unwrap_or(&empty).to_number() as i64;
            if w < 0 {
                spec.left = true;
            }
            spec.width = Some(w.unsigned_abs() as usize);
        } else {
            spec.width = take_digits(&mut chars);
        }

        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let p = args.next().unwrap_or(&empty).to_number();
                spec.precision = (p >= 0.0).then_some(p as usize);
            } else {
                spec.precision = Some(take_digits(&mut chars).unwrap_or(0));
            }
        }

        for (what, n) in [("width", spec.width), ("precision", spec.precision)] {
            if let Some(n) = n.filter(|&n| n > MAX_WIDTH) {
                return Err(Error::runtime(format!("format {} {} too large", what, n)));
            }
        }

        // Length modifiers mean nothing here.
        while matches!(chars.peek(), Some('h' | 'l' | 'L' | 'q' | 'j' | 'z' | 't')) {
            chars.next();
        }

        let Some(conv) = chars.next() else {
            out.push('%');
            break;
        };

        let body = match conv {
            'd' | 'i' | 'u' => {
                let arg = args.next().unwrap_or(&empty);
                format_int(arg.to_number(), &spec)
            }
            'o' | 'x' | 'X' => {
                let arg = args.next().unwrap_or(&empty);
                format_radix(arg.to_number(), conv, &spec)
            }
            'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
                let arg = args.next().unwrap_or(&empty);
                format_float(arg.to_number(), conv, &spec)
            }
            'c' => {
                let arg = args.next().unwrap_or(&empty);
                let s = match arg {
                    Value::Number(n) | Value::StrNum(_, n) => char::from_u32(*n as u32)
                        .map(String::from)
                        .unwrap_or_default(),
                    other => other.to_string_val().chars().take(1).collect(),
                };
                pad(s, &Spec { zero: false, ..spec })
            }
            's' => {
                let arg = args.next().unwrap_or(&empty);
                let mut s = arg.to_string_val();
                if let Some(p) = spec.precision {
                    s = s.chars().take(p).collect();
                }
                pad(s, &Spec { zero: false, ..spec })
            }
            other => {
                // Unknown conversions are copied through untouched.
                out.push('%');
                out.push(other);
                continue;
            }
        };
        out.push_str(&body);
    }

    Ok(out)
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d as usize));
        chars.next();
    }
    n
}

fn sign_prefix(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// Pads `body` to the field width. Zero padding goes between the sign (or
/// radix prefix) and the digits.
fn pad_number(prefix: &str, digits: String, spec: &Spec) -> String {
    let len = prefix.len() + digits.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return format!("{}{}", prefix, digits);
    }
    let fill = width - len;
    if spec.left {
        format!("{}{}{}", prefix, digits, " ".repeat(fill))
    } else if spec.zero {
        format!("{}{}{}", prefix, "0".repeat(fill), digits)
    } else {
        format!("{}{}{}", " ".repeat(fill), prefix, digits)
    }
}

fn pad(body: String, spec: &Spec) -> String {
    pad_number("", body, spec)
}

fn format_int(n: f64, spec: &Spec) -> String {
    if !n.is_finite() {
        return format_float(n, 'f', spec);
    }
    let n = n.trunc();
    let mut digits = format!("{:.0}", n.abs());
    if let Some(p) = spec.precision {
        if p == 0 && n == 0.0 {
            digits.clear();
        } else if digits.len() < p {
            digits = format!("{}{}", "0".repeat(p - digits.len()), digits);
        }
    }
    let zero = spec.zero && spec.precision.is_none();
    pad_number(sign_prefix(n < 0.0, spec), digits, &Spec { zero, ..*spec })
}

fn format_radix(n: f64, conv: char, spec: &Spec) -> String {
    let v = if n < 0.0 {
        (n.trunc() as i64) as u64
    } else {
        n.trunc() as u64
    };
    let digits = match conv {
        'o' => format!("{:o}", v),
        'x' => format!("{:x}", v),
        _ => format!("{:X}", v),
    };
    let prefix = match (spec.alt && v != 0, conv) {
        (true, 'o') => "0",
        (true, 'x') => "0x",
        (true, _) => "0X",
        _ => "",
    };
    pad_number(prefix, digits, spec)
}

fn format_float(n: f64, conv: char, spec: &Spec) -> String {
    let upper = conv.is_ascii_uppercase();
    if !n.is_finite() {
        let s = if n.is_nan() { "nan" } else { "inf" };
        let s = if upper { s.to_uppercase() } else { s.to_string() };
        let negative = n.is_sign_negative() && !n.is_nan();
        return pad_number(sign_prefix(negative, spec), s, &Spec { zero: false, ..*spec });
    }
    let precision = spec.precision.unwrap_or(6);
    let abs = n.abs();
    let digits = match conv {
        'f' | 'F' => format!("{:.*}", precision, abs),
        'e' | 'E' => exp_form(abs, precision, upper),
        _ => general_form(abs, precision, spec.alt, upper),
    };
    pad_number(sign_prefix(n.is_sign_negative() && n != 0.0, spec), digits, spec)
}

/// `d.ddde+XX` with at least two exponent digits.
fn exp_form(n: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, n);
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    format!(
        "{}{}{}{:02}",
        mantissa,
        if upper { 'E' } else { 'e' },
        if exp < 0 { '-' } else { '+' },
        exp.abs()
    )
}

fn general_form(n: f64, precision: usize, alt: bool, upper: bool) -> String {
    let p = precision.max(1);
    let exp = if n == 0.0 {
        0
    } else {
        // exponent after rounding to p significant digits
        let s = format!("{:.*e}", p - 1, n);
        s.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };
    if exp < -4 || exp >= p as i32 {
        let s = exp_form(n, p - 1, upper);
        if alt {
            return s;
        }
        let (mantissa, rest) = s.split_at(s.find(['e', 'E']).unwrap_or(s.len()));
        format!("{}{}", trim_fraction(mantissa), rest)
    } else {
        let s = format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, n);
        if alt { s } else { trim_fraction(&s).to_string() }
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
