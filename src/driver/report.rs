//! Source-line diagnostics for parse errors:
//!
//! ```text
//! -----------------------------------------------------
//! BEGIN { x*; }
//!           ^
//! -----------------------------------------------------
//! parse error at 1:11: expected expression instead of ;
//! ```

use std::io::{self, Write};

use crate::error::Position;

/// Renders the divider, the offending line and a caret under `position`.
/// Tabs in the line are shown as four spaces; the caret accounts for them
/// and for multi-byte characters. Positions outside the source are clamped.
pub fn render_source_line(src: &[u8], position: Position, message: &str) -> String {
    let lines: Vec<&[u8]> = src.split(|&b| b == b'\n').collect();
    let index = position.line.clamp(1, lines.len()) - 1;
    let line = lines[index];

    let mut end = position.column.max(1).saturating_sub(1).min(line.len());
    while end < line.len() && is_continuation(line[end]) {
        end += 1;
    }
    let prefix = &line[..end];
    let num_tabs = prefix.iter().filter(|&&b| b == b'\t').count();
    let rune_column = String::from_utf8_lossy(prefix).chars().count();

    let divider = "-".repeat(message.chars().count());
    let mut out = String::new();
    if !divider.is_empty() {
        out.push_str(&divider);
        out.push('\n');
    }
    out.push_str(&String::from_utf8_lossy(line).replace('\t', "    "));
    out.push('\n');
    out.push_str(&" ".repeat(rune_column + 3 * num_tabs));
    out.push_str("^\n");
    if !divider.is_empty() {
        out.push_str(&divider);
        out.push('\n');
    }
    out
}

pub fn show_source_line<W: Write + ?Sized>(w: &mut W, src: &[u8], position: Position, message: &str) -> io::Result<()> {
    w.write_all(render_source_line(src, position, message).as_bytes())?;
    w.flush()
}

fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}
