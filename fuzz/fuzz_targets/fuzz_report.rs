#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tawk::driver::report::render_source_line;
use tawk::Position;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    src: &'a [u8],
    line: u16,
    column: u16,
    message: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let out = render_source_line(
        input.src,
        Position::new(input.line as usize, input.column as usize),
        input.message,
    );
    assert!(out.contains('^'));
});
