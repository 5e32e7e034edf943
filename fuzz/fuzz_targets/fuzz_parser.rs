#![no_main]

use libfuzzer_sys::fuzz_target;
use tawk::{extensions, parse_program, ParseConfig};

fuzz_target!(|data: &[u8]| {
    let funcs = extensions();
    let mut config = ParseConfig::new(&funcs);
    config.debug_types = true;
    config.debug_writer = Some(Box::new(std::io::sink()));

    match parse_program(data, &mut config) {
        // A parsed program must print without panicking
        Ok(program) => {
            let _ = program.to_string();
        }
        // Parse errors always carry a position the reporter can render
        Err(err) => {
            if let Some(parse_err) = err.as_parse_error() {
                let _ = tawk::driver::report::render_source_line(data, parse_err.position, &err.to_string());
            }
        }
    }
});
