use std::env;
use std::process;

use tawk::driver::profile::TrackingAllocator;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn main() {
    tawk::logging::init();

    let args: Vec<String> = env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    process::exit(tawk::driver::run(&args));
}
