//! Reference studio HTTP server.
//! Run with: cargo run --bin reference-studio

use std::process::ExitCode;

use reference_studio::start_studio;

fn main() -> ExitCode {
    start_studio::run()
}
