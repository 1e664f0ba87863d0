//! `livedoc-patch`: apply a JSON Patch (RFC 6902) to a document.
//!
//! Usage:
//!   livedoc-patch '<patch-array-json>'
//!
//! The document is read from stdin. The patch operations are the first argument.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use livedoc_patch::apply_json_patch;

fn main() -> ExitCode {
    let Some(patch) = std::env::args().nth(1) else {
        eprintln!("First argument must be a JSON patch array.");
        return ExitCode::FAILURE;
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match apply_json_patch(buf.trim(), &patch) {
        Ok(result) => {
            let mut out = io::stdout().lock();
            if let Err(e) = writeln!(out, "{result}") {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
