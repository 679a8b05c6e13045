//! Demo program: report what the launcher handed over
//!
//! Usage: print-env [args...] [--exit-with <code>]
//! Prints one JSON object on stdout:
//!   {"args": [...], "argc": N, "cwd": "...", "library_path": "..." | null, "env": {...}}
//!
//! `--exit-with` makes it exit with the given status after printing, so the
//! test runner can check that the status comes back through the launcher.

use serde_json::{json, Map, Value};
use std::env;
use std::process::ExitCode;

#[cfg(target_os = "linux")]
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";
#[cfg(target_os = "macos")]
const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(windows)]
const LIBRARY_PATH_VAR: &str = "PATH";

fn main() -> ExitCode {
    let args: Vec<String> = env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();

    let exit_code = args
        .iter()
        .position(|a| a == "--exit-with")
        .and_then(|i| args.get(i + 1))
        .and_then(|code| code.parse::<u8>().ok())
        .unwrap_or(0);

    let cwd = match env::current_dir() {
        Ok(dir) => Value::String(dir.to_string_lossy().into_owned()),
        Err(e) => {
            eprintln!("Error reading working directory: {}", e);
            return ExitCode::from(1);
        }
    };

    let library_path = env::var_os(LIBRARY_PATH_VAR)
        .map(|v| Value::String(v.to_string_lossy().into_owned()))
        .unwrap_or(Value::Null);

    // A few common variables, to confirm the rest of the environment survives
    let mut selected = Map::new();
    for var in ["PATH", "HOME", "USER", "LAUNCHER_TEST_MARKER"] {
        if let Some(value) = env::var_os(var) {
            selected.insert(var.to_string(), Value::String(value.to_string_lossy().into_owned()));
        }
    }

    let argc = args.len();
    let report = json!({
        "args": &args,
        "argc": argc,
        "cwd": cwd,
        "library_path": library_path,
        "env": selected,
    });
    println!("{}", report);

    ExitCode::from(exit_code)
}
