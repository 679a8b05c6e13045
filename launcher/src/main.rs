//! Launcher shim. Finds the directory it was installed in, makes that the
//! working directory and the first entry of the library search path, then
//! replaces itself with the `core` binary next to it. Every argument after
//! argv[0] is forwarded untouched.

// Platform-specific hosts
// Linux reads /proc/self/exe, macOS asks dyld, Windows has no exec and
// waits on a child instead

mod error;
mod host;
mod launch;

#[cfg(unix)]
mod unix;

#[cfg(target_os = "linux")]
#[path = "linux.rs"]
mod platform;

#[cfg(target_os = "macos")]
#[path = "macos.rs"]
mod platform;

#[cfg(target_os = "windows")]
#[path = "windows.rs"]
mod platform;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
compile_error!("launcher needs a way to resolve its own executable path on this platform");

use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut host = platform::host();
    match launch::launch(&mut host, &platform::LAYOUT, env::args_os()) {
        Ok(never) => match never {},
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::from(1)
        }
    }
}
