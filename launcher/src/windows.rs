// Windows host. There is no in-place exec, so the core binary runs as a
// child and we exit with its status once it finishes. Console signals
// reach the child through the shared console group.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{self, Command};

use crate::host::{check_var, Host};
use crate::launch::Layout;

pub const LAYOUT: Layout = Layout {
    target: "core.exe",
    library_path_var: "PATH",
    separator: "\\",
    separators: b"\\/",
    list_separator: ";",
};

pub struct WindowsHost;

pub fn host() -> WindowsHost {
    WindowsHost
}

impl Host for WindowsHost {
    fn current_exe(&self) -> io::Result<OsString> {
        env::current_exe().map(|p| p.into_os_string())
    }

    fn set_current_dir(&mut self, dir: &OsStr) -> io::Result<()> {
        env::set_current_dir(dir)
    }

    fn var_os(&self, key: &str) -> Option<OsString> {
        env::var_os(key)
    }

    fn set_var(&mut self, key: &str, value: &OsStr) -> io::Result<()> {
        check_var(key, value)?;
        env::set_var(key, value);
        Ok(())
    }

    fn exec(&mut self, program: &OsStr, argv: &[OsString]) -> io::Error {
        let rest = argv.get(1..).unwrap_or(&[]);
        match Command::new(program).args(rest).status() {
            Ok(status) => process::exit(status.code().unwrap_or(1)),
            Err(e) => e,
        }
    }
}
