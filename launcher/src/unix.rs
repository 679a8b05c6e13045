// Shared by Linux and macOS: everything except self-path resolution.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use crate::host::{check_var, Host};

pub struct UnixHost {
    resolve: fn() -> io::Result<PathBuf>,
}

impl UnixHost {
    pub fn new(resolve: fn() -> io::Result<PathBuf>) -> Self {
        UnixHost { resolve }
    }
}

impl Host for UnixHost {
    fn current_exe(&self) -> io::Result<OsString> {
        (self.resolve)().map(PathBuf::into_os_string)
    }

    fn set_current_dir(&mut self, dir: &OsStr) -> io::Result<()> {
        env::set_current_dir(dir)
    }

    fn var_os(&self, key: &str) -> Option<OsString> {
        env::var_os(key)
    }

    // Single-threaded at this point, so mutating the environment is sound.
    // The replacing image inherits it through exec.
    fn set_var(&mut self, key: &str, value: &OsStr) -> io::Result<()> {
        check_var(key, value)?;
        env::set_var(key, value);
        Ok(())
    }

    fn exec(&mut self, program: &OsStr, argv: &[OsString]) -> io::Error {
        let mut cmd = Command::new(program);
        if let Some((arg0, rest)) = argv.split_first() {
            cmd.arg0(arg0).args(rest);
        }
        cmd.exec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing() -> io::Result<PathBuf> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }

    #[test]
    fn resolver_error_passes_through() {
        let host = UnixHost::new(missing);
        assert_eq!(host.current_exe().unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn exec_of_missing_program_returns() {
        let mut host = UnixHost::new(missing);
        let program = OsStr::new("/nonexistent-launcher-test-dir/core");
        let err = host.exec(program, &[program.to_os_string(), OsString::from("--flag")]);
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
