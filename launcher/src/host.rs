// The process state the launcher touches, behind one trait so the launch
// sequence can run against a fake in tests.

use std::ffi::{OsStr, OsString};
use std::io;

pub trait Host {
    /// Absolute path of the running launcher binary.
    fn current_exe(&self) -> io::Result<OsString>;

    fn set_current_dir(&mut self, dir: &OsStr) -> io::Result<()>;

    fn var_os(&self, key: &str) -> Option<OsString>;

    fn set_var(&mut self, key: &str, value: &OsStr) -> io::Result<()>;

    /// Replace the current process with `program`. Only returns on failure.
    fn exec(&mut self, program: &OsStr, argv: &[OsString]) -> io::Error;
}

/// Reject assignments `std::env::set_var` would panic on.
pub fn check_var(key: &str, value: &OsStr) -> io::Result<()> {
    if key.is_empty() || key.contains('=') || key.contains('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid variable name {:?}", key),
        ));
    }
    if value.as_encoded_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "value contains a NUL byte",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_assignment() {
        assert!(check_var("LD_LIBRARY_PATH", OsStr::new("/opt/app:/usr/lib")).is_ok());
        assert!(check_var("LD_LIBRARY_PATH", OsStr::new("")).is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        for key in ["", "A=B", "A\0B"] {
            let err = check_var(key, OsStr::new("x")).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn rejects_nul_in_value() {
        let err = check_var("LD_LIBRARY_PATH", OsStr::new("/opt\0/app")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
