use std::ffi::OsString;
use std::fmt;
use std::io;

/// Every way the launch sequence can fail. None of them are recoverable.
#[derive(Debug)]
pub enum LaunchError {
    /// The OS could not tell us where our own binary lives, or the answer
    /// does not fit in a path buffer.
    PathResolution(io::Error),
    /// The resolved self path has no directory separator in it.
    UnexpectedLayout(OsString),
    PathTooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },
    DirectoryChange {
        dir: OsString,
        source: io::Error,
    },
    EnvironmentSet {
        var: &'static str,
        source: io::Error,
    },
    Exec {
        program: OsString,
        source: io::Error,
    },
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::PathResolution(e) => {
                write!(f, "failed to resolve launcher path: {}", e)
            }
            LaunchError::UnexpectedLayout(path) => {
                write!(f, "unexpected exe path: {}", path.to_string_lossy())
            }
            LaunchError::PathTooLong { what, len, max } => {
                write!(f, "{} too long: {} bytes (limit {})", what, len, max)
            }
            LaunchError::DirectoryChange { dir, source } => {
                write!(f, "chdir to {} failed: {}", dir.to_string_lossy(), source)
            }
            LaunchError::EnvironmentSet { var, source } => {
                write!(f, "setting {} failed: {}", var, source)
            }
            LaunchError::Exec { program, source } => {
                write!(f, "exec of {} failed: {}", program.to_string_lossy(), source)
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::PathResolution(e) => Some(e),
            LaunchError::DirectoryChange { source, .. }
            | LaunchError::EnvironmentSet { source, .. }
            | LaunchError::Exec { source, .. } => Some(source),
            LaunchError::UnexpectedLayout(_) | LaunchError::PathTooLong { .. } => None,
        }
    }
}
