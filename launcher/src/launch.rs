//! The launch sequence: find our own directory, make it the working
//! directory and the first library search location, then become `core`.
//!
//! Steps run strictly in order and the first failure ends the sequence.
//! Nothing here touches process state directly; that all goes through
//! [`Host`].

use std::convert::Infallible;
use std::ffi::{OsStr, OsString};
use std::io;

use crate::error::LaunchError;
use crate::host::Host;

/// Path buffer size. Paths must be strictly shorter to leave room for NUL.
pub const MAX_PATH_LEN: usize = 4096;
/// Buffer size for the rebuilt library search path: two paths plus the
/// list separator and NUL.
pub const MAX_SEARCH_PATH_LEN: usize = 2 * MAX_PATH_LEN + 2;

/// Per-platform naming conventions, fixed at compile time.
pub struct Layout {
    /// File name of the sibling binary we hand over to.
    pub target: &'static str,
    /// Variable the dynamic loader searches for shared libraries.
    pub library_path_var: &'static str,
    /// Separator used when joining the target onto the directory.
    pub separator: &'static str,
    /// Every byte that counts as a directory separator when splitting.
    pub separators: &'static [u8],
    pub list_separator: &'static str,
}

pub fn resolve_self_path<H: Host>(host: &H) -> Result<OsString, LaunchError> {
    let path = host.current_exe().map_err(LaunchError::PathResolution)?;
    let len = path.as_encoded_bytes().len();
    if len >= MAX_PATH_LEN {
        return Err(LaunchError::PathResolution(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is {} bytes, limit {}", len, MAX_PATH_LEN - 1),
        )));
    }
    Ok(path)
}

/// Everything before the last separator. The separator itself is dropped.
pub fn derive_directory<'a>(layout: &Layout, self_path: &'a OsStr) -> Result<&'a OsStr, LaunchError> {
    let bytes = self_path.as_encoded_bytes();
    let cut = bytes
        .iter()
        .rposition(|b| layout.separators.contains(b))
        .ok_or_else(|| LaunchError::UnexpectedLayout(self_path.to_os_string()))?;

    // SAFETY: `cut` indexes an ASCII separator, and splitting immediately
    // before a UTF-8 substring is a valid boundary in any OsStr encoding.
    Ok(unsafe { OsStr::from_encoded_bytes_unchecked(&bytes[..cut]) })
}

pub fn build_core_path(layout: &Layout, dir: &OsStr) -> Result<OsString, LaunchError> {
    let mut path = OsString::with_capacity(dir.len() + layout.separator.len() + layout.target.len());
    path.push(dir);
    path.push(layout.separator);
    path.push(layout.target);

    let len = path.as_encoded_bytes().len();
    if len >= MAX_PATH_LEN {
        return Err(LaunchError::PathTooLong {
            what: "core path",
            len,
            max: MAX_PATH_LEN - 1,
        });
    }
    Ok(path)
}

/// `dir` alone, or `dir` in front of a non-empty previous value.
pub fn extend_search_path(
    layout: &Layout,
    dir: &OsStr,
    previous: Option<&OsStr>,
) -> Result<OsString, LaunchError> {
    let mut value = dir.to_os_string();
    if let Some(previous) = previous.filter(|p| !p.is_empty()) {
        value.push(layout.list_separator);
        value.push(previous);
    }

    let len = value.as_encoded_bytes().len();
    if len >= MAX_SEARCH_PATH_LEN {
        return Err(LaunchError::PathTooLong {
            what: layout.library_path_var,
            len,
            max: MAX_SEARCH_PATH_LEN - 1,
        });
    }
    Ok(value)
}

/// The launcher's own argv with slot 0 replaced by the core path.
/// An empty argv still yields `[core_path]`.
pub fn forward_args<I>(core_path: &OsStr, args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    args.next();
    std::iter::once(core_path.to_os_string()).chain(args).collect()
}

/// Run the whole sequence. On success the process has become `core`, so
/// this only ever returns an error.
pub fn launch<H, I>(host: &mut H, layout: &Layout, args: I) -> Result<Infallible, LaunchError>
where
    H: Host,
    I: IntoIterator<Item = OsString>,
{
    let self_path = resolve_self_path(host)?;
    let dir = derive_directory(layout, &self_path)?;
    let core_path = build_core_path(layout, dir)?;

    host.set_current_dir(dir)
        .map_err(|source| LaunchError::DirectoryChange {
            dir: dir.to_os_string(),
            source,
        })?;

    let previous = host.var_os(layout.library_path_var);
    let search_path = extend_search_path(layout, dir, previous.as_deref())?;
    host.set_var(layout.library_path_var, &search_path)
        .map_err(|source| LaunchError::EnvironmentSet {
            var: layout.library_path_var,
            source,
        })?;

    let argv = forward_args(&core_path, args);
    let source = host.exec(&core_path, &argv);
    Err(LaunchError::Exec {
        program: core_path,
        source,
    })
}
