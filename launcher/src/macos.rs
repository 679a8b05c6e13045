// macOS host: dyld reports the path we were started with, which may go
// through symlinks, so canonicalize it to match what /proc/self/exe gives.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::launch::Layout;
use crate::unix::UnixHost;

pub const LAYOUT: Layout = Layout {
    target: "core",
    library_path_var: "DYLD_LIBRARY_PATH",
    separator: "/",
    separators: b"/",
    list_separator: ":",
};

fn self_exe() -> io::Result<PathBuf> {
    env::current_exe().and_then(fs::canonicalize)
}

pub fn host() -> UnixHost {
    UnixHost::new(self_exe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_path() {
        let path = self_exe().unwrap();
        assert_eq!(fs::canonicalize(&path).unwrap(), path);
    }
}
