// Linux host: the kernel exposes our own image through /proc/self/exe.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::launch::Layout;
use crate::unix::UnixHost;

pub const LAYOUT: Layout = Layout {
    target: "core",
    library_path_var: "LD_LIBRARY_PATH",
    separator: "/",
    separators: b"/",
    list_separator: ":",
};

const DELETED_SUFFIX: &[u8] = b" (deleted)";

fn self_exe() -> io::Result<PathBuf> {
    fs::read_link("/proc/self/exe").and_then(check_not_deleted)
}

// The kernel keeps the link alive after unlink but tags it.
fn check_not_deleted(path: PathBuf) -> io::Result<PathBuf> {
    if path.as_os_str().as_encoded_bytes().ends_with(DELETED_SUFFIX) {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has been removed", path.display()),
        ));
    }
    Ok(path)
}

pub fn host() -> UnixHost {
    UnixHost::new(self_exe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_absolute_path() {
        let path = self_exe().unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());
    }

    #[test]
    fn deleted_image_is_rejected() {
        let err = check_not_deleted(PathBuf::from("/opt/app/launcher (deleted)")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(check_not_deleted(PathBuf::from("/opt/app/launcher")).is_ok());
    }
}
