use std::io;
use std::path::{Path, PathBuf};

/// Canonicalizes `path`, keeping it unchanged when it does not exist.
///
/// Uses `dunce` so Windows paths stay free of the `\\?\` verbatim prefix, which
/// would otherwise leak into stored archive paths.
pub fn canonicalize_if_possible(path: &Path) -> io::Result<PathBuf> {
    match dunce::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}
