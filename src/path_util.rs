//! Relative-path reconstruction between a parity file and its data file.
//!
//! Rather than computing a generic relative path and trimming a leading
//! `../` (correct only when both files share a parent directory), this walks
//! the two parent directories component-wise and emits exactly the
//! `..`/child components needed.

use std::path::{Component, Path, PathBuf};

/// Compute `data_path`'s path relative to `parity_dir`, with separators
/// normalized to `/` regardless of platform. Used when writing the stored
/// `file_name` field.
pub fn relative_to(parity_dir: &Path, data_path: &Path) -> String {
    let data_components: Vec<Component> = data_path.components().collect();
    let dir_components: Vec<Component> = parity_dir.components().collect();

    let shared = data_components
        .iter()
        .zip(dir_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in shared..dir_components.len() {
        out.push("..");
    }
    for comp in &data_components[shared..] {
        out.push(comp.as_os_str());
    }

    out.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/")
}

/// Resolve a stored `file_name` against the parity file's directory.
///
/// A name beginning with the platform directory separator is treated as
/// absolute and used verbatim; everything else is joined onto `parity_dir`
/// with `/` components translated back to the platform separator.
pub fn resolve_stored_name(parity_dir: &Path, stored_name: &str) -> PathBuf {
    if stored_name.starts_with(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(stored_name);
    }
    let mut out = parity_dir.to_path_buf();
    for part in stored_name.split('/') {
        out.push(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_directory_produces_bare_name() {
        let rel = relative_to(Path::new("/home/user/data"), Path::new("/home/user/data/foo.bin"));
        assert_eq!(rel, "foo.bin");
    }

    #[test]
    fn parity_one_level_deeper_produces_parent_prefix() {
        let rel = relative_to(
            Path::new("/home/user/data/pars"),
            Path::new("/home/user/data/foo.bin"),
        );
        assert_eq!(rel, "../foo.bin");
    }

    #[test]
    fn data_one_level_deeper_produces_child_suffix() {
        let rel = relative_to(
            Path::new("/home/user/data"),
            Path::new("/home/user/data/sub/foo.bin"),
        );
        assert_eq!(rel, "sub/foo.bin");
    }

    #[test]
    fn roundtrip_through_resolve() {
        let parity_dir = Path::new("/home/user/data/pars");
        let data_path = Path::new("/home/user/data/foo.bin");
        let rel = relative_to(parity_dir, data_path);
        let resolved = resolve_stored_name(parity_dir, &rel);
        assert_eq!(resolved, data_path);
    }

    #[test]
    fn absolute_stored_name_is_used_verbatim() {
        let resolved = resolve_stored_name(Path::new("/anywhere"), "/abs/path/foo.bin");
        assert_eq!(resolved, PathBuf::from("/abs/path/foo.bin"));
    }
}
