use lukeux_core::paths::LUKEUX_DIR;
use std::path::{Path, PathBuf};

/// Resolve the data root.
///
/// Priority:
/// 1. `--root` flag / `LUKEUX_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.lukeux/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or(cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(LUKEUX_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_lukeux_dir_above() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".lukeux")).unwrap();
        let deep = dir.path().join("a/b");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_upward(&deep).unwrap(), dir.path());
    }

    #[test]
    fn nothing_found_without_marker() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("x");
        std::fs::create_dir_all(&deep).unwrap();
        // An ancestor of the temp dir could carry .lukeux/ on a dev box;
        // only assert that the temp dirs themselves are not picked.
        if let Some(found) = find_upward(&deep) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
