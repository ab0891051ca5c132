use retrain_core::paths::RETRAIN_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `RETRAIN_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` containing `.retrain/`
/// 3. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project(&cwd).unwrap_or(cwd)
}

fn find_project(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(RETRAIN_DIR).is_dir())
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
    fn finds_nearest_project_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".retrain")).unwrap();
        let deep = dir.path().join("ml_training/scripts");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_project(&deep).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_project_found() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_project(dir.path()), None);
    }
}
