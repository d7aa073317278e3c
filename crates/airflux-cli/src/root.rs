use airflux_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project directory for commands that operate on an existing
/// project.
///
/// Priority:
/// 1. `--root` flag / `AIRFLUX_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for the `.env` written by `new`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return absolute(p);
    }
    let cwd = current_dir();
    find_project_dir(&cwd).unwrap_or(cwd)
}

/// `new` never walks upward: it scaffolds exactly where it is told.
pub fn new_project_root(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => absolute(p),
        None => current_dir(),
    }
}

fn find_project_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| paths::env_path(dir).is_file())
        .map(Path::to_path_buf)
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn absolute(p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        current_dir().join(p)
    }
}
