use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Project artifacts
// ---------------------------------------------------------------------------

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const ENV_FILE: &str = ".env";
pub const CONFIG_FILE: &str = "airflux.yaml";

/// Environment variable pointing the framework at the project directory.
pub const AIRFLOW_HOME_VAR: &str = "AIRFLOW_HOME";
/// Environment variable tmux reads to locate its socket directory.
pub const TMUX_TMPDIR_VAR: &str = "TMUX_TMPDIR";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn requirements_path(root: &Path) -> PathBuf {
    root.join(REQUIREMENTS_FILE)
}

pub fn env_path(root: &Path) -> PathBuf {
    root.join(ENV_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn venv_dir(root: &Path, venv: &str) -> PathBuf {
    root.join(venv)
}

/// Path to an executable inside the virtual environment.
pub fn venv_bin(root: &Path, venv: &str, name: &str) -> PathBuf {
    let bin = if cfg!(windows) { "Scripts" } else { "bin" };
    venv_dir(root, venv).join(bin).join(name)
}

pub fn venv_activate(root: &Path, venv: &str) -> PathBuf {
    venv_bin(root, venv, "activate")
}

/// Default tmux scratch directory: `<home>/.tmux/tmp`.
pub fn default_scratch_dir(home: &Path) -> PathBuf {
    home.join(".tmux").join("tmp")
}
