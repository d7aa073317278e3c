use crate::error::{AirfluxError, Result};
use crate::paths;
use crate::python::PythonVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PACKAGE: &str = "apache-airflow";
pub const DEFAULT_REPOSITORY: &str = "https://github.com/apache/airflow";
pub const DEFAULT_CONSTRAINTS_BASE: &str = "https://raw.githubusercontent.com/apache/airflow/";
pub const DEFAULT_SESSION_NAME: &str = "Airflux";
pub const DEFAULT_WINDOW_NAME: &str = "Main";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_name")]
    pub name: String,
    #[serde(default = "default_window_name")]
    pub window: String,
    #[serde(default = "default_mouse")]
    pub mouse: bool,
    /// Overrides `<home>/.tmux/tmp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

fn default_session_name() -> String {
    DEFAULT_SESSION_NAME.to_string()
}

fn default_window_name() -> String {
    DEFAULT_WINDOW_NAME.to_string()
}

fn default_mouse() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            window: default_window_name(),
            mouse: default_mouse(),
            scratch_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UserConfig
// ---------------------------------------------------------------------------

/// Admin account created at the end of provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_firstname")]
    pub firstname: String,
    #[serde(default = "default_lastname")]
    pub lastname: String,
    #[serde(default = "default_email")]
    pub email: String,
    #[serde(default = "default_password")]
    pub password: String,
}

fn default_username() -> String {
    "airflow".to_string()
}

fn default_firstname() -> String {
    "Air".to_string()
}

fn default_lastname() -> String {
    "Flow".to_string()
}

fn default_email() -> String {
    "example@yourplace.org".to_string()
}

fn default_password() -> String {
    "airflow".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            firstname: default_firstname(),
            lastname: default_lastname(),
            email: default_email(),
            password: default_password(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Optional per-project overrides read from `airflux.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_package")]
    pub package: String,
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_constraints_base")]
    pub constraints_base: String,
    /// Interpreter used to create the virtual environment.
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub user: UserConfig,
}

fn default_package() -> String {
    DEFAULT_PACKAGE.to_string()
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

fn default_constraints_base() -> String {
    DEFAULT_CONSTRAINTS_BASE.to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_venv_dir() -> String {
    "venv".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package: default_package(),
            repository: default_repository(),
            constraints_base: default_constraints_base(),
            python: default_python(),
            venv_dir: default_venv_dir(),
            session: SessionConfig::default(),
            user: UserConfig::default(),
        }
    }
}

impl Config {
    /// Load `airflux.yaml` from `root`, or the defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.package.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "package must not be empty".to_string(),
            });
        }

        if !self.constraints_base.starts_with("http://")
            && !self.constraints_base.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "constraints_base '{}' is not an http(s) URL",
                    self.constraints_base
                ),
            });
        }

        // tmux treats '.' and ':' as target separators
        if self.session.name.is_empty() || self.session.name.contains(&['.', ':'][..]) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "session.name '{}' must be non-empty and contain no '.' or ':'",
                    self.session.name
                ),
            });
        }

        if self.session.window.is_empty() || self.session.window.contains(&['.', ':'][..]) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "session.window '{}' must be non-empty and contain no '.' or ':'",
                    self.session.window
                ),
            });
        }

        if self.user.password == default_password() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "user.password is the default; pass --password for anything shared"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the scaffolder and session manager read from the environment,
/// resolved once by the caller.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Absolute project directory (`AIRFLOW_HOME`).
    pub project_dir: PathBuf,
    pub home_dir: PathBuf,
    /// Unset for commands that never look at the interpreter.
    pub python_version: Option<PythonVersion>,
    pub config: Config,
}

impl Settings {
    pub fn new(
        project_dir: PathBuf,
        home_dir: PathBuf,
        python_version: Option<PythonVersion>,
        config: Config,
    ) -> Self {
        Self {
            project_dir,
            home_dir,
            python_version,
            config,
        }
    }

    pub fn require_python(&self) -> Result<PythonVersion> {
        self.python_version
            .ok_or(AirfluxError::PythonVersionUnresolved)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.config
            .session
            .scratch_dir
            .clone()
            .unwrap_or_else(|| paths::default_scratch_dir(&self.home_dir))
    }

    pub fn venv_dir(&self) -> PathBuf {
        paths::venv_dir(&self.project_dir, &self.config.venv_dir)
    }

    pub fn venv_bin(&self, name: &str) -> PathBuf {
        paths::venv_bin(&self.project_dir, &self.config.venv_dir, name)
    }
}

/// Resolve the operator's home directory.
pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(AirfluxError::HomeNotFound)
}
