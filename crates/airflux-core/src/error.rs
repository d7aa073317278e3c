use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AirfluxError {
    #[error("{} already exists; remove it and re-run", .0.display())]
    AlreadyExists(PathBuf),

    #[error(
        "no constraint file for airflow {version} on python {python} \
         ({url} returned HTTP {status}); check the version with 'airflux versions'"
    )]
    ConstraintNotFound {
        version: String,
        python: String,
        url: String,
        status: u16,
    },

    #[error("virtual environment creation failed")]
    VenvFailed(String),

    #[error("package installation failed")]
    InstallFailed(String),

    #[error("airflow db init failed")]
    DbInitFailed(String),

    #[error("airflow users create failed")]
    UserCreateFailed(String),

    #[error("tmux session not found: {0}")]
    SessionNotFound(String),

    #[error("tmux is not installed or not on PATH")]
    TmuxNotInstalled,

    #[error("git is not installed or not on PATH")]
    GitNotInstalled,

    #[error("tmux {command} failed: {output}")]
    Tmux { command: String, output: String },

    #[error("failed to run {program}: {reason}")]
    CommandSpawn { program: String, reason: String },

    #[error("failed to list tags: {0}")]
    TagListFailed(String),

    #[error("invalid python version '{0}': expected <major>.<minor>")]
    InvalidPythonVersion(String),

    #[error("{program} exited with {code:?} while reporting its version: {output}")]
    PythonProbeFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("python version not resolved; pass --python-version")]
    PythonVersionUnresolved,

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error("http request failed: {0}")]
    Http(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl AirfluxError {
    /// Captured subprocess output carried by a failed provisioning command.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            AirfluxError::VenvFailed(out)
            | AirfluxError::InstallFailed(out)
            | AirfluxError::DbInitFailed(out)
            | AirfluxError::UserCreateFailed(out) => Some(out),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AirfluxError>;
