use airflux_core::{
    config::{self, Config, Settings, WarnLevel},
    python::{self, PythonVersion},
    runner::SystemRunner,
};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// How a command obtains the interpreter version.
pub enum PythonSource<'a> {
    /// `--python-version`, else probe the venv interpreter, else the
    /// configured one.
    Resolve(Option<&'a str>),
    /// The command never reads it; `Settings::python_version` stays unset.
    Unused,
}

/// Build the [`Settings`] every core operation receives.
pub fn load(root: &Path, python: PythonSource<'_>) -> anyhow::Result<Settings> {
    let config = load_config(root)?;
    let home = config::home_dir()?;
    let python_version = match python {
        PythonSource::Resolve(explicit) => Some(resolve_python(root, &config, explicit)?),
        PythonSource::Unused => None,
    };
    tracing::debug!(
        root = %root.display(),
        python = ?python_version,
        "settings resolved"
    );
    Ok(Settings::new(
        root.to_path_buf(),
        home,
        python_version,
        config,
    ))
}

pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let config = Config::load(root).context("failed to load airflux.yaml")?;
    let mut errors = Vec::new();
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::info!("{}", w.message),
            WarnLevel::Error => errors.push(w.message),
        }
    }
    if !errors.is_empty() {
        anyhow::bail!("invalid airflux.yaml: {}", errors.join("; "));
    }
    Ok(config)
}

fn resolve_python(
    root: &Path,
    config: &Config,
    explicit: Option<&str>,
) -> anyhow::Result<PythonVersion> {
    if let Some(raw) = explicit {
        return Ok(raw.parse::<PythonVersion>()?);
    }
    let venv_python = airflux_core::paths::venv_bin(root, &config.venv_dir, "python");
    let interpreter = if venv_python.exists() {
        venv_python
    } else {
        PathBuf::from(&config.python)
    };
    python::probe(&SystemRunner, &interpreter, root).with_context(|| {
        format!(
            "could not determine the python version of {}; pass --python-version",
            interpreter.display()
        )
    })
}
