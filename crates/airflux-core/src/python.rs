use crate::error::{AirfluxError, Result};
use crate::runner::{CommandRunner, Invocation};
use std::fmt;
use std::path::Path;

/// Interpreter `major.minor`, used in constraint filenames and to gate the
/// triggerer pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
}

/// First interpreter version the triggerer component runs on.
pub const TRIGGERER_MIN: PythonVersion = PythonVersion { major: 3, minor: 7 };

impl PythonVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn supports_triggerer(&self) -> bool {
        *self >= TRIGGERER_MIN
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for PythonVersion {
    type Err = AirfluxError;

    /// Accepts `3.11`, `3.11.4` and `Python 3.11.4`; patch level is dropped.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let raw = trimmed.strip_prefix("Python ").unwrap_or(trimmed);
        let mut parts = raw.split('.');
        let parse = |p: Option<&str>| p.and_then(|v| v.trim().parse::<u32>().ok());
        match (parse(parts.next()), parse(parts.next())) {
            (Some(major), Some(minor)) => Ok(Self { major, minor }),
            _ => Err(AirfluxError::InvalidPythonVersion(s.trim().to_string())),
        }
    }
}

/// Ask `python` for its version.
pub fn probe(runner: &dyn CommandRunner, python: &Path, workdir: &Path) -> Result<PythonVersion> {
    let inv = Invocation::new(python, workdir)
        .arg("-c")
        .arg("import sys; print('%d.%d' % sys.version_info[:2])");
    let out = runner.run(&inv)?;
    if !out.success() {
        return Err(AirfluxError::PythonProbeFailed {
            program: python.display().to_string(),
            code: out.code,
            output: out.output.trim().to_string(),
        });
    }
    // stdout comes first in the combined output; interpreter warnings follow
    let first = out.output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    first.parse()
}
