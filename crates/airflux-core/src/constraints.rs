use crate::python::PythonVersion;

/// Where a constraint file comes from and what it is called locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRef {
    pub url: String,
    pub filename: String,
}

/// Local constraint filename for an interpreter version.
pub fn filename(python: &PythonVersion) -> String {
    format!("constraints-{python}.txt")
}

/// Compose the raw-content URL and filename for `version` on `python`.
///
/// Pure string composition; inputs are not validated.
pub fn resolve(base: &str, version: &str, python: &PythonVersion) -> ConstraintRef {
    let filename = filename(python);
    let sep = if base.ends_with('/') { "" } else { "/" };
    let url = format!("{base}{sep}constraints-{version}/{filename}");
    ConstraintRef { url, filename }
}
