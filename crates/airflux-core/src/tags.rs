//! Release discovery from the framework repository's constraint tags.
//!
//! Every release publishes a `constraints-<version>` tag. Listing them with
//! `git ls-remote --tags` yields one line per ref, plus a peeled `^{}` line for
//! annotated tags and a moving `constraints-latest` tag. Filtering those out
//! is a heuristic: other non-release tags matching the prefix would leak
//! through.

use crate::error::{AirfluxError, Result};
use crate::runner::{CommandRunner, Invocation};
use regex::Regex;
use std::sync::OnceLock;

const CONSTRAINT_TAG_PREFIX: &str = "constraints-";
const PEELED_MARKER: &str = "^{}";
const LATEST_TAG: &str = "latest";

pub trait TagLister {
    /// Tag ref names for `repo_url`, in the order the remote reports them.
    fn list_tags(&self, repo_url: &str) -> Result<Vec<String>>;
}

/// Lists tags with `git ls-remote --tags`.
pub struct GitTagLister<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitTagLister<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

static REF_LINE_RE: OnceLock<Regex> = OnceLock::new();

fn ref_line_re() -> &'static Regex {
    REF_LINE_RE.get_or_init(|| Regex::new(r"^[0-9a-f]+\s+(refs/tags/\S+)$").unwrap())
}

impl TagLister for GitTagLister<'_> {
    fn list_tags(&self, repo_url: &str) -> Result<Vec<String>> {
        let git = which::which("git").map_err(|_| AirfluxError::GitNotInstalled)?;
        let cwd = std::env::temp_dir();
        let inv = Invocation::new(git, &cwd).args(["ls-remote", "--tags", repo_url]);
        let out = self.runner.run(&inv)?;
        if !out.success() {
            return Err(AirfluxError::TagListFailed(out.output.trim().to_string()));
        }
        Ok(parse_ls_remote(&out.output))
    }
}

/// Extract `refs/tags/...` names from `git ls-remote` output.
pub fn parse_ls_remote(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| ref_line_re().captures(line.trim()))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Release versions from tag names, order preserved.
pub fn available_versions(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|t| !t.ends_with(PEELED_MARKER))
        .filter_map(|t| {
            let name = t.strip_prefix("refs/tags/").unwrap_or(t);
            name.strip_prefix(CONSTRAINT_TAG_PREFIX)
        })
        .filter(|v| !v.is_empty() && *v != LATEST_TAG)
        .map(str::to_string)
        .collect()
}

/// List release versions available from `repo_url`.
pub fn list_versions(lister: &dyn TagLister, repo_url: &str) -> Result<Vec<String>> {
    let tags = lister.list_tags(repo_url)?;
    let versions = available_versions(&tags);
    tracing::debug!(tags = tags.len(), versions = versions.len(), "listed versions");
    Ok(versions)
}
