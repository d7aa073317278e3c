//! [`Multiplexer`] backed by the `tmux` binary.
//!
//! Every call is one `tmux` invocation. When a scratch directory is configured
//! it is exported as `TMUX_TMPDIR` so the server socket lives there and `start`
//! and `stop` talk to the same server. An inherited `$TMUX` names the socket of
//! the operator's own server and outranks `TMUX_TMPDIR`, so it is cleared on
//! every invocation.

use crate::error::{AirfluxError, Result};
use crate::mux::{Multiplexer, PaneTarget, Split};
use crate::paths;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub struct TmuxClient {
    binary: PathBuf,
    tmpdir: Option<PathBuf>,
}

impl TmuxClient {
    pub fn new(tmpdir: Option<PathBuf>) -> Result<Self> {
        let binary = which::which("tmux").map_err(|_| AirfluxError::TmuxNotInstalled)?;
        Ok(Self { binary, tmpdir })
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).env_remove("TMUX");
        if let Some(dir) = &self.tmpdir {
            cmd.env(paths::TMUX_TMPDIR_VAR, dir);
        }
        cmd
    }

    /// Run a control command; non-zero exit is an error carrying stderr.
    fn run(&self, args: Vec<String>) -> Result<String> {
        tracing::debug!(args = %args.join(" "), "tmux");
        let output = self
            .command(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AirfluxError::CommandSpawn {
                program: self.binary.display().to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(AirfluxError::Tmux {
                command: args.first().cloned().unwrap_or_default(),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a lookup; `Ok(None)` when tmux reports the target or its server
    /// does not exist, any other failure is an error.
    fn lookup(&self, args: Vec<String>) -> Result<Option<String>> {
        // No socket directory, no server; tmux would fail creating it.
        if self.tmpdir.as_deref().is_some_and(|dir| !dir.is_dir()) {
            return Ok(None);
        }
        match self.run(args) {
            Ok(out) => Ok(Some(out)),
            Err(AirfluxError::Tmux { output, .. }) if is_absent(&output) => {
                tracing::debug!(%output, "tmux target absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// `=name` makes tmux match the session name exactly instead of by prefix.
fn exact(session: &str) -> String {
    format!("={session}")
}

/// Session target for commands that resolve a pane (`set-option`); a bare
/// `=name` is only accepted where a session is expected.
fn exact_pane(session: &str) -> String {
    format!("={session}:")
}

fn exact_window(session: &str, window: &str) -> String {
    format!("={session}:={window}")
}

/// Stderr of a lookup whose target, or whole server, is missing.
fn is_absent(stderr: &str) -> bool {
    stderr.contains("can't find session")
        || stderr.contains("can't find window")
        || stderr.contains("no server running")
        || (stderr.contains("error connecting to") && stderr.contains("No such file or directory"))
}

fn set_option_args(session: &str, option: &str, value: &str) -> Vec<String> {
    owned(&["set-option", "-t", &exact_pane(session), option, value])
}

fn set_pane_option_args(target: &PaneTarget, option: &str, value: &str) -> Vec<String> {
    owned(&["set-option", "-p", "-t", target.as_str(), option, value])
}

fn list_panes_args(session: &str, window: &str, option: &str) -> Vec<String> {
    let format = format!("#{{pane_id}} #{{{option}}}");
    owned(&[
        "list-panes",
        "-t",
        &exact_window(session, window),
        "-F",
        &format,
    ])
}

fn parse_panes(output: &str) -> Vec<(PaneTarget, String)> {
    output
        .lines()
        .filter_map(|line| {
            let (id, value) = line.split_once(' ').unwrap_or((line, ""));
            let id = id.trim();
            (!id.is_empty()).then(|| (PaneTarget::new(id), value.trim().to_string()))
        })
        .collect()
}

fn create_session_args(session: &str, window: &str, start_dir: &str) -> Vec<String> {
    owned(&[
        "new-session",
        "-d",
        "-s",
        session,
        "-n",
        window,
        "-c",
        start_dir,
        "-P",
        "-F",
        "#{pane_id}",
    ])
}

fn split_args(target: &PaneTarget, split: Split) -> Vec<String> {
    let flag = match split {
        Split::Vertical => "-v",
        Split::Horizontal => "-h",
    };
    owned(&[
        "split-window",
        flag,
        "-t",
        target.as_str(),
        "-P",
        "-F",
        "#{pane_id}",
    ])
}

fn send_keys_args(target: &PaneTarget, keys: &str, enter: bool) -> Vec<String> {
    let mut args = owned(&["send-keys", "-t", target.as_str(), keys]);
    if enter {
        args.push("Enter".to_string());
    }
    args
}

fn window_names(list_windows_output: &str) -> impl Iterator<Item = &str> {
    list_windows_output.lines().map(str::trim)
}

impl Multiplexer for TmuxClient {
    fn find_session(&self, session: &str) -> Result<bool> {
        let found = self.lookup(owned(&["has-session", "-t", &exact(session)]))?;
        Ok(found.is_some())
    }

    fn kill_session(&self, session: &str) -> Result<()> {
        self.run(owned(&["kill-session", "-t", &exact(session)]))
            .map(|_| ())
    }

    fn create_session(
        &self,
        session: &str,
        window: &str,
        start_dir: &str,
    ) -> Result<PaneTarget> {
        let pane = self.run(create_session_args(session, window, start_dir))?;
        Ok(PaneTarget::new(pane))
    }

    fn find_window(&self, session: &str, window: &str) -> Result<bool> {
        let args = owned(&["list-windows", "-t", &exact(session), "-F", "#{window_name}"]);
        Ok(self
            .lookup(args)?
            .is_some_and(|out| window_names(&out).any(|w| w == window)))
    }

    fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()> {
        self.run(set_option_args(session, option, value)).map(|_| ())
    }

    fn set_env(&self, session: &str, key: &str, value: &str) -> Result<()> {
        self.run(owned(&["set-environment", "-t", &exact(session), key, value]))
            .map(|_| ())
    }

    fn split_pane(&self, target: &PaneTarget, split: Split) -> Result<PaneTarget> {
        let pane = self.run(split_args(target, split))?;
        Ok(PaneTarget::new(pane))
    }

    fn set_pane_option(&self, target: &PaneTarget, option: &str, value: &str) -> Result<()> {
        self.run(set_pane_option_args(target, option, value))
            .map(|_| ())
    }

    fn list_panes(
        &self,
        session: &str,
        window: &str,
        option: &str,
    ) -> Result<Vec<(PaneTarget, String)>> {
        let out = self.run(list_panes_args(session, window, option))?;
        Ok(parse_panes(&out))
    }

    fn send_keys(&self, target: &PaneTarget, keys: &str, enter: bool) -> Result<()> {
        self.run(send_keys_args(target, keys, enter)).map(|_| ())
    }

    fn attach(&self, session: &str) -> Result<()> {
        let args = owned(&["attach-session", "-t", &exact(session)]);
        tracing::debug!(args = %args.join(" "), "tmux attach");
        let status = self
            .command(&args)
            .status()
            .map_err(|e| AirfluxError::CommandSpawn {
                program: self.binary.display().to_string(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(AirfluxError::Tmux {
                command: "attach-session".to_string(),
                output: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}
