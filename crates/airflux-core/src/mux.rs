use crate::error::Result;
use std::fmt;

/// A tmux target: a pane id (`%3`) or `session:window.index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaneTarget(String);

impl PaneTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of a new pane relative to the one being split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// New pane below.
    Vertical,
    /// New pane to the right.
    Horizontal,
}

/// The subset of the tmux server the session manager drives.
pub trait Multiplexer {
    fn find_session(&self, session: &str) -> Result<bool>;

    fn kill_session(&self, session: &str) -> Result<()>;

    /// Create a detached session whose single window is named `window`,
    /// returning that window's initial pane.
    fn create_session(&self, session: &str, window: &str, start_dir: &str)
        -> Result<PaneTarget>;

    fn find_window(&self, session: &str, window: &str) -> Result<bool>;

    fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()>;

    fn set_env(&self, session: &str, key: &str, value: &str) -> Result<()>;

    fn split_pane(&self, target: &PaneTarget, split: Split) -> Result<PaneTarget>;

    /// Set a user option (`@name`) on one pane.
    fn set_pane_option(&self, target: &PaneTarget, option: &str, value: &str) -> Result<()>;

    /// Every pane of the window with its value of `option` (empty when unset).
    fn list_panes(
        &self,
        session: &str,
        window: &str,
        option: &str,
    ) -> Result<Vec<(PaneTarget, String)>>;

    /// Type `keys` into the pane, followed by Enter when `enter` is set.
    fn send_keys(&self, target: &PaneTarget, keys: &str, enter: bool) -> Result<()>;

    /// Hand the terminal to the session; blocks until the operator detaches.
    fn attach(&self, session: &str) -> Result<()>;
}
