//! Lifecycle of the tmux session that runs the Airflow components.
//!
//! Layout after `start` (pane indices are tmux's positional order):
//!
//! ```text
//! +-------------+-------------+
//! | 0 shell     | 1 webserver |
//! +-------------+-------------+
//! | 2 scheduler | 3 triggerer |
//! +-------------+-------------+
//! ```
//!
//! The triggerer pane only exists on Python 3.7 and newer. Positions depend
//! on the operator's `pane-base-index`, so each component pane carries its
//! name in the `@airflux_component` pane option and `stop` finds it by that.

use crate::config::Settings;
use crate::error::{AirfluxError, Result};
use crate::io;
use crate::mux::{Multiplexer, PaneTarget, Split};
use crate::paths;
use std::path::PathBuf;

/// Pane user option naming the component running in it.
pub const COMPONENT_OPTION: &str = "@airflux_component";

/// Stopped in this order.
const STOP_ORDER: [Component; 2] = [Component::Scheduler, Component::Webserver];

/// Long-running framework processes, each in its own pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Scheduler,
    Webserver,
    Triggerer,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Scheduler => "scheduler",
            Component::Webserver => "webserver",
            Component::Triggerer => "triggerer",
        }
    }

    pub fn command(&self) -> String {
        format!("airflow {}", self.as_str())
    }
}

/// What `start` built.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    pub session: String,
    pub main_pane: PaneTarget,
    pub panes: Vec<(Component, PaneTarget)>,
}

impl SessionLayout {
    pub fn pane(&self, component: Component) -> Option<&PaneTarget> {
        self.panes
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, p)| p)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StartOptions {
    pub attach: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self { attach: true }
    }
}

pub struct SessionManager<'a> {
    settings: &'a Settings,
    mux: &'a dyn Multiplexer,
}

impl<'a> SessionManager<'a> {
    pub fn new(settings: &'a Settings, mux: &'a dyn Multiplexer) -> Self {
        Self { settings, mux }
    }

    fn session_name(&self) -> &str {
        &self.settings.config.session.name
    }

    fn window_name(&self) -> &str {
        &self.settings.config.session.window
    }

    /// `AIRFLOW_HOME` as written by `new`, else the project directory.
    fn airflow_home(&self) -> Result<String> {
        let env = io::read_env_file(&paths::env_path(&self.settings.project_dir))?;
        Ok(env
            .into_iter()
            .find(|(k, _)| k == paths::AIRFLOW_HOME_VAR)
            .map(|(_, v)| v)
            .unwrap_or_else(|| self.settings.project_dir.display().to_string()))
    }

    fn activate_line(&self) -> String {
        let activate =
            paths::venv_activate(&self.settings.project_dir, &self.settings.config.venv_dir);
        format!("source {}", shell_quote(&activate.display().to_string()))
    }

    fn launch(&self, pane: &PaneTarget, component: Component) -> Result<()> {
        tracing::info!(pane = %pane, component = component.as_str(), "launching");
        self.mux
            .set_pane_option(pane, COMPONENT_OPTION, component.as_str())?;
        self.mux.send_keys(pane, &self.activate_line(), true)?;
        self.mux.send_keys(pane, &component.command(), true)
    }

    pub fn start(&self, opts: StartOptions) -> Result<SessionLayout> {
        let session = self.session_name();
        let window = self.window_name();
        let python = self.settings.require_python()?;

        // Kill first: the old server's socket lives in the scratch dir.
        if self.mux.find_session(session)? {
            tracing::info!(session, "killing existing session");
            self.mux.kill_session(session)?;
        }

        let scratch: PathBuf = self.settings.scratch_dir();
        io::reset_dir(&scratch)?;
        tracing::debug!(scratch = %scratch.display(), "scratch dir reset");

        let project_dir = self.settings.project_dir.display().to_string();
        let main_pane = self.mux.create_session(session, window, &project_dir)?;

        if self.settings.config.session.mouse {
            self.mux.set_option(session, "mouse", "on")?;
        }
        self.mux
            .set_env(session, paths::AIRFLOW_HOME_VAR, &self.airflow_home()?)?;
        self.mux
            .set_env(session, paths::TMUX_TMPDIR_VAR, &scratch.display().to_string())?;

        self.mux.send_keys(&main_pane, &self.activate_line(), true)?;
        self.mux.send_keys(&main_pane, "clear", true)?;

        let mut panes = Vec::new();

        let scheduler = self.mux.split_pane(&main_pane, Split::Vertical)?;
        self.launch(&scheduler, Component::Scheduler)?;
        panes.push((Component::Scheduler, scheduler.clone()));

        let webserver = self.mux.split_pane(&main_pane, Split::Horizontal)?;
        self.launch(&webserver, Component::Webserver)?;
        panes.push((Component::Webserver, webserver));

        if python.supports_triggerer() {
            let triggerer = self.mux.split_pane(&scheduler, Split::Horizontal)?;
            self.launch(&triggerer, Component::Triggerer)?;
            panes.push((Component::Triggerer, triggerer));
        } else {
            tracing::info!(
                python = %python,
                "triggerer needs python 3.7+, skipping"
            );
        }

        let layout = SessionLayout {
            session: session.to_string(),
            main_pane,
            panes,
        };

        if opts.attach {
            self.mux.attach(session)?;
        }
        Ok(layout)
    }

    pub fn stop(&self) -> Result<()> {
        let session = self.session_name();
        let window = self.window_name();

        if !self.mux.find_session(session)? {
            return Err(AirfluxError::SessionNotFound(session.to_string()));
        }
        if !self.mux.find_window(session, window)? {
            return Err(AirfluxError::SessionNotFound(format!("{session}:{window}")));
        }

        let panes = self.mux.list_panes(session, window, COMPONENT_OPTION)?;
        for component in STOP_ORDER {
            let Some((pane, _)) = panes.iter().find(|(_, tag)| tag == component.as_str())
            else {
                tracing::warn!(
                    component = component.as_str(),
                    "no pane tagged for component; it goes down with the session"
                );
                continue;
            };
            tracing::info!(pane = %pane, component = component.as_str(), "interrupting");
            self.mux.send_keys(pane, "C-c", false)?;
            self.mux.send_keys(pane, "exit", true)?;
        }

        self.mux.kill_session(session)
    }
}

/// Single-quote `s` for a POSIX shell unless it is plainly safe.
fn shell_quote(s: &str) -> String {
    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@".contains(c));
    if safe && !s.is_empty() {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::python::PythonVersion;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory tmux: sessions map to their window name and pane count.
    /// Panes and their component tags are kept for the one live window.
    #[derive(Default)]
    struct FakeMux {
        sessions: RefCell<HashMap<String, (String, usize)>>,
        panes: RefCell<Vec<(PaneTarget, String)>>,
        next_pane: RefCell<usize>,
        log: RefCell<Vec<String>>,
    }

    impl FakeMux {
        fn log(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn record(&self, entry: String) {
            self.log.borrow_mut().push(entry);
        }

        fn alloc_pane(&self) -> PaneTarget {
            let mut n = self.next_pane.borrow_mut();
            let pane = PaneTarget::new(format!("%{n}"));
            *n += 1;
            pane
        }

        fn split_count(&self) -> usize {
            self.log().iter().filter(|l| l.starts_with("split ")).count()
        }
    }

    impl Multiplexer for FakeMux {
        fn find_session(&self, session: &str) -> Result<bool> {
            Ok(self.sessions.borrow().contains_key(session))
        }

        fn kill_session(&self, session: &str) -> Result<()> {
            self.record(format!("kill {session}"));
            match self.sessions.borrow_mut().remove(session) {
                Some(_) => {
                    self.panes.borrow_mut().clear();
                    Ok(())
                }
                None => Err(AirfluxError::Tmux {
                    command: "kill-session".to_string(),
                    output: format!("can't find session: {session}"),
                }),
            }
        }

        fn create_session(
            &self,
            session: &str,
            window: &str,
            _start_dir: &str,
        ) -> Result<PaneTarget> {
            if self.sessions.borrow().contains_key(session) {
                return Err(AirfluxError::Tmux {
                    command: "new-session".to_string(),
                    output: format!("duplicate session: {session}"),
                });
            }
            self.record(format!("create {session}:{window}"));
            self.sessions
                .borrow_mut()
                .insert(session.to_string(), (window.to_string(), 1));
            let pane = self.alloc_pane();
            self.panes.borrow_mut().push((pane.clone(), String::new()));
            Ok(pane)
        }

        fn find_window(&self, session: &str, window: &str) -> Result<bool> {
            Ok(self
                .sessions
                .borrow()
                .get(session)
                .is_some_and(|(w, _)| w == window))
        }

        fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()> {
            self.record(format!("option {session} {option}={value}"));
            Ok(())
        }

        fn set_env(&self, session: &str, key: &str, value: &str) -> Result<()> {
            self.record(format!("env {session} {key}={value}"));
            Ok(())
        }

        fn split_pane(&self, target: &PaneTarget, split: Split) -> Result<PaneTarget> {
            let pane = self.alloc_pane();
            self.record(format!("split {target} {split:?} -> {pane}"));
            for (_, count) in self.sessions.borrow_mut().values_mut() {
                *count += 1;
            }
            self.panes.borrow_mut().push((pane.clone(), String::new()));
            Ok(pane)
        }

        fn set_pane_option(&self, target: &PaneTarget, option: &str, value: &str) -> Result<()> {
            self.record(format!("tag {target} {option}={value}"));
            let mut panes = self.panes.borrow_mut();
            let Some((_, tag)) = panes.iter_mut().find(|(p, _)| p == target) else {
                return Err(AirfluxError::Tmux {
                    command: "set-option".to_string(),
                    output: format!("can't find pane: {target}"),
                });
            };
            *tag = value.to_string();
            Ok(())
        }

        fn list_panes(
            &self,
            _session: &str,
            _window: &str,
            _option: &str,
        ) -> Result<Vec<(PaneTarget, String)>> {
            Ok(self.panes.borrow().clone())
        }

        fn send_keys(&self, target: &PaneTarget, keys: &str, enter: bool) -> Result<()> {
            let suffix = if enter { " <Enter>" } else { "" };
            self.record(format!("keys {target} {keys}{suffix}"));
            Ok(())
        }

        fn attach(&self, session: &str) -> Result<()> {
            self.record(format!("attach {session}"));
            Ok(())
        }
    }

    fn settings(dir: &TempDir, python: PythonVersion) -> Settings {
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        Settings::new(
            project,
            dir.path().join("home"),
            Some(python),
            Config::default(),
        )
    }

    fn keys_for(log: &[String], pane: &PaneTarget) -> Vec<String> {
        let prefix = format!("keys {pane} ");
        log.iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    #[test]
    fn start_builds_full_layout_on_modern_python() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();

        let layout = SessionManager::new(&settings, &mux)
            .start(StartOptions::default())
            .unwrap();

        assert_eq!(mux.split_count(), 3);
        assert_eq!(layout.panes.len(), 3);
        let log = mux.log();
        assert_eq!(log[0], "create Airflux:Main");
        assert!(log.contains(&"option Airflux mouse=on".to_string()));
        assert_eq!(log.last().unwrap(), "attach Airflux");

        let scheduler = layout.pane(Component::Scheduler).unwrap();
        let webserver = layout.pane(Component::Webserver).unwrap();
        let triggerer = layout.pane(Component::Triggerer).unwrap();
        let main = &layout.main_pane;
        assert!(log.contains(&format!("split {main} Vertical -> {scheduler}")));
        assert!(log.contains(&format!("split {main} Horizontal -> {webserver}")));
        assert!(log.contains(&format!("split {scheduler} Horizontal -> {triggerer}")));

        let activate = format!(
            "source {}/project/venv/bin/activate <Enter>",
            dir.path().display()
        );
        assert_eq!(keys_for(&log, main), vec![activate.clone(), "clear <Enter>".to_string()]);
        assert_eq!(
            keys_for(&log, scheduler),
            vec![activate.clone(), "airflow scheduler <Enter>".to_string()]
        );
        assert_eq!(
            keys_for(&log, webserver),
            vec![activate.clone(), "airflow webserver <Enter>".to_string()]
        );
        assert_eq!(
            keys_for(&log, triggerer),
            vec![activate, "airflow triggerer <Enter>".to_string()]
        );
    }

    #[test]
    fn start_skips_triggerer_on_old_python() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 6));
        let mux = FakeMux::default();

        let layout = SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        assert_eq!(mux.split_count(), 2);
        assert!(layout.pane(Component::Triggerer).is_none());
        assert!(!mux.log().iter().any(|l| l.contains("triggerer")));
        assert!(!mux.log().iter().any(|l| l.starts_with("attach")));
    }

    #[test]
    fn split_order_is_scheduler_webserver_triggerer() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 7));
        let mux = FakeMux::default();

        SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        let launched: Vec<String> = mux
            .log()
            .iter()
            .filter(|l| l.contains("airflow "))
            .map(|l| l.rsplit("airflow ").next().unwrap().to_string())
            .collect();
        assert_eq!(
            launched,
            ["scheduler <Enter>", "webserver <Enter>", "triggerer <Enter>"]
        );
    }

    #[test]
    fn start_twice_replaces_the_session() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();
        let manager = SessionManager::new(&settings, &mux);

        manager.start(StartOptions { attach: false }).unwrap();
        manager.start(StartOptions { attach: false }).unwrap();

        let log = mux.log();
        let creates = log.iter().filter(|l| l.starts_with("create ")).count();
        assert_eq!(creates, 2);
        assert_eq!(log.iter().filter(|l| *l == "kill Airflux").count(), 1);
        assert_eq!(mux.sessions.borrow().len(), 1);
        assert_eq!(mux.sessions.borrow()["Airflux"], ("Main".to_string(), 4));
    }

    #[test]
    fn start_resets_scratch_dir_and_exports_env() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let scratch = settings.scratch_dir();
        std::fs::create_dir_all(scratch.join("tmux-1000")).unwrap();
        std::fs::write(scratch.join("tmux-1000/default"), "stale").unwrap();
        std::fs::write(
            settings.project_dir.join(".env"),
            "AIRFLOW_HOME=/srv/elsewhere\n",
        )
        .unwrap();
        let mux = FakeMux::default();

        SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        assert!(scratch.is_dir());
        assert!(!scratch.join("tmux-1000").exists());
        let log = mux.log();
        assert!(log.contains(&"env Airflux AIRFLOW_HOME=/srv/elsewhere".to_string()));
        assert!(log.contains(&format!("env Airflux TMUX_TMPDIR={}", scratch.display())));
    }

    #[test]
    fn airflow_home_falls_back_to_project_dir() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();

        SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        let expected = format!(
            "env Airflux AIRFLOW_HOME={}",
            settings.project_dir.display()
        );
        assert!(mux.log().contains(&expected));
    }

    #[test]
    fn mouse_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, PythonVersion::new(3, 11));
        settings.config.session.mouse = false;
        let mux = FakeMux::default();

        SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        assert!(!mux.log().iter().any(|l| l.starts_with("option ")));
    }

    #[test]
    fn stop_interrupts_components_then_kills() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();
        let manager = SessionManager::new(&settings, &mux);
        manager.start(StartOptions { attach: false }).unwrap();
        mux.log.borrow_mut().clear();

        manager.stop().unwrap();

        // %0 main, %1 scheduler, %2 webserver, %3 triggerer
        assert_eq!(
            mux.log(),
            [
                "keys %1 C-c",
                "keys %1 exit <Enter>",
                "keys %2 C-c",
                "keys %2 exit <Enter>",
                "kill Airflux",
            ]
        );
        assert!(mux.sessions.borrow().is_empty());
    }

    #[test]
    fn start_tags_every_component_pane() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();

        let layout = SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap();

        let panes = mux.panes.borrow();
        assert!(panes.contains(&(layout.main_pane.clone(), String::new())));
        for (component, pane) in &layout.panes {
            assert!(panes.contains(&(pane.clone(), component.as_str().to_string())));
        }
    }

    #[test]
    fn stop_finds_components_by_tag_not_position() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();
        // Layout as listed with pane-base-index 1: the shell is not first.
        mux.create_session("Airflux", "Main", "/").unwrap();
        *mux.panes.borrow_mut() = vec![
            (PaneTarget::new("%7"), "webserver".to_string()),
            (PaneTarget::new("%4"), String::new()),
            (PaneTarget::new("%9"), "triggerer".to_string()),
            (PaneTarget::new("%5"), "scheduler".to_string()),
        ];
        mux.log.borrow_mut().clear();

        SessionManager::new(&settings, &mux).stop().unwrap();

        assert_eq!(
            mux.log(),
            [
                "keys %5 C-c",
                "keys %5 exit <Enter>",
                "keys %7 C-c",
                "keys %7 exit <Enter>",
                "kill Airflux",
            ]
        );
    }

    #[test]
    fn stop_without_tags_still_kills_the_session() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();
        mux.create_session("Airflux", "Main", "/").unwrap();
        mux.log.borrow_mut().clear();

        SessionManager::new(&settings, &mux).stop().unwrap();

        assert_eq!(mux.log(), ["kill Airflux"]);
    }

    #[test]
    fn start_needs_a_python_version() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, PythonVersion::new(3, 11));
        settings.python_version = None;
        let mux = FakeMux::default();

        let err = SessionManager::new(&settings, &mux)
            .start(StartOptions { attach: false })
            .unwrap_err();

        assert!(matches!(err, AirfluxError::PythonVersionUnresolved));
        assert!(mux.log().is_empty());
    }

    #[test]
    fn stop_without_session_is_session_not_found() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();

        let err = SessionManager::new(&settings, &mux).stop().unwrap_err();

        assert!(matches!(err, AirfluxError::SessionNotFound(ref s) if s == "Airflux"));
        assert!(mux.log().is_empty());
    }

    #[test]
    fn stop_without_window_is_session_not_found() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir, PythonVersion::new(3, 11));
        let mux = FakeMux::default();
        mux.create_session("Airflux", "scratch", "/").unwrap();

        let err = SessionManager::new(&settings, &mux).stop().unwrap_err();

        assert!(matches!(err, AirfluxError::SessionNotFound(ref s) if s == "Airflux:Main"));
        assert!(mux.sessions.borrow().contains_key("Airflux"));
    }

    #[test]
    fn shell_quote_leaves_plain_paths() {
        assert_eq!(shell_quote("/srv/flows/venv/bin/activate"), "/srv/flows/venv/bin/activate");
        assert_eq!(shell_quote("/srv/my flows/activate"), "'/srv/my flows/activate'");
        assert_eq!(shell_quote("/srv/it's"), r"'/srv/it'\''s'");
    }

    /// Restores `$TMUX` when dropped.
    struct TmuxEnvGuard(Option<std::ffi::OsString>);

    impl Drop for TmuxEnvGuard {
        fn drop(&mut self) {
            match self.0.take() {
                Some(v) => std::env::set_var("TMUX", v),
                None => std::env::remove_var("TMUX"),
            }
        }
    }

    /// Full start/stop against a real tmux server in a private scratch dir,
    /// run as if from inside another tmux; skipped when tmux is missing.
    #[test]
    fn start_and_stop_against_real_tmux() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir, PythonVersion::new(3, 11));
        settings.config.session.name = "airflux-it".to_string();
        settings.config.session.scratch_dir = Some(dir.path().join("scratch"));
        let Ok(tmux) = crate::tmux::TmuxClient::new(Some(settings.scratch_dir())) else {
            return;
        };

        let foreign = dir.path().join("foreign.sock");
        let _guard = TmuxEnvGuard(std::env::var_os("TMUX"));
        std::env::set_var("TMUX", format!("{},1,0", foreign.display()));

        let manager = SessionManager::new(&settings, &tmux);
        let layout = manager.start(StartOptions { attach: false }).unwrap();

        assert_eq!(layout.panes.len(), 3);
        assert!(tmux.find_session("airflux-it").unwrap());
        let tagged: Vec<String> = tmux
            .list_panes("airflux-it", "Main", COMPONENT_OPTION)
            .unwrap()
            .into_iter()
            .map(|(_, tag)| tag)
            .filter(|tag| !tag.is_empty())
            .collect();
        assert_eq!(tagged.len(), 3);
        for component in [Component::Scheduler, Component::Webserver, Component::Triggerer] {
            assert!(tagged.iter().any(|t| t == component.as_str()));
        }

        // A second start replaces the session on the same server.
        manager.start(StartOptions { attach: false }).unwrap();

        manager.stop().unwrap();
        assert!(!tmux.find_session("airflux-it").unwrap());
        assert!(!foreign.exists());
    }
}
