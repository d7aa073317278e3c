use crate::settings::{self, PythonSource};
use airflux_core::{
    session::{SessionManager, StartOptions},
    tmux::TmuxClient,
};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, python: Option<&str>, attach: bool) -> anyhow::Result<()> {
    let settings = settings::load(root, PythonSource::Resolve(python))?;
    let tmux = TmuxClient::new(Some(settings.scratch_dir()))?;

    let layout = SessionManager::new(&settings, &tmux)
        .start(StartOptions { attach })
        .with_context(|| format!("failed to start session {}", settings.config.session.name))?;

    if !attach {
        println!("Started session: {}", layout.session);
        for (component, pane) in &layout.panes {
            println!("  {:<10} {pane}", component.as_str());
        }
        println!(
            "\nAttach with: TMUX_TMPDIR={} tmux attach -t {}",
            settings.scratch_dir().display(),
            layout.session
        );
    }
    Ok(())
}
