use crate::settings::{self, PythonSource};
use airflux_core::{session::SessionManager, tmux::TmuxClient};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let settings = settings::load(root, PythonSource::Unused)?;
    let tmux = TmuxClient::new(Some(settings.scratch_dir()))?;

    SessionManager::new(&settings, &tmux).stop()?;
    println!("Stopped session: {}", settings.config.session.name);
    Ok(())
}
