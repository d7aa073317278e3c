use crate::output::print_json;
use crate::settings;
use airflux_core::{
    runner::SystemRunner,
    tags::{self, GitTagLister},
};
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = settings::load_config(root)?;
    let runner = SystemRunner;
    let lister = GitTagLister::new(&runner);
    let versions = tags::list_versions(&lister, &config.repository)
        .with_context(|| format!("failed to list versions from {}", config.repository))?;

    if json {
        print_json(&versions)?;
    } else {
        for v in &versions {
            println!("{v}");
        }
    }
    Ok(())
}
