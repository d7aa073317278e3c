use crate::output;
use crate::settings::{self, PythonSource};
use airflux_core::{
    config::UserConfig,
    fetch::ReqwestFetcher,
    runner::SystemRunner,
    scaffold::{NewProject, Scaffolder},
};
use anyhow::Context;
use clap::Args;
use std::path::Path;

/// Admin account created by `airflow users create`; unset flags fall back to
/// `user.*` in airflux.yaml.
#[derive(Args, Debug, Default)]
pub struct UserArgs {
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub firstname: Option<String>,
    #[arg(long)]
    pub lastname: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
}

impl UserArgs {
    fn apply(self, mut user: UserConfig) -> UserConfig {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.firstname {
            user.firstname = v;
        }
        if let Some(v) = self.lastname {
            user.lastname = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.password {
            user.password = v;
        }
        user
    }
}

pub fn run(
    root: &Path,
    python: Option<&str>,
    version: &str,
    user: UserArgs,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("failed to create {}", root.display()))?;
    let settings = settings::load(root, PythonSource::Resolve(python))?;

    let request = NewProject {
        version: version.to_string(),
        user: user.apply(settings.config.user.clone()),
    };

    let fetcher = ReqwestFetcher::new()?;
    let runner = SystemRunner;
    let scaffolder = Scaffolder::new(&settings, &fetcher, &runner)?;
    let constraint = scaffolder.constraint_for(version);

    println!("Creating Airflow {version} project in: {}", root.display());
    println!("  python:      {}", settings.require_python()?);
    println!("  constraints: {}", constraint.url);

    let result = scaffolder.run(&request, |step| println!("  done: {step}"));

    if let Err(failure) = result {
        if let Some(captured) = failure.source.captured_output() {
            output::page(captured)?;
        }
        return Err(failure.into());
    }

    println!("\nProject ready. Next: airflux start");
    Ok(())
}
