//! Project provisioning for `airflux new`.
//!
//! The plan is an ordered list of [`Step`]s run against the project directory.
//! Each step's `precheck` runs at its own turn, immediately before its
//! `execute`. The first failure aborts the run and is returned as a
//! [`StepFailure`]; nothing already written is removed, so a re-run needs the
//! operator to delete the stray artifacts first.

use crate::config::{Settings, UserConfig};
use crate::constraints::{self, ConstraintRef};
use crate::error::{AirfluxError, Result};
use crate::fetch::HttpFetcher;
use crate::io;
use crate::paths;
use crate::python::PythonVersion;
use crate::runner::{CommandOutput, CommandRunner, Invocation};
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Step names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepName {
    Precheck,
    FetchConstraints,
    WriteRequirements,
    WriteEnv,
    CreateVenv,
    InstallPackages,
    DbInit,
    CreateUser,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Precheck => "precheck",
            StepName::FetchConstraints => "fetch-constraints",
            StepName::WriteRequirements => "write-requirements",
            StepName::WriteEnv => "write-env",
            StepName::CreateVenv => "create-venv",
            StepName::InstallPackages => "install-packages",
            StepName::DbInit => "db-init",
            StepName::CreateUser => "create-user",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step that aborted a run and why.
#[derive(Debug, thiserror::Error)]
#[error("step '{step}' failed")]
pub struct StepFailure {
    pub step: StepName,
    #[source]
    pub source: AirfluxError,
}

// ---------------------------------------------------------------------------
// Request / context
// ---------------------------------------------------------------------------

/// Inputs to `airflux new`.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub version: String,
    pub user: UserConfig,
}

/// Everything a step can read. Steps share no mutable state; artifacts on
/// disk are the hand-off between them.
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub python: PythonVersion,
    pub request: &'a NewProject,
    pub constraint: ConstraintRef,
    pub fetcher: &'a dyn HttpFetcher,
    pub runner: &'a dyn CommandRunner,
}

impl Context<'_> {
    fn constraint_path(&self) -> PathBuf {
        self.settings.project_dir.join(&self.constraint.filename)
    }

    fn airflow_home(&self) -> String {
        self.settings.project_dir.display().to_string()
    }

    fn run(&self, inv: Invocation) -> Result<CommandOutput> {
        self.runner.run(&inv)
    }
}

fn ensure_absent(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Err(AirfluxError::AlreadyExists(path));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

pub trait Step {
    fn name(&self) -> StepName;

    /// Filesystem checks evaluated right before `execute`.
    fn precheck(&self, _ctx: &Context<'_>) -> Result<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()>;
}

struct Precheck;

impl Step for Precheck {
    fn name(&self) -> StepName {
        StepName::Precheck
    }

    fn precheck(&self, ctx: &Context<'_>) -> Result<()> {
        ensure_absent(ctx.constraint_path())?;
        ensure_absent(paths::requirements_path(&ctx.settings.project_dir))?;
        ensure_absent(ctx.settings.venv_dir())
    }

    fn execute(&self, _ctx: &Context<'_>) -> Result<()> {
        Ok(())
    }
}

struct FetchConstraints;

impl Step for FetchConstraints {
    fn name(&self) -> StepName {
        StepName::FetchConstraints
    }

    fn precheck(&self, ctx: &Context<'_>) -> Result<()> {
        ensure_absent(ctx.constraint_path())
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let resp = ctx.fetcher.get(&ctx.constraint.url)?;
        if !resp.is_success() {
            return Err(AirfluxError::ConstraintNotFound {
                version: ctx.request.version.clone(),
                python: ctx.python.to_string(),
                url: ctx.constraint.url.clone(),
                status: resp.status,
            });
        }
        io::write_new(&ctx.constraint_path(), &resp.body)
    }
}

struct WriteRequirements;

impl Step for WriteRequirements {
    fn name(&self) -> StepName {
        StepName::WriteRequirements
    }

    fn precheck(&self, ctx: &Context<'_>) -> Result<()> {
        ensure_absent(paths::requirements_path(&ctx.settings.project_dir))
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let line = format!(
            "{}=={}\n",
            ctx.settings.config.package, ctx.request.version
        );
        io::write_new(
            &paths::requirements_path(&ctx.settings.project_dir),
            line.as_bytes(),
        )
    }
}

struct WriteEnv;

impl Step for WriteEnv {
    fn name(&self) -> StepName {
        StepName::WriteEnv
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let line = format!("{}={}\n", paths::AIRFLOW_HOME_VAR, ctx.airflow_home());
        io::atomic_write(&paths::env_path(&ctx.settings.project_dir), line.as_bytes())
    }
}

struct CreateVenv;

impl Step for CreateVenv {
    fn name(&self) -> StepName {
        StepName::CreateVenv
    }

    fn precheck(&self, ctx: &Context<'_>) -> Result<()> {
        ensure_absent(ctx.settings.venv_dir())
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let settings = ctx.settings;
        let out = ctx.run(
            Invocation::new(&settings.config.python, &settings.project_dir).args([
                "-m",
                "venv",
                settings.config.venv_dir.as_str(),
            ]),
        )?;
        if !out.success() {
            return Err(AirfluxError::VenvFailed(out.output));
        }
        Ok(())
    }
}

struct InstallPackages;

impl Step for InstallPackages {
    fn name(&self) -> StepName {
        StepName::InstallPackages
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let settings = ctx.settings;
        let out = ctx.run(
            Invocation::new(settings.venv_bin("pip"), &settings.project_dir).args([
                "install",
                "-r",
                paths::REQUIREMENTS_FILE,
                "-c",
                ctx.constraint.filename.as_str(),
            ]),
        )?;
        if !out.success() {
            return Err(AirfluxError::InstallFailed(out.output));
        }
        Ok(())
    }
}

struct DbInit;

impl Step for DbInit {
    fn name(&self) -> StepName {
        StepName::DbInit
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let settings = ctx.settings;
        let out = ctx.run(
            Invocation::new(settings.venv_bin("airflow"), &settings.project_dir)
                .args(["db", "init"])
                .env(paths::AIRFLOW_HOME_VAR, ctx.airflow_home()),
        )?;
        if !out.success() {
            return Err(AirfluxError::DbInitFailed(out.output));
        }
        Ok(())
    }
}

struct CreateUser;

impl Step for CreateUser {
    fn name(&self) -> StepName {
        StepName::CreateUser
    }

    fn execute(&self, ctx: &Context<'_>) -> Result<()> {
        let settings = ctx.settings;
        let user = &ctx.request.user;
        let out = ctx.run(
            Invocation::new(settings.venv_bin("airflow"), &settings.project_dir)
                .args(["users", "create"])
                .args(["--username", user.username.as_str()])
                .args(["--firstname", user.firstname.as_str()])
                .args(["--lastname", user.lastname.as_str()])
                .args(["--role", "Admin"])
                .args(["--email", user.email.as_str()])
                .args(["--password", user.password.as_str()])
                .env(paths::AIRFLOW_HOME_VAR, ctx.airflow_home()),
        )?;
        if !out.success() {
            return Err(AirfluxError::UserCreateFailed(out.output));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

pub struct Plan {
    steps: Vec<Box<dyn Step>>,
}

impl Plan {
    pub fn standard() -> Self {
        Self {
            steps: vec![
                Box::new(Precheck),
                Box::new(FetchConstraints),
                Box::new(WriteRequirements),
                Box::new(WriteEnv),
                Box::new(CreateVenv),
                Box::new(InstallPackages),
                Box::new(DbInit),
                Box::new(CreateUser),
            ],
        }
    }

    pub fn names(&self) -> Vec<StepName> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order, calling `on_step` after each one completes.
    pub fn run(
        &self,
        ctx: &Context<'_>,
        mut on_step: impl FnMut(StepName),
    ) -> std::result::Result<(), StepFailure> {
        for step in &self.steps {
            let name = step.name();
            tracing::info!(step = %name, "starting");
            step.precheck(ctx)
                .and_then(|()| step.execute(ctx))
                .map_err(|source| {
                    tracing::warn!(step = %name, error = %source, "aborting");
                    StepFailure { step: name, source }
                })?;
            on_step(name);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scaffolder
// ---------------------------------------------------------------------------

pub struct Scaffolder<'a> {
    settings: &'a Settings,
    python: PythonVersion,
    fetcher: &'a dyn HttpFetcher,
    runner: &'a dyn CommandRunner,
    plan: Plan,
}

impl<'a> Scaffolder<'a> {
    pub fn new(
        settings: &'a Settings,
        fetcher: &'a dyn HttpFetcher,
        runner: &'a dyn CommandRunner,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            python: settings.require_python()?,
            fetcher,
            runner,
            plan: Plan::standard(),
        })
    }

    /// Constraint file `request` will use.
    pub fn constraint_for(&self, version: &str) -> ConstraintRef {
        constraints::resolve(
            &self.settings.config.constraints_base,
            version,
            &self.python,
        )
    }

    pub fn run(
        &self,
        request: &NewProject,
        on_step: impl FnMut(StepName),
    ) -> std::result::Result<(), StepFailure> {
        let ctx = Context {
            settings: self.settings,
            python: self.python,
            request,
            constraint: self.constraint_for(&request.version),
            fetcher: self.fetcher,
            runner: self.runner,
        };
        self.plan.run(&ctx, on_step)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
