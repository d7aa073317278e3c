mod cmd;
mod output;
mod root;
mod settings;

use clap::{Parser, Subcommand};
use cmd::new::UserArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "airflux",
    about = "Bootstrap a local Airflow project and run its components in tmux",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project directory (default: nearest ancestor holding a .env, else cwd)
    #[arg(long, global = true, env = "AIRFLUX_ROOT")]
    root: Option<PathBuf>,

    /// Python major.minor to assume instead of probing the interpreter
    #[arg(long, global = true, env = "AIRFLUX_PYTHON_VERSION", value_name = "X.Y")]
    python_version: Option<String>,

    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List Airflow versions that publish constraint files
    Versions {
        /// Output as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Scaffold a project: constraints, venv, database and admin user
    New {
        /// Airflow version, e.g. 2.7.0
        #[arg(id = "airflow_version", value_name = "VERSION", value_parser = clap::builder::NonEmptyStringValueParser::new())]
        version: String,

        #[command(flatten)]
        user: UserArgs,
    },

    /// Start scheduler, webserver and triggerer in a fresh tmux session
    Start {
        /// Leave the session running in the background
        #[arg(long)]
        no_attach: bool,
    },

    /// Stop the components and kill the tmux session
    Stop,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let explicit_root = cli.root.as_deref();
    let python = cli.python_version.as_deref();

    let result = match cli.command {
        Commands::Versions { json } => cmd::versions::run(&root::resolve_root(explicit_root), json),
        Commands::New { version, user } => {
            cmd::new::run(&root::new_project_root(explicit_root), python, &version, user)
        }
        Commands::Start { no_attach } => {
            cmd::start::run(&root::resolve_root(explicit_root), python, !no_attach)
        }
        Commands::Stop => cmd::stop::run(&root::resolve_root(explicit_root)),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
