pub mod config;
pub mod constraints;
pub mod error;
pub mod fetch;
pub mod io;
pub mod mux;
pub mod paths;
pub mod python;
pub mod runner;
pub mod scaffold;
pub mod session;
pub mod tags;
pub mod tmux;

pub use error::{AirfluxError, Result};
