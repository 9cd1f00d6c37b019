//! External tools driven by the CLI
//!
//! dbt, Dagster, docker compose and MkDocs run as child processes. Builders
//! produce a [`ProcessCommand`] and [`ProcessRunner`] executes it.

mod compose;
mod dagster;
mod dbt;
mod mkdocs;
mod process;

pub use compose::ComposeCommand;
pub use dagster::{DagsterCommand, prepare_dagster_home};
pub use dbt::{DbtAction, DbtCommand, run_results_path};
pub use mkdocs::MkDocsCommand;
pub use process::{ProcessCommand, ProcessRunner};
