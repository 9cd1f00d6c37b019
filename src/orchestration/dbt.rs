use super::ProcessCommand;
use crate::config::Settings;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbtAction {
    Run,
    Test,
}

impl DbtAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Test => "test",
        }
    }
}

/// `dbt run` / `dbt test` against the configured project
#[derive(Debug, Clone)]
pub struct DbtCommand {
    action: DbtAction,
    select: Option<String>,
    full_refresh: bool,
    project_dir: PathBuf,
    profiles_dir: PathBuf,
    target: String,
}

impl DbtCommand {
    pub fn new(action: DbtAction, settings: &Settings) -> Self {
        Self {
            action,
            select: None,
            full_refresh: false,
            project_dir: settings.dbt_project_dir.clone(),
            profiles_dir: settings.dbt_profiles_dir.clone(),
            target: settings.dbt_target.to_string(),
        }
    }

    pub fn select(mut self, model: Option<String>) -> Self {
        self.select = model;
        self
    }

    /// Only meaningful for `run`
    pub fn full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    /// Where dbt writes `run_results.json`
    pub fn run_results_path(&self) -> PathBuf {
        run_results_path(&self.project_dir)
    }

    pub fn build(&self) -> ProcessCommand {
        let mut cmd = ProcessCommand::new("dbt").arg(self.action.as_str());
        if let Some(model) = &self.select {
            cmd = cmd.args(["--select", model.as_str()]);
        }
        if self.full_refresh && self.action == DbtAction::Run {
            cmd = cmd.arg("--full-refresh");
        }
        cmd.arg("--project-dir")
            .path_arg(&self.project_dir)
            .arg("--profiles-dir")
            .path_arg(&self.profiles_dir)
            .args(["--target", self.target.as_str()])
    }
}

pub fn run_results_path(project_dir: &Path) -> PathBuf {
    project_dir.join("target").join("run_results.json")
}
