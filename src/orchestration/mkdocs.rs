use super::ProcessCommand;
use std::path::{Path, PathBuf};

/// `mkdocs` against `<root>/docs/mkdocs.yml`
#[derive(Debug, Clone)]
pub struct MkDocsCommand {
    config: PathBuf,
    root: PathBuf,
}

impl MkDocsCommand {
    pub fn new(root: &Path) -> Self {
        Self {
            config: root.join("docs").join("mkdocs.yml"),
            root: root.to_path_buf(),
        }
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    pub fn serve(&self, host: &str, port: u16) -> ProcessCommand {
        ProcessCommand::new("mkdocs")
            .args(["serve", "-f"])
            .path_arg(&self.config)
            .arg("--dev-addr")
            .arg(format!("{}:{}", host, port))
            .current_dir(&self.root)
    }

    pub fn build(&self) -> ProcessCommand {
        ProcessCommand::new("mkdocs")
            .args(["build", "-f"])
            .path_arg(&self.config)
            .current_dir(&self.root)
    }
}
