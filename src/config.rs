//! Locating project stores on disk.
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/active-project          name of the project used when none is given
//! <root>/projects/<name>/roadmap.db
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;

pub const DEFAULT_PROJECT: &str = "default";
const ROOT_ENV: &str = "TASKLEDGER_HOME";
const ACTIVE_FILE: &str = "active-project";
const STORE_FILE: &str = "roadmap.db";

#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
}

impl Config {
    /// `TASKLEDGER_HOME` if set, else the platform data directory.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(root));
        }
        let dirs = ProjectDirs::from("", "", "taskledger")
            .context("could not determine a data directory; set TASKLEDGER_HOME")?;
        Ok(Self::with_root(dirs.data_dir()))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self, project: &str) -> Result<PathBuf> {
        validate_name(project)?;
        Ok(self.root.join("projects").join(project).join(STORE_FILE))
    }

    pub fn active_project(&self) -> Result<String> {
        let path = self.root.join(ACTIVE_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let name = raw.trim();
                if name.is_empty() {
                    Ok(DEFAULT_PROJECT.to_string())
                } else {
                    Ok(name.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DEFAULT_PROJECT.to_string()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn set_active_project(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating {}", self.root.display()))?;
        let path = self.root.join(ACTIVE_FILE);
        fs::write(&path, format!("{name}\n"))
            .with_context(|| format!("writing {}", path.display()))
    }

    /// The explicitly named project, else the active one.
    pub fn resolve_project(&self, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(name) => {
                validate_name(name)?;
                Ok(name.to_string())
            }
            None => self.active_project(),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        bail!("invalid project name '{name}'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_project_defaults_when_unset() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        assert_eq!(config.active_project().unwrap(), DEFAULT_PROJECT);
    }

    #[test]
    fn use_switches_active_project() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        config.set_active_project("billing").unwrap();
        assert_eq!(config.active_project().unwrap(), "billing");
        assert_eq!(config.resolve_project(None).unwrap(), "billing");
        assert_eq!(config.resolve_project(Some("infra")).unwrap(), "infra");
    }

    #[test]
    fn projects_get_separate_files() {
        let config = Config::with_root("/data");
        let a = config.store_path("a").unwrap();
        let b = config.store_path("b").unwrap();
        assert_eq!(a, PathBuf::from("/data/projects/a/roadmap.db"));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_path_like_names() {
        let config = Config::with_root("/data");
        for name in ["", "..", "a/b", "a\\b"] {
            assert!(config.store_path(name).is_err(), "{name:?} accepted");
        }
    }
}
