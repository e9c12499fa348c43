// src/branch.rs

//! Branch Manager.
//!
//! Owns the `.synthdb/` project directory: a hand-rolled INI-like config
//! file (`[database]`, `[branches]`, `[branch.<name>]` sections) and a
//! `databases/` directory of branch database files. The grammar is small
//! and bespoke enough that a full INI/TOML crate would be overkill, so
//! the parser/writer here is hand-rolled.
//!
//! The core (`Connection`) has no awareness of branches; this module only
//! ever hands back filesystem paths for the caller to `Connection::open`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DEFAULT_BRANCH: &str = "main";

/// One `[branch.<name>]` section's fields.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    pub database: String,
    pub created: String,
}

/// A parsed `.synthdb/config` file: an ordered list of sections, each an
/// ordered list of key=value pairs, mirroring `configparser`'s shape
/// closely enough to round-trip the sections this crate cares about.
#[derive(Debug, Default, Clone)]
struct Ini {
    sections: Vec<(String, BTreeMap<String, String>)>,
}

impl Ini {
    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .and_then(|(_, fields)| fields.get(key))
            .map(String::as_str)
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        if let Some((_, fields)) = self.sections.iter_mut().find(|(name, _)| name == section) {
            fields.insert(key.to_string(), value.to_string());
        } else {
            let mut fields = BTreeMap::new();
            fields.insert(key.to_string(), value.to_string());
            self.sections.push((section.to_string(), fields));
        }
    }

    fn sections_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a BTreeMap<String, String>)> {
        self.sections
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
            .map(|(name, fields)| (name.as_str(), fields))
    }

    fn parse(text: &str) -> Self {
        let mut ini = Ini::default();
        let mut current: Option<String> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(['#', ';']) {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[') {
                if let Some(name) = stripped.strip_suffix(']') {
                    ini.sections.push((name.to_string(), BTreeMap::new()));
                    current = Some(name.to_string());
                    continue;
                }
            }
            if let Some((key, value)) = line.split_once('=') {
                if let Some(section) = &current {
                    if let Some((_, fields)) = ini.sections.iter_mut().find(|(n, _)| n == section) {
                        fields.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
            }
        }
        ini
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (name, fields) in &self.sections {
            out.push_str(&format!("[{name}]\n"));
            for (key, value) in fields {
                out.push_str(&format!("{key} = {value}\n"));
            }
            out.push('\n');
        }
        out
    }
}

/// A handle onto an initialized `.synthdb/` project directory.
pub struct Project {
    root: PathBuf,
}

impl Project {
    fn synthdb_dir(&self) -> PathBuf {
        self.root.join(".synthdb")
    }

    fn config_path(&self) -> PathBuf {
        self.synthdb_dir().join("config")
    }

    fn read_config(&self) -> Result<Ini> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(Ini::default());
        }
        Ok(Ini::parse(&fs::read_to_string(path)?))
    }

    fn write_config(&self, ini: &Ini) -> Result<()> {
        fs::write(self.config_path(), ini.render())?;
        Ok(())
    }

    /// Open a handle onto an existing project root without touching disk
    /// beyond what callers subsequently ask for.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create `.synthdb/` under `root` with a default config: a `main`
    /// branch pointing at `.synthdb/databases/main.db`, active.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let project = Project::at(root);
        let synthdb_dir = project.synthdb_dir();
        fs::create_dir_all(synthdb_dir.join("databases"))?;

        let mut ini = Ini::default();
        ini.set("database", "default", &format!(".synthdb/databases/{DEFAULT_BRANCH}.db"));
        ini.set("database", "backend", "sqlite");
        ini.set("branches", "active", DEFAULT_BRANCH);
        ini.set(
            &format!("branch.{DEFAULT_BRANCH}"),
            "database",
            &format!(".synthdb/databases/{DEFAULT_BRANCH}.db"),
        );
        ini.set(&format!("branch.{DEFAULT_BRANCH}"), "created", "initial");
        project.write_config(&ini)?;

        Ok(project)
    }

    /// Create a new branch by copying `from`'s (default: active) database
    /// file bytes, and recording the branch in the config.
    pub fn create_branch(&self, name: &str, from: Option<&str>) -> Result<PathBuf> {
        let mut ini = self.read_config()?;
        let from_branch = match from {
            Some(f) => f.to_string(),
            None => self.active_branch_from(&ini),
        };

        let relative_db_path = format!(".synthdb/databases/{name}.db");
        let new_db_path = self.root.join(&relative_db_path);

        if let Some(source_path) = self.database_path_from(&ini, &from_branch) {
            if source_path.exists() {
                if let Some(parent) = new_db_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&source_path, &new_db_path)?;
            }
        }

        ini.set(&format!("branch.{name}"), "database", &relative_db_path);
        ini.set(&format!("branch.{name}"), "created", &format!("from {from_branch}"));
        self.write_config(&ini)?;

        Ok(new_db_path)
    }

    /// Rewrite `[branches] active` to `name`. Does not validate that the
    /// branch exists — callers query `list_branches` first if they want
    /// that check.
    pub fn set_active_branch(&self, name: &str) -> Result<()> {
        let mut ini = self.read_config()?;
        ini.set("branches", "active", name);
        self.write_config(&ini)
    }

    pub fn active_branch(&self) -> Result<String> {
        let ini = self.read_config()?;
        Ok(self.active_branch_from(&ini))
    }

    fn active_branch_from(&self, ini: &Ini) -> String {
        ini.get("branches", "active").unwrap_or(DEFAULT_BRANCH).to_string()
    }

    /// All configured branches.
    pub fn list_branches(&self) -> Result<Vec<BranchInfo>> {
        let ini = self.read_config()?;
        let branches = ini
            .sections_with_prefix("branch.")
            .map(|(section, fields)| BranchInfo {
                name: section.trim_start_matches("branch.").to_string(),
                database: fields.get("database").cloned().unwrap_or_default(),
                created: fields.get("created").cloned().unwrap_or_default(),
            })
            .collect();
        Ok(branches)
    }

    /// Resolve a branch's database file path, relative to the project
    /// root. Defaults to the active branch, then the `[database] default`
    /// fallback.
    pub fn get_database_path(&self, branch: Option<&str>) -> Result<Option<PathBuf>> {
        let ini = self.read_config()?;
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.active_branch_from(&ini),
        };
        if let Some(path) = self.database_path_from(&ini, &branch) {
            return Ok(Some(path));
        }
        Ok(ini.get("database", "default").map(|p| self.resolve(p)))
    }

    fn database_path_from(&self, ini: &Ini, branch: &str) -> Option<PathBuf> {
        ini.get(&format!("branch.{branch}"), "database").map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

/// Initialize a project rooted at `root`. Fails if `.synthdb/` already
/// has a config file.
pub fn init_project(root: impl Into<PathBuf>) -> Result<Project> {
    let root = root.into();
    if root.join(".synthdb").join("config").exists() {
        return Err(Error::InvariantViolation(format!(
            "{} is already a SynthDB project",
            root.display()
        )));
    }
    Project::init(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_the_main_branch_active_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let project = init_project(dir.path()).unwrap();

        assert_eq!(project.active_branch().unwrap(), "main");
        let branches = project.list_branches().unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "main");
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path()).unwrap();
        assert!(init_project(dir.path()).is_err());
    }

    #[test]
    fn create_branch_copies_database_bytes_and_registers_it() {
        let dir = tempfile::tempdir().unwrap();
        let project = init_project(dir.path()).unwrap();

        let main_db = project.get_database_path(Some("main")).unwrap().unwrap();
        fs::create_dir_all(main_db.parent().unwrap()).unwrap();
        fs::write(&main_db, b"pretend-sqlite-bytes").unwrap();

        let feature_db = project.create_branch("feature", None).unwrap();
        assert!(feature_db.exists());
        assert_eq!(fs::read(&feature_db).unwrap(), b"pretend-sqlite-bytes");

        let branches = project.list_branches().unwrap();
        assert!(branches.iter().any(|b| b.name == "feature"));
    }

    #[test]
    fn set_active_branch_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let project = init_project(dir.path()).unwrap();
        project.create_branch("feature", None).unwrap();
        project.set_active_branch("feature").unwrap();

        let reopened = Project::at(dir.path());
        assert_eq!(reopened.active_branch().unwrap(), "feature");
    }

    #[test]
    fn get_database_path_resolves_relative_to_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let project = init_project(dir.path()).unwrap();
        let path = project.get_database_path(None).unwrap().unwrap();
        assert_eq!(path, dir.path().join(".synthdb/databases/main.db"));
    }
}
