//! Throwaway repositories for integration tests

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A temporary repository root (marked with `.git/`)
pub struct TestRepo {
    temp: TempDir,
}

#[allow(dead_code)]
impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        fs::create_dir(temp.path().join(".git"))?;
        Ok(Self { temp })
    }

    /// A repository that has already run `pd init`
    pub fn initialized() -> Result<Self> {
        let repo = Self::new()?;
        crate::pd!(repo.path(), "init").assert_success()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a patch into the watch directory, returning its relative path
    pub fn write_patch(&self, name: &str, content: &str) -> Result<String> {
        let dir = self.path().join("patches");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(name), content)?;
        Ok(format!("patches/{}", name))
    }

    pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn read_file(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path().join(rel)).ok()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path().join(rel).exists()
    }
}
