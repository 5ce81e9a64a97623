//! Test utilities: temporary C source trees

use std::fs;
use std::path::PathBuf;

use closure_core::FrontendConfig;
use tempfile::TempDir;

/// Directory under the project root that plays the system include directory.
pub const SYSTEM_DIR: &str = "sys";

/// A throwaway C project on disk.
pub struct CProject {
    dir: TempDir,
}

impl CProject {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(SYSTEM_DIR)).unwrap();
        CProject { dir }
    }

    /// Create a project from `(path, content)` pairs.
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let project = CProject::new();
        for (path, content) in files {
            project.file(path, content);
        }
        project
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn file(&self, relative: &str, content: &str) -> PathBuf {
        let full_path = self.path(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        full_path
    }

    /// A header inside the fake system include directory.
    pub fn system_file(&self, relative: &str, content: &str) -> PathBuf {
        self.file(&format!("{SYSTEM_DIR}/{relative}"), content)
    }
}

/// Front-end settings that only know the project's fake system directory.
pub fn system_config(project: &CProject) -> FrontendConfig {
    FrontendConfig {
        include_dirs: Vec::new(),
        system_include_dirs: vec![project.path(SYSTEM_DIR)],
        ..FrontendConfig::default()
    }
}
