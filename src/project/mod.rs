//! Project layout checks and playbook discovery.

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

const REQUIRED_DIRS: [&str; 3] = ["project", "inventory", "env"];
const REQUIRED_FILES: [&str; 3] = ["project/main.yml", "env/envvars", "env/ssh_key"];
const PLAYBOOK_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Result of checking an ARK root for the ansible-runner input tree.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProjectCheck {
    pub missing_dirs: Vec<PathBuf>,
    pub missing_files: Vec<PathBuf>,
}

impl ProjectCheck {
    pub fn is_valid(&self) -> bool {
        self.missing_dirs.is_empty() && self.missing_files.is_empty()
    }

    /// Human readable report of everything that is missing.
    pub fn report(&self) -> String {
        let mut out = String::new();
        if !self.missing_dirs.is_empty() {
            out.push_str("\nRequired directories are missing:\n");
            for dir in &self.missing_dirs {
                out.push_str(&format!("  {}\n", dir.display()));
            }
        }
        if !self.missing_files.is_empty() {
            out.push_str("\nRequired files are missing:\n");
            for file in &self.missing_files {
                out.push_str(&format!("  {}\n", file.display()));
            }
        }
        out.push_str("\nPlease correct the issues above then try again.");
        out
    }
}

/// Check every required directory and file under `root`.
pub fn validate_project(root: &Path) -> ProjectCheck {
    let missing_dirs = REQUIRED_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|path| !path.is_dir())
        .collect();
    let missing_files = REQUIRED_FILES
        .iter()
        .map(|file| root.join(file))
        .filter(|path| !path.is_file())
        .collect();

    let check = ProjectCheck {
        missing_dirs,
        missing_files,
    };
    debug!("Project check for {}: {:?}", root.display(), check);
    check
}

pub fn validate_inventory_dir(inventory_dir: &Path) -> bool {
    inventory_dir.is_dir()
}

/// File names of the playbooks directly inside `project_dir`.
///
/// `.yml` files come first, then `.yaml`, each sorted by name. A missing
/// directory yields an empty list.
pub fn find_playbooks(project_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(project_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", project_dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", project_dir.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut playbooks = Vec::new();
    for ext in PLAYBOOK_EXTENSIONS {
        for path in &files {
            if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    playbooks.push(name.to_string());
                }
            }
        }
    }
    playbooks
}

/// Path of `playbook_file` inside the project directory, if it is a file.
pub fn playbook_path(project_dir: &Path, playbook_file: &str) -> Option<PathBuf> {
    if playbook_file.is_empty() {
        return None;
    }
    let path = project_dir.join(playbook_file);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}
