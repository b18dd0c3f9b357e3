//! Shared fixtures for ARK unit and integration tests
//!
//! These helpers build throwaway ARK roots, artifact directories and
//! inventories on disk so tests can exercise the real file-system code.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Sample ansible-runner console output with a single play recap.
pub const SAMPLE_STDOUT: &str = "\
PLAY [all] *********************************************************************

TASK [Gathering Facts] *********************************************************
ok: [web1]

PLAY RECAP *********************************************************************
web1                       : ok=2    changed=1    unreachable=0    failed=0

";

/// Create the directories and files `validate_project` requires.
pub fn create_project_tree(root: &Path) {
    for dir in ["project", "inventory", "env"] {
        fs::create_dir_all(root.join(dir)).expect("create project dir");
    }
    fs::write(root.join("project/main.yml"), "---\n- hosts: all\n").expect("write main.yml");
    fs::write(root.join("env/envvars"), "---\n").expect("write envvars");
    fs::write(root.join("env/ssh_key"), "not-a-real-key\n").expect("write ssh_key");
}

/// Create an artifact directory the way ansible-runner lays it out.
pub fn write_artifact(root: &Path, name: &str, stdout: &str, playbook: Option<&str>) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("create artifact dir");
    fs::write(dir.join("stdout"), stdout).expect("write stdout");

    if let Some(playbook) = playbook {
        let command = serde_json::json!({
            "command": ["ansible-playbook", "-i", "/ark/inventory", format!("/ark/project/{}", playbook)],
            "cwd": "/ark/project",
        });
        fs::write(dir.join("command"), command.to_string()).expect("write command");
    }
    dir
}

/// Set the modification time of a file or directory to `secs` after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = File::open(path).expect("open for mtime");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .expect("set mtime");
}
