pub mod host;
mod parser;
mod yaml;

use anyhow::{anyhow, Context, Result};
pub use host::{Host, HostGroup};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

const IGNORED_DIRS: [&str; 3] = ["group_vars", "host_vars", "vars_plugins"];
const IGNORED_SUFFIXES: [&str; 13] = [
    ".orig", ".ini", ".cfg", ".retry", ".pyc", ".pyo", ".swp", ".bak", "~", ".rpm", ".md",
    ".txt", ".rst",
];

/// Read-only lookups over a loaded inventory.
pub trait InventoryQuery {
    /// Every group `host` belongs to, directly or through a parent group.
    /// `None` when the host is unknown.
    fn groups_of(&self, host: &str) -> Option<Vec<String>>;

    /// Every host in `group`, including hosts of nested child groups.
    /// `None` when the group is unknown.
    fn hosts_of(&self, group: &str) -> Option<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub hosts: IndexMap<String, Host>,
    pub groups: IndexMap<String, HostGroup>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert("all".to_string(), HostGroup::new("all"));
        groups.insert("ungrouped".to_string(), HostGroup::new("ungrouped"));

        Inventory {
            hosts: IndexMap::new(),
            groups,
        }
    }

    pub fn get_group(&self, name: &str) -> Option<&HostGroup> {
        self.groups.get(name)
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn add_group(&mut self, name: &str) {
        if !self.groups.contains_key(name) {
            self.groups.insert(name.to_string(), HostGroup::new(name));
        }
    }

    pub fn add_host(&mut self, host: &str, group: &str) {
        self.add_group(group);
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Host::new(host))
            .groups
            .insert(group.to_string());
        if let Some(group) = self.groups.get_mut(group) {
            group.add_host(host);
        }
    }

    pub fn add_child_group(&mut self, parent: &str, child: &str) {
        self.add_group(parent);
        self.add_group(child);
        if let Some(parent_group) = self.groups.get_mut(parent) {
            parent_group.add_child(child);
        }
        if let Some(child_group) = self.groups.get_mut(child) {
            child_group.add_parent(parent);
        }
    }

    /// Sorted names of every host.
    pub fn host_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hosts.keys().cloned().collect();
        names.sort();
        names
    }

    /// Hang parentless groups under `all` and put groupless hosts in `ungrouped`.
    fn reconcile(&mut self) {
        let orphans: Vec<String> = self
            .groups
            .values()
            .filter(|group| group.name != "all" && group.parents.is_empty())
            .map(|group| group.name.clone())
            .collect();
        for group in orphans {
            debug!("Adding top-level group '{}' to 'all'", group);
            self.add_child_group("all", &group);
        }

        let ungrouped: Vec<String> = self
            .hosts
            .values()
            .filter(|host| host.groups.iter().all(|g| g == "all" || g == "ungrouped"))
            .map(|host| host.name.clone())
            .collect();
        for host in ungrouped {
            self.add_host(&host, "ungrouped");
        }
    }

    fn collect_hosts(&self, group_name: &str, seen: &mut IndexSet<String>, hosts: &mut IndexSet<String>) {
        if !seen.insert(group_name.to_string()) {
            return;
        }
        if let Some(group) = self.groups.get(group_name) {
            hosts.extend(group.hosts.iter().cloned());
            for child in &group.children {
                self.collect_hosts(child, seen, hosts);
            }
        }
    }
}

impl InventoryQuery for Inventory {
    fn groups_of(&self, host: &str) -> Option<Vec<String>> {
        let host = self.hosts.get(host)?;

        let mut groups = BTreeSet::new();
        let mut pending: Vec<String> = host.groups.iter().cloned().collect();
        while let Some(name) = pending.pop() {
            if !groups.insert(name.clone()) {
                continue;
            }
            if let Some(group) = self.groups.get(&name) {
                pending.extend(group.parents.iter().cloned());
            }
        }
        Some(groups.into_iter().collect())
    }

    fn hosts_of(&self, group: &str) -> Option<Vec<String>> {
        if !self.groups.contains_key(group) {
            return None;
        }
        let mut hosts = IndexSet::new();
        self.collect_hosts(group, &mut IndexSet::new(), &mut hosts);
        Some(hosts.into_iter().collect())
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if entry.file_type().is_dir() {
        return IGNORED_DIRS.contains(&name.as_ref());
    }
    IGNORED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

fn load_file(path: &Path, inventory: &mut Inventory) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory file {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yml" | "yaml" | "json") => yaml::parse_yaml_inventory(&content, inventory),
        _ => parser::parse_ini_inventory(&content, inventory),
    }
    .with_context(|| format!("Failed to parse inventory file {}", path.display()))
}

/// Load an inventory file, or every inventory source inside a directory.
pub fn load(inventory_path: &Path) -> Result<Inventory> {
    if !inventory_path.exists() {
        return Err(anyhow!("Inventory not found: {}", inventory_path.display()));
    }

    let mut inventory = Inventory::new();
    if inventory_path.is_file() {
        load_file(inventory_path, &mut inventory)?;
    } else {
        let walker = WalkDir::new(inventory_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry));
        for entry in walker {
            let entry = entry.context("Failed to walk inventory directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_executable(entry.path()) {
                warn!(
                    "Skipping executable inventory script {}",
                    entry.path().display()
                );
                continue;
            }
            debug!("Loading inventory source {}", entry.path().display());
            load_file(entry.path(), &mut inventory)?;
        }
    }

    inventory.reconcile();
    info!(
        "Inventory loaded: {} hosts, {} groups",
        inventory.hosts.len(),
        inventory.groups.len()
    );
    Ok(inventory)
}
