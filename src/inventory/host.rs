use indexmap::IndexSet;
use log::debug;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    /// Groups the host was placed in directly; ancestors are not listed.
    pub groups: IndexSet<String>,
}

impl Host {
    pub fn new(name: &str) -> Self {
        debug!("Creating new host: {}", name);
        Host {
            name: name.to_string(),
            groups: IndexSet::new(),
        }
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone)]
pub struct HostGroup {
    pub name: String,
    pub hosts: IndexSet<String>,
    pub parents: IndexSet<String>,
    pub children: IndexSet<String>,
}

impl HostGroup {
    pub fn new(name: &str) -> Self {
        debug!("Creating new host group: {}", name);
        HostGroup {
            name: name.to_string(),
            hosts: IndexSet::new(),
            parents: IndexSet::new(),
            children: IndexSet::new(),
        }
    }

    pub fn add_child(&mut self, child: &str) -> bool {
        self.children.insert(child.to_string())
    }

    pub fn add_parent(&mut self, parent: &str) -> bool {
        self.parents.insert(parent.to_string())
    }

    pub fn add_host(&mut self, host: &str) -> bool {
        self.hosts.insert(host.to_string())
    }
}
