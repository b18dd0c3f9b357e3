use anyhow::{anyhow, Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Inventory;

static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\[\]:]+)(?::(\w+))?\]$").unwrap());
static HOST_PORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+):(\d+)$").unwrap());
static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\[([0-9a-zA-Z]+):([0-9a-zA-Z]+)(?::(\d+))?\](.*)$").unwrap());

enum Section {
    Hosts(String),
    Vars(String),
    Children(String),
}

/// Parse an INI-format inventory into `inventory`.
pub fn parse_ini_inventory(content: &str, inventory: &mut Inventory) -> Result<()> {
    let mut section = Section::Hosts("ungrouped".to_string());

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            let caps = SECTION_RE
                .captures(line)
                .ok_or_else(|| anyhow!("Invalid section header on line {}: {}", line_num + 1, line))?;
            let group = caps[1].trim().to_string();
            inventory.add_group(&group);

            section = match caps.get(2).map(|m| m.as_str()) {
                None | Some("hosts") => Section::Hosts(group),
                Some("vars") => Section::Vars(group),
                Some("children") => Section::Children(group),
                Some(other) => {
                    return Err(anyhow!(
                        "Unknown section type '{}' on line {}",
                        other,
                        line_num + 1
                    ))
                }
            };
            continue;
        }

        match &section {
            Section::Vars(group) => {
                debug!("Ignoring variable for group {}: {}", group, line);
            }
            Section::Children(parent) => {
                let child = line.split_whitespace().next().unwrap_or(line);
                debug!("Adding child group {} to parent {}", child, parent);
                inventory.add_child_group(parent, child);
            }
            Section::Hosts(group) => {
                // host[:port] followed by optional key=value variables
                let host_entry = line.split_whitespace().next().unwrap_or(line);
                let hosts = expand_host_pattern(strip_port(host_entry))
                    .with_context(|| format!("Invalid host pattern on line {}", line_num + 1))?;
                for host in hosts {
                    debug!("Adding host {} to group {}", host, group);
                    inventory.add_host(&host, group);
                }
            }
        }
    }

    Ok(())
}

/// Drop a trailing `:port` from a host entry; ranges like `web[1:3]` are kept.
pub fn strip_port(host_entry: &str) -> &str {
    match HOST_PORT_RE.captures(host_entry) {
        Some(caps) => caps.get(1).map_or(host_entry, |m| m.as_str()),
        None => host_entry,
    }
}

/// Expand `web[01:03]`-style ranges, including alphabetic and stepped ones.
pub fn expand_host_pattern(pattern: &str) -> Result<Vec<String>> {
    let Some(caps) = RANGE_RE.captures(pattern) else {
        return Ok(vec![pattern.to_string()]);
    };
    let (prefix, start, end, suffix) = (&caps[1], &caps[2], &caps[3], &caps[5]);
    let step = match caps.get(4) {
        Some(step) => step.as_str().parse::<usize>()?,
        None => 1,
    };
    if step == 0 {
        return Err(anyhow!("Range step cannot be zero in {}", pattern));
    }

    let items: Vec<String> = if let (Ok(first), Ok(last)) = (start.parse::<u64>(), end.parse::<u64>()) {
        if first > last {
            return Err(anyhow!("Range start is after range end in {}", pattern));
        }
        let width = if start.starts_with('0') { start.len() } else { 0 };
        (first..=last)
            .step_by(step)
            .map(|n| format!("{:0width$}", n, width = width))
            .collect()
    } else {
        let (first, last) = match (single_char(start), single_char(end)) {
            (Some(first), Some(last)) if first <= last => (first, last),
            _ => return Err(anyhow!("Invalid alphabetic range in {}", pattern)),
        };
        (first..=last).step_by(step).map(String::from).collect()
    };

    let mut hosts = Vec::new();
    for item in items {
        // the suffix may hold further ranges
        for rest in expand_host_pattern(suffix)? {
            hosts.push(format!("{}{}{}", prefix, item, rest));
        }
    }
    Ok(hosts)
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryQuery;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inventory_parsing() {
        let mut inventory = Inventory::new();
        parse_ini_inventory(
            r#"
# comment
[webservers]
test1.example.com ansible_ssh_user=admin
test2.example.com:2222 ansible_ssh_user=user

[dbservers]
db1.example.com

[webservers:vars]
http_port=80

[all:vars]
ansible_ssh_pass=testpassword
"#,
            &mut inventory,
        )
        .unwrap();

        assert_eq!(inventory.hosts.len(), 3);
        // all, ungrouped, webservers, dbservers
        assert_eq!(inventory.groups.len(), 4);
        assert_eq!(
            inventory.hosts_of("webservers").unwrap(),
            vec!["test1.example.com", "test2.example.com"]
        );
        assert!(inventory.get_host("http_port=80").is_none());
    }

    #[test]
    fn test_ranged_hosts_with_port() {
        let mut inventory = Inventory::new();
        parse_ini_inventory("[web]\nweb[01:03]:2222\nsingle:22 ansible_user=ops\n", &mut inventory)
            .unwrap();
        assert_eq!(
            inventory.hosts_of("web").unwrap(),
            vec!["web01", "web02", "web03", "single"]
        );
        assert_eq!(inventory.groups_of("web01").unwrap(), vec!["web"]);
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("db1:5432"), "db1");
        assert_eq!(strip_port("web[01:03]:2222"), "web[01:03]");
        assert_eq!(strip_port("web[01:03]"), "web[01:03]");
        assert_eq!(strip_port("plain"), "plain");
    }

    #[test]
    fn test_invalid_section_header() {
        let mut inventory = Inventory::new();
        assert!(parse_ini_inventory("[web\nweb1\n", &mut inventory).is_err());
        assert!(parse_ini_inventory("[web:bogus]\n", &mut inventory).is_err());
    }

    #[test]
    fn test_expand_numeric_range() {
        assert_eq!(
            expand_host_pattern("web[01:03].example.com").unwrap(),
            vec!["web01.example.com", "web02.example.com", "web03.example.com"]
        );
        assert_eq!(expand_host_pattern("node[8:10]").unwrap(), vec!["node8", "node9", "node10"]);
        assert_eq!(expand_host_pattern("n[0:6:3]").unwrap(), vec!["n0", "n3", "n6"]);
    }

    #[test]
    fn test_expand_alpha_and_nested_ranges() {
        assert_eq!(
            expand_host_pattern("db-[a:b][1:2]").unwrap(),
            vec!["db-a1", "db-a2", "db-b1", "db-b2"]
        );
        assert_eq!(expand_host_pattern("plain").unwrap(), vec!["plain"]);
        assert!(expand_host_pattern("bad[5:1]").is_err());
    }
}
