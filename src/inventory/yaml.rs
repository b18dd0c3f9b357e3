use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use super::parser::{expand_host_pattern, strip_port};
use super::Inventory;

/// Parse a YAML (or JSON) inventory into `inventory`.
///
/// The document is a mapping of group names; each group may carry `hosts`,
/// `children` and `vars`. Variables are not needed for lookups and are skipped.
pub fn parse_yaml_inventory(content: &str, inventory: &mut Inventory) -> Result<()> {
    let doc: Value = serde_yaml::from_str(content).context("Failed to parse YAML content")?;
    match doc {
        Value::Null => Ok(()),
        Value::Mapping(groups) => {
            for (name, group) in &groups {
                let name = key_name(name)?;
                parse_group(inventory, &name, group)?;
            }
            Ok(())
        }
        _ => Err(anyhow!("Inventory document must be a mapping of groups")),
    }
}

fn key_name(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("Invalid inventory name: {:?}", other)),
    }
}

fn entries(value: &Value, what: &str, group: &str) -> Result<Mapping> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map.clone()),
        _ => Err(anyhow!("'{}' of group '{}' must be a mapping", what, group)),
    }
}

fn parse_group(inventory: &mut Inventory, name: &str, group: &Value) -> Result<()> {
    debug!("Parsing YAML group {}", name);
    inventory.add_group(name);

    let group = match group {
        Value::Null => return Ok(()),
        Value::Mapping(map) => map,
        _ => return Err(anyhow!("Group '{}' must be a mapping", name)),
    };

    for (key, value) in group {
        match key.as_str() {
            Some("hosts") => {
                for (host, _vars) in &entries(value, "hosts", name)? {
                    let pattern = key_name(host)?;
                    for host in expand_host_pattern(strip_port(&pattern))? {
                        inventory.add_host(&host, name);
                    }
                }
            }
            Some("children") => {
                for (child, child_group) in &entries(value, "children", name)? {
                    let child = key_name(child)?;
                    inventory.add_child_group(name, &child);
                    parse_group(inventory, &child, child_group)?;
                }
            }
            Some("vars") => {}
            _ => warn!("Skipping unknown key {:?} in group '{}'", key, name),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryQuery;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_yaml_groups() {
        let mut inventory = Inventory::new();
        parse_yaml_inventory(
            r#"
all:
  hosts:
    bastion:
  children:
    web:
      hosts:
        web[1:2]:
          ansible_host: 10.0.0.1
      children:
        canary:
          hosts:
            web3:
    db:
      vars:
        port: 5432
      hosts:
        db1:
"#,
            &mut inventory,
        )
        .unwrap();

        assert_eq!(inventory.hosts_of("web").unwrap(), vec!["web1", "web2", "web3"]);
        assert_eq!(inventory.groups_of("web3").unwrap(), vec!["all", "canary", "web"]);
        assert_eq!(inventory.hosts_of("db").unwrap(), vec!["db1"]);
        assert_eq!(inventory.hosts.len(), 5);
    }

    #[test]
    fn test_host_keys_with_port() {
        let mut inventory = Inventory::new();
        parse_yaml_inventory(
            "web:\n  hosts:\n    web1:2222:\n    app[1:2]:8080:\n",
            &mut inventory,
        )
        .unwrap();
        assert_eq!(inventory.hosts_of("web").unwrap(), vec!["web1", "app1", "app2"]);
    }

    #[test]
    fn test_empty_and_invalid_documents() {
        let mut inventory = Inventory::new();
        parse_yaml_inventory("", &mut inventory).unwrap();
        assert!(parse_yaml_inventory("- just\n- a list\n", &mut inventory).is_err());
        assert!(parse_yaml_inventory("web:\n  hosts: [web1]\n", &mut inventory).is_err());
    }

    #[test]
    fn test_json_inventory() {
        let mut inventory = Inventory::new();
        parse_yaml_inventory(
            r#"{"web": {"hosts": {"web1": {}, "web2": null}}}"#,
            &mut inventory,
        )
        .unwrap();
        assert_eq!(inventory.hosts_of("web").unwrap(), vec!["web1", "web2"]);
    }
}
