//! DNS resolution check for every host of an inventory.
//!
//! Each host is looked up against each DNS server with `nslookup`, one
//! check at a time. A server that fails or times out is recorded as not
//! resolving the host.

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::process::ProcessRunner;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
const CSV_HEADER: [&str; 2] = ["Hostname", "No resolution with"];

/// A host that at least one DNS server could not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsFinding {
    pub host: String,
    pub unresolved: Vec<String>,
}

/// Split a comma-separated server list, dropping empty entries.
pub fn parse_dns_servers(servers: &str) -> Vec<String> {
    servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Servers among `dns_servers` that did not resolve `host`.
///
/// Errors only when the lookup tool itself cannot be started.
pub fn check_host<R: ProcessRunner>(
    runner: &R,
    lookup: &str,
    host: &str,
    dns_servers: &[String],
    timeout: Duration,
) -> std::io::Result<Vec<String>> {
    let mut missing = Vec::new();
    for server in dns_servers {
        let args = vec![host.to_string(), server.clone()];
        match runner.output_with_timeout(lookup, &args, timeout)? {
            Some(output) if output.success() => {
                debug!("{} resolved by {}", host, server);
            }
            Some(output) => {
                debug!("{} not resolved by {} (exit {:?})", host, server, output.code);
                missing.push(server.clone());
            }
            None => {
                debug!("{} lookup against {} timed out", host, server);
                missing.push(server.clone());
            }
        }
    }
    Ok(missing)
}

/// Check every host; a host whose check cannot run is reported and skipped.
pub fn check_hosts<R: ProcessRunner>(
    runner: &R,
    lookup: &str,
    hosts: &[String],
    dns_servers: &[String],
    timeout: Duration,
) -> Vec<DnsFinding> {
    let mut findings = Vec::new();
    for host in hosts {
        match check_host(runner, lookup, host, dns_servers, timeout) {
            Ok(unresolved) if unresolved.is_empty() => {}
            Ok(unresolved) => findings.push(DnsFinding {
                host: host.clone(),
                unresolved,
            }),
            Err(e) => {
                warn!("DNS check for {} failed: {}", host, e);
                println!("Error: Issue with DNS resolution check - {}", e);
            }
        }
    }
    findings
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_row(fields: &[&str]) -> String {
    fields.iter().map(|f| csv_field(f)).join(",")
}

/// CSV document with a header row and one row per finding.
pub fn render_csv(findings: &[DnsFinding]) -> String {
    let mut out = csv_row(&CSV_HEADER);
    out.push_str("\r\n");
    for finding in findings {
        let servers = finding.unresolved.join(", ");
        out.push_str(&csv_row(&[finding.host.as_str(), servers.as_str()]));
        out.push_str("\r\n");
    }
    out
}

pub fn write_csv(path: &Path, findings: &[DnsFinding]) -> Result<()> {
    fs::write(path, render_csv(findings))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Plain console listing.
pub fn render_console(findings: &[DnsFinding]) -> String {
    let mut lines = vec![CSV_HEADER.join(", ")];
    lines.extend(
        findings
            .iter()
            .map(|f| format!("{},{}", f.host, f.unresolved.join(", "))),
    );
    lines.join("\n")
}
