use ark::cron::{self, CronJobSpec, CronTarget, SystemCrontab, UpsertOutcome};
use ark::error::ArkError;
use ark::inventory::{self, InventoryQuery};
use ark::process::SystemRunner;
use ark::report::{self, ArtifactRecord};
use ark::runner::{self, RunRequest};
use ark::{cli, config::ArkConfig, dns, lint, project};

use anyhow::Result;
use clap::error::ErrorKind;
use clap::ArgMatches;
use colored::Colorize;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<()> {
    // Delay logger initialization until after parsing arguments
    let matches = cli::build_cli().get_matches();

    // Global flags are propagated down, so read them from the innermost subcommand
    let mut leaf = &matches;
    while let Some((_, sub_matches)) = leaf.subcommand() {
        leaf = sub_matches;
    }

    let log_level = match leaf.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // Custom log format
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(log_level)
        .init();

    let root = match leaf.get_one::<PathBuf>("ark-dir") {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let config = ArkConfig::new(&root);
    let runner = SystemRunner::new();
    info!("Starting ARK in {}", config.root.display());

    match matches.subcommand() {
        Some(("run", sub_matches)) => run_command(&config, &runner, sub_matches),
        Some(("lint", sub_matches)) => lint_command(&config, &runner, sub_matches),
        Some(("report", sub_matches)) => report_command(&config, sub_matches),
        Some(("inv", sub_matches)) => inv_command(&config, sub_matches),
        Some(("cron", sub_matches)) => cron_command(&config, &runner, sub_matches),
        Some(("dns-check", sub_matches)) => dns_check_command(&config, &runner, sub_matches),
        _ => {
            eprintln!("Unknown command");
            std::process::exit(1);
        }
    }
}

/// Reject a command-line value the way clap does and exit with status 2.
fn parameter_error(message: impl Display) -> ! {
    cli::build_cli()
        .error(ErrorKind::InvalidValue, message)
        .exit()
}

fn string_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn report_missing_playbook(config: &ArkConfig, playbook: &str) {
    println!("Invalid argument: '{}' was not found.", playbook);
    if playbook.is_empty() {
        println!("List of available playbooks:");
        for name in project::find_playbooks(&config.project_dir) {
            println!(" - {}", name);
        }
    }
}

fn run_command(config: &ArkConfig, runner: &SystemRunner, matches: &ArgMatches) -> Result<()> {
    let check = project::validate_project(&config.root);
    if !check.is_valid() {
        println!("{}", check.report());
        std::process::exit(1);
    }

    let playbook = string_arg(matches, "playbook");
    if project::playbook_path(&config.project_dir, playbook).is_none() {
        report_missing_playbook(config, playbook);
        return Ok(());
    }

    let extra_vars = match runner::prepare_extra_vars(string_arg(matches, "extra-vars")) {
        Ok(vars) => vars,
        Err(e) => parameter_error(format!("invalid value for '--extra-vars': {}", e)),
    };

    let request = RunRequest {
        playbook: playbook.to_string(),
        rotate_artifacts: matches.get_one::<u8>("rotate-artifacts").copied().unwrap_or(7),
        limit: matches.get_one::<String>("limit").cloned(),
        extra_vars,
    };

    match runner::run_playbook(runner, config, &request) {
        Ok(Some(0)) => info!("Playbook {} completed", playbook),
        Ok(Some(code)) => println!("{}", format!("{} exited with status {}", config.runner, code).red()),
        Ok(None) => println!("{}", format!("{} was terminated by a signal", config.runner).red()),
        Err(e) => println!("Error: {}", e),
    }
    Ok(())
}

fn lint_command(config: &ArkConfig, runner: &SystemRunner, matches: &ArgMatches) -> Result<()> {
    if !lint::linter_available(runner, &config.linter) {
        println!("Warning: {} is not installed.", config.linter);
        return Ok(());
    }

    let playbook = string_arg(matches, "playbook");
    let outcomes = if playbook.is_empty() {
        lint::lint_all(runner, &config.linter, &config.project_dir)
    } else {
        match project::playbook_path(&config.project_dir, playbook) {
            Some(path) => vec![lint::lint_playbook(runner, &config.linter, playbook, &path)],
            None => {
                report_missing_playbook(config, playbook);
                return Ok(());
            }
        }
    };

    for outcome in outcomes {
        match &outcome.error {
            None => println!("{} {}", outcome.playbook.bold(), "passed".green()),
            Some(error) => {
                println!("Error linting playbook '{}': {}", outcome.playbook, error);
                if !outcome.output.trim().is_empty() {
                    println!("{}", outcome.output.trim_end().dimmed());
                }
            }
        }
    }
    Ok(())
}

fn report_command(config: &ArkConfig, matches: &ArgMatches) -> Result<()> {
    let artifacts_dir = config.root.join(
        matches
            .get_one::<PathBuf>("artifacts-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("artifacts")),
    );
    let last = matches.get_one::<usize>("last").copied();

    let artifacts = report::sort_and_limit_artifacts(report::find_artifacts(&artifacts_dir), last);
    for artifact in artifacts {
        match ArtifactRecord::load(&artifact) {
            Ok(record) => println!("{}", record.render()),
            Err(e) => println!("Error reading report for {}: {:#}", artifact.display(), e),
        }
    }
    Ok(())
}

fn inv_command(config: &ArkConfig, matches: &ArgMatches) -> Result<()> {
    if !project::validate_inventory_dir(&config.inventory_dir) {
        println!(
            "Inventory directory '{}' does not exist.",
            config.inventory_dir.display()
        );
        std::process::exit(1);
    }

    let inventory = match inventory::load(&config.inventory_dir) {
        Ok(inventory) => inventory,
        Err(e) => {
            println!("Error loading inventory: {:#}", e);
            return Ok(());
        }
    };

    match matches.subcommand() {
        Some(("get-host-groups", sub_matches)) => {
            let host = string_arg(sub_matches, "host");
            match inventory.groups_of(host) {
                Some(groups) => {
                    println!("Host '{}' is a member of the following groups:", host);
                    for group in groups {
                        println!("- {}", group);
                    }
                }
                None => println!("Host '{}' not found in the inventory.", host),
            }
        }
        Some(("get-group-hosts", sub_matches)) => {
            let group = string_arg(sub_matches, "group");
            match inventory.hosts_of(group) {
                Some(hosts) => {
                    println!("Group '{}' contains the following hosts:", group);
                    for host in hosts {
                        println!("- {}", host);
                    }
                }
                None => println!("Group '{}' not found in the inventory.", group),
            }
        }
        _ => unreachable!("clap requires an inv subcommand"),
    }
    Ok(())
}

fn cron_command(config: &ArkConfig, runner: &SystemRunner, matches: &ArgMatches) -> Result<()> {
    let store = SystemCrontab::new(runner);
    let target = CronTarget {
        launcher: &config.launcher,
        ark_dir: &config.root,
    };

    match matches.subcommand() {
        Some(("create", sub_matches)) => {
            let user = string_arg(sub_matches, "user");
            let job = string_arg(sub_matches, "job");
            let valid = project::find_playbooks(&config.project_dir);
            if !valid.iter().any(|name| name == job) {
                let err = ArkError::UnknownPlaybook {
                    name: job.to_string(),
                    valid,
                };
                parameter_error(format!("invalid value for '--job': {}", err));
            }

            let cron_job = CronJobSpec {
                name: string_arg(sub_matches, "name").to_string(),
                job: job.to_string(),
                minute: string_arg(sub_matches, "minute").to_string(),
                hour: string_arg(sub_matches, "hour").to_string(),
                day: string_arg(sub_matches, "day").to_string(),
                month: string_arg(sub_matches, "month").to_string(),
                weekday: string_arg(sub_matches, "weekday").to_string(),
            };
            if let Err(e) = cron_job.validate() {
                parameter_error(e);
            }

            match cron::reconcile(&store, user, target, &[cron_job], &[]) {
                Ok(summary) => {
                    for (name, outcome) in summary.upserted {
                        match outcome {
                            UpsertOutcome::Appended => println!("Created cron job '{}'", name),
                            UpsertOutcome::Updated => println!("Updated cron job '{}'", name),
                            UpsertOutcome::Deduplicated(extra) => println!(
                                "{} Job with the name '{}' appeared {} extra time(s); updated the first and removed the rest.",
                                "Warning:".yellow(),
                                name,
                                extra
                            ),
                        }
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        Some(("delete", sub_matches)) => {
            let user = string_arg(sub_matches, "user");
            let name = string_arg(sub_matches, "name").to_string();
            match cron::reconcile(&store, user, target, &[], &[name]) {
                Ok(summary) => {
                    for name in summary.removed {
                        println!("Deleted cron job '{}'", name);
                    }
                    for name in summary.not_found {
                        println!("No cron job named '{}' for user {}", name, user);
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        Some(("list", sub_matches)) => {
            let user = string_arg(sub_matches, "user");
            println!("ARK cron jobs for user {}:", user);
            match cron::list_jobs(&store, user) {
                Ok(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                Err(e) => {
                    info!("Listing cron jobs failed: {}", e);
                    println!("An error occurred while fetching the cron jobs.");
                }
            }
        }
        _ => unreachable!("clap requires a cron subcommand"),
    }
    Ok(())
}

fn dns_check_command(config: &ArkConfig, runner: &SystemRunner, matches: &ArgMatches) -> Result<()> {
    let servers = dns::parse_dns_servers(string_arg(matches, "dns-servers"));
    if servers.is_empty() {
        println!("Error: Invalid DNS servers list - no servers given");
        return Ok(());
    }

    let inventory_path = matches
        .get_one::<PathBuf>("inventory")
        .cloned()
        .unwrap_or_default();
    let inventory = match inventory::load(&inventory_path) {
        Ok(inventory) => inventory,
        Err(e) => {
            println!("Error: Inventory file not found - {:#}", e);
            return Ok(());
        }
    };

    let timeout = Duration::from_secs(
        matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(dns::DEFAULT_TIMEOUT_SECS),
    );
    let findings = dns::check_hosts(
        runner,
        &config.dns_lookup,
        &inventory.host_names(),
        &servers,
        timeout,
    );

    match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            if let Err(e) = dns::write_csv(path, &findings) {
                println!("Error: {:#}", e);
            }
        }
        None => println!("{}", dns::render_console(&findings)),
    }
    Ok(())
}
