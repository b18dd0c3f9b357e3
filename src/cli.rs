use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn playbook_arg() -> Arg {
    Arg::new("playbook")
        .help("Playbook file name inside the project directory")
        .default_value("")
        .hide_default_value(true)
        .index(1)
}

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .env("USER")
        .required(true)
        .help("The user whose crontab is managed")
        .value_name("USER")
}

fn schedule_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .default_value("*")
        .help(help)
        .value_name("FIELD")
}

pub fn build_cli() -> Command {
    Command::new("ark")
        .about("ARK - Ansible Runner Kit")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("ark-dir")
                .long("ark-dir")
                .env("ARK_DIR")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("ansible-runner input tree (default: current directory)")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase verbosity (up to -vvv)"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a project playbook with ansible-runner")
                .arg(playbook_arg())
                .arg(
                    Arg::new("rotate-artifacts")
                        .long("rotate-artifacts")
                        .default_value("7")
                        .value_parser(value_parser!(u8).range(1..=31))
                        .help("Number of artifacts to keep")
                        .value_name("N"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .help("Limit the playbook execution to a specific group or host")
                        .value_name("SUBSET"),
                )
                .arg(
                    Arg::new("extra-vars")
                        .long("extra-vars")
                        .default_value("")
                        .hide_default_value(true)
                        .help("Pass additional variables as key=value pairs separated by commas")
                        .value_name("VARS"),
                ),
        )
        .subcommand(
            Command::new("lint")
                .about("Lint project playbooks using ansible-lint")
                .arg(playbook_arg()),
        )
        .subcommand(
            Command::new("report")
                .about("Display ansible-runner run report(s)")
                .arg(
                    Arg::new("artifacts-dir")
                        .long("artifacts-dir")
                        .default_value("artifacts")
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the artifacts directory")
                        .value_name("DIR"),
                )
                .arg(
                    Arg::new("last")
                        .long("last")
                        .value_parser(value_parser!(usize))
                        .help("Display the last N reports")
                        .value_name("N"),
                ),
        )
        .subcommand(
            Command::new("inv")
                .about("Inventory commands")
                .subcommand_required(true)
                .subcommand(
                    Command::new("get-host-groups")
                        .about("Display all groups a host is a member of")
                        .arg(Arg::new("host").required(true).index(1)),
                )
                .subcommand(
                    Command::new("get-group-hosts")
                        .about("Display all hosts in a group")
                        .arg(Arg::new("group").required(true).index(1)),
                ),
        )
        .subcommand(
            Command::new("cron")
                .about("Manage cron jobs")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Create or update a cron job")
                        .arg(user_arg())
                        .arg(
                            Arg::new("name")
                                .long("name")
                                .required(true)
                                .help("The name of the cron job")
                                .value_name("NAME"),
                        )
                        .arg(
                            Arg::new("job")
                                .long("job")
                                .required(true)
                                .help("The playbook to run")
                                .value_name("PLAYBOOK"),
                        )
                        .arg(schedule_arg("minute", "Minute field of the cron job"))
                        .arg(schedule_arg("hour", "Hour field of the cron job"))
                        .arg(schedule_arg("day", "Day of the month field of the cron job"))
                        .arg(schedule_arg("month", "Month field of the cron job"))
                        .arg(schedule_arg("weekday", "Day of the week field of the cron job")),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a cron job")
                        .arg(user_arg())
                        .arg(
                            Arg::new("name")
                                .long("name")
                                .required(true)
                                .help("The name of the cron job to delete")
                                .value_name("NAME"),
                        ),
                )
                .subcommand(
                    Command::new("list")
                        .about("List all ARK cron jobs for a user")
                        .arg(user_arg()),
                ),
        )
        .subcommand(
            Command::new("dns-check")
                .about("Check inventory hosts for DNS resolution")
                .arg(
                    Arg::new("inventory")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("The inventory file or directory")
                        .index(1),
                )
                .arg(
                    Arg::new("dns-servers")
                        .required(true)
                        .help("Comma-separated list of DNS servers")
                        .index(2),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .default_value("5")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Timeout for each check in seconds")
                        .value_name("SECONDS"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output CSV file")
                        .value_name("FILE"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::build_cli;

    #[test]
    fn test_build_cli_subcommands() {
        let cmd = build_cli();
        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in ["run", "lint", "report", "inv", "cron", "dns-check"] {
            assert!(subcommands.contains(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_run_defaults() {
        let matches = build_cli().try_get_matches_from(["ark", "run", "site.yml"]).unwrap();
        let (_, run) = matches.subcommand().unwrap();
        assert_eq!(run.get_one::<String>("playbook").unwrap(), "site.yml");
        assert_eq!(*run.get_one::<u8>("rotate-artifacts").unwrap(), 7);
        assert_eq!(run.get_one::<String>("extra-vars").unwrap(), "");
        assert!(run.get_one::<String>("limit").is_none());
    }

    #[test]
    fn test_rotate_artifacts_range() {
        for bad in ["0", "32"] {
            assert!(build_cli()
                .try_get_matches_from(["ark", "run", "site.yml", "--rotate-artifacts", bad])
                .is_err());
        }
        assert!(build_cli()
            .try_get_matches_from(["ark", "run", "--rotate-artifacts", "31"])
            .is_ok());
    }

    #[test]
    fn test_cron_create_schedule_defaults() {
        let matches = build_cli()
            .try_get_matches_from([
                "ark", "cron", "create", "--user", "deploy", "--name", "nightly", "--job",
                "site.yml", "--hour", "2",
            ])
            .unwrap();
        let (_, cron) = matches.subcommand().unwrap();
        let (_, create) = cron.subcommand().unwrap();
        assert_eq!(create.get_one::<String>("user").unwrap(), "deploy");
        assert_eq!(create.get_one::<String>("hour").unwrap(), "2");
        assert_eq!(create.get_one::<String>("minute").unwrap(), "*");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from(["ark", "report", "--last", "2", "-vv", "--ark-dir", "/srv/ark"])
            .unwrap();
        let (_, report) = matches.subcommand().unwrap();
        assert_eq!(report.get_count("verbose"), 2);
        assert_eq!(
            report.get_one::<std::path::PathBuf>("ark-dir").unwrap(),
            &std::path::PathBuf::from("/srv/ark")
        );
        assert_eq!(*report.get_one::<usize>("last").unwrap(), 2);
    }

    #[test]
    fn test_inv_requires_subcommand() {
        assert!(build_cli().try_get_matches_from(["ark", "inv"]).is_err());
        assert!(build_cli()
            .try_get_matches_from(["ark", "inv", "get-group-hosts", "web"])
            .is_ok());
    }
}
