//! ARK - Ansible Runner Kit
//!
//! Wraps ansible-runner, ansible-lint, the user's crontab and inventory
//! lookups behind one command-line tool. Execution, linting and scheduling
//! are left to those external programs; this crate validates the project
//! tree, shells out, and turns their output into reports.

pub mod cli;
pub mod config;
pub mod cron;
pub mod dns;
pub mod error;
pub mod inventory;
pub mod lint;
pub mod process;
pub mod project;
pub mod report;
pub mod runner;
pub mod testing;

pub use error::{ArkError, Result};
