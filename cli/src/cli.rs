// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf};

use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use colored::Colorize;
use crmdav_core::{APP_NAME, DavSync};
use futures::{FutureExt, future::BoxFuture};
use tracing_subscriber::EnvFilter;

use crate::cmd_connection::CmdTestConnection;
use crate::cmd_log::CmdLogs;
use crate::cmd_subscription::{
    CmdSubscribe, CmdSubscriptionActivate, CmdSubscriptionDelete, CmdSubscriptionList,
};
use crate::cmd_sync::{CmdDaemon, CmdSync, CmdSyncDue};
use crate::config::{Scope, parse_config};

/// Run the crmdav command-line interface.
pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    match Cli::parse() {
        Ok(cli) => {
            if let Err(e) = cli.run().await {
                println!("{} {}", "Error:".red(), e);
            }
        }
        Err(e) => println!("{} {}", "Error:".red(), e),
    };
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file
    pub config: Option<PathBuf>,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("Synchronize CRM contacts with CardDAV address books.")
            .author("Zexin Yuan <aim@yzx9.xyz>")
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                arg!(-c --config [CONFIG] "Path to the configuration file")
                    .long_help(
                        "\
Path to the configuration file. Defaults to $CRMDAV_CONFIG, then \
$XDG_CONFIG_HOME/crmdav/config.toml on Linux and MacOS, %APPDATA%/crmdav/config.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            )
            .subcommand(CmdTestConnection::command())
            .subcommand(CmdSubscribe::command())
            .subcommand(CmdSubscriptionList::command())
            .subcommand(CmdSubscriptionActivate::command_activate())
            .subcommand(CmdSubscriptionActivate::command_deactivate())
            .subcommand(CmdSubscriptionDelete::command())
            .subcommand(CmdSync::command())
            .subcommand(CmdSyncDue::command())
            .subcommand(CmdDaemon::command())
            .subcommand(CmdLogs::command())
    }

    /// Parse the command-line arguments
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Self::from(matches)
    }

    /// Parse the specified arguments
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Self::from(matches)
    }

    /// Create a CLI instance from the `ArgMatches`
    pub fn from(matches: ArgMatches) -> Result<Self, Box<dyn Error>> {
        use Commands::*;
        let command = match matches.subcommand() {
            Some((CmdTestConnection::NAME, matches)) => {
                TestConnection(CmdTestConnection::from(matches))
            }
            Some((CmdSubscribe::NAME, matches)) => Subscribe(CmdSubscribe::from(matches)),
            Some((CmdSubscriptionList::NAME, matches)) => List(CmdSubscriptionList::from(matches)),
            Some((CmdSubscriptionActivate::NAME_ACTIVATE, matches)) => {
                SetActive(CmdSubscriptionActivate::from(matches, true))
            }
            Some((CmdSubscriptionActivate::NAME_DEACTIVATE, matches)) => {
                SetActive(CmdSubscriptionActivate::from(matches, false))
            }
            Some((CmdSubscriptionDelete::NAME, matches)) => {
                Delete(CmdSubscriptionDelete::from(matches))
            }
            Some((CmdSync::NAME, matches)) => SyncNow(CmdSync::from(matches)),
            Some((CmdSyncDue::NAME, matches)) => SyncDue(CmdSyncDue::from(matches)),
            Some((CmdDaemon::NAME, matches)) => Daemon(CmdDaemon::from(matches)),
            Some((CmdLogs::NAME, matches)) => Logs(CmdLogs::from(matches)),
            _ => unreachable!(),
        };

        let config = matches.get_one("config").cloned();
        Ok(Cli { config, command })
    }

    /// Run the command
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        self.command.run(self.config).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// Probe a CardDAV server
    TestConnection(CmdTestConnection),

    /// Create a subscription
    Subscribe(CmdSubscribe),

    /// List subscriptions
    List(CmdSubscriptionList),

    /// Activate or deactivate a subscription
    SetActive(CmdSubscriptionActivate),

    /// Delete a subscription
    Delete(CmdSubscriptionDelete),

    /// Pull one subscription
    SyncNow(CmdSync),

    /// Pull all due subscriptions once
    SyncDue(CmdSyncDue),

    /// Pull due subscriptions periodically
    Daemon(CmdDaemon),

    /// Show the sync log
    Logs(CmdLogs),
}

impl Commands {
    /// Run the command with the given configuration
    #[rustfmt::skip]
    pub async fn run(self, config: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
        use Commands::*;
        match self {
            TestConnection(a) => Self::run_with(config, |x, _| a.run(x).boxed()).await,
            Subscribe(a)      => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
            List(a)           => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
            SetActive(a)      => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
            Delete(a)         => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
            SyncNow(a)        => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
            SyncDue(a)        => Self::run_with(config, |x, _| a.run(x).boxed()).await,
            Daemon(a)         => Self::run_with(config, |x, _| a.run(x).boxed()).await,
            Logs(a)           => Self::run_with(config, |x, s| a.run(x, s).boxed()).await,
        }
    }

    async fn run_with<F>(config: Option<PathBuf>, f: F) -> Result<(), Box<dyn Error>>
    where
        F: for<'a> FnOnce(&'a DavSync, &'a Scope) -> BoxFuture<'a, Result<(), Box<dyn Error>>>,
    {
        tracing::debug!("parsing configuration...");
        let (core_config, config) = parse_config(config).await?;
        let sync = DavSync::new(core_config).await?;

        let result = f(&sync, &config.scope).await;

        sync.close().await?;
        result
    }
}
