// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, time::Duration};

use clap::{ArgMatches, Command, arg, value_parser};
use colored::Colorize;
use crmdav_core::{CancellationToken, DavSync, SubscriptionRun, SyncError, SyncResult};
use tokio::time::MissedTickBehavior;

use crate::arg::SubscriptionArgs;
use crate::config::Scope;

#[derive(Debug, Clone)]
pub struct CmdSync {
    pub id: String,
}

impl CmdSync {
    pub const NAME: &str = "sync";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Pull one subscription now, whether it is due or not")
            .arg(SubscriptionArgs::id())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: SubscriptionArgs::get_id(matches),
        }
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "syncing subscription...");
        let cancel = cancel_on_ctrl_c();
        let result = sync
            .sync_subscription(&cancel, &self.id, &scope.vault_id)
            .await?;
        print_result(&self.id, &result);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdSyncDue;

impl CmdSyncDue {
    pub const NAME: &str = "sync-due";

    pub fn command() -> Command {
        Command::new(Self::NAME).about("Pull every active subscription whose interval elapsed")
    }

    pub fn from(_matches: &ArgMatches) -> Self {
        Self
    }

    pub async fn run(self, sync: &DavSync) -> Result<(), Box<dyn Error>> {
        tracing::debug!("syncing due subscriptions...");
        let cancel = cancel_on_ctrl_c();
        let runs = sync.sync_all_due(&cancel).await?;
        if runs.is_empty() {
            println!("Nothing is due");
        }
        print_runs(&runs);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdDaemon {
    pub interval: u64,
}

impl CmdDaemon {
    pub const NAME: &str = "daemon";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Keep pulling due subscriptions until interrupted")
            .arg(
                arg!(-i --interval <SECONDS> "Seconds between checks for due subscriptions")
                    .value_parser(value_parser!(u64).range(1..))
                    .default_value("60"),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            interval: matches.get_one("interval").copied().unwrap_or(60),
        }
    }

    pub async fn run(self, sync: &DavSync) -> Result<(), Box<dyn Error>> {
        tracing::info!(interval = self.interval, "daemon started");
        let cancel = cancel_on_ctrl_c();

        let mut ticker = tokio::time::interval(Duration::from_secs(self.interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match sync.sync_all_due(&cancel).await {
                Ok(runs) => print_runs(&runs),
                Err(SyncError::Cancelled) => break,
                // a broken database read is retried on the next tick
                Err(e) => tracing::error!(err = %e, "scheduled sync failed"),
            }
        }

        tracing::info!("daemon stopped");
        Ok(())
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupted, stopping...");
                token.cancel();
            }
            Err(e) => tracing::warn!(err = %e, "failed to listen for Ctrl-C"),
        }
    });
    cancel
}

fn print_runs(runs: &[SubscriptionRun]) {
    for run in runs {
        match &run.outcome {
            Ok(result) => print_result(&run.subscription_id, result),
            Err(e) => println!("{} {} {}", run.subscription_id, "Error:".red(), e),
        }
    }
}

fn print_result(id: &str, result: &SyncResult) {
    match result.is_clean() {
        true => println!("{} {}", id.green(), result),
        false => println!("{} {}", id.yellow(), result),
    }
}
