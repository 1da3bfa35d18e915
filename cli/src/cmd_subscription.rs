// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use clap::{ArgMatches, Command};
use colored::Colorize;
use crmdav_core::{DavSync, NewSubscription, SyncWay};

use crate::arg::{RemoteArgs, SubscriptionArgs};
use crate::config::Scope;
use crate::formatter::SubscriptionColumn;
use crate::table::Table;

#[derive(Clone)]
pub struct CmdSubscribe {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub way: SyncWay,
    pub frequency: Option<u32>,
}

impl CmdSubscribe {
    pub const NAME: &str = "subscribe";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("add")
            .about("Subscribe the vault to a remote address book")
            .long_about(
                "\
Subscribe the vault to a remote address book. The server is not contacted, \
run `test-connection` first to find the address book URL.",
            )
            .arg(RemoteArgs::uri())
            .arg(RemoteArgs::username())
            .arg(RemoteArgs::password())
            .arg(SubscriptionArgs::way())
            .arg(SubscriptionArgs::frequency())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            uri: RemoteArgs::get_uri(matches),
            username: RemoteArgs::get_username(matches),
            password: RemoteArgs::get_password(matches),
            way: SubscriptionArgs::get_way(matches),
            frequency: SubscriptionArgs::get_frequency(matches),
        }
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(uri = %self.uri, way = %self.way, "creating subscription...");
        let new = NewSubscription {
            account_id: scope.account_id.clone(),
            vault_id: scope.vault_id.clone(),
            user_id: scope.user_id.clone(),
            uri: self.uri,
            username: self.username,
            password: self.password,
            sync_way: self.way,
            frequency_minutes: self.frequency,
        };
        let id = sync.create_subscription(&new).await?;
        println!("{} {}", "Subscribed:".green(), id);
        Ok(())
    }
}

impl std::fmt::Debug for CmdSubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdSubscribe")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("way", &self.way)
            .field("frequency", &self.frequency)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdSubscriptionList;

impl CmdSubscriptionList {
    pub const NAME: &str = "list";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("ls")
            .about("List the subscriptions of the vault")
    }

    pub fn from(_matches: &ArgMatches) -> Self {
        Self
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(vault_id = %scope.vault_id, "listing subscriptions...");
        let subscriptions = sync.list_subscriptions(&scope.vault_id).await?;
        if subscriptions.is_empty() {
            println!("No subscriptions");
        } else {
            print!("{}", Table::new(&SubscriptionColumn::ALL, &subscriptions));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdSubscriptionDelete {
    pub id: String,
}

impl CmdSubscriptionDelete {
    pub const NAME: &str = "delete";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("rm")
            .about("Delete a subscription together with its sync state and logs")
            .arg(SubscriptionArgs::id())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: SubscriptionArgs::get_id(matches),
        }
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "deleting subscription...");
        sync.delete_subscription(&self.id, &scope.vault_id).await?;
        println!("{} {}", "Deleted:".yellow(), self.id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CmdSubscriptionActivate {
    pub id: String,
    pub active: bool,
}

impl CmdSubscriptionActivate {
    pub const NAME_ACTIVATE: &str = "activate";
    pub const NAME_DEACTIVATE: &str = "deactivate";

    pub fn command_activate() -> Command {
        Command::new(Self::NAME_ACTIVATE)
            .about("Resume syncing a subscription")
            .arg(SubscriptionArgs::id())
    }

    pub fn command_deactivate() -> Command {
        Command::new(Self::NAME_DEACTIVATE)
            .about("Pause syncing a subscription")
            .arg(SubscriptionArgs::id())
    }

    pub fn from(matches: &ArgMatches, active: bool) -> Self {
        Self {
            id: SubscriptionArgs::get_id(matches),
            active,
        }
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "updating subscription...");
        sync.set_subscription_active(&self.id, &scope.vault_id, self.active)
            .await?;
        match self.active {
            true => println!("{} {}", "Activated:".green(), self.id),
            false => println!("{} {}", "Deactivated:".yellow(), self.id),
        }
        Ok(())
    }
}
