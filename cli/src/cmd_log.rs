// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use clap::{ArgMatches, Command, arg, value_parser};
use crmdav_core::{DavSync, Pager};

use crate::arg::{CommonArgs, SubscriptionArgs};
use crate::config::Scope;
use crate::formatter::LogColumn;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct CmdLogs {
    pub id: String,
    pub page: u32,
    pub per_page: u32,
    pub verbose: bool,
}

impl CmdLogs {
    pub const NAME: &str = "logs";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("log")
            .about("Show the sync log of a subscription, newest first")
            .arg(SubscriptionArgs::id())
            .arg(
                arg!(--page <PAGE> "Page to show, starting at 1")
                    .value_parser(value_parser!(u32).range(1..))
                    .default_value("1"),
            )
            .arg(
                arg!(-n --"per-page" <COUNT> "Entries per page")
                    .value_parser(value_parser!(u32).range(1..))
                    .default_value("15"),
            )
            .arg(CommonArgs::verbose())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            id: SubscriptionArgs::get_id(matches),
            page: matches.get_one("page").copied().unwrap_or(1),
            per_page: matches.get_one("per-page").copied().unwrap_or(15),
            verbose: CommonArgs::get_verbose(matches),
        }
    }

    pub async fn run(self, sync: &DavSync, scope: &Scope) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "reading sync logs...");
        let pager = Pager::from((self.page, self.per_page));
        let (logs, meta) = sync.get_sync_logs(&self.id, &scope.vault_id, &pager).await?;

        if logs.is_empty() {
            println!("No sync log entries");
        } else {
            let columns: &[LogColumn] = match self.verbose {
                true => &LogColumn::VERBOSE,
                false => &LogColumn::BASIC,
            };
            print!("{}", Table::new(columns, &logs));
        }
        println!(
            "Page {}/{}, {} entries in total",
            meta.page, meta.last_page, meta.total
        );
        Ok(())
    }
}
