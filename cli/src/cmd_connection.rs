// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use clap::{ArgMatches, Command};
use colored::Colorize;
use crmdav_core::{ConnectionParams, DavSync};

use crate::arg::RemoteArgs;
use crate::formatter::AddressBookColumn;
use crate::table::Table;

#[derive(Clone)]
pub struct CmdTestConnection {
    pub uri: String,
    pub username: String,
    pub password: String,
}

impl CmdTestConnection {
    pub const NAME: &str = "test-connection";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("probe")
            .about("Check credentials and list the address books of a CardDAV server")
            .arg(RemoteArgs::uri())
            .arg(RemoteArgs::username())
            .arg(RemoteArgs::password())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            uri: RemoteArgs::get_uri(matches),
            username: RemoteArgs::get_username(matches),
            password: RemoteArgs::get_password(matches),
        }
    }

    pub async fn run(self, sync: &DavSync) -> Result<(), Box<dyn Error>> {
        tracing::debug!(uri = %self.uri, username = %self.username, "testing connection...");
        let params = ConnectionParams {
            uri: self.uri,
            username: self.username,
            password: self.password,
        };
        let result = sync.test_connection(&params).await;
        if !result.success {
            let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(format!("Connection failed: {reason}").into());
        }

        println!("{} {}", "Connected:".green(), params.uri);
        if result.address_books.is_empty() {
            println!("No address books found");
        } else {
            let columns = [AddressBookColumn::Name, AddressBookColumn::Uri];
            print!("{}", Table::new(&columns, &result.address_books));
        }
        Ok(())
    }
}

// Keeps the password out of debug logs.
impl std::fmt::Debug for CmdTestConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdTestConnection")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
