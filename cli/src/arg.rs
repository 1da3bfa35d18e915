// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use clap::{Arg, ArgMatches, ValueHint, arg, value_parser};
use crmdav_core::SyncWay;

#[derive(Debug, Clone, Copy)]
pub struct CommonArgs;

impl CommonArgs {
    pub fn verbose() -> Arg {
        arg!(-v --verbose "Show more detailed information")
    }

    pub fn get_verbose(matches: &ArgMatches) -> bool {
        matches.get_flag("verbose")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RemoteArgs;

impl RemoteArgs {
    pub fn uri() -> Arg {
        arg!(uri: <URI> "URL of the CardDAV server or address book").value_hint(ValueHint::Url)
    }

    pub fn get_uri(matches: &ArgMatches) -> String {
        get_required(matches, "uri")
    }

    pub fn username() -> Arg {
        arg!(-u --username <USERNAME> "Remote username").required(true)
    }

    pub fn get_username(matches: &ArgMatches) -> String {
        get_required(matches, "username")
    }

    pub fn password() -> Arg {
        arg!(-p --password <PASSWORD> "Remote password").required(true)
    }

    pub fn get_password(matches: &ArgMatches) -> String {
        get_required(matches, "password")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionArgs;

impl SubscriptionArgs {
    pub fn id() -> Arg {
        arg!(id: <ID> "The subscription id")
    }

    pub fn get_id(matches: &ArgMatches) -> String {
        get_required(matches, "id")
    }

    pub fn way() -> Arg {
        arg!(-w --way <WAY> "Direction to synchronize in")
            .value_parser(value_parser!(SyncWay))
            .default_value("both")
    }

    pub fn get_way(matches: &ArgMatches) -> SyncWay {
        matches
            .get_one("way")
            .copied()
            .unwrap_or(SyncWay::Both)
    }

    pub fn frequency() -> Arg {
        arg!(-f --frequency <MINUTES> "Minutes between scheduled pulls")
            .value_parser(value_parser!(u32).range(1..))
    }

    pub fn get_frequency(matches: &ArgMatches) -> Option<u32> {
        matches.get_one("frequency").copied()
    }
}

fn get_required(matches: &ArgMatches, id: &str) -> String {
    matches
        .get_one::<String>(id)
        .cloned()
        .unwrap_or_else(|| unreachable!("{id} is required"))
}
