// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface of crmdav.

mod arg;
mod cli;
mod cmd_connection;
mod cmd_log;
mod cmd_subscription;
mod cmd_sync;
mod config;
mod formatter;
mod table;

pub use crate::cli::{Cli, Commands, run};
pub use crate::config::{Config, Scope};
