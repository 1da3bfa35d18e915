// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod config;
mod contact;
mod crypto;
mod dav_sync;
mod driver;
mod engine;
mod error;
mod isolate;
pub mod localdb;
pub mod mapper;
mod publisher;
mod pull;
mod push;
mod remote;
mod types;
pub mod vcard;

pub use jiff::Timestamp;
pub use tokio_util::sync::CancellationToken;

pub use crate::config::{APP_NAME, Config};
pub use crate::contact::{Address, Contact, ContactDraft, ContactName, ContactService};
pub use crate::crypto::PasswordCipher;
pub use crate::dav_sync::DavSync;
pub use crate::driver::SubscriptionRun;
pub use crate::error::{ErrorKind, SyncError};
pub use crate::isolate::isolate;
pub use crate::publisher::{ContactChangePublisher, NoopPublisher};
pub use crate::remote::{AddressBookClient, CardDavClientFactory, ClientFactory};
pub use crate::types::{
    AddressBookInfo, ConnectionParams, NewSubscription, PageMeta, Pager, Subscription, SyncAction,
    SyncLog, SyncResult, SyncWay, TestConnectionResult,
};
