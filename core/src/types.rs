// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;

/// Direction(s) a subscription synchronizes in.
///
/// Stored as a two-bit mask: [`SyncWay::PUSH_BIT`] | [`SyncWay::PULL_BIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SyncWay {
    /// Local changes are sent to the remote.
    Push,

    /// Remote changes are fetched.
    Pull,

    /// Both directions.
    Both,
}

impl SyncWay {
    /// Bit set when local changes are pushed.
    pub const PUSH_BIT: u8 = 0x1;

    /// Bit set when remote changes are pulled.
    pub const PULL_BIT: u8 = 0x2;

    /// Returns the bitmask representation.
    pub fn bits(self) -> u8 {
        match self {
            SyncWay::Push => Self::PUSH_BIT,
            SyncWay::Pull => Self::PULL_BIT,
            SyncWay::Both => Self::PUSH_BIT | Self::PULL_BIT,
        }
    }

    /// Parses a bitmask, `None` when no known bit is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        let push = bits & Self::PUSH_BIT != 0;
        let pull = bits & Self::PULL_BIT != 0;
        match (push, pull) {
            (true, true) => Some(SyncWay::Both),
            (true, false) => Some(SyncWay::Push),
            (false, true) => Some(SyncWay::Pull),
            (false, false) => None,
        }
    }

    /// Whether local changes are pushed.
    pub fn pushes(self) -> bool {
        self.bits() & Self::PUSH_BIT != 0
    }

    /// Whether remote changes are pulled.
    pub fn pulls(self) -> bool {
        self.bits() & Self::PULL_BIT != 0
    }
}

impl fmt::Display for SyncWay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncWay::Push => "push",
            SyncWay::Pull => "pull",
            SyncWay::Both => "both",
        })
    }
}

/// Observable action recorded in the sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// A contact was created from a remote card.
    Created,
    /// A contact was updated from a remote card.
    Updated,
    /// A contact was soft-deleted because its remote card disappeared.
    Deleted,
    /// A local contact was stored on the remote.
    Pushed,
    /// A local deletion was propagated to the remote.
    PushDeleted,
    /// A remote card was unchanged and left alone.
    Skipped,
    /// A push was suppressed because the contact came from the same address book.
    SkippedPushOrigin,
    /// A remote update lost against a newer local edit.
    ConflictLocalWins,
    /// Something failed; see the error message.
    Error,
}

impl SyncAction {
    /// All actions, in declaration order.
    pub const ALL: [SyncAction; 9] = [
        SyncAction::Created,
        SyncAction::Updated,
        SyncAction::Deleted,
        SyncAction::Pushed,
        SyncAction::PushDeleted,
        SyncAction::Skipped,
        SyncAction::SkippedPushOrigin,
        SyncAction::ConflictLocalWins,
        SyncAction::Error,
    ];

    /// The stable name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Deleted => "deleted",
            SyncAction::Pushed => "pushed",
            SyncAction::PushDeleted => "push_deleted",
            SyncAction::Skipped => "skipped",
            SyncAction::SkippedPushOrigin => "skipped_push_origin",
            SyncAction::ConflictLocalWins => "conflict_local_wins",
            SyncAction::Error => "error",
        }
    }
}

impl AsRef<str> for SyncAction {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown sync action: {s}"))
    }
}

/// Tally of one pull run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Contacts created.
    pub created: usize,
    /// Contacts updated.
    pub updated: usize,
    /// Contacts soft-deleted.
    pub deleted: usize,
    /// Cards left alone (unchanged, or lost against a local edit).
    pub skipped: usize,
    /// Entities that failed.
    pub errors: usize,
}

impl SyncResult {
    /// Whether the run completed without a single error.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={}, updated={}, deleted={}, skipped={}, errors={}",
            self.created, self.updated, self.deleted, self.skipped, self.errors
        )
    }
}

/// A configured binding between a local vault and a remote address book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// The subscription id.
    pub id: String,
    /// Owning account.
    pub account_id: String,
    /// Vault contacts are pulled into.
    pub vault_id: String,
    /// User new contacts are attached to.
    pub user_id: String,
    /// Absolute URL of the remote address book.
    pub uri: String,
    /// Remote username.
    pub username: String,
    /// Sync direction(s).
    pub sync_way: SyncWay,
    /// Whether the subscription takes part in syncs.
    pub active: bool,
    /// The last sync token the remote handed out, if any.
    pub distant_sync_token: Option<String>,
    /// When the last pull run finished.
    pub last_synchronized_at: Option<Timestamp>,
    /// Minimum interval between scheduled pulls.
    pub frequency_minutes: u32,
    /// When the subscription was created.
    pub created_at: Timestamp,
}

impl Subscription {
    /// Whether a scheduled pull is due at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        if !self.active {
            return false;
        }
        match self.last_synchronized_at {
            None => true,
            Some(last) => {
                let frequency_ms = i64::from(self.frequency_minutes) * 60_000;
                now.as_millisecond() - last.as_millisecond() >= frequency_ms
            }
        }
    }
}

/// Input for creating a subscription.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    /// Owning account.
    pub account_id: String,
    /// Vault contacts are pulled into.
    pub vault_id: String,
    /// User new contacts are attached to.
    pub user_id: String,
    /// Absolute http(s) URL of the remote address book.
    pub uri: String,
    /// Remote username.
    pub username: String,
    /// Remote password, sealed before it is stored.
    pub password: String,
    /// Sync direction(s).
    pub sync_way: SyncWay,
    /// Pull interval; the configured default when `None`.
    pub frequency_minutes: Option<u32>,
}

/// Credentials for probing a remote.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// URL of the remote server or address book.
    pub uri: String,
    /// Remote username.
    pub username: String,
    /// Remote password.
    pub password: String,
}

/// An address book found during a connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookInfo {
    /// Absolute URL of the address book.
    pub uri: String,
    /// Display name, or the last path segment.
    pub name: String,
}

/// Outcome of a connection test.
#[derive(Debug, Clone, Default)]
pub struct TestConnectionResult {
    /// Whether the remote could be reached and enumerated.
    pub success: bool,
    /// Address books of the user.
    pub address_books: Vec<AddressBookInfo>,
    /// What went wrong, when `success` is false.
    pub error: Option<String>,
}

/// One sync-log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLog {
    /// The log id.
    pub id: i64,
    /// The subscription the entry belongs to.
    pub subscription_id: String,
    /// The local contact involved, if any.
    pub contact_id: Option<String>,
    /// The remote resource involved, if any.
    pub distant_uri: Option<String>,
    /// The remote `ETag`, if known.
    pub distant_etag: Option<String>,
    /// What happened.
    pub action: SyncAction,
    /// Error details for [`SyncAction::Error`].
    pub error_message: Option<String>,
    /// When it happened.
    pub created_at: Timestamp,
}

/// A page request, 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Pager {
    /// The page number, starting at 1.
    pub page: u32,

    /// The number of items per page.
    pub per_page: u32,
}

impl Pager {
    /// The number of items to skip.
    pub(crate) fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    /// The maximum number of items to return.
    pub(crate) fn limit(&self) -> i64 {
        i64::from(self.per_page.max(1))
    }
}

impl Default for Pager {
    fn default() -> Self {
        Pager {
            page: 1,
            per_page: 15,
        }
    }
}

impl From<(u32, u32)> for Pager {
    fn from((page, per_page): (u32, u32)) -> Self {
        Pager { page, per_page }
    }
}

/// Pagination metadata of a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    /// Total number of items.
    pub total: i64,
    /// The page that was returned.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// The last page number, at least 1.
    pub last_page: u32,
}

impl PageMeta {
    pub(crate) fn new(total: i64, pager: &Pager) -> Self {
        let per_page = pager.per_page.max(1);
        let pages = (total.max(0) + i64::from(per_page) - 1) / i64::from(per_page);
        PageMeta {
            total,
            page: pager.page.max(1),
            per_page,
            last_page: u32::try_from(pages.max(1)).unwrap_or(u32::MAX),
        }
    }
}
