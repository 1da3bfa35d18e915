// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;

use colored::Color;
use crmdav_core::{AddressBookInfo, Subscription, SyncAction, SyncLog};

use crate::table::{PaddingDirection, TableColumn};

#[derive(Debug, Clone, Copy)]
pub enum SubscriptionColumn {
    Id,
    Way,
    Active,
    Frequency,
    LastSync,
    Uri,
}

impl SubscriptionColumn {
    pub const ALL: [SubscriptionColumn; 6] = [
        SubscriptionColumn::Id,
        SubscriptionColumn::Way,
        SubscriptionColumn::Active,
        SubscriptionColumn::Frequency,
        SubscriptionColumn::LastSync,
        SubscriptionColumn::Uri,
    ];
}

impl TableColumn<Subscription> for SubscriptionColumn {
    fn name(&self) -> Cow<'_, str> {
        match self {
            SubscriptionColumn::Id => "ID",
            SubscriptionColumn::Way => "Way",
            SubscriptionColumn::Active => "Active",
            SubscriptionColumn::Frequency => "Every",
            SubscriptionColumn::LastSync => "Last Sync",
            SubscriptionColumn::Uri => "Address Book",
        }
        .into()
    }

    fn format<'a>(&self, sub: &'a Subscription) -> Cow<'a, str> {
        match self {
            SubscriptionColumn::Id => sub.id.as_str().into(),
            SubscriptionColumn::Way => sub.sync_way.to_string().into(),
            SubscriptionColumn::Active => if sub.active { "yes" } else { "no" }.into(),
            SubscriptionColumn::Frequency => format!("{}m", sub.frequency_minutes).into(),
            SubscriptionColumn::LastSync => match sub.last_synchronized_at {
                Some(at) => at.strftime("%Y-%m-%d %H:%M:%S").to_string().into(),
                None => "never".into(),
            },
            SubscriptionColumn::Uri => sub.uri.as_str().into(),
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            SubscriptionColumn::Frequency => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn get_color(&self, sub: &Subscription) -> Option<Color> {
        match self {
            SubscriptionColumn::Active if !sub.active => Some(Color::BrightBlack),
            SubscriptionColumn::LastSync if sub.last_synchronized_at.is_none() => {
                Some(Color::Yellow)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LogColumn {
    Id,
    Time,
    Action,
    Contact,
    Uri,
    Error,
}

impl LogColumn {
    pub const BASIC: [LogColumn; 5] = [
        LogColumn::Id,
        LogColumn::Time,
        LogColumn::Action,
        LogColumn::Contact,
        LogColumn::Uri,
    ];

    pub const VERBOSE: [LogColumn; 6] = [
        LogColumn::Id,
        LogColumn::Time,
        LogColumn::Action,
        LogColumn::Contact,
        LogColumn::Uri,
        LogColumn::Error,
    ];
}

impl TableColumn<SyncLog> for LogColumn {
    fn name(&self) -> Cow<'_, str> {
        match self {
            LogColumn::Id => "#",
            LogColumn::Time => "Time",
            LogColumn::Action => "Action",
            LogColumn::Contact => "Contact",
            LogColumn::Uri => "Remote",
            LogColumn::Error => "Error",
        }
        .into()
    }

    fn format<'a>(&self, log: &'a SyncLog) -> Cow<'a, str> {
        match self {
            LogColumn::Id => log.id.to_string().into(),
            LogColumn::Time => log.created_at.strftime("%Y-%m-%d %H:%M:%S").to_string().into(),
            LogColumn::Action => log.action.as_str().into(),
            LogColumn::Contact => log.contact_id.as_deref().unwrap_or("-").into(),
            LogColumn::Uri => log.distant_uri.as_deref().unwrap_or("-").into(),
            LogColumn::Error => log.error_message.as_deref().unwrap_or("").into(),
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            LogColumn::Id => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn get_color(&self, log: &SyncLog) -> Option<Color> {
        match self {
            LogColumn::Action | LogColumn::Error => action_color(log.action),
            _ => None,
        }
    }
}

fn action_color(action: SyncAction) -> Option<Color> {
    match action {
        SyncAction::Created | SyncAction::Pushed => Some(Color::Green),
        SyncAction::Updated => Some(Color::Cyan),
        SyncAction::Deleted | SyncAction::PushDeleted => Some(Color::Yellow),
        SyncAction::ConflictLocalWins => Some(Color::Magenta),
        SyncAction::Skipped | SyncAction::SkippedPushOrigin => Some(Color::BrightBlack),
        SyncAction::Error => Some(Color::Red),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AddressBookColumn {
    Name,
    Uri,
}

impl TableColumn<AddressBookInfo> for AddressBookColumn {
    fn name(&self) -> Cow<'_, str> {
        match self {
            AddressBookColumn::Name => "Name",
            AddressBookColumn::Uri => "URI",
        }
        .into()
    }

    fn format<'a>(&self, book: &'a AddressBookInfo) -> Cow<'a, str> {
        match self {
            AddressBookColumn::Name => book.name.as_str().into(),
            AddressBookColumn::Uri => book.uri.as_str().into(),
        }
    }
}
