// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::localdb::from_millis;
use crate::{Subscription, SyncWay};

#[derive(Debug, Clone)]
pub struct Subscriptions {
    pool: SqlitePool,
}

impl Subscriptions {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, sub: &SubscriptionRecord) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO addressbook_subscriptions (id, account_id, vault_id, user_id, uri, username,
                                       password_ciphertext, sync_way, active, distant_sync_token,
                                       last_synchronized_at, frequency_minutes, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
";

        sqlx::query(SQL)
            .bind(&sub.id)
            .bind(&sub.account_id)
            .bind(&sub.vault_id)
            .bind(&sub.user_id)
            .bind(&sub.uri)
            .bind(&sub.username)
            .bind(&sub.password_ciphertext)
            .bind(sub.sync_way)
            .bind(sub.active)
            .bind(&sub.distant_sync_token)
            .bind(sub.last_synchronized_at)
            .bind(sub.frequency_minutes)
            .bind(sub.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, user_id, uri, username, password_ciphertext, sync_way, active,
       distant_sync_token, last_synchronized_at, frequency_minutes, created_at
FROM addressbook_subscriptions
WHERE id = ?;
";

        sqlx::query_as(SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Gets a subscription only if it belongs to the vault.
    pub async fn get_in_vault(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, user_id, uri, username, password_ciphertext, sync_way, active,
       distant_sync_token, last_synchronized_at, frequency_minutes, created_at
FROM addressbook_subscriptions
WHERE id = ? AND vault_id = ?;
";

        sqlx::query_as(SQL)
            .bind(id)
            .bind(vault_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self, vault_id: &str) -> Result<Vec<SubscriptionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, user_id, uri, username, password_ciphertext, sync_way, active,
       distant_sync_token, last_synchronized_at, frequency_minutes, created_at
FROM addressbook_subscriptions
WHERE vault_id = ?
ORDER BY created_at, id;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Lists active subscriptions whose pull is due at `now`, never-synced and
    /// oldest first.
    pub async fn list_due(&self, now: i64) -> Result<Vec<SubscriptionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, user_id, uri, username, password_ciphertext, sync_way, active,
       distant_sync_token, last_synchronized_at, frequency_minutes, created_at
FROM addressbook_subscriptions
WHERE active = 1
  AND (last_synchronized_at IS NULL OR last_synchronized_at + frequency_minutes * 60000 <= ?)
ORDER BY last_synchronized_at IS NOT NULL, last_synchronized_at, created_at;
";

        sqlx::query_as(SQL).bind(now).fetch_all(&self.pool).await
    }

    /// Lists active subscriptions of a vault that push local changes.
    pub async fn list_push_enabled(
        &self,
        vault_id: &str,
    ) -> Result<Vec<SubscriptionRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, user_id, uri, username, password_ciphertext, sync_way, active,
       distant_sync_token, last_synchronized_at, frequency_minutes, created_at
FROM addressbook_subscriptions
WHERE vault_id = ? AND active = 1 AND (sync_way & ?) != 0
ORDER BY created_at, id;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .bind(i64::from(SyncWay::PUSH_BIT))
            .fetch_all(&self.pool)
            .await
    }

    /// Records a finished run at `now`. The token is replaced only when one is given.
    pub async fn update_sync_status(
        &self,
        id: &str,
        token: Option<&str>,
        now: i64,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE addressbook_subscriptions SET
    distant_sync_token   = COALESCE(?, distant_sync_token),
    last_synchronized_at = ?
WHERE id = ?;
";

        sqlx::query(SQL)
            .bind(token)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<bool, sqlx::Error> {
        const SQL: &str = "UPDATE addressbook_subscriptions SET active = ? WHERE id = ?;";

        let result = sqlx::query(SQL)
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a subscription; its states and logs go with it.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        const SQL: &str = "DELETE FROM addressbook_subscriptions WHERE id = ?;";

        let result = sqlx::query(SQL).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub id: String,
    pub account_id: String,
    pub vault_id: String,
    pub user_id: String,
    pub uri: String,
    pub username: String,
    pub password_ciphertext: String,
    pub sync_way: i64,
    pub active: bool,
    pub distant_sync_token: Option<String>,
    pub last_synchronized_at: Option<i64>,
    pub frequency_minutes: i64,
    pub created_at: i64,
}

impl SubscriptionRecord {
    pub fn to_subscription(&self) -> Subscription {
        Subscription {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            vault_id: self.vault_id.clone(),
            user_id: self.user_id.clone(),
            uri: self.uri.clone(),
            username: self.username.clone(),
            // the column is constrained to 1..=3
            sync_way: u8::try_from(self.sync_way)
                .ok()
                .and_then(SyncWay::from_bits)
                .unwrap_or(SyncWay::Pull),
            active: self.active,
            distant_sync_token: self.distant_sync_token.clone(),
            last_synchronized_at: self.last_synchronized_at.map(from_millis),
            frequency_minutes: u32::try_from(self.frequency_minutes).unwrap_or(u32::MAX),
            created_at: from_millis(self.created_at),
        }
    }
}
