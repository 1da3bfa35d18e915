// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::{SqliteConnection, SqlitePool};

/// Remembered remote resource of a contact per subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionStates {
    pool: SqlitePool,
}

impl SubscriptionStates {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        contact_id: &str,
        subscription_id: &str,
    ) -> Result<Option<StateRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT contact_id, subscription_id, distant_uri, distant_etag
FROM contact_subscription_states
WHERE contact_id = ? AND subscription_id = ?;
";

        sqlx::query_as(SQL)
            .bind(contact_id)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        state: &StateRecord,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO contact_subscription_states (contact_id, subscription_id, distant_uri, distant_etag)
VALUES (?, ?, ?, ?)
ON CONFLICT(contact_id, subscription_id) DO UPDATE SET
    distant_uri  = excluded.distant_uri,
    distant_etag = excluded.distant_etag;
";

        sqlx::query(SQL)
            .bind(&state.contact_id)
            .bind(&state.subscription_id)
            .bind(&state.distant_uri)
            .bind(&state.distant_etag)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn delete(
        &self,
        conn: &mut SqliteConnection,
        contact_id: &str,
        subscription_id: &str,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
DELETE FROM contact_subscription_states
WHERE contact_id = ? AND subscription_id = ?;
";

        sqlx::query(SQL)
            .bind(contact_id)
            .bind(subscription_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn list_for_contact(&self, contact_id: &str) -> Result<Vec<StateRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT contact_id, subscription_id, distant_uri, distant_etag
FROM contact_subscription_states
WHERE contact_id = ?
ORDER BY subscription_id;
";

        sqlx::query_as(SQL)
            .bind(contact_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_for_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<StateRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT contact_id, subscription_id, distant_uri, distant_etag
FROM contact_subscription_states
WHERE subscription_id = ?
ORDER BY distant_uri;
";

        sqlx::query_as(SQL)
            .bind(subscription_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StateRecord {
    pub contact_id: String,
    pub subscription_id: String,
    pub distant_uri: String,
    pub distant_etag: String,
}
