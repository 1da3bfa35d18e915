// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::{SqliteConnection, SqlitePool};

use crate::contact::{Address, ContactName};

#[derive(Debug, Clone)]
pub struct Contacts {
    pool: SqlitePool,
}

impl Contacts {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE id = ?;
";

        sqlx::query_as(SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Gets a live contact of a vault.
    pub async fn get_in_vault(
        &self,
        id: &str,
        vault_id: &str,
    ) -> Result<Option<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE id = ? AND vault_id = ? AND deleted_at IS NULL;
";

        sqlx::query_as(SQL)
            .bind(id)
            .bind(vault_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self, vault_id: &str) -> Result<Vec<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE vault_id = ? AND deleted_at IS NULL
ORDER BY last_name, first_name, id;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn information(&self, id: &str) -> Result<Vec<InformationRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT contact_id, kind, data, position
FROM contact_information
WHERE contact_id = ?
ORDER BY kind, position;
";

        sqlx::query_as(SQL).bind(id).fetch_all(&self.pool).await
    }

    pub async fn addresses(&self, id: &str) -> Result<Vec<AddressRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT contact_id, street, city, region, postal_code, country, position
FROM addresses
WHERE contact_id = ?
ORDER BY position;
";

        sqlx::query_as(SQL).bind(id).fetch_all(&self.pool).await
    }

    /// Finds the live contact of a vault linked to a remote resource.
    pub async fn find_by_distant_uri(
        &self,
        conn: &mut SqliteConnection,
        vault_id: &str,
        distant_uri: &str,
    ) -> Result<Option<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE vault_id = ? AND distant_uri = ? AND deleted_at IS NULL
ORDER BY created_at
LIMIT 1;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .bind(distant_uri)
            .fetch_optional(conn)
            .await
    }

    /// Lists every live contact of a vault linked to a remote resource.
    pub async fn list_by_distant_uri(
        &self,
        conn: &mut SqliteConnection,
        vault_id: &str,
        distant_uri: &str,
    ) -> Result<Vec<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE vault_id = ? AND distant_uri = ? AND deleted_at IS NULL;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .bind(distant_uri)
            .fetch_all(conn)
            .await
    }

    /// Finds an unlinked live contact of a vault with exactly this name.
    pub async fn find_adoptable(
        &self,
        conn: &mut SqliteConnection,
        vault_id: &str,
        name: &ContactName,
    ) -> Result<Option<ContactRecord>, sqlx::Error> {
        const SQL: &str = "\
SELECT id, account_id, vault_id, first_name, last_name, nickname, distant_uri, distant_etag,
       vcard, last_updated_at, created_at, deleted_at
FROM contacts
WHERE vault_id = ? AND first_name IS ? AND last_name IS ?
  AND distant_uri IS NULL AND deleted_at IS NULL
ORDER BY created_at
LIMIT 1;
";

        sqlx::query_as(SQL)
            .bind(vault_id)
            .bind(&name.first_name)
            .bind(&name.last_name)
            .fetch_optional(conn)
            .await
    }

    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        contact: &ContactRecord,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO contacts (id, account_id, vault_id, first_name, last_name, nickname, distant_uri,
                      distant_etag, vcard, last_updated_at, created_at, deleted_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
";

        sqlx::query(SQL)
            .bind(&contact.id)
            .bind(&contact.account_id)
            .bind(&contact.vault_id)
            .bind(&contact.first_name)
            .bind(&contact.last_name)
            .bind(&contact.nickname)
            .bind(&contact.distant_uri)
            .bind(&contact.distant_etag)
            .bind(&contact.vcard)
            .bind(contact.last_updated_at)
            .bind(contact.created_at)
            .bind(contact.deleted_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Overwrites the mapped name fields.
    pub async fn update_name(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        name: &ContactName,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE contacts SET
    first_name = ?,
    last_name  = ?,
    nickname   = ?
WHERE id = ?;
";

        sqlx::query(SQL)
            .bind(&name.first_name)
            .bind(&name.last_name)
            .bind(&name.nickname)
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Links a contact to a remote resource; `vcard` keeps the raw card when given.
    pub async fn set_distant(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        distant_uri: &str,
        distant_etag: &str,
        vcard: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE contacts SET
    distant_uri  = ?,
    distant_etag = ?,
    vcard        = COALESCE(?, vcard)
WHERE id = ?;
";

        sqlx::query(SQL)
            .bind(distant_uri)
            .bind(distant_etag)
            .bind(vcard)
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn set_last_updated_at(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        last_updated_at: i64,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "UPDATE contacts SET last_updated_at = ? WHERE id = ?;";

        sqlx::query(SQL)
            .bind(last_updated_at)
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Replaces phones and emails, keeping the given order.
    pub async fn replace_information(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        phones: &[String],
        emails: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM contact_information WHERE contact_id = ?;")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        const SQL: &str = "\
INSERT INTO contact_information (contact_id, kind, data, position)
VALUES (?, ?, ?, ?);
";
        let rows = phones
            .iter()
            .enumerate()
            .map(|(i, data)| (InformationRecord::PHONE, i, data))
            .chain(
                emails
                    .iter()
                    .enumerate()
                    .map(|(i, data)| (InformationRecord::EMAIL, i, data)),
            );
        for (kind, position, data) in rows {
            sqlx::query(SQL)
                .bind(id)
                .bind(kind)
                .bind(data)
                .bind(i64::try_from(position).unwrap_or(i64::MAX))
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    /// Replaces postal addresses, keeping the given order.
    pub async fn replace_addresses(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        addresses: &[Address],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM addresses WHERE contact_id = ?;")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        const SQL: &str = "\
INSERT INTO addresses (contact_id, street, city, region, postal_code, country, position)
VALUES (?, ?, ?, ?, ?, ?, ?);
";
        for (position, address) in addresses.iter().enumerate() {
            sqlx::query(SQL)
                .bind(id)
                .bind(&address.street)
                .bind(&address.city)
                .bind(&address.region)
                .bind(&address.postal_code)
                .bind(&address.country)
                .bind(i64::try_from(position).unwrap_or(i64::MAX))
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    /// Attaches a contact to a user within a vault.
    pub async fn insert_membership(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        user_id: &str,
        vault_id: &str,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO contact_vault_user (contact_id, user_id, vault_id)
VALUES (?, ?, ?)
ON CONFLICT(contact_id, user_id, vault_id) DO NOTHING;
";

        sqlx::query(SQL)
            .bind(id)
            .bind(user_id)
            .bind(vault_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn count_memberships(&self, id: &str) -> Result<i64, sqlx::Error> {
        const SQL: &str = "SELECT COUNT(*) FROM contact_vault_user WHERE contact_id = ?;";

        sqlx::query_scalar(SQL)
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn soft_delete(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        deleted_at: i64,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "UPDATE contacts SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL;";

        sqlx::query(SQL)
            .bind(deleted_at)
            .bind(id)
            .execute(conn)
            .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ContactRecord {
    pub id: String,
    pub account_id: String,
    pub vault_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub distant_uri: Option<String>,
    pub distant_etag: Option<String>,
    pub vcard: Option<String>,
    pub last_updated_at: Option<i64>,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl ContactRecord {
    pub fn name(&self) -> ContactName {
        ContactName {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            nickname: self.nickname.clone(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InformationRecord {
    pub contact_id: String,
    pub kind: String,
    pub data: String,
    pub position: i64,
}

impl InformationRecord {
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddressRecord {
    pub contact_id: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub position: i64,
}

impl From<AddressRecord> for Address {
    fn from(record: AddressRecord) -> Self {
        Address {
            street: record.street,
            city: record.city,
            region: record.region,
            postal_code: record.postal_code,
            country: record.country,
        }
    }
}
