//! PostgreSQL implementation of SubscriptionStore.
//!
//! Conditional updates are a single `UPDATE ... WHERE phone = $1 AND
//! <predicate> RETURNING`, so the compare-and-set happens inside the
//! database and never spans two round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, PlatformUserId, SubscriberId, Timestamp};
use crate::domain::subscription::{
    HistoryEntry, HistoryKind, InviteToken, PhoneNumber, SubscriberRecord,
};
use crate::ports::{RecordPatch, RecordPredicate, SubscriptionStore};

const COLUMNS: &str = "id, phone, platform_id, display_name, invite_token, invite_consumed, \
                       expiry_at, joined, departed_at, created_at, updated_at";

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscriber.
#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    id: Uuid,
    phone: String,
    platform_id: Option<i64>,
    display_name: Option<String>,
    invite_token: Option<String>,
    invite_consumed: bool,
    expiry_at: DateTime<Utc>,
    joined: bool,
    departed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriberRow> for SubscriberRecord {
    type Error = DomainError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone)
            .map_err(|e| DomainError::database(format!("Invalid stored phone: {}", e)))?;
        let invite_token = row
            .invite_token
            .map(InviteToken::new)
            .transpose()
            .map_err(|e| DomainError::database(format!("Invalid stored invite token: {}", e)))?;

        Ok(SubscriberRecord {
            id: SubscriberId::from_uuid(row.id),
            phone,
            platform_id: row.platform_id.map(PlatformUserId::new),
            display_name: row.display_name,
            invite_token,
            invite_consumed: row.invite_consumed,
            expiry_at: Timestamp::from_datetime(row.expiry_at),
            joined: row.joined,
            departed_at: row.departed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

/// Database row representation of a history entry.
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    subscriber_id: Uuid,
    phone: String,
    platform_id: Option<i64>,
    kind: String,
    expiry_at: DateTime<Utc>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let phone = PhoneNumber::parse(&row.phone)
            .map_err(|e| DomainError::database(format!("Invalid stored phone: {}", e)))?;
        let kind = row
            .kind
            .parse::<HistoryKind>()
            .map_err(DomainError::database)?;

        Ok(HistoryEntry {
            subscriber_id: SubscriberId::from_uuid(row.subscriber_id),
            phone,
            platform_id: row.platform_id.map(PlatformUserId::new),
            kind,
            expiry_at: Timestamp::from_datetime(row.expiry_at),
            occurred_at: Timestamp::from_datetime(row.occurred_at),
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

fn token_str(token: &Option<InviteToken>) -> Option<String> {
    token.as_ref().map(|t| t.as_str().to_string())
}

fn into_records(rows: Vec<SubscriberRow>) -> Result<Vec<SubscriberRecord>, DomainError> {
    rows.into_iter().map(SubscriberRecord::try_from).collect()
}

/// Appends ` AND <condition>` for every field the predicate constrains.
fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &RecordPredicate) {
    if let Some(joined) = predicate.joined {
        qb.push(" AND joined = ").push_bind(joined);
    }
    if let Some(consumed) = predicate.invite_consumed {
        qb.push(" AND invite_consumed = ").push_bind(consumed);
    }
    match &predicate.invite_token {
        Some(Some(token)) => {
            qb.push(" AND invite_token = ")
                .push_bind(token.as_str().to_string());
        }
        Some(None) => {
            qb.push(" AND invite_token IS NULL");
        }
        None => {}
    }
    if let Some(expiry_at) = predicate.expiry_at {
        qb.push(" AND expiry_at = ").push_bind(*expiry_at.as_datetime());
    }
    if let Some(now) = predicate.expired_before {
        qb.push(" AND expiry_at < ").push_bind(*now.as_datetime());
    }
    match predicate.departed {
        Some(true) => {
            qb.push(" AND departed_at IS NOT NULL");
        }
        Some(false) => {
            qb.push(" AND departed_at IS NULL");
        }
        None => {}
    }
    match predicate.platform_id {
        Some(Some(id)) => {
            qb.push(" AND platform_id = ").push_bind(id.value());
        }
        Some(None) => {
            qb.push(" AND platform_id IS NULL");
        }
        None => {}
    }
}

/// Builds the full conditional `UPDATE` statement.
fn conditional_update_query<'a>(
    phone: &PhoneNumber,
    predicate: &RecordPredicate,
    patch: &RecordPatch,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE subscribers SET updated_at = ");
    qb.push_bind(*patch.updated_at.as_datetime());

    if let Some(id) = patch.platform_id {
        qb.push(", platform_id = ").push_bind(id.map(|id| id.value()));
    }
    if let Some(name) = &patch.display_name {
        qb.push(", display_name = ").push_bind(name.clone());
    }
    if let Some(token) = &patch.invite_token {
        qb.push(", invite_token = ").push_bind(token_str(token));
    }
    if let Some(consumed) = patch.invite_consumed {
        qb.push(", invite_consumed = ").push_bind(consumed);
    }
    if let Some(expiry_at) = patch.expiry_at {
        qb.push(", expiry_at = ").push_bind(*expiry_at.as_datetime());
    }
    if let Some(joined) = patch.joined {
        qb.push(", joined = ").push_bind(joined);
    }
    if let Some(departed_at) = patch.departed_at {
        qb.push(", departed_at = ")
            .push_bind(departed_at.map(|t| *t.as_datetime()));
    }

    qb.push(" WHERE phone = ").push_bind(phone.as_str().to_string());
    push_predicate(&mut qb, predicate);
    qb.push(" RETURNING ").push(COLUMNS);
    qb
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn find_by_identity(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let row: Option<SubscriberRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscribers WHERE phone = $1",
            COLUMNS
        ))
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscriber by phone", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn find_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let row: Option<SubscriberRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscribers WHERE invite_token = $1",
            COLUMNS
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscriber by invite", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn find_by_platform_id(
        &self,
        platform_id: PlatformUserId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let row: Option<SubscriberRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscribers WHERE platform_id = $1 ORDER BY updated_at DESC LIMIT 1",
            COLUMNS
        ))
        .bind(platform_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find subscriber by platform id", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<SubscriberRecord>, DomainError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscribers WHERE expiry_at < $1 ORDER BY expiry_at",
            COLUMNS
        ))
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find expired subscribers", e))?;

        into_records(rows)
    }

    async fn list_all(&self) -> Result<Vec<SubscriberRecord>, DomainError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscribers ORDER BY created_at",
            COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list subscribers", e))?;

        into_records(rows)
    }

    async fn insert_new(&self, record: &SubscriberRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscribers (
                id, phone, platform_id, display_name, invite_token, invite_consumed,
                expiry_at, joined, departed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (phone) DO NOTHING
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.phone.as_str())
        .bind(record.platform_id.map(|id| id.value()))
        .bind(&record.display_name)
        .bind(token_str(&record.invite_token))
        .bind(record.invite_consumed)
        .bind(record.expiry_at.as_datetime())
        .bind(record.joined)
        .bind(record.departed_at.map(|t| *t.as_datetime()))
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert subscriber", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (
                id, phone, platform_id, display_name, invite_token, invite_consumed,
                expiry_at, joined, departed_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (phone) DO UPDATE SET
                platform_id = EXCLUDED.platform_id,
                display_name = EXCLUDED.display_name,
                invite_token = EXCLUDED.invite_token,
                invite_consumed = EXCLUDED.invite_consumed,
                expiry_at = EXCLUDED.expiry_at,
                joined = EXCLUDED.joined,
                departed_at = EXCLUDED.departed_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.phone.as_str())
        .bind(record.platform_id.map(|id| id.value()))
        .bind(&record.display_name)
        .bind(token_str(&record.invite_token))
        .bind(record.invite_consumed)
        .bind(record.expiry_at.as_datetime())
        .bind(record.joined)
        .bind(record.departed_at.map(|t| *t.as_datetime()))
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("upsert subscriber", e))?;

        Ok(())
    }

    async fn conditional_update(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
        patch: &RecordPatch,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let mut qb = conditional_update_query(phone, predicate, patch);
        let row: Option<SubscriberRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("conditionally update subscriber", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn delete(&self, phone: &PhoneNumber) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM subscribers WHERE phone = $1")
            .bind(phone.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete subscriber", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_where(
        &self,
        phone: &PhoneNumber,
        predicate: &RecordPredicate,
    ) -> Result<bool, DomainError> {
        let mut qb = QueryBuilder::new("DELETE FROM subscribers WHERE phone = ");
        qb.push_bind(phone.as_str().to_string());
        push_predicate(&mut qb, predicate);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("conditionally delete subscriber", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscription_history (
                subscriber_id, phone, platform_id, kind, expiry_at, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.subscriber_id.as_uuid())
        .bind(entry.phone.as_str())
        .bind(entry.platform_id.map(|id| id.value()))
        .bind(entry.kind.as_str())
        .bind(entry.expiry_at.as_datetime())
        .bind(entry.occurred_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("append subscription history", e))?;

        Ok(())
    }

    async fn history_for(&self, phone: &PhoneNumber) -> Result<Vec<HistoryEntry>, DomainError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT subscriber_id, phone, platform_id, kind, expiry_at, occurred_at
            FROM subscription_history
            WHERE phone = $1
            ORDER BY occurred_at, id
            "#,
        )
        .bind(phone.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load subscription history", e))?;

        rows.into_iter().map(HistoryEntry::try_from).collect()
    }
}
