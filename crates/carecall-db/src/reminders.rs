//! PostgreSQL reminder store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use carecall_core::{
    new_v7, ConditionalUpdate, Error, NewReminder, Reminder, ReminderKind, ReminderOrder,
    ReminderOutcome, ReminderPatch, ReminderQuery, ReminderStatus, ReminderStore, Result, Stamp,
};

const REMINDER_COLUMNS: &str = "id, user_id, kind, medication_name, about, metadata, \
     scheduled_time, status, is_recurring, attempts, last_outcome, outcome_note, \
     error_message, created_at, updated_at, triggered_at, completed_at";

/// PostgreSQL implementation of [`ReminderStore`].
#[derive(Clone)]
pub struct PgReminderStore {
    pool: Pool<Postgres>,
}

/// A value bound into a dynamically built statement.
enum Bind {
    Text(Option<String>),
    Time(DateTime<Utc>),
}

impl PgReminderStore {
    /// Create a new PgReminderStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a reminder row.
    fn parse_row(row: PgRow) -> Result<Reminder> {
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        let last_outcome: Option<String> = row.try_get("last_outcome")?;

        Ok(Reminder {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: ReminderKind::parse(&kind).map_err(|e| Error::Serialization(e.to_string()))?,
            medication_name: row.try_get("medication_name")?,
            about: row.try_get("about")?,
            metadata: row.try_get("metadata")?,
            scheduled_time: row.try_get("scheduled_time")?,
            status: status
                .parse()
                .map_err(|e: Error| Error::Serialization(e.to_string()))?,
            is_recurring: row.try_get("is_recurring")?,
            attempts: row.try_get("attempts")?,
            last_outcome: last_outcome
                .map(|s| s.parse::<ReminderOutcome>())
                .transpose()
                .map_err(|e| Error::Serialization(e.to_string()))?,
            outcome_note: row.try_get("outcome_note")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            triggered_at: row.try_get("triggered_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    /// Render a patch as a SET clause, numbering parameters from `first_param`.
    ///
    /// `updated_at` is always refreshed.
    fn patch_sql(patch: &ReminderPatch, first_param: usize) -> (String, Vec<Bind>) {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        let mut param_idx = first_param;

        let stamp_sql = |stamp: Stamp| match stamp {
            Stamp::Now => "now()",
            Stamp::Clear => "NULL",
        };

        if let Some(status) = patch.status {
            sets.push(format!("status = ${}", param_idx));
            binds.push(Bind::Text(Some(status.as_str().to_string())));
            param_idx += 1;
        }
        if let Some(at) = patch.scheduled_time {
            sets.push(format!("scheduled_time = ${}", param_idx));
            binds.push(Bind::Time(at));
            param_idx += 1;
        }
        if let Some(stamp) = patch.triggered_at {
            sets.push(format!("triggered_at = {}", stamp_sql(stamp)));
        }
        if let Some(stamp) = patch.completed_at {
            sets.push(format!("completed_at = {}", stamp_sql(stamp)));
        }
        if patch.increment_attempts {
            sets.push("attempts = attempts + 1".to_string());
        }
        if let Some(outcome) = patch.last_outcome {
            sets.push(format!("last_outcome = ${}", param_idx));
            binds.push(Bind::Text(Some(outcome.as_str().to_string())));
            param_idx += 1;
        }
        if let Some(note) = &patch.outcome_note {
            sets.push(format!("outcome_note = ${}", param_idx));
            binds.push(Bind::Text(note.clone()));
            param_idx += 1;
        }
        if let Some(message) = &patch.error_message {
            sets.push(format!("error_message = ${}", param_idx));
            binds.push(Bind::Text(message.clone()));
        }
        sets.push("updated_at = now()".to_string());

        (sets.join(", "), binds)
    }

    /// Render query filters as a WHERE clause, numbering parameters from 1.
    fn where_sql(query: &ReminderQuery) -> (String, Vec<Bind>) {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        let mut param_idx = 1;

        if let Some(user_id) = &query.user_id {
            conditions.push(format!("user_id = ${}", param_idx));
            binds.push(Bind::Text(Some(user_id.clone())));
            param_idx += 1;
        }
        if let Some(status) = query.status {
            conditions.push(format!("status = ${}", param_idx));
            binds.push(Bind::Text(Some(status.as_str().to_string())));
            param_idx += 1;
        }
        if let Some(at) = query.due_at_or_before {
            conditions.push(format!("scheduled_time <= ${}", param_idx));
            binds.push(Bind::Time(at));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, binds)
    }

    fn order_sql(order: ReminderOrder) -> &'static str {
        match order {
            ReminderOrder::ScheduledAsc => "ORDER BY scheduled_time ASC, id ASC",
            ReminderOrder::ScheduledDesc => "ORDER BY scheduled_time DESC, id DESC",
            ReminderOrder::CreatedDesc => "ORDER BY created_at DESC, id DESC",
        }
    }

    fn bind_all<'q>(
        mut q: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
        binds: Vec<Bind>,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        for bind in binds {
            q = match bind {
                Bind::Text(value) => q.bind(value),
                Bind::Time(value) => q.bind(value),
            };
        }
        q
    }

    async fn current_status(&self, id: Uuid) -> Result<Option<ReminderStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM reminder WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        status
            .map(|s| {
                s.parse::<ReminderStatus>()
                    .map_err(|e| Error::Serialization(e.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn create(&self, new: NewReminder) -> Result<Reminder> {
        let id = new_v7();
        let sql = format!(
            "INSERT INTO reminder (id, user_id, kind, medication_name, about, metadata,
                                   scheduled_time, status, is_recurring)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
             RETURNING {}",
            REMINDER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&new.user_id)
            .bind(new.kind.as_str())
            .bind(&new.medication_name)
            .bind(&new.about)
            .bind(&new.metadata)
            .bind(new.scheduled_time)
            .bind(new.is_recurring)
            .fetch_one(&self.pool)
            .await?;

        debug!(
            subsystem = "db",
            component = "reminders",
            op = "create",
            reminder_id = %id,
            user_id = %new.user_id,
            "Reminder inserted"
        );
        Self::parse_row(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reminder>> {
        let sql = format!("SELECT {} FROM reminder WHERE id = $1", REMINDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::parse_row).transpose()
    }

    async fn update(&self, id: Uuid, patch: ReminderPatch) -> Result<Reminder> {
        let (set_clause, binds) = Self::patch_sql(&patch, 2);
        let sql = format!(
            "UPDATE reminder SET {} WHERE id = $1 RETURNING {}",
            set_clause, REMINDER_COLUMNS
        );

        let q = Self::bind_all(sqlx::query(&sql).bind(id), binds);
        let row = q.fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Self::parse_row(row),
            None => Err(Error::reminder_not_found(id)),
        }
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: ReminderStatus,
        patch: ReminderPatch,
    ) -> Result<ConditionalUpdate> {
        // Status check and write in one statement so concurrent callers
        // cannot both apply a patch from the same expected status.
        let (set_clause, binds) = Self::patch_sql(&patch, 3);
        let sql = format!(
            "UPDATE reminder SET {} WHERE id = $1 AND status = $2 RETURNING {}",
            set_clause, REMINDER_COLUMNS
        );

        let q = Self::bind_all(
            sqlx::query(&sql).bind(id).bind(expected.as_str()),
            binds,
        );
        if let Some(row) = q.fetch_optional(&self.pool).await? {
            return Ok(ConditionalUpdate::Applied(Self::parse_row(row)?));
        }

        match self.current_status(id).await? {
            Some(actual) => Ok(ConditionalUpdate::StatusMismatch { actual }),
            None => Err(Error::reminder_not_found(id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM reminder WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::reminder_not_found(id));
        }
        Ok(())
    }

    async fn query(&self, query: ReminderQuery) -> Result<Vec<Reminder>> {
        let (where_clause, binds) = Self::where_sql(&query);
        let param_idx = binds.len() + 1;

        let sql = format!(
            "SELECT {} FROM reminder {} {} LIMIT ${} OFFSET ${}",
            REMINDER_COLUMNS,
            where_clause,
            Self::order_sql(query.order),
            param_idx,
            param_idx + 1
        );

        // LIMIT NULL means no limit in PostgreSQL.
        let q = Self::bind_all(sqlx::query(&sql), binds)
            .bind(query.limit)
            .bind(query.offset.unwrap_or(0));
        let rows = q.fetch_all(&self.pool).await?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn count(&self, query: ReminderQuery) -> Result<i64> {
        let (where_clause, binds) = Self::where_sql(&query);
        let sql = format!("SELECT COUNT(*) FROM reminder {}", where_clause);

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for bind in binds {
            q = match bind {
                Bind::Text(value) => q.bind(value),
                Bind::Time(value) => q.bind(value),
            };
        }
        Ok(q.fetch_one(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_patch_sql_numbering() {
        let patch = ReminderPatch::new()
            .status(ReminderStatus::Pinging)
            .triggered_at(Stamp::Now)
            .increment_attempts()
            .error_message(None);

        let (sql, binds) = PgReminderStore::patch_sql(&patch, 3);
        assert_eq!(
            sql,
            "status = $3, triggered_at = now(), attempts = attempts + 1, \
             error_message = $4, updated_at = now()"
        );
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn test_patch_sql_clear_stamps() {
        let patch = ReminderPatch::new().reset_attempt();
        let (sql, binds) = PgReminderStore::patch_sql(&patch, 2);
        assert_eq!(
            sql,
            "triggered_at = NULL, completed_at = NULL, error_message = $2, updated_at = now()"
        );
        assert_eq!(binds.len(), 1);
    }

    #[test]
    fn test_empty_patch_only_touches_updated_at() {
        let (sql, binds) = PgReminderStore::patch_sql(&ReminderPatch::new(), 2);
        assert_eq!(sql, "updated_at = now()");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_where_sql_due_query() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let (sql, binds) = PgReminderStore::where_sql(&ReminderQuery::due(now));
        assert_eq!(sql, "WHERE status = $1 AND scheduled_time <= $2");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn test_where_sql_empty() {
        let (sql, binds) = PgReminderStore::where_sql(&ReminderQuery::new());
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn test_order_sql() {
        assert!(PgReminderStore::order_sql(ReminderOrder::ScheduledAsc).contains("ASC"));
        assert!(PgReminderStore::order_sql(ReminderOrder::ScheduledDesc)
            .starts_with("ORDER BY scheduled_time DESC"));
        assert!(PgReminderStore::order_sql(ReminderOrder::CreatedDesc)
            .starts_with("ORDER BY created_at DESC"));
    }
}
