//! SQLite backend reading a Trac ticket database.
//!
//! Tickets come from the `ticket` table plus their `ticket_custom` fields;
//! history comes from `ticket_change`. Trac stores timestamps as
//! microseconds since the Unix epoch.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tickethistory_core::{ChangeEvent, FieldValue, Ticket, TicketId, Time};
use tracing::debug;

use super::trait_::{
    sort_tickets, ChangeLogProvider, FieldSet, Result, StorageError, TicketQuery, TicketSource,
};

/// Built-in text columns of the Trac `ticket` table.
const TICKET_COLUMNS: &[&str] = &[
    "type", "component", "severity", "priority", "owner", "reporter", "cc", "version",
    "milestone", "status", "resolution", "summary", "keywords",
];

/// Trac database reader.
#[derive(Clone)]
pub struct TracSqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl TracSqliteStorage {
    /// Connect to a Trac database.
    pub async fn new(db_url: &str) -> Result<Self> {
        let pool = sqlx::SqlitePool::connect(db_url).await.map_err(db_error)?;
        Ok(Self { pool })
    }

    /// Create an empty in-memory database with the Trac ticket schema.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_error)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Access the pool, e.g. to load fixtures.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Create the subset of the Trac schema this backend reads.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ticket (
                id INTEGER PRIMARY KEY,
                type TEXT, time INTEGER, changetime INTEGER,
                component TEXT, severity TEXT, priority TEXT, owner TEXT,
                reporter TEXT, cc TEXT, version TEXT, milestone TEXT,
                status TEXT, resolution TEXT, summary TEXT, description TEXT,
                keywords TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ticket_custom (
                ticket INTEGER, name TEXT, value TEXT,
                UNIQUE (ticket, name)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ticket_change (
                ticket INTEGER, time INTEGER, author TEXT,
                field TEXT, oldvalue TEXT, newvalue TEXT,
                UNIQUE (ticket, time, field)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn custom_fields(&self, id: i64) -> Result<Vec<(String, Option<String>)>> {
        let rows = sqlx::query("SELECT name, value FROM ticket_custom WHERE ticket = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let mut fields = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name").map_err(db_error)?;
            let value: Option<String> = row.try_get("value").map_err(db_error)?;
            fields.push((name, value));
        }
        Ok(fields)
    }

    async fn ticket_from_row(&self, row: &SqliteRow) -> Result<Ticket> {
        let id: i64 = row.try_get("id").map_err(db_error)?;
        let ticket_id = TicketId::from(id);
        let time: i64 = row.try_get("time").map_err(db_error)?;
        let mut ticket = Ticket::new(ticket_id.clone(), from_utimestamp(&ticket_id, time)?);

        for column in TICKET_COLUMNS {
            let value: Option<String> = row.try_get(*column).map_err(db_error)?;
            ticket.fields.insert((*column).to_string(), FieldValue::from(value));
        }
        for (name, value) in self.custom_fields(id).await? {
            ticket.fields.insert(name, FieldValue::from(value));
        }
        Ok(ticket)
    }
}

fn db_error(e: sqlx::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

fn from_utimestamp(ticket: &TicketId, raw: i64) -> Result<Time> {
    DateTime::from_timestamp_micros(raw).ok_or_else(|| StorageError::InvalidTimestamp {
        ticket: ticket.clone(),
        raw,
    })
}

fn numeric_id(id: &TicketId) -> Result<i64> {
    id.as_str()
        .parse()
        .map_err(|_| StorageError::NotFound(format!("ticket {}", id)))
}

#[async_trait]
impl ChangeLogProvider for TracSqliteStorage {
    async fn changes(&self, ticket: &TicketId, fields: &FieldSet) -> Result<Vec<ChangeEvent>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let id = numeric_id(ticket)?;
        // Field names are validated identifiers and are still bound as parameters.
        let placeholders = vec!["?"; fields.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT field, time, oldvalue, newvalue FROM ticket_change \
             WHERE ticket = ? AND field IN ({}) ORDER BY time ASC",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(id);
        for field in fields.iter() {
            query = query.bind(field.to_string());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in &rows {
            let time: i64 = row.try_get("time").map_err(db_error)?;
            let old: Option<String> = row.try_get("oldvalue").map_err(db_error)?;
            let new: Option<String> = row.try_get("newvalue").map_err(db_error)?;
            changes.push(ChangeEvent {
                field: row.try_get("field").map_err(db_error)?,
                time: from_utimestamp(ticket, time)?,
                old_value: FieldValue::from(old),
                new_value: FieldValue::from(new),
            });
        }
        debug!(ticket = %ticket, count = changes.len(), "Loaded ticket changes");
        Ok(changes)
    }
}

#[async_trait]
impl TicketSource for TracSqliteStorage {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT DISTINCT t.id, t.time, {} FROM ticket t \
             WHERE ?1 IS NULL OR t.milestone = ?1 OR t.id IN ( \
                SELECT c.ticket FROM ticket_change c \
                WHERE c.field = 'milestone' AND (c.oldvalue = ?1 OR c.newvalue = ?1))",
            TICKET_COLUMNS
                .iter()
                .map(|c| format!("t.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = sqlx::query(&sql)
            .bind(query.milestone.clone())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in &rows {
            let ticket = self.ticket_from_row(row).await?;
            if query.ids.as_ref().map_or(true, |ids| ids.contains(&ticket.id)) {
                tickets.push(ticket);
            }
        }
        sort_tickets(&mut tickets);
        Ok(tickets)
    }
}
