//! JSON file storage implementation.
//!
//! Stores tickets as JSON files in a data directory: `tickets/<id>.json`
//! holds the current ticket and `changes/<id>.json` its change log as a JSON
//! array, oldest first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tickethistory_core::{ChangeEvent, Ticket, TicketId};
use tokio::fs;
use tracing::{debug, warn};

use super::trait_::{
    sort_tickets, ChangeLogProvider, FieldSet, Result, StorageError, TicketQuery, TicketSource,
};

/// File-based JSON storage backend.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Open storage rooted at `root`, creating the data directories.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("tickets")).await?;
        fs::create_dir_all(root.join("changes")).await?;
        Ok(Self { root })
    }

    fn ticket_path(&self, id: &TicketId) -> Result<PathBuf> {
        Ok(self.root.join("tickets").join(format!("{}.json", file_stem(id)?)))
    }

    fn changes_path(&self, id: &TicketId) -> Result<PathBuf> {
        Ok(self.root.join("changes").join(format!("{}.json", file_stem(id)?)))
    }

    /// Save a ticket (create or update).
    pub async fn save_ticket(&self, ticket: &Ticket) -> Result<()> {
        let json = serde_json::to_string_pretty(ticket)?;
        fs::write(self.ticket_path(&ticket.id)?, json.as_bytes()).await?;
        Ok(())
    }

    /// Load a ticket by id.
    pub async fn load_ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        read_json(&self.ticket_path(id)?).await
    }

    /// Append a change to a ticket's log.
    pub async fn record_change(&self, id: &TicketId, change: ChangeEvent) -> Result<()> {
        let path = self.changes_path(id)?;
        let mut changes: Vec<ChangeEvent> = read_json(&path).await?.unwrap_or_default();
        changes.push(change);
        let json = serde_json::to_string_pretty(&changes)?;
        fs::write(&path, json.as_bytes()).await?;
        Ok(())
    }

    async fn load_changes(&self, id: &TicketId) -> Result<Vec<ChangeEvent>> {
        Ok(read_json(&self.changes_path(id)?).await?.unwrap_or_default())
    }
}

#[async_trait]
impl ChangeLogProvider for JsonStorage {
    async fn changes(&self, ticket: &TicketId, fields: &FieldSet) -> Result<Vec<ChangeEvent>> {
        let mut changes: Vec<ChangeEvent> = self
            .load_changes(ticket)
            .await?
            .into_iter()
            .filter(|c| fields.contains(&c.field))
            .collect();
        changes.sort_by_key(|c| c.time);
        Ok(changes)
    }
}

#[async_trait]
impl TicketSource for JsonStorage {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let all: Vec<Ticket> = list_dir(&self.root.join("tickets")).await?;
        let mut tickets = Vec::with_capacity(all.len());
        for ticket in all {
            let changes = if query.milestone.is_some() {
                self.load_changes(&ticket.id).await?
            } else {
                Vec::new()
            };
            if query.matches(&ticket, &changes) {
                tickets.push(ticket);
            }
        }
        sort_tickets(&mut tickets);
        debug!(count = tickets.len(), root = %self.root.display(), "Loaded tickets");
        Ok(tickets)
    }
}

fn file_stem(id: &TicketId) -> Result<&str> {
    let stem = id.as_str();
    if stem.is_empty() || !stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(StorageError::NotFound(format!("ticket {:?}", stem)));
    }
    Ok(stem)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable ticket file"),
        }
    }
    Ok(items)
}
