//! In-memory ticket store.

use std::collections::HashMap;

use async_trait::async_trait;
use tickethistory_core::{ChangeEvent, Ticket, TicketId};

use super::trait_::{sort_tickets, ChangeLogProvider, FieldSet, Result, TicketQuery, TicketSource};

/// Tickets and their change log held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tickets: Vec<Ticket>,
    changes: HashMap<TicketId, Vec<ChangeEvent>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a ticket.
    pub fn insert_ticket(&mut self, ticket: Ticket) {
        self.tickets.retain(|t| t.id != ticket.id);
        self.tickets.push(ticket);
    }

    /// Record a change of a ticket field.
    pub fn record_change(&mut self, ticket: impl Into<TicketId>, change: ChangeEvent) {
        self.changes.entry(ticket.into()).or_default().push(change);
    }

    /// Builder-style [`MemoryStorage::insert_ticket`].
    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        self.insert_ticket(ticket);
        self
    }

    /// Builder-style [`MemoryStorage::record_change`].
    pub fn with_change(mut self, ticket: impl Into<TicketId>, change: ChangeEvent) -> Self {
        self.record_change(ticket, change);
        self
    }

    /// All recorded changes of a ticket, in insertion order.
    pub fn recorded_changes(&self, ticket: &TicketId) -> &[ChangeEvent] {
        self.changes.get(ticket).map(Vec::as_slice).unwrap_or_default()
    }
}

#[async_trait]
impl ChangeLogProvider for MemoryStorage {
    async fn changes(&self, ticket: &TicketId, fields: &FieldSet) -> Result<Vec<ChangeEvent>> {
        let mut changes: Vec<ChangeEvent> = self
            .recorded_changes(ticket)
            .iter()
            .filter(|c| fields.contains(&c.field))
            .cloned()
            .collect();
        changes.sort_by_key(|c| c.time);
        Ok(changes)
    }
}

#[async_trait]
impl TicketSource for MemoryStorage {
    async fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| query.matches(t, self.recorded_changes(&t.id)))
            .cloned()
            .collect();
        sort_tickets(&mut tickets);
        Ok(tickets)
    }
}
