//! Task board.

use tickethistory_core::{TicketInfo, TimetableConfig};

/// Statuses collected by a board column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnStates {
    /// Exactly these statuses
    Listed(Vec<String>),
    /// Statuses no column lists
    Rest,
}

/// A board column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column title
    pub title: String,
    /// Statuses in the column
    pub states: ColumnStates,
}

impl ColumnInfo {
    /// Create a column.
    pub fn new(title: impl Into<String>, states: ColumnStates) -> Self {
        Self {
            title: title.into(),
            states,
        }
    }

    /// `New`, `In progress` and `Done`, using the configured status lists.
    pub fn defaults(config: &TimetableConfig) -> Vec<Self> {
        vec![
            Self::new("New", ColumnStates::Listed(config.new_states.clone())),
            Self::new("In progress", ColumnStates::Rest),
            Self::new("Done", ColumnStates::Listed(config.closed_states.clone())),
        ]
    }

    fn lists(&self, status: Option<&str>) -> bool {
        match (&self.states, status) {
            (ColumnStates::Listed(states), Some(s)) => states.iter().any(|st| st == s),
            _ => false,
        }
    }
}

/// Tickets of one column.
#[derive(Debug, Clone)]
pub struct BoardColumn {
    /// Column title
    pub title: String,
    /// Tickets ordered by id
    pub tickets: Vec<TicketInfo>,
}

/// Tickets of a timetable entry split into columns.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    /// Columns in definition order
    pub columns: Vec<BoardColumn>,
}

impl TaskBoard {
    /// Split `tickets` into `columns` by status.
    ///
    /// A ticket goes to every column listing its status. A ticket no column
    /// lists goes to the first [`ColumnStates::Rest`] column, or nowhere if
    /// there is none.
    pub fn split(tickets: &[TicketInfo], columns: &[ColumnInfo]) -> Self {
        let rest = columns.iter().position(|c| c.states == ColumnStates::Rest);
        let mut out: Vec<BoardColumn> = columns
            .iter()
            .map(|c| BoardColumn {
                title: c.title.clone(),
                tickets: Vec::new(),
            })
            .collect();

        let mut sorted: Vec<&TicketInfo> = tickets.iter().collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));

        for info in sorted {
            let status = info.status.as_deref();
            let mut placed = false;
            for (column, def) in out.iter_mut().zip(columns) {
                if def.lists(status) {
                    column.tickets.push(info.clone());
                    placed = true;
                }
            }
            if !placed {
                match rest {
                    Some(i) => out[i].tickets.push(info.clone()),
                    None => tracing::trace!(ticket = %info.id(), ?status, "Ticket has no board column"),
                }
            }
        }

        Self { columns: out }
    }
}
