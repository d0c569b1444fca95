//! TicketHistory CLI - burndown and task board reports from ticket change logs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tickethistory_core::iteration::{extract_iterations, iterations_by_date};
use tickethistory_core::{Ticket, Timetable, TimetableConfig};
use tickethistory_history::{in_milestone, TimetableBuilder};
use tickethistory_progress::{BurndownOptions, BurndownRow, BurndownTable, ColumnInfo, TaskBoard};
use tickethistory_storage::{JsonStorage, TicketQuery, TicketSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tickethistory")]
#[command(about = "Burndown and task board reports from ticket change logs", long_about = None)]
struct Cli {
    /// Data directory with tickets/ and changes/
    #[arg(long, default_value = ".tickethistory")]
    data: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tickets whose history is fetched concurrently (overrides the config)
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a burndown table, one row per day
    Burndown {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Day to highlight, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Only tickets in this milestone
        #[arg(long)]
        milestone: Option<String>,
    },
    /// Print the task board at the end of a day
    Board {
        /// Day of the board, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only tickets in this milestone
        #[arg(long)]
        milestone: Option<String>,
    },
    /// List the iterations defined on a wiki page
    Iterations {
        /// Wiki page text file
        page: PathBuf,
        /// Only iterations containing this day
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TimetableConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => TimetableConfig::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config.history_concurrency = concurrency;
    }
    let current_date = Utc::now().date_naive();

    match cli.command {
        Commands::Burndown {
            start,
            end,
            today,
            milestone,
        } => {
            let range = BurndownOptions { start, end, today }.resolve(current_date)?;
            let storage = Arc::new(JsonStorage::new(&cli.data).await?);
            let tickets = load_tickets(storage.as_ref(), milestone.as_deref()).await?;

            let mut timetable = range.timetable();
            fill(storage, &config, milestone, &tickets, &mut timetable).await?;

            let table = BurndownTable::build(&timetable, &config, range.start_time(), range.today);
            println!(
                "{:<12}{:>8}{:>8}{:>8}{:>8}{:>8}  {:<12}{:<12}",
                "Date", "Total", "Remain", "New", "WiP", "Done", "End", "End*"
            );
            for row in &table.rows {
                println!("{}", format_row(row));
            }
        }
        Commands::Board { date, milestone } => {
            let day = date.unwrap_or(current_date);
            let storage = Arc::new(JsonStorage::new(&cli.data).await?);
            let tickets = load_tickets(storage.as_ref(), milestone.as_deref()).await?;

            let end_of_day = day.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::microseconds(1);
            let mut timetable = Timetable::at(end_of_day);
            fill(storage, &config, milestone, &tickets, &mut timetable).await?;

            let snapshots = timetable.entries().first().map(|e| e.tickets.as_slice()).unwrap_or_default();
            let board = TaskBoard::split(snapshots, &ColumnInfo::defaults(&config));
            for column in &board.columns {
                println!("{} ({})", column.title, column.tickets.len());
                for t in &column.tickets {
                    let estimate = t
                        .value(&config.estimation_field)
                        .map(|v| format!(" ({})", v))
                        .unwrap_or_default();
                    let summary = t.value("summary").map(|v| v.to_string()).unwrap_or_default();
                    println!("  #{}{} {}", t.id(), estimate, summary);
                }
            }
        }
        Commands::Iterations { page, date } => {
            let text = tokio::fs::read_to_string(&page)
                .await
                .with_context(|| format!("reading {}", page.display()))?;
            let iterations = extract_iterations(&text);
            let shown = match date {
                Some(d) => iterations_by_date(&iterations, d),
                None => iterations.iter().collect(),
            };
            for it in shown {
                println!("{:<20} {} .. {}", it.name, it.start_date, it.end_date);
            }
        }
    }

    Ok(())
}

async fn load_tickets(storage: &JsonStorage, milestone: Option<&str>) -> Result<Vec<Ticket>> {
    let query = match milestone {
        Some(name) => TicketQuery::milestone(name),
        None => TicketQuery::default(),
    };
    let tickets = storage.list_tickets(&query).await?;
    info!("Loaded {} tickets", tickets.len());
    Ok(tickets)
}

async fn fill(
    storage: Arc<JsonStorage>,
    config: &TimetableConfig,
    milestone: Option<String>,
    tickets: &[Ticket],
    timetable: &mut Timetable,
) -> Result<()> {
    let mut builder = TimetableBuilder::from_config(storage, config);
    if let Some(name) = milestone {
        builder = builder.with_filter(in_milestone(name));
    }
    builder
        .fill_ticket_timetable(tickets, timetable, config.tracked_fields().as_slice())
        .await?;
    Ok(())
}

fn format_row(row: &BurndownRow) -> String {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    let marker = if row.today {
        " <- today"
    } else if row.weekend {
        " (weekend)"
    } else {
        ""
    };
    let delta = match row.delta_days {
        Some(d) if d > 0 => format!("+{}", d),
        Some(d) => d.to_string(),
        None => String::new(),
    };
    format!(
        "{:<12}{:>8.1}{:>8.1}{:>8.1}{:>8.1}{:>8.1}  {:<12}{:<12}{:>4}{}",
        row.date.to_string(),
        row.total,
        row.remaining,
        row.new,
        row.in_progress,
        row.done,
        date(row.end),
        date(row.workday_end),
        delta,
        marker
    )
}
