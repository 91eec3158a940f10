use crate::api::LogSource;
use crate::error::DashboardError;
use crate::types::{sort_ascending, LogEntry, SortOrder};
use chrono::{Local, NaiveDate};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// Identifies one issued fetch so that its result can be matched against
/// the state at the time it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub date: NaiveDate,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub ticket: FetchTicket,
    pub result: Result<Vec<LogEntry>, DashboardError>,
}

/// Displayed log set plus the flags around it.
#[derive(Debug)]
pub struct LogView {
    logs: Vec<LogEntry>,
    last_update: Option<String>,
    error: Option<String>,
    order: Option<SortOrder>,
    next_seq: u64,
    applied_seq: u64,
    /// Highest sequence that has come back, applied or not
    settled_seq: u64,
}

impl LogView {
    pub fn new(order: Option<SortOrder>) -> Self {
        Self {
            logs: Vec::new(),
            last_update: None,
            error: None,
            order,
            next_seq: 1,
            applied_seq: 0,
            settled_seq: 0,
        }
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while the most recently issued fetch has not come back. An
    /// older request that never returns does not keep this set once a newer
    /// one has settled.
    pub fn loading(&self) -> bool {
        self.settled_seq + 1 < self.next_seq
    }

    /// Most recent entry in display order.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.logs.last()
    }

    /// Registers a new request for `date` and clears the error banner.
    pub fn begin(&mut self, date: NaiveDate) -> FetchTicket {
        let ticket = FetchTicket {
            seq: self.next_seq,
            date,
        };
        self.next_seq += 1;
        self.error = None;
        debug!("Fetch #{} issued for {}", ticket.seq, date);
        ticket
    }

    /// Applies a finished fetch. Returns true if the displayed state changed.
    pub fn complete(&mut self, outcome: FetchOutcome, selected: NaiveDate) -> bool {
        let FetchOutcome { ticket, result } = outcome;
        self.settled_seq = self.settled_seq.max(ticket.seq);

        if ticket.seq <= self.applied_seq || ticket.date != selected {
            debug!(
                "Discarding stale fetch #{} for {} (applied #{}, selected {})",
                ticket.seq, ticket.date, self.applied_seq, selected
            );
            return false;
        }
        self.applied_seq = ticket.seq;

        match result {
            Ok(mut logs) => {
                if self.order == Some(SortOrder::Asc) {
                    sort_ascending(&mut logs);
                }
                info!("Showing {} log entries for {}", logs.len(), ticket.date);
                self.logs = logs;
                self.last_update = Some(Local::now().format("%H:%M:%S").to_string());
                self.error = None;
            }
            Err(e) => {
                error!("Error fetching logs: {}", e);
                self.error = Some(e.to_string());
            }
        }
        true
    }

    /// Records an error detected before any request was made.
    pub fn fail_locally(&mut self, err: DashboardError) {
        error!("Error fetching logs: {}", err);
        self.error = Some(err.to_string());
    }
}

/// Runs one fetch against `source`, bounded by `limit`, and tags the result
/// with its ticket.
pub async fn fetch(
    source: Arc<dyn LogSource>,
    ticket: FetchTicket,
    limit: Duration,
) -> FetchOutcome {
    let result = match timeout(limit, source.fetch_logs(ticket.date)).await {
        Ok(result) => result,
        Err(_) => Err(DashboardError::Timeout(limit.as_secs())),
    };
    FetchOutcome { ticket, result }
}
