use chrono::NaiveDate;
use log::{debug, info};
use std::future;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Drives periodic refreshes for the selected date.
///
/// Owns at most one timer. Every change of the toggle or the date drops the
/// current timer before a new one is armed, so a tick can never come from a
/// superseded configuration.
pub struct RefreshScheduler {
    enabled: bool,
    date: NaiveDate,
    period: Duration,
    timer: Option<Interval>,
}

impl RefreshScheduler {
    pub fn new(date: NaiveDate, period: Duration, enabled: bool) -> Self {
        let mut scheduler = Self {
            enabled,
            date,
            period,
            timer: None,
        };
        scheduler.rearm();
        scheduler
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Switches the selected date. Returns true if it changed, in which case
    /// the caller fetches immediately.
    pub fn set_date(&mut self, date: NaiveDate) -> bool {
        if date == self.date {
            return false;
        }
        info!("Selected date changed to {}", date);
        self.date = date;
        self.rearm();
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        info!("Auto-refresh {}", if enabled { "enabled" } else { "disabled" });
        self.enabled = enabled;
        self.rearm();
    }

    /// Resolves at the next scheduled refresh. Pending forever while
    /// auto-refresh is off.
    pub async fn tick(&mut self) -> NaiveDate {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
                debug!("Scheduled refresh for {}", self.date);
                self.date
            }
            None => future::pending().await,
        }
    }

    fn rearm(&mut self) {
        self.timer = None;
        if self.enabled {
            let mut timer = interval_at(Instant::now() + self.period, self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.timer = Some(timer);
        }
    }
}
