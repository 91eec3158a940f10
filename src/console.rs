use crate::api::{CommandSink, LogSource};
use crate::config::Config;
use crate::dispatcher::{self, canned, parse_freeform, CannedCommand, CommandDispatcher, DispatchState};
use crate::error::DashboardError;
use crate::interpolator::{JointInterpolator, TwinRig};
use crate::log_fetcher::{self, FetchOutcome, LogView};
use crate::render;
use crate::scheduler::RefreshScheduler;
use crate::types::Command;
use anyhow::Result;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Operator input, one per line.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Refresh,
    Date(NaiveDate),
    Auto(bool),
    Canned(&'static CannedCommand),
    Send(&'a str),
    Logs,
    Pose,
    Status,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<Option<Input<'_>>, DashboardError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match (word, rest) {
        ("refresh", "") => Input::Refresh,
        ("date", date) => Input::Date(
            date.parse()
                .map_err(|_| DashboardError::InvalidDate(date.to_string()))?,
        ),
        ("auto", "on") => Input::Auto(true),
        ("auto", "off") => Input::Auto(false),
        ("send", json) => Input::Send(json),
        ("logs", "") => Input::Logs,
        ("pose", "") => Input::Pose,
        ("status", "") => Input::Status,
        ("help", "") => Input::Help,
        ("quit", "") | ("exit", "") => Input::Quit,
        (name, "") => match canned(name) {
            Some(cmd) => Input::Canned(cmd),
            None => return Err(DashboardError::UnknownInput(line.to_string())),
        },
        _ => return Err(DashboardError::UnknownInput(line.to_string())),
    };
    Ok(Some(input))
}

#[derive(Debug)]
pub enum Event {
    Fetched(FetchOutcome),
    CommandSent(Result<Option<String>, DashboardError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Owns every piece of dashboard state. Network work runs on spawned tasks
/// that report back through `events`.
pub struct Console {
    config: Config,
    source: Arc<dyn LogSource>,
    sink: Arc<dyn CommandSink>,
    view: LogView,
    scheduler: RefreshScheduler,
    dispatcher: CommandDispatcher,
    twin: JointInterpolator,
    live_joints: Option<watch::Receiver<Option<Vec<f64>>>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    tasks: Vec<JoinHandle<()>>,
}

impl Console {
    pub fn new(
        config: &Config,
        date: NaiveDate,
        source: Arc<dyn LogSource>,
        sink: Arc<dyn CommandSink>,
        live_joints: Option<watch::Receiver<Option<Vec<f64>>>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            view: LogView::new(config.order),
            scheduler: RefreshScheduler::new(date, config.refresh_interval(), config.auto_refresh),
            dispatcher: CommandDispatcher::new(),
            twin: JointInterpolator::new(TwinRig::from_attachments(&config.twin_attachments)),
            config: config.clone(),
            source,
            sink,
            live_joints,
            events_tx,
            events_rx,
            tasks: Vec::new(),
        }
    }

    /// Reads operator lines from `input` until EOF or `quit`.
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, input: R) -> Result<()> {
        let mut lines = input.lines();
        let mut frame = interval(self.config.frame_period());
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

        println!("{}", render::help());
        self.refresh();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if self.handle_line(&line) == Flow::Quit {
                                break;
                            }
                        }
                        None => {
                            info!("Input closed");
                            break;
                        }
                    }
                }
                date = self.scheduler.tick() => {
                    self.start_fetch(date);
                }
                Some(event) = self.events_rx.recv() => {
                    self.apply(event);
                }
                _ = frame.tick() => {
                    self.frame(Instant::now());
                }
            }
        }

        info!("Shutting down");
        Ok(())
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        let input = match parse_input(line) {
            Ok(Some(input)) => input,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                println!("{}", e);
                return Flow::Continue;
            }
        };

        match input {
            Input::Refresh => self.refresh(),
            Input::Date(date) => {
                if self.scheduler.set_date(date) {
                    self.start_fetch(date);
                }
            }
            Input::Auto(enabled) => self.scheduler.set_enabled(enabled),
            Input::Canned(cmd) => {
                info!("Canned command: {}", cmd.label);
                self.submit(cmd.command());
            }
            Input::Send(text) => self.submit_freeform(text),
            Input::Logs => print!("{}", render::render_logs(self.view.logs())),
            Input::Pose => println!("{}", render::render_pose(self.twin.pose())),
            Input::Status => self.print_status(),
            Input::Help => print!("{}", render::help()),
            Input::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Manual refresh; ignored while a fetch is outstanding.
    pub fn refresh(&mut self) {
        if self.view.loading() {
            println!("Refresh already in progress");
            return;
        }
        self.start_fetch(self.scheduler.date());
    }

    fn start_fetch(&mut self, date: NaiveDate) {
        if let Err(e) = self.config.log_endpoint() {
            self.view.fail_locally(e);
            self.print_log_error();
            return;
        }
        let ticket = self.view.begin(date);
        let limit = self.config.request_timeout();
        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        self.spawn(async move {
            let outcome = log_fetcher::fetch(source, ticket, limit).await;
            let _ = events.send(Event::Fetched(outcome));
        });
    }

    pub fn submit_freeform(&mut self, text: &str) {
        if self.dispatcher.state() == DispatchState::Sending {
            warn!("Freeform command ignored: previous command still in flight");
            println!("{}", DashboardError::Busy);
            return;
        }
        match parse_freeform(text) {
            Ok(Some(command)) => self.submit(command),
            Ok(None) => {}
            Err(e) => {
                self.dispatcher.fail(e);
                self.print_command_status();
            }
        }
    }

    /// Sends `command` unless one is already in flight.
    pub fn submit(&mut self, command: Command) {
        if let Err(e) = self.dispatcher.begin() {
            println!("{}", e);
            return;
        }
        if let Err(e) = self.config.command_endpoint() {
            self.dispatcher.complete(Err(e));
            self.print_command_status();
            return;
        }
        info!("Submitting command {}", command.action().unwrap_or("<freeform>"));
        println!("Sending...");
        let limit = self.config.request_timeout();
        let sink = Arc::clone(&self.sink);
        let events = self.events_tx.clone();
        self.spawn(async move {
            let result = dispatcher::send(sink, command, limit).await;
            let _ = events.send(Event::CommandSent(result));
        });
    }

    fn apply(&mut self, event: Event) {
        match event {
            Event::Fetched(outcome) => {
                if self.view.complete(outcome, self.scheduler.date()) {
                    match self.view.error() {
                        Some(_) => self.print_log_error(),
                        None => println!(
                            "[{}] {} for {}",
                            self.view.last_update().unwrap_or("-"),
                            render::log_count(self.view.logs().len()),
                            self.scheduler.date()
                        ),
                    }
                }
            }
            Event::CommandSent(result) => {
                self.dispatcher.complete(result);
                self.print_command_status();
            }
        }
    }

    /// Joint target for this frame: the live feed if it has delivered
    /// anything, the newest log entry otherwise.
    fn joint_target(&self) -> Option<Vec<f64>> {
        if let Some(ref live) = self.live_joints {
            if let Some(joints) = live.borrow().clone() {
                return Some(joints);
            }
        }
        self.view.latest().and_then(|entry| entry.data.joints())
    }

    /// One rendered frame: advance the twin and expire banners.
    pub fn frame(&mut self, now: Instant) {
        if let Some(target) = self.joint_target() {
            self.twin.step(&target);
        }
        if self.dispatcher.expire(now) {
            debug!("Command banner cleared");
        }
        self.tasks.retain(|task| !task.is_finished());
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    fn print_log_error(&self) {
        if let Some(error) = self.view.error() {
            println!("Error loading logs: {}", error);
        }
    }

    fn print_command_status(&self) {
        if let Some(status) = self.dispatcher.status() {
            println!("{}", render::render_command_status(status));
        }
    }

    fn print_status(&self) {
        println!(
            "Date: {}  Auto-refresh: {}  {}  Last update: {}{}",
            self.scheduler.date(),
            if self.scheduler.enabled() { "on" } else { "off" },
            render::log_count(self.view.logs().len()),
            self.view.last_update().unwrap_or("never"),
            if self.view.loading() { "  (loading)" } else { "" }
        );
        self.print_log_error();
        self.print_command_status();
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
