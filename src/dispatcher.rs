use crate::api::CommandSink;
use crate::error::DashboardError;
use crate::types::Command;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::time::{timeout, Duration, Instant};

/// How long a success banner stays up.
pub const SUCCESS_BANNER_TTL: Duration = Duration::from_secs(5);

/// A canned command offered as a one-word shortcut.
#[derive(Debug)]
pub struct CannedCommand {
    pub name: &'static str,
    pub label: &'static str,
    build: fn() -> Command,
}

impl CannedCommand {
    pub fn command(&self) -> Command {
        (self.build)()
    }
}

fn home() -> Command {
    Command::new("home")
}

fn stop() -> Command {
    Command::new("stop")
}

fn move_up() -> Command {
    Command::new("move").with("axis", "z").with("value", 10)
}

fn move_down() -> Command {
    Command::new("move").with("axis", "z").with("value", -10)
}

pub static CANNED_COMMANDS: [CannedCommand; 4] = [
    CannedCommand {
        name: "home",
        label: "Home",
        build: home,
    },
    CannedCommand {
        name: "stop",
        label: "Stop",
        build: stop,
    },
    CannedCommand {
        name: "up",
        label: "Move Up",
        build: move_up,
    },
    CannedCommand {
        name: "down",
        label: "Move Down",
        build: move_down,
    },
];

pub fn canned(name: &str) -> Option<&'static CannedCommand> {
    CANNED_COMMANDS.iter().find(|c| c.name == name)
}

/// Parses operator text into a command. Blank input yields `None`.
pub fn parse_freeform(text: &str) -> Result<Option<Command>, DashboardError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|_| DashboardError::InvalidJson)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandStatus {
    Success {
        message_id: Option<String>,
        expires_at: Instant,
    },
    Error(String),
}

/// Single-flight command submission plus the banner it leaves behind.
#[derive(Debug)]
pub struct CommandDispatcher {
    state: DispatchState,
    status: Option<CommandStatus>,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            status: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn status(&self) -> Option<&CommandStatus> {
        self.status.as_ref()
    }

    /// Moves to `Sending`. Fails without side effects if a command is
    /// already outstanding.
    pub fn begin(&mut self) -> Result<(), DashboardError> {
        if self.state == DispatchState::Sending {
            warn!("Command rejected: previous command still in flight");
            return Err(DashboardError::Busy);
        }
        self.state = DispatchState::Sending;
        self.status = None;
        Ok(())
    }

    /// Back to `Idle` with the banner for `result`.
    pub fn complete(&mut self, result: Result<Option<String>, DashboardError>) {
        self.state = DispatchState::Idle;
        match result {
            Ok(message_id) => {
                info!("Command sent successfully, message id {:?}", message_id);
                self.status = Some(CommandStatus::Success {
                    message_id,
                    expires_at: Instant::now() + SUCCESS_BANNER_TTL,
                });
            }
            Err(e) => self.fail(e),
        }
    }

    /// Shows an error that happened before anything was sent. Does not touch
    /// the dispatch state.
    pub fn fail(&mut self, err: DashboardError) {
        if err.is_config() {
            error!("Configuration error: {}", err);
        } else {
            error!("Command failed: {}", err);
        }
        self.status = Some(CommandStatus::Error(err.to_string()));
    }

    /// Clears an expired success banner. Returns true if one was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        if let Some(CommandStatus::Success { expires_at, .. }) = self.status {
            if now >= expires_at {
                self.status = None;
                return true;
            }
        }
        false
    }
}

/// Posts one command, bounded by `limit`, and returns its outcome.
pub async fn send(
    sink: Arc<dyn CommandSink>,
    command: Command,
    limit: Duration,
) -> Result<Option<String>, DashboardError> {
    match timeout(limit, sink.send_command(&command)).await {
        Ok(result) => result,
        Err(_) => Err(DashboardError::Timeout(limit.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canned_payloads() {
        assert_eq!(canned("home").unwrap().command().0, json!({"action": "home"}));
        assert_eq!(canned("stop").unwrap().label, "Stop");
        assert_eq!(
            canned("down").unwrap().command().0,
            json!({"action": "move", "axis": "z", "value": -10})
        );
        assert!(canned("dance").is_none());
    }

    #[test]
    fn freeform_home_equals_canned_home() {
        let parsed = parse_freeform(r#"{"action":"home"}"#).unwrap().unwrap();
        assert_eq!(parsed, canned("home").unwrap().command());
    }

    #[test]
    fn freeform_rejects_non_json() {
        let err = parse_freeform("not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON format");
        assert!(parse_freeform("   ").unwrap().is_none());
    }

    #[test]
    fn second_begin_is_rejected_while_sending() {
        let mut d = CommandDispatcher::new();
        d.begin().unwrap();
        assert!(matches!(d.begin(), Err(DashboardError::Busy)));
        assert_eq!(d.state(), DispatchState::Sending);

        d.complete(Ok(Some("m".into())));
        assert_eq!(d.state(), DispatchState::Idle);
        assert!(d.begin().is_ok());
    }

    #[test]
    fn new_attempt_clears_old_banner() {
        let mut d = CommandDispatcher::new();
        d.fail(DashboardError::InvalidJson);
        assert!(matches!(d.status(), Some(CommandStatus::Error(_))));
        d.begin().unwrap();
        assert!(d.status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn success_banner_expires_error_does_not() {
        let mut d = CommandDispatcher::new();
        d.begin().unwrap();
        d.complete(Ok(Some("abc".into())));

        assert!(!d.expire(Instant::now()));
        tokio::time::advance(SUCCESS_BANNER_TTL).await;
        assert!(d.expire(Instant::now()));
        assert!(d.status().is_none());

        d.begin().unwrap();
        d.complete(Err(DashboardError::ApiError("nope".into())));
        tokio::time::advance(SUCCESS_BANNER_TTL * 10).await;
        assert!(!d.expire(Instant::now()));
        assert_eq!(d.status(), Some(&CommandStatus::Error("nope".into())));
    }
}
