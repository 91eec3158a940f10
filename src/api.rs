use crate::config::Config;
use crate::error::DashboardError;
use crate::types::{
    date_param, Command, CommandRequest, CommandResponse, LogEntry, LogsResponse,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};

/// Read side: logs stored for a date.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_logs(&self, date: NaiveDate) -> Result<Vec<LogEntry>, DashboardError>;
}

/// Write side: control commands. Returns the server-assigned message id.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_command(&self, command: &Command) -> Result<Option<String>, DashboardError>;
}

/// The two HTTP endpoints the dashboard talks to.
pub struct HttpApi {
    client: reqwest::Client,
    config: Config,
}

impl HttpApi {
    pub fn new(config: &Config) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn query(&self, date: NaiveDate) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("date", date_param(date)),
            ("limit", self.config.fetch_limit.to_string()),
        ];
        if let Some(order) = self.config.order {
            query.push(("order", order.as_str().to_string()));
        }
        query
    }
}

#[async_trait]
impl LogSource for HttpApi {
    async fn fetch_logs(&self, date: NaiveDate) -> Result<Vec<LogEntry>, DashboardError> {
        let url = self.config.log_endpoint()?;
        let query = self.query(date);
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(DashboardError::StatusError(response.status().as_u16()));
        }

        let body: LogsResponse = response.json().await?;
        if !body.success {
            return Err(DashboardError::ApiError(
                body.error.unwrap_or_else(|| "Failed to fetch logs".to_string()),
            ));
        }

        let logs = body.logs.unwrap_or_default();
        info!("Fetched {} log entries for {}", logs.len(), date);
        Ok(logs)
    }
}

#[async_trait]
impl CommandSink for HttpApi {
    async fn send_command(&self, command: &Command) -> Result<Option<String>, DashboardError> {
        let url = self.config.command_endpoint()?;
        info!("POST command {} to {}", command.0, url);

        let response = self
            .client
            .post(url)
            .json(&CommandRequest { command })
            .send()
            .await?;

        let status = response.status();
        let body = response.json::<CommandResponse>().await;

        match body {
            Ok(body) if body.success => Ok(body.message_id),
            Ok(body) => Err(DashboardError::ApiError(
                body.error.unwrap_or_else(|| "Failed to send command".to_string()),
            )),
            Err(_) if !status.is_success() => Err(DashboardError::StatusError(status.as_u16())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one HTTP request with the given status and JSON body and
    /// hands back the raw request text.
    async fn serve_once(status: u16, body: serde_json::Value) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let body = body.to_string();
            let reply = format!(
                "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn config(log_url: &str, command_url: &str) -> Config {
        toml::from_str(&format!(
            "log_api_url = \"{}\"\ncommand_api_url = \"{}\"\norder = \"asc\"\nfetch_limit = 25",
            log_url, command_url
        ))
        .unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
    }

    #[tokio::test]
    async fn fetch_sends_date_limit_and_order() {
        let (url, server) = serve_once(
            200,
            json!({"success": true, "logs": [{"key": "a", "timestamp": "t", "size": 1, "data": {}}]}),
        )
        .await;
        let api = HttpApi::new(&config(&url, "https://cmd.example.com")).unwrap();

        let logs = api.fetch_logs(date()).await.unwrap();
        assert_eq!(logs.len(), 1);

        let request = server.await.unwrap();
        let first_line = request.lines().next().unwrap();
        assert!(first_line.starts_with("GET /?date=2024%2F01%2F31&limit=25&order=asc "));
    }

    #[tokio::test]
    async fn fetch_surfaces_application_error() {
        let (url, _server) = serve_once(200, json!({"success": false, "error": "X"})).await;
        let api = HttpApi::new(&config(&url, "https://cmd.example.com")).unwrap();
        let err = api.fetch_logs(date()).await.unwrap_err();
        assert_eq!(err.to_string(), "X");
    }

    #[tokio::test]
    async fn fetch_surfaces_http_status() {
        let (url, _server) = serve_once(502, json!({})).await;
        let api = HttpApi::new(&config(&url, "https://cmd.example.com")).unwrap();
        let err = api.fetch_logs(date()).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error: status 502");
    }

    #[tokio::test]
    async fn missing_logs_field_is_empty_set() {
        let (url, _server) = serve_once(200, json!({"success": true})).await;
        let api = HttpApi::new(&config(&url, "https://cmd.example.com")).unwrap();
        assert!(api.fetch_logs(date()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn placeholder_endpoint_never_hits_network() {
        let api = HttpApi::new(&config(
            "https://your-api-id.execute-api.region.amazonaws.com/prod/logs",
            "https://cmd.example.com",
        ))
        .unwrap();
        assert!(api.fetch_logs(date()).await.unwrap_err().is_config());
    }

    #[tokio::test]
    async fn command_posts_wrapped_payload() {
        let (url, server) = serve_once(200, json!({"success": true, "messageId": "mid-7"})).await;
        let api = HttpApi::new(&config("https://logs.example.com", &url)).unwrap();

        let id = api.send_command(&Command::new("home")).await.unwrap();
        assert_eq!(id.as_deref(), Some("mid-7"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST / "));
        let body = request.split("\r\n\r\n").nth(1).unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, json!({"command": {"action": "home"}}));
    }

    #[tokio::test]
    async fn command_failure_uses_server_error() {
        let (url, _server) = serve_once(200, json!({"success": false})).await;
        let api = HttpApi::new(&config("https://logs.example.com", &url)).unwrap();
        let err = api.send_command(&Command::new("stop")).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to send command");
    }
}
