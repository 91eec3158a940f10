use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60000;

/// One line of the feed: either a bare array or an object carrying `joints`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedLine {
    Bare(Vec<f64>),
    Wrapped { joints: Vec<f64> },
}

pub fn parse_line(line: &str) -> Option<Vec<f64>> {
    match serde_json::from_str::<FeedLine>(line) {
        Ok(FeedLine::Bare(joints)) | Ok(FeedLine::Wrapped { joints }) => Some(joints),
        Err(e) => {
            warn!("Ignoring joint feed line {:?}: {}", line, e);
            None
        }
    }
}

/// Keeps a connection to the live joint feed and publishes the latest
/// vector. Reconnects with exponential backoff.
pub struct JointFeed {
    addr: String,
    latest_tx: watch::Sender<Option<Vec<f64>>>,
}

impl JointFeed {
    pub fn new(addr: String) -> (Self, watch::Receiver<Option<Vec<f64>>>) {
        let (latest_tx, latest_rx) = watch::channel(None);
        (Self { addr, latest_tx }, latest_rx)
    }

    pub async fn run(self) {
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.connect_and_read().await {
                Ok(_) => {
                    backoff_ms = INITIAL_BACKOFF_MS;
                    info!("Joint feed connection closed. Reconnecting in {}ms...", backoff_ms);
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    error!("Joint feed error: {:#}. Retrying in {}ms...", e, backoff_ms);
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                }
            }
            if self.latest_tx.is_closed() {
                debug!("Joint feed receiver dropped, stopping");
                return;
            }
        }
    }

    async fn connect_and_read(&self) -> Result<()> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to connect to {}", self.addr))?;
        info!("Connected to joint feed at {}", self.addr);

        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            trace!("Joint feed line: {}", line);
            if let Some(joints) = parse_line(line) {
                if self.latest_tx.send(Some(joints)).is_err() {
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn parses_both_shapes() {
        assert_eq!(parse_line("[1, 2, 3]"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(
            parse_line(r#"{"joints": [0.5, 0.25], "t": 3}"#),
            Some(vec![0.5, 0.25])
        );
        assert_eq!(parse_line("garbage"), None);
    }

    #[tokio::test]
    async fn publishes_latest_vector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"[0,0,0,0,0,0]\nnot json\n{\"joints\":[1,2,3,4,5,6]}\n")
                .await
                .unwrap();
            // keep the connection open so the feed does not start reconnecting
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (feed, mut rx) = JointFeed::new(addr);
        let handle = tokio::spawn(feed.run());

        loop {
            rx.changed().await.unwrap();
            let latest = rx.borrow().clone();
            if latest == Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]) {
                break;
            }
        }
        handle.abort();
    }

    #[tokio::test]
    async fn clean_close_waits_before_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let (feed, _rx) = JointFeed::new(addr);
        let handle = tokio::spawn(feed.run());
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.abort();

        let n = accepts.load(Ordering::SeqCst);
        assert!((1..=2).contains(&n), "reconnected {} times", n);
    }
}
