//! Session Transport
//!
//! The seam to whatever actually owns the playback sessions. Commands are
//! dispatched on their own tasks; the caller never waits for a client to
//! answer.

mod client;
mod types;

pub use client::{MediaServerClient, DEFAULT_SERVER_URL};
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::sync::{LiveSession, PlaystateCommand, SessionCommand};

/// Delivers playstate commands and lists live sessions
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Send a command to one session
    async fn send_command(&self, session_id: &str, command: PlaystateCommand) -> Result<(), TransportError>;

    /// Every session currently known to the server
    async fn live_sessions(&self) -> Result<Vec<LiveSession>, TransportError>;
}

/// Result of one dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub command: SessionCommand,
    /// Error message if the command failed
    pub result: Result<(), String>,
}

impl CommandReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fires commands without waiting for them
#[derive(Clone)]
pub struct CommandDispatcher {
    transport: Arc<dyn SessionTransport>,
    reports: Option<mpsc::UnboundedSender<CommandReport>>,
}

impl CommandDispatcher {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            reports: None,
        }
    }

    /// Also publish every command result on a channel
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<CommandReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// The transport commands go through
    pub fn transport(&self) -> &Arc<dyn SessionTransport> {
        &self.transport
    }

    /// Spawn one task per command
    pub fn dispatch(&self, commands: Vec<SessionCommand>) {
        for command in commands {
            let transport = self.transport.clone();
            let reports = self.reports.clone();

            tokio::spawn(async move {
                let result = transport
                    .send_command(&command.session_id, command.command)
                    .await;

                match &result {
                    Ok(()) => debug!(
                        "[Party {}] {:?} sent to session {}",
                        command.party_id, command.command, command.session_id
                    ),
                    Err(e) => warn!(
                        "[Party {}] {:?} to session {} failed: {}",
                        command.party_id, command.command, command.session_id, e
                    ),
                }

                if let Some(tx) = reports {
                    let _ = tx.send(CommandReport {
                        command,
                        result: result.map_err(|e| e.to_string()),
                    });
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Transport that fails for one session and hangs for another
    struct FlakyTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionTransport for FlakyTransport {
        async fn send_command(&self, session_id: &str, _command: PlaystateCommand) -> Result<(), TransportError> {
            match session_id {
                "gone" => Err(TransportError::SessionNotFound(session_id.to_string())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => {
                    self.sent.lock().push(session_id.to_string());
                    Ok(())
                }
            }
        }

        async fn live_sessions(&self) -> Result<Vec<LiveSession>, TransportError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_failures_and_slow_sessions_do_not_block_others() {
        let transport = Arc::new(FlakyTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = CommandDispatcher::new(transport.clone()).with_reports(tx);

        dispatcher.dispatch(vec![
            SessionCommand::new("p1", "slow", PlaystateCommand::Pause),
            SessionCommand::new("p1", "gone", PlaystateCommand::Pause),
            SessionCommand::new("p1", "ok", PlaystateCommand::SeekTo(1000)),
        ]);

        let mut reports = Vec::new();
        for _ in 0..2 {
            let report = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            reports.push(report);
        }
        reports.sort_by(|a, b| a.command.session_id.cmp(&b.command.session_id));

        assert_eq!(reports[0].command.session_id, "gone");
        assert!(!reports[0].is_ok());
        assert_eq!(reports[1].command.session_id, "ok");
        assert!(reports[1].is_ok());
        assert_eq!(*transport.sent.lock(), vec!["ok".to_string()]);
    }
}
