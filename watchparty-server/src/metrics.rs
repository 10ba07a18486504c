//! Metrics tracking for the sync daemon

use chrono::{DateTime, Local};
use std::collections::VecDeque;

use watchparty_core::{CommandReport, TickSummary};

/// Maximum number of log entries to keep
const MAX_LOG_ENTRIES: usize = 100;

/// A notable event, kept for the status report
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LogLevel {
    Info,
    Warning,
    Sync,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Sync => "SYNC",
        }
    }
}

/// Daemon metrics
pub struct Metrics {
    /// Daemon start time
    pub start_time: DateTime<Local>,

    /// Sessions seen in the last poll
    pub live_sessions: usize,

    /// Playback events fed to the coordinator
    pub starts: u64,
    pub progress_reports: u64,
    pub stops: u64,

    /// Reconciliation ticks that ran
    pub ticks_run: u64,

    /// Ticks skipped because the previous one was still running
    pub ticks_skipped: u64,

    /// Correction seeks issued by ticks
    pub corrections: u64,

    /// Participants evicted for inactivity
    pub evictions: u64,

    /// Commands that reached their session
    pub commands_sent: u64,

    /// Commands that failed
    pub command_failures: u64,

    /// Recent notable events
    pub logs: VecDeque<LogEntry>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Local::now(),
            live_sessions: 0,
            starts: 0,
            progress_reports: 0,
            stops: 0,
            ticks_run: 0,
            ticks_skipped: 0,
            corrections: 0,
            evictions: 0,
            commands_sent: 0,
            command_failures: 0,
            logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
        }
    }

    /// Add a log entry
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.logs.len() >= MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        });
    }

    /// Record the outcome of one tick (None = skipped)
    pub fn tick_finished(&mut self, summary: Option<TickSummary>) {
        let Some(summary) = summary else {
            self.ticks_skipped += 1;
            return;
        };

        self.ticks_run += 1;
        self.corrections += summary.corrections as u64;
        self.evictions += summary.evicted as u64;

        if summary.corrections > 0 {
            self.log(
                LogLevel::Sync,
                format!("Tick corrected {} of {} sessions", summary.corrections, summary.sessions),
            );
        }
        for party_id in summary.pruned {
            self.log(LogLevel::Warning, format!("Party {} pruned (content gone)", party_id));
        }
    }

    /// Record a dispatched command's result
    pub fn command_finished(&mut self, report: &CommandReport) {
        match &report.result {
            Ok(()) => self.commands_sent += 1,
            Err(e) => {
                self.command_failures += 1;
                self.log(
                    LogLevel::Warning,
                    format!(
                        "{} to {} failed: {}",
                        report.command.command.as_str(),
                        report.command.session_id,
                        e
                    ),
                );
            }
        }
    }

    /// Get uptime as formatted string
    pub fn uptime(&self) -> String {
        let duration = Local::now().signed_duration_since(self.start_time);
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            let hours = secs / 3600;
            let mins = (secs % 3600) / 60;
            format!("{}h {}m", hours, mins)
        }
    }

    /// One-line status report
    pub fn summary(&self) -> String {
        format!(
            "up {} | sessions {} | events {}/{}/{} | ticks {} (skipped {}) | corrections {} | commands {} ok, {} failed",
            self.uptime(),
            self.live_sessions,
            self.starts,
            self.progress_reports,
            self.stops,
            self.ticks_run,
            self.ticks_skipped,
            self.corrections,
            self.commands_sent,
            self.command_failures
        )
    }
}
