use std::collections::VecDeque;

use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::domain::{RunPhase, RunProgress, RunStats};

const STREAM_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub time: String,
    pub message: String,
    pub level: EventLevel,
}

/// Event sink shared by the engine and the control service.
pub struct EventLog {
    tz: Tz,
    capacity: usize,
    buffer: Mutex<VecDeque<LogEvent>>,
    stream: broadcast::Sender<LogEvent>,
    progress: watch::Sender<RunProgress>,
}

impl EventLog {
    pub fn new(tz: Tz, capacity: usize) -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        let (progress, _) = watch::channel(RunProgress::default());
        Self {
            tz,
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::new()),
            stream,
            progress,
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(EventLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.record(EventLevel::Success, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(EventLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(EventLevel::Error, message.into());
    }

    fn record(&self, level: EventLevel, message: String) {
        match level {
            EventLevel::Info | EventLevel::Success => {
                tracing::info!(target: "events", ?level, "{message}")
            }
            EventLevel::Warning => tracing::warn!(target: "events", "{message}"),
            EventLevel::Error => tracing::error!(target: "events", "{message}"),
        }

        let event = LogEvent {
            time: Utc::now()
                .with_timezone(&self.tz)
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            message,
            level,
        };
        {
            let mut buffer = self.buffer.lock();
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }
        // No live subscribers is the common case.
        let _ = self.stream.send(event);
    }

    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.buffer.lock().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.stream.subscribe()
    }

    pub fn publish_progress(&self, phase: RunPhase, status: impl Into<String>, stats: RunStats) {
        self.progress.send_replace(RunProgress {
            phase,
            status: status.into(),
            stats,
        });
    }

    pub fn publish_stats(&self, stats: RunStats) {
        self.progress.send_modify(|progress| progress.stats = stats);
    }

    pub fn progress(&self) -> RunProgress {
        self.progress.borrow().clone()
    }

    #[cfg(test)]
    pub fn watch_progress(&self) -> watch::Receiver<RunProgress> {
        self.progress.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_keeps_latest_events() {
        let log = EventLog::new(chrono_tz::UTC, 2);
        log.info("one");
        log.warning("two");
        log.error("three");
        let events = log.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "two");
        assert_eq!(events[1].level, EventLevel::Error);
    }

    #[test]
    fn event_wire_format_is_time_message_level() {
        let log = EventLog::new(chrono_tz::Asia::Seoul, 4);
        log.success("liked post");
        let value = serde_json::to_value(&log.snapshot()[0]).unwrap();
        assert_eq!(value["level"], "success");
        assert_eq!(value["message"], "liked post");
        assert!(value["time"].as_str().unwrap().ends_with("+09:00"));
    }

    #[tokio::test]
    async fn subscribers_receive_events_and_progress() {
        let log = EventLog::new(chrono_tz::UTC, 4);
        let mut events = log.subscribe();
        let progress = log.watch_progress();
        log.info("hello");
        assert_eq!(events.recv().await.unwrap().message, "hello");

        let stats = RunStats {
            liked: 3,
            ..RunStats::default()
        };
        log.publish_progress(RunPhase::Processing, "Processing", stats);
        assert_eq!(progress.borrow().stats.liked, 3);
        log.publish_stats(RunStats::default());
        assert_eq!(log.progress().phase, RunPhase::Processing);
        assert_eq!(log.progress().stats.liked, 0);
    }
}
