use std::collections::VecDeque;
use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::{DEFAULT_WIDTH, ElementError, Render, add_border, arg};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMonitorConfig {
    pub max_logs: usize,
    /// Prefix each entry with the local time.
    pub timestamp: bool,
    /// `chrono` format string for the prefix.
    pub timestamp_format: String,
    /// Characters cut from the end of the formatted stamp.
    pub timestamp_trim: usize,
    pub border: bool,
    pub width: usize,
}

impl Default for LogMonitorConfig {
    fn default() -> Self {
        Self {
            max_logs: 10,
            timestamp: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.6f".into(),
            timestamp_trim: 7,
            border: false,
            width: DEFAULT_WIDTH,
        }
    }
}

/// Rolling window of the last `max_logs` lines, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMonitor {
    config: LogMonitorConfig,
    logs: VecDeque<String>,
}

impl LogMonitor {
    pub fn new(config: LogMonitorConfig) -> Self {
        Self {
            logs: VecDeque::with_capacity(config.max_logs),
            config,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.logs.iter().map(String::as_str)
    }

    /// Append `text` as if it arrived at `at`.
    pub fn push_at<Tz>(&mut self, text: &str, at: &DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let line = if self.config.timestamp {
            let stamp = at.format(&self.config.timestamp_format).to_string();
            let keep = stamp.chars().count().saturating_sub(self.config.timestamp_trim);
            let stamp: String = stamp.chars().take(keep).collect();
            format!("{stamp} {text}")
        } else {
            text.to_owned()
        };

        self.logs.push_back(line);
        while self.logs.len() > self.config.max_logs {
            self.logs.pop_front();
        }
    }
}

impl Render for LogMonitor {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        arg(args, 0)?;
        let text = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.push_at(&text, &Local::now());
        Ok(())
    }

    fn display(&self) -> String {
        let inner = self.config.width.saturating_sub(4);
        let mut lines: Vec<String> = self.logs.iter().map(|log| format!("{log:<inner$}")).collect();
        while lines.len() < self.config.max_logs {
            lines.push(" ".repeat(inner));
        }
        let content = lines.join("\n");
        if self.config.border {
            add_border(&content, self.config.width)
        } else {
            content
        }
    }

    fn height(&self) -> usize {
        let rows = self.logs.len().max(self.config.max_logs);
        if self.config.border { rows + 2 } else { rows }
    }
}
