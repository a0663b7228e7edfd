//! Per-procedure log: timestamped lines returned with the result, mirrored
//! to `tracing`.

use chrono::Local;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct MigrationLog {
    lines: Vec<String>,
}

impl MigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `[YYYY-MM-DD HH:MM:SS] message`.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "migration", "{}", message);
        self.lines.push(format!(
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        ));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
