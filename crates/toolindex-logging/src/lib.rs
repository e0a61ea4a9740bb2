//! JSONL logging for calls made through a [`toolindex_core::Index`].
//!
//! One [`ToolCallRecord`] per call, appended to a daily-bucketed JSONL file
//! under file locking so concurrent callers never interleave partial lines.
//! Disable entirely via `TOOLINDEX_LOGGING_DISABLED=1`.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};

pub use chrono;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while writing a call log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("atomic write error: {0}")]
    AtomicWrite(String),
}

impl<E: std::fmt::Display> From<atomicwrites::Error<E>> for LogError {
    fn from(e: atomicwrites::Error<E>) -> Self {
        LogError::AtomicWrite(e.to_string())
    }
}

/// Errors longer than this are truncated before being written to the log,
/// so one misbehaving tool can't blow up the JSONL file with a giant traceback.
const MAX_ERROR_LEN: usize = 2000;

/// One record of a call made through an index, independent of which kind of
/// source served the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique identifier for this call.
    pub call_id: String,
    /// The tool's id as resolved by the index (see `ToolDescriptor::id`).
    pub tool_id: String,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// When the call completed.
    pub completed_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u128,
    /// The arguments the call was made with.
    pub request: serde_json::Value,
    /// Whether the call succeeded.
    pub success: bool,
    /// Error message if the call failed, truncated to [`MAX_ERROR_LEN`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallRecord {
    /// Truncate `message` to [`MAX_ERROR_LEN`] bytes (at a char boundary) before storing it.
    pub fn truncate_error(message: &str) -> String {
        if message.len() <= MAX_ERROR_LEN {
            return message.to_string();
        }
        let mut end = MAX_ERROR_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &message[..end])
    }
}

/// Check if logging is disabled via environment variable.
pub fn logging_disabled() -> bool {
    match std::env::var("TOOLINDEX_LOGGING_DISABLED") {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => false,
    }
}

/// Timer utility for measuring call duration and generating call IDs.
pub struct CallTimer {
    /// Unique call identifier.
    pub call_id: String,
    /// When the call started (UTC).
    pub started_at: DateTime<Utc>,
    start_instant: std::time::Instant,
}

impl CallTimer {
    /// Start a new timer with a fresh call ID.
    pub fn start() -> Self {
        Self {
            call_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            start_instant: std::time::Instant::now(),
        }
    }

    /// Finish the timer and return the completion time and duration.
    pub fn finish(&self) -> (DateTime<Utc>, u128) {
        let completed_at = Utc::now();
        let duration_ms = self.start_instant.elapsed().as_millis();
        (completed_at, duration_ms)
    }
}

/// Writer for daily-bucketed JSONL call logs.
pub struct LogWriter {
    base_logs_dir: PathBuf,
}

impl LogWriter {
    /// Create a new log writer rooted at `base_logs_dir`.
    pub fn new(base_logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_logs_dir: base_logs_dir.into(),
        }
    }

    fn day_bucket_name(date: DateTime<Utc>) -> String {
        date.format("tool_calls_%Y-%m-%d").to_string()
    }

    fn ensure_day_file(&self, day_bucket: &str) -> Result<PathBuf, LogError> {
        std::fs::create_dir_all(&self.base_logs_dir)?;
        Ok(self.base_logs_dir.join(format!("{day_bucket}.jsonl")))
    }

    /// Append a call record to the JSONL log file.
    ///
    /// Uses file locking to prevent concurrent write corruption. No-op if
    /// logging is disabled.
    pub fn append_jsonl(&self, record: &ToolCallRecord) -> Result<(), LogError> {
        if logging_disabled() {
            return Ok(());
        }
        let bucket = Self::day_bucket_name(record.completed_at);
        let jsonl_path = self.ensure_day_file(&bucket)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&jsonl_path)?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write()?;
        serde_json::to_writer(&mut *guard, record)?;
        guard.write_all(b"\n")?;
        Ok(())
    }
}

/// Write a markdown artifact alongside the JSONL logs, e.g. a large tool
/// result not worth inlining into the JSON record. Returns the filename
/// written, or an empty string if logging is disabled.
pub fn write_artifact(
    base_logs_dir: &std::path::Path,
    completed_at: DateTime<Utc>,
    call_id: &str,
    content: &str,
) -> Result<String, LogError> {
    if logging_disabled() {
        return Ok(String::new());
    }
    let bucket = LogWriter::day_bucket_name(completed_at);
    let dir = base_logs_dir.join(&bucket);
    std::fs::create_dir_all(&dir)?;
    let filename = format!("{call_id}.md");
    let target = dir.join(&filename);
    let af = AtomicFile::new(&target, OverwriteBehavior::AllowOverwrite);
    af.write(|f| f.write_all(content.as_bytes()))?;
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Read;

    #[test]
    fn call_timer_generates_uuid() {
        let timer = CallTimer::start();
        assert!(Uuid::parse_str(&timer.call_id).is_ok());
    }

    #[test]
    fn call_timer_measures_duration() {
        let timer = CallTimer::start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let (completed_at, duration_ms) = timer.finish();
        assert!(duration_ms >= 10);
        assert!(completed_at >= timer.started_at);
    }

    #[test]
    #[serial]
    fn logging_disabled_env_var() {
        // SAFETY: serial_test ensures no concurrent env access in this process.
        unsafe {
            std::env::set_var("TOOLINDEX_LOGGING_DISABLED", "1");
            assert!(logging_disabled());
            std::env::set_var("TOOLINDEX_LOGGING_DISABLED", "0");
            assert!(!logging_disabled());
            std::env::remove_var("TOOLINDEX_LOGGING_DISABLED");
            assert!(!logging_disabled());
        }
    }

    #[test]
    fn day_bucket_name_format() {
        let date = DateTime::parse_from_rfc3339("2025-03-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(LogWriter::day_bucket_name(date), "tool_calls_2025-03-15");
    }

    #[test]
    fn truncate_error_passes_short_messages_through() {
        assert_eq!(ToolCallRecord::truncate_error("boom"), "boom");
    }

    #[test]
    fn truncate_error_shortens_long_messages() {
        let long = "x".repeat(MAX_ERROR_LEN + 500);
        let truncated = ToolCallRecord::truncate_error(&long);
        assert!(truncated.ends_with('…'));
        assert!(truncated.len() < long.len());
    }

    fn sample_record(tool_id: &str, completed_at: DateTime<Utc>, duration_ms: u128) -> ToolCallRecord {
        ToolCallRecord {
            call_id: Uuid::new_v4().to_string(),
            tool_id: tool_id.to_string(),
            started_at: completed_at,
            completed_at,
            duration_ms,
            request: serde_json::json!({"param": "value"}),
            success: true,
            error: None,
        }
    }

    #[test]
    #[serial]
    fn jsonl_append_creates_file() {
        let temp = tempfile::tempdir().unwrap();
        let writer = LogWriter::new(temp.path());
        let timer = CallTimer::start();
        let (completed_at, duration_ms) = timer.finish();

        let record = sample_record("mock.greet", completed_at, duration_ms);
        writer.append_jsonl(&record).unwrap();

        let bucket = LogWriter::day_bucket_name(completed_at);
        let jsonl_path = temp.path().join(format!("{bucket}.jsonl"));
        assert!(jsonl_path.exists());

        let mut content = String::new();
        std::fs::File::open(&jsonl_path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("mock.greet"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    #[serial]
    fn jsonl_append_multiple_lines() {
        let temp = tempfile::tempdir().unwrap();
        let writer = LogWriter::new(temp.path());
        let now = Utc::now();

        for i in 0..2 {
            let record = sample_record(&format!("mock.tool_{i}"), now, i as u128);
            writer.append_jsonl(&record).unwrap();
        }

        let bucket = LogWriter::day_bucket_name(now);
        let jsonl_path = temp.path().join(format!("{bucket}.jsonl"));
        let content = std::fs::read_to_string(&jsonl_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("tool_0"));
        assert!(lines[1].contains("tool_1"));
    }

    #[test]
    #[serial]
    fn disabled_logging_skips_writes() {
        // SAFETY: serial_test ensures no concurrent env access in this process.
        unsafe {
            std::env::set_var("TOOLINDEX_LOGGING_DISABLED", "1");
        }

        let temp = tempfile::tempdir().unwrap();
        let writer = LogWriter::new(temp.path());
        let record = sample_record("mock.greet", Utc::now(), 1);
        writer.append_jsonl(&record).unwrap();

        let filename = write_artifact(temp.path(), Utc::now(), "call-1", "content").unwrap();
        assert!(filename.is_empty());

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert!(entries.is_empty());

        // SAFETY: serial_test ensures no concurrent env access in this process.
        unsafe {
            std::env::remove_var("TOOLINDEX_LOGGING_DISABLED");
        }
    }

    #[test]
    fn optional_fields_omitted_when_absent() {
        let record = sample_record("mock.greet", Utc::now(), 1);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"error\""));
    }
}
