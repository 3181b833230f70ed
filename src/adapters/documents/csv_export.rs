//! Message-log CSV export. Uses the `csv` crate for quoting and escaping.

use crate::domain::{DomainError, StoredMessage};
use chrono::{DateTime, Utc};
use std::path::Path;

const HEADER: [&str; 9] = [
    "id",
    "received_at",
    "sender",
    "message",
    "status",
    "reply",
    "language",
    "confidence",
    "processing_ms",
];

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Render messages as CSV (comma-delimited, header row first).
/// Newlines inside message bodies are flattened to spaces.
pub fn messages_to_csv(messages: &[StoredMessage]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    wtr.write_record(HEADER)?;

    for m in messages {
        let flatten = |s: &str| s.replace('\r', "").replace('\n', " ");
        wtr.write_record([
            m.id.to_string(),
            format_timestamp(m.received_at),
            m.sender.clone(),
            flatten(&m.text),
            m.status.as_str().to_string(),
            m.reply.as_deref().map(flatten).unwrap_or_default(),
            m.language.clone().unwrap_or_default(),
            m.confidence.map(|c| c.to_string()).unwrap_or_default(),
            m.processing_ms.map(|ms| ms.to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

/// Write the CSV export to `path`, creating parent directories.
pub async fn export_messages(path: &Path, messages: &[StoredMessage]) -> Result<(), DomainError> {
    let body = messages_to_csv(messages).map_err(|e| DomainError::Document(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Document(e.to_string()))?;
    }
    tokio::fs::write(path, body)
        .await
        .map_err(|e| DomainError::Document(format!("{}: {}", path.display(), e)))
}
