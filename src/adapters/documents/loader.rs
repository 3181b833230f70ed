//! Load a knowledge document from disk as plain text.
//!
//! Text and Markdown are read as-is. CSV price lists and catalogues are
//! flattened to one `column: value` line per record so each row embeds as a
//! self-contained fact.

use crate::domain::DomainError;
use std::path::Path;

pub async fn load_text(path: &Path) -> Result<String, DomainError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DomainError::Document(format!("{}: {}", path.display(), e)))?;
    match ext.as_str() {
        "txt" | "md" | "" => Ok(raw),
        "csv" => csv_to_text(&raw),
        other => Err(DomainError::Document(format!(
            "unsupported document type: .{}",
            other
        ))),
    }
}

pub fn csv_to_text(raw: &str) -> Result<String, DomainError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| DomainError::Document(e.to_string()))?
        .clone();

    let mut lines = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| DomainError::Document(e.to_string()))?;
        let fields: Vec<String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, v)| !v.is_empty())
            .map(|(h, v)| format!("{}: {}", h, v))
            .collect();
        if !fields.is_empty() {
            lines.push(fields.join("; "));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rows_become_lines() {
        let text = csv_to_text("item,price,size\nChocolate cake,2500,1kg\nButter cake,1800,\n").unwrap();
        assert_eq!(
            text,
            "item: Chocolate cake; price: 2500; size: 1kg\nitem: Butter cake; price: 1800"
        );
    }

    #[tokio::test]
    async fn test_load_text_and_reject_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("faq.txt");
        std::fs::write(&txt, "We open at 8am.").unwrap();
        assert_eq!(load_text(&txt).await.unwrap(), "We open at 8am.");

        let pdf = dir.path().join("menu.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert!(matches!(load_text(&pdf).await, Err(DomainError::Document(_))));
    }
}
