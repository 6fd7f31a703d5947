//! Synchronous file-text extraction for `POST /files/extract`. Unlike
//! the asynchronous file-ingestion job handled by `chatcore::FileHandler`, this
//! path never touches the job queue: it extracts, truncates, and returns inline.
//!
//! Grounded on the original `file_extractor` service's txt/csv handling; PDF,
//! DOCX, and XLSX parsing need a binary-format crate this workspace doesn't
//! carry, so those extensions pass `validate_extension` but are rejected at
//! extraction time with a clear error until a real collaborator is wired in
//! at this seam.

use std::fmt;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const MAX_TEXT_CHARS: usize = 20_000;
pub const MAX_CSV_ROWS: usize = 100;
const TRUNCATION_MARKER: &str = "\n[Truncated]";

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "csv", "docx", "xlsx"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("file extension '{0}' is not allowed")]
    DisallowedExtension(String),
    #[error("file exceeds the {} byte upload limit", MAX_UPLOAD_BYTES)]
    TooLarge,
    #[error("extraction for '{0}' files is not supported in this deployment")]
    Unsupported(String),
    #[error("file is not valid UTF-8 text")]
    NotUtf8,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractResult {
    pub text: String,
    pub text_length: usize,
    pub truncated: bool,
    pub rows: Option<usize>,
    pub columns: Option<usize>,
}

pub fn validate_extension(file_type: &str) -> Result<(), ExtractError> {
    let lowered = file_type.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.contains(&lowered.as_str()) {
        Ok(())
    } else {
        Err(ExtractError::DisallowedExtension(lowered))
    }
}

/// Collapse runs of spaces and blank lines, trim trailing whitespace per line.
pub fn compact_whitespace(text: &str) -> String {
    let mut collapsed_lines = Vec::new();
    let mut blank_run = 0;
    for line in text.lines() {
        let squeezed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if squeezed.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                collapsed_lines.push(String::new());
            }
        } else {
            blank_run = 0;
            collapsed_lines.push(squeezed);
        }
    }
    collapsed_lines.join("\n").trim().to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    (truncated, true)
}

fn extract_txt(bytes: &[u8]) -> Result<ExtractResult, ExtractError> {
    let raw = std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)?;
    let compacted = compact_whitespace(raw);
    let (text, truncated) = truncate_chars(&compacted, MAX_TEXT_CHARS);
    Ok(ExtractResult {
        text_length: text.chars().count(),
        text,
        truncated,
        rows: None,
        columns: None,
    })
}

fn extract_csv(bytes: &[u8]) -> Result<ExtractResult, ExtractError> {
    let raw = std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)?;
    let mut lines = raw.lines();
    let header = lines.next().unwrap_or_default();
    let columns = header.split(',').count();

    let all_rows: Vec<&str> = lines.collect();
    let row_count = all_rows.len();
    let row_truncated = row_count > MAX_CSV_ROWS;
    let kept_rows = &all_rows[..row_count.min(MAX_CSV_ROWS)];

    let mut body = String::new();
    body.push_str(&format!("CSV: {} rows, {} cols\n", kept_rows.len(), columns));
    body.push_str(header);
    body.push('\n');
    for row in kept_rows {
        body.push_str(row);
        body.push('\n');
    }

    let (text, char_truncated) = truncate_chars(body.trim_end(), MAX_TEXT_CHARS);
    Ok(ExtractResult {
        text_length: text.chars().count(),
        text,
        truncated: row_truncated || char_truncated,
        rows: Some(kept_rows.len()),
        columns: Some(columns),
    })
}

pub fn extract(bytes: &[u8], file_type: &str) -> Result<ExtractResult, ExtractError> {
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(ExtractError::TooLarge);
    }
    match file_type.to_ascii_lowercase().as_str() {
        "txt" => extract_txt(bytes),
        "csv" => extract_csv(bytes),
        other @ ("pdf" | "docx" | "xlsx") => Err(ExtractError::Unsupported(other.to_string())),
        other => Err(ExtractError::DisallowedExtension(other.to_string())),
    }
}

impl fmt::Display for ExtractResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chars, truncated={}", self.text_length, self.truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_extensions() {
        assert!(validate_extension("exe").is_err());
        assert!(validate_extension("TXT").is_ok());
    }

    #[test]
    fn compact_whitespace_collapses_runs() {
        assert_eq!(compact_whitespace("Hello    world   test"), "Hello world test");
        assert_eq!(compact_whitespace("Line 1\n\n\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn extracts_and_truncates_txt() {
        let result = extract_txt(b"Hello, World!\nThis is a test file.").unwrap();
        assert!(result.text.contains("Hello, World!"));
        assert!(!result.truncated);

        let long = "A".repeat(MAX_TEXT_CHARS + 1000);
        let result = extract_txt(long.as_bytes()).unwrap();
        assert!(result.truncated);
        assert!(result.text.ends_with(TRUNCATION_MARKER.trim_start()));
    }

    #[test]
    fn extracts_csv_with_row_and_column_counts() {
        let result = extract_csv(b"name,age,city\nAlice,30,NYC\nBob,25,LA").unwrap();
        assert!(result.text.contains("Alice"));
        assert_eq!(result.rows, Some(2));
        assert_eq!(result.columns, Some(3));
        assert!(!result.truncated);
    }

    #[test]
    fn truncates_csv_beyond_max_rows() {
        let mut csv = "col1,col2\n".to_string();
        for i in 0..(MAX_CSV_ROWS + 50) {
            csv.push_str(&format!("{i},{}\n", i * 2));
        }
        let result = extract_csv(csv.as_bytes()).unwrap();
        assert_eq!(result.rows, Some(MAX_CSV_ROWS));
        assert!(result.truncated);
    }

    #[test]
    fn pdf_docx_xlsx_are_accepted_but_unsupported() {
        for ext in ["pdf", "docx", "xlsx"] {
            assert!(validate_extension(ext).is_ok());
            assert!(matches!(extract(b"stub", ext), Err(ExtractError::Unsupported(_))));
        }
    }

    #[test]
    fn rejects_oversized_upload() {
        let oversized = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        assert!(matches!(extract(&oversized, "txt"), Err(ExtractError::TooLarge)));
    }
}
