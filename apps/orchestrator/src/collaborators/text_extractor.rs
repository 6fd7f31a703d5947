//! Minimal `TextExtractor`: reads plain-text files verbatim. PDF/DOCX/CSV/XLSX
//! parsing is out of scope here (an external collaborator per the file
//! handler's contract) — wire in a richer extractor at this seam when those
//! formats are needed.

use chatcore::{ChatCoreError, ChatCoreResult, ExtractedText, TextExtractor};

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, file_path: &str, file_type: &str) -> ChatCoreResult<ExtractedText> {
        match file_type.to_ascii_lowercase().as_str() {
            "txt" | "md" | "text" => {
                let text = std::fs::read_to_string(file_path)
                    .map_err(|e| ChatCoreError::Extraction(format!("reading {file_path}: {e}")))?;
                Ok(ExtractedText {
                    text,
                    preview_table: None,
                })
            }
            other => Err(ChatCoreError::UnsupportedFileType(other.to_string())),
        }
    }
}
