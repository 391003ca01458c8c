//! Media artifact generation: synthesized speech and document files.
//!
//! [`MediaGenerator`] is the collaborator contract the dispatcher
//! consumes. [`MediaStudio`] implements it with the Groq speech endpoint
//! for audio and local writers for documents. Generated files are wrapped
//! in [`MediaFile`], which deletes the underlying file when dropped so
//! temporary artifacts never outlive the send that used them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MEDIA_TIMEOUT_SECS;

/// Errors from media generation.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Synthesis error: {0}")]
    Synthesis(String),
    #[error("File error: {0}")]
    File(String),
}

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Excel,
    Note,
}

impl DocumentKind {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "rtf",
            Self::Excel => "csv",
            Self::Note => "md",
        }
    }

    /// Short label used in captions and report headings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Word => "Word",
            Self::Excel => "Excel",
            Self::Note => "note",
        }
    }
}

/// A generated file with scoped ownership: the file is removed from disk
/// when this handle is dropped, on every exit path.
#[derive(Debug)]
pub struct MediaFile {
    path: PathBuf,
}

impl MediaFile {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MediaFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove media file {}: {e}", self.path.display());
        }
    }
}

/// Produces media artifacts on demand; any call may fail.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    /// Synthesize speech audio for `text`.
    async fn synthesize_speech(&self, text: &str, user_id: i64)
        -> Result<MediaFile, MediaError>;

    /// Generate a single document of the given kind.
    async fn generate_document(
        &self,
        kind: DocumentKind,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> Result<MediaFile, MediaError>;

    /// Generate a multi-format report; each entry is sent separately.
    async fn generate_report(
        &self,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> Result<Vec<(DocumentKind, MediaFile)>, MediaError>;
}

const GROQ_SPEECH_URL: &str = "https://api.groq.com/openai/v1/audio/speech";
const SPEECH_MODEL: &str = "playai-tts";
const SPEECH_VOICE: &str = "Fritz-PlayAI";

/// Production media generator: Groq speech synthesis plus local document
/// writers (Markdown notes, CSV sheets, RTF documents, single-page PDFs).
pub struct MediaStudio {
    client: reqwest::Client,
    api_key: String,
    out_dir: PathBuf,
}

impl MediaStudio {
    #[must_use]
    pub fn new(api_key: String, out_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(MEDIA_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            out_dir,
        }
    }

    fn output_path(&self, prefix: &str, user_id: i64, extension: &str) -> PathBuf {
        let stamp = Uuid::new_v4().as_simple().to_string();
        self.out_dir
            .join(format!("{prefix}_{user_id}_{stamp}.{extension}"))
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MediaError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| MediaError::File(format!("{}: {e}", path.display())))
    }

    fn render_document(kind: DocumentKind, title: &str, content: &str) -> Vec<u8> {
        match kind {
            DocumentKind::Note => render_markdown_note(title, content).into_bytes(),
            DocumentKind::Excel => render_csv_sheet(title, content).into_bytes(),
            DocumentKind::Word => render_rtf_document(title, content).into_bytes(),
            DocumentKind::Pdf => render_pdf_document(title, content),
        }
    }
}

#[async_trait]
impl MediaGenerator for MediaStudio {
    async fn synthesize_speech(
        &self,
        text: &str,
        user_id: i64,
    ) -> Result<MediaFile, MediaError> {
        let body = serde_json::json!({
            "model": SPEECH_MODEL,
            "voice": SPEECH_VOICE,
            "input": text,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(GROQ_SPEECH_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::Synthesis(format!("speech request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            warn!("Speech synthesis returned {status}");
            return Err(MediaError::Synthesis(format!(
                "speech API returned {status}: {err_body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| MediaError::Synthesis(format!("speech response read error: {e}")))?;

        let path = self.output_path("voice", user_id, "mp3");
        Self::write_file(&path, &audio).await?;
        Ok(MediaFile::new(path))
    }

    async fn generate_document(
        &self,
        kind: DocumentKind,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> Result<MediaFile, MediaError> {
        let bytes = Self::render_document(kind, title, content);
        let path = self.output_path("doc", user_id, kind.extension());
        Self::write_file(&path, &bytes).await?;
        Ok(MediaFile::new(path))
    }

    async fn generate_report(
        &self,
        title: &str,
        content: &str,
        user_id: i64,
    ) -> Result<Vec<(DocumentKind, MediaFile)>, MediaError> {
        let mut files = Vec::new();
        for kind in [DocumentKind::Note, DocumentKind::Pdf, DocumentKind::Word] {
            let file = self.generate_document(kind, title, content, user_id).await?;
            files.push((kind, file));
        }
        Ok(files)
    }
}

fn render_markdown_note(title: &str, content: &str) -> String {
    let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    format!("# {title}\n\n{content}\n\n---\n_Generated {stamp}_\n")
}

/// The sheet body is expected to already be CSV rows; a title header row
/// is prepended.
fn render_csv_sheet(title: &str, content: &str) -> String {
    format!("{},\n{content}\n", csv_quote(title))
}

fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn render_rtf_document(title: &str, content: &str) -> String {
    let mut body = String::from("{\\rtf1\\ansi\\deff0{\\fonttbl{\\f0 Helvetica;}}\n");
    body.push_str("{\\b\\fs32 ");
    body.push_str(&rtf_escape(title));
    body.push_str("}\\par\\par\n");
    for line in content.lines() {
        body.push_str(&rtf_escape(line));
        body.push_str("\\par\n");
    }
    body.push('}');
    body
}

fn rtf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            c if c.is_ascii() => out.push(c),
            c => {
                // RTF unicode escape takes a signed 16-bit code point
                let code = u32::from(c);
                if code <= 0x7FFF {
                    out.push_str(&format!("\\u{code}?"));
                } else {
                    out.push('?');
                }
            }
        }
    }
    out
}

/// Maximum content lines placed on the single PDF page.
const PDF_MAX_LINES: usize = 55;
const PDF_WRAP_COLUMNS: usize = 90;

/// Assembles a minimal single-page PDF with the title and wrapped content
/// in Helvetica. Text is reduced to ASCII; other characters are replaced.
fn render_pdf_document(title: &str, content: &str) -> Vec<u8> {
    let mut stream = String::new();
    stream.push_str("BT\n/F1 16 Tf\n72 760 Td\n14 TL\n");
    stream.push_str(&format!("({}) Tj\nT*\nT*\n", pdf_escape(title)));
    stream.push_str("/F1 10 Tf\n12 TL\n");
    for line in wrap_columns(content, PDF_WRAP_COLUMNS)
        .into_iter()
        .take(PDF_MAX_LINES)
    {
        stream.push_str(&format!("({}) Tj\nT*\n", pdf_escape(&line)));
    }
    stream.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!("<< /Length {} >>\nstream\n{stream}endstream", stream.len()),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{object}\nendobj\n", i + 1));
    }

    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));

    pdf.into_bytes()
}

fn pdf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn wrap_columns(content: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for line in content.lines() {
        if line.len() <= width {
            lines.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            // A single word longer than the width gets a hard break
            if word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                for chunk in word.as_bytes().chunks(width) {
                    lines.push(String::from_utf8_lossy(chunk).into_owned());
                }
                continue;
            }
            if !current.is_empty() && current.len() + word.len() + 1 > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn studio() -> MediaStudio {
        MediaStudio::new("test-key".to_string(), std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_note_document_round_trip() {
        let studio = studio();
        let file = studio
            .generate_document(DocumentKind::Note, "My Ideas", "Some body text", 1)
            .await
            .expect("note generated");
        assert_eq!(
            file.path().extension().and_then(|e| e.to_str()),
            Some("md")
        );
        let written = std::fs::read_to_string(file.path()).expect("file exists");
        assert!(written.starts_with("# My Ideas"));
        assert!(written.contains("Some body text"));
    }

    #[tokio::test]
    async fn test_media_file_removed_on_drop() {
        let studio = studio();
        let file = studio
            .generate_document(DocumentKind::Note, "Ephemeral", "gone soon", 2)
            .await
            .expect("note generated");
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_pdf_document_is_well_formed() {
        let studio = studio();
        let file = studio
            .generate_document(DocumentKind::Pdf, "Report (v1)", "line one\nline two", 3)
            .await
            .expect("pdf generated");
        let bytes = std::fs::read(file.path()).expect("file exists");
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        // Parentheses in the title must be escaped inside the text object
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Report \\(v1\\)) Tj"));
    }

    #[tokio::test]
    async fn test_word_document_escapes_rtf_specials() {
        let studio = studio();
        let file = studio
            .generate_document(DocumentKind::Word, "Braces {here}", "back\\slash", 4)
            .await
            .expect("rtf generated");
        let written = std::fs::read_to_string(file.path()).expect("file exists");
        assert!(written.starts_with("{\\rtf1"));
        assert!(written.contains("Braces \\{here\\}"));
        assert!(written.contains("back\\\\slash"));
    }

    #[tokio::test]
    async fn test_report_produces_multiple_formats() {
        let studio = studio();
        let files = studio
            .generate_report("Summary", "report body", 5)
            .await
            .expect("report generated");
        assert_eq!(files.len(), 3);
        let kinds: Vec<DocumentKind> = files.iter().map(|(k, _)| *k).collect();
        assert!(kinds.contains(&DocumentKind::Note));
        assert!(kinds.contains(&DocumentKind::Pdf));
        assert!(kinds.contains(&DocumentKind::Word));
    }

    #[test]
    fn test_csv_quote_doubles_quotes() {
        assert_eq!(csv_quote("plain"), "\"plain\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_wrap_columns_hard_breaks_long_words() {
        let lines = wrap_columns(&"x".repeat(200), 90);
        assert!(lines.len() >= 3);
        assert!(lines.iter().all(|l| l.len() <= 90));
    }
}
