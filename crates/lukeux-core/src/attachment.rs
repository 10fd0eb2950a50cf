//! Attachment intake for task generation.
//!
//! Uploads arrive base64-encoded. Each one is checked against the count cap,
//! a MIME allow-list and a per-kind size cap, then turned into either UTF-8
//! text (spliced into the prompt) or a data URL (sent to the model as an
//! image, or referenced by name for documents). Processing is synchronous
//! and bounded; nothing is compressed, deduplicated or streamed.

use crate::config::AttachmentLimits;
use crate::error::{LukeError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const TEXT_TYPES: &[&str] = &["text/plain", "text/markdown", "text/csv", "application/json"];
pub const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];
pub const DOCUMENT_TYPES: &[&str] = &["application/pdf"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Base64 file content. A `data:` URL is accepted as well.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Text,
    Image,
    Document,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttachmentContent {
    Text(String),
    DataUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAttachment {
    pub name: String,
    pub mime_type: String,
    pub kind: AttachmentKind,
    pub size: usize,
    pub content: AttachmentContent,
}

/// What a task keeps about its attachments once the prompt is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub name: String,
    pub mime_type: String,
    pub kind: AttachmentKind,
    pub size: usize,
}

impl ProcessedAttachment {
    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            kind: self.kind,
            size: self.size,
        }
    }

    /// Raw base64 payload of an image/document attachment.
    pub fn base64_data(&self) -> Option<&str> {
        match &self.content {
            AttachmentContent::DataUrl(url) => url.split_once(";base64,").map(|(_, d)| d),
            AttachmentContent::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

pub fn classify(mime: &str) -> Option<AttachmentKind> {
    if TEXT_TYPES.contains(&mime) {
        Some(AttachmentKind::Text)
    } else if IMAGE_TYPES.contains(&mime) {
        Some(AttachmentKind::Image)
    } else if DOCUMENT_TYPES.contains(&mime) {
        Some(AttachmentKind::Document)
    } else {
        None
    }
}

/// Declared type (parameters stripped), else a guess from the file name.
/// `application/octet-stream` counts as undeclared.
pub fn resolve_mime(name: &str, declared: Option<&str>) -> String {
    let declared = declared
        .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty() && m != "application/octet-stream");
    if let Some(m) = declared {
        return m;
    }
    // mime_guess reports .md as text/x-markdown on some tables.
    let guessed = mime_guess::from_path(name).first_or_octet_stream();
    match guessed.essence_str() {
        "text/x-markdown" => "text/markdown".to_string(),
        other => other.to_string(),
    }
}

fn size_limit(kind: AttachmentKind, limits: &AttachmentLimits) -> usize {
    match kind {
        AttachmentKind::Text => limits.max_text_bytes,
        AttachmentKind::Image => limits.max_image_bytes,
        AttachmentKind::Document => limits.max_document_bytes,
    }
}

fn decode(upload: &AttachmentUpload) -> Result<Vec<u8>> {
    let raw = upload.data.trim();
    let payload = match raw.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, d)| d)
            .ok_or_else(|| LukeError::InvalidAttachment {
                name: upload.name.clone(),
                reason: "data URL is not base64".to_string(),
            })?,
        None => raw,
    };
    STANDARD
        .decode(payload)
        .map_err(|e| LukeError::InvalidAttachment {
            name: upload.name.clone(),
            reason: format!("invalid base64: {e}"),
        })
}

pub fn process_attachment(
    upload: &AttachmentUpload,
    limits: &AttachmentLimits,
) -> Result<ProcessedAttachment> {
    let name = upload.name.trim();
    if name.is_empty() {
        return Err(LukeError::InvalidAttachment {
            name: String::new(),
            reason: "missing file name".to_string(),
        });
    }
    let mime = resolve_mime(name, upload.mime_type.as_deref());
    let kind = classify(&mime).ok_or_else(|| LukeError::UnsupportedAttachment {
        name: name.to_string(),
        mime: mime.clone(),
    })?;

    let bytes = decode(upload)?;
    let limit = size_limit(kind, limits);
    if bytes.len() > limit {
        return Err(LukeError::AttachmentTooLarge {
            name: name.to_string(),
            size: bytes.len(),
            limit,
        });
    }

    let content = match kind {
        AttachmentKind::Text => {
            let text = String::from_utf8(bytes.clone()).map_err(|_| {
                LukeError::InvalidAttachment {
                    name: name.to_string(),
                    reason: "text file is not valid UTF-8".to_string(),
                }
            })?;
            AttachmentContent::Text(text)
        }
        AttachmentKind::Image | AttachmentKind::Document => {
            AttachmentContent::DataUrl(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
        }
    };

    Ok(ProcessedAttachment {
        name: name.to_string(),
        mime_type: mime,
        kind,
        size: bytes.len(),
        content,
    })
}

/// Process a batch, failing on the first rejected upload.
pub fn process_attachments(
    uploads: &[AttachmentUpload],
    limits: &AttachmentLimits,
) -> Result<Vec<ProcessedAttachment>> {
    if uploads.len() > limits.max_files {
        return Err(LukeError::TooManyAttachments {
            count: uploads.len(),
            limit: limits.max_files,
        });
    }
    uploads
        .iter()
        .map(|u| process_attachment(u, limits))
        .collect()
}

/// Append text attachments to the prompt and name the documents. Images are
/// not mentioned here; they travel as image parts.
pub fn splice_into_prompt(prompt: &str, attachments: &[ProcessedAttachment]) -> String {
    let mut out = prompt.to_string();
    for att in attachments {
        match (&att.content, att.kind) {
            (AttachmentContent::Text(text), _) => {
                out.push_str(&format!("\n\n--- Attachment: {} ---\n{}", att.name, text.trim_end()));
            }
            (AttachmentContent::DataUrl(_), AttachmentKind::Document) => {
                out.push_str(&format!(
                    "\n\n--- Attachment: {} ({}, {} bytes, not inlined) ---",
                    att.name, att.mime_type, att.size
                ));
            }
            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
