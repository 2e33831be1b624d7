//! Buffering of multipart bodies. Parsing never touches storage; callers hand
//! the buffered parts to [`crate::files::FileService::upload_file`] afterwards.

use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;

use crate::error::ApiError;

const TEXT_FIELD_LIMIT: usize = 64 * 1024;

/// A file part held fully in memory.
#[derive(Debug, Clone)]
pub struct BufferedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<BufferedFile>,
    pub text: HashMap<String, String>,
}

impl UploadForm {
    /// Text value with surrounding whitespace removed; blank counts as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, field: &str) -> Option<BufferedFile> {
        let idx = self.files.iter().position(|f| f.field == field)?;
        Some(self.files.remove(idx))
    }
}

/// Reads the whole body. Parts named in `file_fields` are kept as files (at most
/// one each, at most `limit` bytes), parts without a filename become text, and
/// any other file part is skipped. Empty file parts count as absent.
pub async fn buffer_form(mut payload: Multipart, file_fields: &[&str], limit: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::warn!("multipart error: {e}");
        ApiError::BadRequest("Malformed multipart body".into())
    })? {
        let cd = field.content_disposition();
        let Some(name) = cd.get_name().map(str::to_owned) else { continue };
        let file_name = cd.get_filename().map(str::to_owned);
        let declared = field.content_type().map(|m| m.essence_str().to_owned());

        let is_file = file_fields.contains(&name.as_str());
        if !is_file && file_name.is_some() {
            continue;
        }
        // browsers send an unselected file input as an empty filename
        if is_file && file_name.as_deref() == Some("") {
            continue;
        }

        let max = if is_file { limit } else { TEXT_FIELD_LIMIT };
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            log::warn!("multipart read error: {e}");
            ApiError::BadRequest("Malformed multipart body".into())
        })? {
            if bytes.len() + chunk.len() > max {
                return Err(ApiError::PayloadTooLarge(format!("Field {name} is too large.")));
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_file {
            if bytes.is_empty() {
                continue;
            }
            if form.files.iter().any(|f| f.field == name) {
                return Err(ApiError::BadRequest(format!("Unexpected field: {name}")));
            }
            let content_type = infer::get(&bytes)
                .map(|t| t.mime_type().to_string())
                .or(declared)
                .unwrap_or_else(|| "application/octet-stream".into());
            form.files.push(BufferedFile {
                file_name: sanitize_file_name(file_name.as_deref().unwrap_or(&name)),
                field: name,
                content_type,
                bytes,
            });
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| ApiError::BadRequest(format!("Field {name} is not valid UTF-8")))?;
            form.text.insert(name, value);
        }
    }
    Ok(form)
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() { "file".into() } else { cleaned }
}
