//! Multipart parsing and file validation shared by document, policy and
//! profile-picture uploads. All checks run before anything touches storage.

use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::error;

use crate::error::{AppError, AppResult};

pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const PICTURE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<RawFile>,
    pub fields: HashMap<String, String>,
}

#[derive(Debug)]
pub struct RawFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };

        if name == "file" {
            let file_name = field.file_name().map(|n| n.to_string());
            let content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await.map_err(|err| {
                error!(error = %err, "failed to read file bytes");
                AppError::bad_request(format!("failed to read file bytes: {err}"))
            })?;
            form.file = Some(RawFile {
                file_name,
                content_type,
                bytes: data.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(|err| {
                AppError::bad_request(format!("invalid value for {name}: {err}"))
            })?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

impl UploadForm {
    pub fn required(&self, name: &str) -> AppResult<String> {
        self.optional(name)
            .ok_or_else(|| AppError::bad_request(format!("{name} is required")))
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn take_file(&mut self, max_bytes: usize, allowed: &[&str]) -> AppResult<ValidatedFile> {
        let raw = self
            .file
            .take()
            .ok_or_else(|| AppError::bad_request("file field is required"))?;
        validate_file(raw, max_bytes, allowed)
    }
}

/// Resolves the effective MIME type (falling back to the file extension when
/// the client sent none or a generic one) and enforces the size cap.
pub fn validate_file(raw: RawFile, max_bytes: usize, allowed: &[&str]) -> AppResult<ValidatedFile> {
    let file_name = raw
        .file_name
        .map(|name| sanitize_file_name(&name))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("filename is required"))?;

    if raw.bytes.is_empty() {
        return Err(AppError::bad_request("file must not be empty"));
    }
    if raw.bytes.len() > max_bytes {
        return Err(AppError::bad_request(format!(
            "file exceeds the {max_bytes} byte limit"
        )));
    }

    // Parameters such as `; charset=binary` do not change the type.
    let declared = raw
        .content_type
        .and_then(|value| value.parse::<mime_guess::Mime>().ok())
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .filter(|essence| essence != "application/octet-stream");
    let mime_type = declared.unwrap_or_else(|| {
        mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    if !allowed.contains(&mime_type.as_str()) {
        return Err(AppError::bad_request(format!(
            "file type {mime_type} is not allowed"
        )));
    }

    Ok(ValidatedFile {
        file_name,
        mime_type,
        bytes: raw.bytes,
    })
}

/// Keeps the final path component and replaces characters that would make an
/// awkward object key. Leading dots are dropped, so `..` sanitizes to nothing.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .trim_start_matches('.');
    base.chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => ch,
            _ => '_',
        })
        .collect()
}
