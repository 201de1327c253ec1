use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::authz::GrantKind;
use crate::error::{AppError, AppResult};
use crate::storage::{content_disposition, ObjectStorage};

/// Expiring read capability over one stored blob. Never persisted and cannot
/// be revoked; it simply stops working at `expires_at`.
#[derive(Debug, Serialize)]
pub struct AccessGrant {
    pub url: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
    pub filename: String,
}

pub async fn issue(
    storage: &dyn ObjectStorage,
    key: &str,
    filename: &str,
    kind: GrantKind,
    lifetime: Duration,
) -> AppResult<AccessGrant> {
    let disposition = match kind {
        GrantKind::View => content_disposition("inline", filename),
        GrantKind::Download => content_disposition("attachment", filename),
    };

    let issued_at = Utc::now();
    let url = storage
        .presign_get_object(key, lifetime, disposition)
        .await
        .map_err(|err| {
            error!(error = %err, key = %key, "failed to sign access grant");
            AppError::internal(format!("failed to generate access URL: {err}"))
        })?;

    let expires_at = issued_at
        + chrono::Duration::from_std(lifetime).map_err(AppError::internal)?;

    Ok(AccessGrant {
        url,
        expires_in: lifetime.as_secs(),
        expires_at,
        filename: filename.to_string(),
    })
}
