mod common;

use anyhow::{anyhow, ensure, Result};
use axum::http::StatusCode;
use chrono::{NaiveDateTime, Utc};
use common::{acquire_db_lock, read_json, FilePart, TestApp, TEST_MAX_UPLOAD_BYTES};
use compliance_backend::lifecycle::{self, ReviewDecision};
use compliance_backend::models::Document;
use compliance_backend::routes::documents::persist_review;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct DocumentBody {
    id: Uuid,
    uploaded_by: Uuid,
    category: String,
    department: String,
    file_name: String,
    status: String,
    reviewer_id: Option<Uuid>,
    review_notes: Option<String>,
    rejection_reason: Option<String>,
    version: i32,
    reviewed_at: Option<NaiveDateTime>,
    approved_at: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
struct QueueItem {
    document: DocumentBody,
    owner: OwnerBody,
}

#[derive(Deserialize)]
struct OwnerBody {
    id: Uuid,
    name: String,
}

#[derive(Deserialize)]
struct GrantBody {
    url: String,
    expires_in: u64,
    filename: String,
}

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

async fn upload_medical(app: &TestApp, token: &str, department: &str) -> Result<DocumentBody> {
    let response = app
        .upload(
            "/api/documents",
            &[
                ("title", "Annual medical certificate"),
                ("category", "Medical"),
                ("department", department),
            ],
            Some(FilePart::pdf(PDF)),
            token,
        )
        .await?;
    ensure!(
        response.status() == StatusCode::CREATED,
        "upload failed with status {}",
        response.status()
    );
    read_json(response).await
}

#[tokio::test]
async fn upload_creates_pending_document() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (officer, token) = app.register("off@corp.example", "officer", "systems").await?;
    let doc = upload_medical(&app, &token, "systems").await?;

    assert_eq!(doc.status, "pending");
    assert_eq!(doc.uploaded_by, officer);
    assert_eq!(doc.category, "Medical");
    assert_eq!(doc.department, "systems");
    assert_eq!(doc.file_name, "scan.pdf");
    assert_eq!(doc.version, 1);
    assert!(doc.reviewer_id.is_none());
    assert!(doc.reviewed_at.is_none());

    let bucket = app.documents_bucket();
    assert_eq!(bucket.object_count().await, 1);
    let key = format!("documents/{officer}/{}/scan.pdf", doc.id);
    let stored = bucket.get(&key).await.expect("blob stored under owner key");
    assert_eq!(stored.bytes, PDF);
    assert_eq!(stored.content_type.as_deref(), Some("application/pdf"));

    let response = app.get("/api/documents?status=pending", Some(&token)).await?;
    let listed: Vec<DocumentBody> = read_json(response).await?;
    assert_eq!(listed.len(), 1);
    let response = app.get("/api/documents?status=approved", Some(&token)).await?;
    let listed: Vec<DocumentBody> = read_json(response).await?;
    assert!(listed.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_uploads_store_nothing() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, token) = app.register("off@corp.example", "officer", "systems").await?;

    let missing_category = app
        .upload(
            "/api/documents",
            &[("title", "No category"), ("department", "systems")],
            Some(FilePart::pdf(PDF)),
            &token,
        )
        .await?;
    assert_eq!(missing_category.status(), StatusCode::BAD_REQUEST);

    let unknown_category = app
        .upload(
            "/api/documents",
            &[
                ("title", "Odd"),
                ("category", "Astrology"),
                ("department", "systems"),
            ],
            Some(FilePart::pdf(PDF)),
            &token,
        )
        .await?;
    assert_eq!(unknown_category.status(), StatusCode::BAD_REQUEST);

    let gif = app
        .upload(
            "/api/documents",
            &[
                ("title", "Animated"),
                ("category", "Other"),
                ("department", "systems"),
            ],
            Some(FilePart {
                name: "funny.gif",
                content_type: "image/gif",
                bytes: b"GIF89a",
            }),
            &token,
        )
        .await?;
    assert_eq!(gif.status(), StatusCode::BAD_REQUEST);

    let oversized = vec![b'x'; TEST_MAX_UPLOAD_BYTES + 1];
    let too_big = app
        .upload(
            "/api/documents",
            &[
                ("title", "Huge"),
                ("category", "Other"),
                ("department", "systems"),
            ],
            Some(FilePart::pdf(&oversized)),
            &token,
        )
        .await?;
    assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

    let no_file = app
        .upload(
            "/api/documents",
            &[
                ("title", "Empty"),
                ("category", "Other"),
                ("department", "systems"),
            ],
            None,
            &token,
        )
        .await?;
    assert_eq!(no_file.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.documents_bucket().object_count().await, 0);
    let response = app.get("/api/documents", Some(&token)).await?;
    let listed: Vec<DocumentBody> = read_json(response).await?;
    assert!(listed.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn review_queue_is_scoped_by_reviewer() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (officer, officer_token) = app.register("off@corp.example", "officer", "systems").await?;
    let (_, gm_systems) = app
        .register("gm.sys@corp.example", "general_manager", "systems")
        .await?;
    let (_, gm_finance) = app
        .register("gm.fin@corp.example", "general_manager", "finance_accounts")
        .await?;
    let (_, manager) = app.register("mgr@corp.example", "manager", "systems").await?;
    let (_, hr) = app.register_hr("hr@corp.example", "human_resources").await?;

    let doc = upload_medical(&app, &officer_token, "systems").await?;

    let response = app.get("/api/reviews", Some(&gm_systems)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let queue: Vec<QueueItem> = read_json(response).await?;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].document.id, doc.id);
    assert_eq!(queue[0].owner.id, officer);
    assert_eq!(queue[0].owner.name, "off Tester");

    let response = app.get("/api/reviews", Some(&gm_finance)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let queue: Vec<QueueItem> = read_json(response).await?;
    assert!(queue.is_empty());

    let response = app.get("/api/reviews?status=pending", Some(&hr)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let queue: Vec<QueueItem> = read_json(response).await?;
    assert_eq!(queue.len(), 1);

    let response = app.get("/api/reviews", Some(&manager)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/reviews", Some(&officer_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn general_manager_approves_once() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, officer_token) = app.register("off@corp.example", "officer", "systems").await?;
    let (gm, gm_token) = app
        .register("gm.sys@corp.example", "general_manager", "systems")
        .await?;
    let (_, other_gm) = app
        .register("gm.fin@corp.example", "general_manager", "finance_accounts")
        .await?;
    let doc = upload_medical(&app, &officer_token, "systems").await?;

    let path = format!("/api/documents/{}/approve", doc.id);

    let response = app.post_empty(&path, &officer_token).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_empty(&path, &other_gm).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post_empty(&path, &gm_token).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let approved: DocumentBody = read_json(response).await?;
    assert_eq!(approved.status, "approved");
    assert_eq!(approved.reviewer_id, Some(gm));
    assert!(approved.reviewed_at.is_some());
    assert!(approved.approved_at.is_some());
    assert!(approved.rejection_reason.is_none());
    assert_eq!(approved.version, 2);

    let response = app.post_empty(&path, &gm_token).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let reject_path = format!("/api/documents/{}/reject", doc.id);
    let response = app.post_empty(&reject_path, &gm_token).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .get(&format!("/api/documents/{}", doc.id), Some(&officer_token))
        .await?;
    let current: DocumentBody = read_json(response).await?;
    assert_eq!(current.status, "approved");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn hr_rejects_with_notes_across_departments() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, officer_token) = app
        .register("off@corp.example", "officer", "supply_chain")
        .await?;
    let (hr, hr_token) = app.register_hr("hr@corp.example", "human_resources").await?;
    let doc = upload_medical(&app, &officer_token, "supply_chain").await?;

    let path = format!("/api/documents/{}/review", doc.id);

    let response = app
        .post_json(
            &path,
            &json!({ "decision": "reject", "notes": "x", "expected_version": 7 }),
            Some(&hr_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .post_json(
            &path,
            &json!({ "decision": "reject", "notes": "  Scan is illegible  ", "expected_version": 1 }),
            Some(&hr_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let rejected: DocumentBody = read_json(response).await?;
    assert_eq!(rejected.status, "rejected");
    assert_eq!(rejected.reviewer_id, Some(hr));
    assert_eq!(rejected.review_notes.as_deref(), Some("Scan is illegible"));
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Scan is illegible"));
    assert!(rejected.approved_at.is_none());

    let response = app
        .post_json(&path, &json!({ "decision": "approve" }), Some(&hr_token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn access_grants_follow_visibility() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, owner_token) = app.register("own@corp.example", "officer", "systems").await?;
    let (_, stranger_token) = app.register("str@corp.example", "officer", "systems").await?;
    let (_, hr_token) = app.register_hr("hr@corp.example", "human_resources").await?;
    let doc = upload_medical(&app, &owner_token, "systems").await?;

    let view_path = format!("/api/documents/{}/view", doc.id);
    let download_path = format!("/api/documents/{}/download", doc.id);

    let response = app.get(&view_path, Some(&owner_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let grant: GrantBody = read_json(response).await?;
    assert_eq!(grant.expires_in, 3600);
    assert_eq!(grant.filename, "scan.pdf");
    assert!(grant.url.contains("expires_in=3600"));
    assert!(grant.url.contains("disposition=inline"));

    let response = app.get(&download_path, Some(&owner_token)).await?;
    let grant: GrantBody = read_json(response).await?;
    assert_eq!(grant.expires_in, 600);
    assert!(grant.url.contains("disposition=attachment"));

    let response = app.get(&view_path, Some(&hr_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&view_path, Some(&stranger_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.get(&download_path, Some(&stranger_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get(&format!("/api/documents/{}/view", Uuid::new_v4()), Some(&owner_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn owner_deletes_document_and_blob() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, owner_token) = app.register("own@corp.example", "officer", "systems").await?;
    let (_, stranger_token) = app.register("str@corp.example", "officer", "systems").await?;
    let doc = upload_medical(&app, &owner_token, "systems").await?;
    let path = format!("/api/documents/{}", doc.id);

    let response = app.delete(&path, &stranger_token).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.documents_bucket().object_count().await, 1);

    let response = app.delete(&path, &owner_token).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.documents_bucket().object_count().await, 0);

    let response = app.get(&path, Some(&owner_token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn review_written_over_a_changed_row_conflicts() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let (_, officer_token) = app.register("off@corp.example", "officer", "systems").await?;
    let (gm, _) = app
        .register("gm.sys@corp.example", "general_manager", "systems")
        .await?;
    let decided = upload_medical(&app, &officer_token, "systems").await?.id;
    let edited = upload_medical(&app, &officer_token, "systems").await?.id;

    let (decided_err, edited_err, decided_row, edited_row) = app
        .with_conn(move |conn| {
            use compliance_backend::schema::documents;

            // Both rows are read before the other writer gets in.
            let stale_decided: Document = documents::table.find(decided).first(conn)?;
            let stale_edited: Document = documents::table.find(edited).first(conn)?;

            diesel::update(documents::table.find(decided))
                .set((
                    documents::status.eq("approved"),
                    documents::version.eq(stale_decided.version + 1),
                ))
                .execute(conn)?;
            diesel::update(documents::table.find(edited))
                .set(documents::version.eq(stale_edited.version + 1))
                .execute(conn)?;

            let mut write = |doc: &Document| -> Result<(StatusCode, String)> {
                let outcome = lifecycle::review(
                    doc.status()?,
                    doc.version,
                    None,
                    ReviewDecision::Reject,
                    gm,
                    Some("unreadable".to_string()),
                    Utc::now(),
                )?;
                let err = persist_review(conn, doc, outcome)
                    .err()
                    .ok_or_else(|| anyhow!("write over a changed row succeeded"))?;
                Ok((err.status(), err.message().to_string()))
            };
            let decided_err = write(&stale_decided)?;
            let edited_err = write(&stale_edited)?;

            let decided_row: Document = documents::table.find(decided).first(conn)?;
            let edited_row: Document = documents::table.find(edited).first(conn)?;
            Ok((decided_err, edited_err, decided_row, edited_row))
        })
        .await?;

    assert_eq!(decided_err.0, StatusCode::CONFLICT);
    assert!(decided_err.1.contains("already approved"), "{}", decided_err.1);
    assert_eq!(decided_row.status, "approved");
    assert_eq!(decided_row.version, 2);
    assert!(decided_row.reviewer_id.is_none());
    assert!(decided_row.rejection_reason.is_none());

    assert_eq!(edited_err.0, StatusCode::CONFLICT);
    assert!(edited_err.1.contains("modified concurrently"), "{}", edited_err.1);
    assert_eq!(edited_row.status, "pending");
    assert_eq!(edited_row.version, 2);
    assert!(edited_row.reviewer_id.is_none());
    assert!(edited_row.reviewed_at.is_none());

    app.cleanup().await?;
    Ok(())
}
