use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::CurrentActor;
use crate::authz::{
    authorize, document_grant_duration, review_scope, Action, GrantKind, ReviewScope,
};
use crate::domain::{Department, DocumentCategory, DocumentStatus};
use crate::error::{AppError, AppResult};
use crate::grants::{self, AccessGrant};
use crate::lifecycle::{self, ReviewDecision, ReviewOutcome, TransitionError};
use crate::models::{Document, NewDocument, Profile};
use crate::schema::{documents, profiles};
use crate::state::AppState;
use crate::uploads::{read_form, DOCUMENT_MIME_TYPES};

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub status: Option<DocumentStatus>,
}

#[derive(Deserialize)]
pub struct ReviewQueueQuery {
    pub status: Option<DocumentStatus>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub notes: Option<String>,
    pub expected_version: Option<i32>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub department: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub reviewer_id: Option<Uuid>,
    pub review_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub version: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
    pub approved_at: Option<NaiveDateTime>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            uploaded_by: doc.uploaded_by,
            title: doc.title,
            description: doc.description,
            category: doc.category,
            department: doc.department,
            file_name: doc.file_name,
            file_size: doc.file_size,
            mime_type: doc.mime_type,
            status: doc.status,
            reviewer_id: doc.reviewer_id,
            review_notes: doc.review_notes,
            rejection_reason: doc.rejection_reason,
            version: doc.version,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            reviewed_at: doc.reviewed_at,
            approved_at: doc.approved_at,
        }
    }
}

#[derive(Serialize)]
pub struct DocumentOwner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub designation: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewQueueItem {
    pub document: DocumentResponse,
    pub owner: DocumentOwner,
}

pub async fn upload_document(
    State(state): State<AppState>,
    current: CurrentActor,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    authorize(&current.actor, Action::UploadDocument)?;

    let mut form = read_form(multipart).await?;
    let title = form.required("title")?;
    let description = form.optional("description");
    let category: DocumentCategory = form.required("category")?.parse()?;
    let department: Department = form.required("department")?.parse()?;
    let file = form.take_file(state.config.max_upload_bytes, DOCUMENT_MIME_TYPES)?;

    let owner = current.actor.id;
    let document_id = Uuid::new_v4();
    let file_key = format!("documents/{owner}/{document_id}/{}", file.file_name);

    state
        .buckets
        .documents
        .put_object(&file_key, file.bytes.clone(), Some(file.mime_type.clone()))
        .await
        .map_err(|err| {
            error!(error = %err, key = %file_key, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let new_document = NewDocument::pending(
        document_id,
        owner,
        title,
        description,
        category,
        department,
        file_key.clone(),
        &file,
    );

    let inserted = {
        let mut conn = state.db()?;
        diesel::insert_into(documents::table)
            .values(&new_document)
            .get_result::<Document>(&mut conn)
    };

    let document = match inserted {
        Ok(document) => document,
        Err(err) => {
            if let Err(cleanup) = state.buckets.documents.delete_object(&file_key).await {
                warn!(error = %cleanup, key = %file_key, "failed to remove blob after insert error");
            }
            return Err(AppError::from(err));
        }
    };

    info!(
        document_id = %document.id,
        owner = %owner,
        category = %category,
        department = %department,
        size_bytes = document.file_size,
        "document uploaded"
    );

    Ok((StatusCode::CREATED, Json(document.into())))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
    current: CurrentActor,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    authorize(&current.actor, Action::ListOwnDocuments)?;

    let mut conn = state.db()?;
    let mut statement = documents::table
        .filter(documents::uploaded_by.eq(current.actor.id))
        .into_boxed();
    if let Some(status) = query.status {
        statement = statement.filter(documents::status.eq(status.as_str()));
    }

    let rows: Vec<Document> = statement
        .order(documents::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(DocumentResponse::from).collect()))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<DocumentResponse>> {
    let doc = load_document(&state, document_id)?;
    authorize(&current.actor, Action::ViewDocument(doc.access_ref()?))?;
    Ok(Json(doc.into()))
}

pub async fn view_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<AccessGrant>> {
    document_grant(&state, document_id, &current, GrantKind::View).await
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<AccessGrant>> {
    document_grant(&state, document_id, &current, GrantKind::Download).await
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<StatusCode> {
    let doc = load_document(&state, document_id)?;
    authorize(&current.actor, Action::DeleteDocument(doc.access_ref()?))?;

    state
        .buckets
        .documents
        .delete_object(&doc.file_key)
        .await
        .map_err(|err| {
            error!(error = %err, key = %doc.file_key, "failed to delete document blob");
            AppError::internal(format!("failed to delete document file: {err}"))
        })?;

    let mut conn = state.db()?;
    diesel::delete(documents::table.find(document_id)).execute(&mut conn)?;

    info!(
        document_id = %document_id,
        deleted_by = %current.actor.id,
        owner = %doc.uploaded_by,
        "document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Review dashboard: HR sees every department, a general manager sees the
/// documents routed to their own department.
pub async fn review_queue(
    State(state): State<AppState>,
    Query(query): Query<ReviewQueueQuery>,
    current: CurrentActor,
) -> AppResult<Json<Vec<ReviewQueueItem>>> {
    authorize(&current.actor, Action::OpenReviewDashboard)?;
    let scope = review_scope(&current.actor)
        .ok_or_else(|| AppError::forbidden("not permitted to open review dashboard"))?;

    let mut conn = state.db()?;
    let mut statement = documents::table
        .inner_join(profiles::table.on(profiles::id.eq(documents::uploaded_by)))
        .select((documents::all_columns, profiles::all_columns))
        .into_boxed();

    if let ReviewScope::Department(department) = scope {
        statement = statement.filter(documents::department.eq(department.as_str()));
    }
    if let Some(status) = query.status {
        statement = statement.filter(documents::status.eq(status.as_str()));
    }

    let rows: Vec<(Document, Profile)> = statement
        .order(documents::created_at.desc())
        .load(&mut conn)?;

    let items = rows
        .into_iter()
        .map(|(document, owner)| ReviewQueueItem {
            document: document.into(),
            owner: DocumentOwner {
                name: owner.full_name(),
                id: owner.id,
                email: owner.email,
                department: owner.department,
                designation: owner.designation,
            },
        })
        .collect();

    Ok(Json(items))
}

pub async fn review_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<DocumentResponse>> {
    let doc = apply_review(
        &state,
        &current,
        document_id,
        payload.decision,
        payload.notes,
        payload.expected_version,
    )?;
    Ok(Json(doc.into()))
}

pub async fn quick_approve(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<DocumentResponse>> {
    let doc = apply_review(
        &state,
        &current,
        document_id,
        ReviewDecision::Approve,
        None,
        None,
    )?;
    Ok(Json(doc.into()))
}

pub async fn quick_reject(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<DocumentResponse>> {
    let doc = apply_review(
        &state,
        &current,
        document_id,
        ReviewDecision::Reject,
        None,
        None,
    )?;
    Ok(Json(doc.into()))
}

fn load_document(state: &AppState, document_id: Uuid) -> AppResult<Document> {
    let mut conn = state.db()?;
    Ok(documents::table.find(document_id).first(&mut conn)?)
}

async fn document_grant(
    state: &AppState,
    document_id: Uuid,
    current: &CurrentActor,
    kind: GrantKind,
) -> AppResult<Json<AccessGrant>> {
    let doc = load_document(state, document_id)?;
    authorize(&current.actor, Action::ViewDocument(doc.access_ref()?))?;

    let grant = grants::issue(
        state.buckets.documents.as_ref(),
        &doc.file_key,
        &doc.file_name,
        kind,
        document_grant_duration(kind),
    )
    .await?;
    Ok(Json(grant))
}

/// Validates and persists a status transition. The UPDATE is conditioned on
/// the status and version that were read, so of two concurrent reviewers only
/// the first write lands and the second gets a conflict.
fn apply_review(
    state: &AppState,
    current: &CurrentActor,
    document_id: Uuid,
    decision: ReviewDecision,
    notes: Option<String>,
    expected_version: Option<i32>,
) -> AppResult<Document> {
    let mut conn = state.db()?;
    let doc: Document = documents::table.find(document_id).first(&mut conn)?;
    authorize(&current.actor, Action::ReviewDocument(doc.access_ref()?))?;

    let now = Utc::now();
    let outcome = lifecycle::review(
        doc.status()?,
        doc.version,
        expected_version,
        decision,
        current.actor.id,
        notes,
        now,
    )?;

    let document = persist_review(&mut conn, &doc, outcome)?;
    info!(
        document_id = %document.id,
        reviewer = %current.actor.id,
        status = %document.status,
        "document reviewed"
    );
    Ok(document)
}

/// Writes a review outcome over the row `doc` was read from. The UPDATE only
/// matches while the row is still pending at the version that was read; any
/// other writer in between turns this into a conflict and leaves the row as
/// that writer left it.
pub fn persist_review(
    conn: &mut PgConnection,
    doc: &Document,
    outcome: ReviewOutcome,
) -> AppResult<Document> {
    let updated = diesel::update(
        documents::table
            .filter(documents::id.eq(doc.id))
            .filter(documents::status.eq(DocumentStatus::Pending.as_str()))
            .filter(documents::version.eq(doc.version)),
    )
    .set((
        documents::status.eq(outcome.status.as_str()),
        documents::reviewer_id.eq(Some(outcome.reviewer_id)),
        documents::reviewed_at.eq(Some(naive(outcome.reviewed_at))),
        documents::approved_at.eq(outcome.approved_at.map(naive)),
        documents::review_notes.eq(outcome.review_notes),
        documents::rejection_reason.eq(outcome.rejection_reason),
        documents::version.eq(doc.version + 1),
        documents::updated_at.eq(naive(outcome.reviewed_at)),
    ))
    .get_result::<Document>(conn)
    .optional()?;

    match updated {
        Some(document) => Ok(document),
        None => Err(lost_race(conn, doc.id, doc.version)?.into()),
    }
}

fn lost_race(
    conn: &mut PgConnection,
    document_id: Uuid,
    read_version: i32,
) -> AppResult<TransitionError> {
    let latest: Document = documents::table.find(document_id).first(conn)?;
    let status = latest.status()?;
    warn!(
        document_id = %document_id,
        status = %status,
        read_version,
        current_version = latest.version,
        "review lost a concurrent update"
    );
    Ok(if status.is_terminal() {
        TransitionError::Terminal(status)
    } else {
        TransitionError::Stale {
            expected: read_version,
            found: latest.version,
        }
    })
}

fn naive(value: DateTime<Utc>) -> NaiveDateTime {
    value.naive_utc()
}
