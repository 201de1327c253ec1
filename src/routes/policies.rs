use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::CurrentActor;
use crate::authz::{authorize, policy_grant_duration, Action, GrantKind};
use crate::domain::PolicyCategory;
use crate::error::{AppError, AppResult};
use crate::grants::{self, AccessGrant};
use crate::models::{CompanyPolicy, NewCompanyPolicy};
use crate::schema::company_policies;
use crate::state::AppState;
use crate::uploads::{read_form, DOCUMENT_MIME_TYPES};

#[derive(Deserialize)]
pub struct PolicyListQuery {
    pub category: Option<PolicyCategory>,
}

#[derive(Serialize)]
pub struct PolicyResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub uploaded_by: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: NaiveDateTime,
}

impl From<CompanyPolicy> for PolicyResponse {
    fn from(policy: CompanyPolicy) -> Self {
        Self {
            id: policy.id,
            title: policy.title,
            description: policy.description,
            category: policy.category,
            uploaded_by: policy.uploaded_by,
            file_name: policy.file_name,
            file_size: policy.file_size,
            mime_type: policy.mime_type,
            created_at: policy.created_at,
        }
    }
}

pub async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<PolicyListQuery>,
    current: CurrentActor,
) -> AppResult<Json<Vec<PolicyResponse>>> {
    authorize(&current.actor, Action::ViewPolicy)?;

    let mut conn = state.db()?;
    let mut statement = company_policies::table.into_boxed();
    if let Some(category) = query.category {
        statement = statement.filter(company_policies::category.eq(category.as_str()));
    }
    let rows: Vec<CompanyPolicy> = statement
        .order(company_policies::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(PolicyResponse::from).collect()))
}

pub async fn create_policy(
    State(state): State<AppState>,
    current: CurrentActor,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<PolicyResponse>)> {
    authorize(&current.actor, Action::ManagePolicies)?;

    let mut form = read_form(multipart).await?;
    let title = form.required("title")?;
    let description = form.optional("description");
    let category: PolicyCategory = form.required("category")?.parse()?;
    let file = form.take_file(state.config.max_upload_bytes, DOCUMENT_MIME_TYPES)?;

    let policy_id = Uuid::new_v4();
    let file_key = format!("policies/{category}/{policy_id}/{}", file.file_name);
    let file_size = file.bytes.len() as i64;

    state
        .buckets
        .policies
        .put_object(&file_key, file.bytes, Some(file.mime_type.clone()))
        .await
        .map_err(|err| {
            error!(error = %err, key = %file_key, "failed to store policy");
            AppError::internal(format!("failed to store policy: {err}"))
        })?;

    let new_policy = NewCompanyPolicy {
        id: policy_id,
        title,
        description,
        category: category.as_str().to_string(),
        uploaded_by: Some(current.actor.id),
        file_key: file_key.clone(),
        file_name: file.file_name,
        file_size,
        mime_type: file.mime_type,
    };

    let inserted = {
        let mut conn = state.db()?;
        diesel::insert_into(company_policies::table)
            .values(&new_policy)
            .get_result::<CompanyPolicy>(&mut conn)
    };

    let policy = match inserted {
        Ok(policy) => policy,
        Err(err) => {
            if let Err(cleanup) = state.buckets.policies.delete_object(&file_key).await {
                warn!(error = %cleanup, key = %file_key, "failed to remove blob after insert error");
            }
            return Err(AppError::from(err));
        }
    };

    info!(
        policy_id = %policy.id,
        category = %category,
        uploaded_by = %current.actor.id,
        "company policy published"
    );

    Ok((StatusCode::CREATED, Json(policy.into())))
}

pub async fn delete_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<StatusCode> {
    authorize(&current.actor, Action::ManagePolicies)?;

    let policy = load_policy(&state, policy_id)?;
    state
        .buckets
        .policies
        .delete_object(&policy.file_key)
        .await
        .map_err(|err| {
            error!(error = %err, key = %policy.file_key, "failed to delete policy blob");
            AppError::internal(format!("failed to delete policy file: {err}"))
        })?;

    let mut conn = state.db()?;
    diesel::delete(company_policies::table.find(policy_id)).execute(&mut conn)?;

    info!(policy_id = %policy_id, deleted_by = %current.actor.id, "company policy deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn view_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<AccessGrant>> {
    policy_grant(&state, policy_id, &current, GrantKind::View).await
}

pub async fn download_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<AccessGrant>> {
    policy_grant(&state, policy_id, &current, GrantKind::Download).await
}

fn load_policy(state: &AppState, policy_id: Uuid) -> AppResult<CompanyPolicy> {
    let mut conn = state.db()?;
    Ok(company_policies::table.find(policy_id).first(&mut conn)?)
}

async fn policy_grant(
    state: &AppState,
    policy_id: Uuid,
    current: &CurrentActor,
    kind: GrantKind,
) -> AppResult<Json<AccessGrant>> {
    authorize(&current.actor, Action::ViewPolicy)?;

    let policy = load_policy(state, policy_id)?;
    let lifetime = policy_grant_duration(&current.actor, policy.category()?, kind);
    let grant = grants::issue(
        state.buckets.policies.as_ref(),
        &policy.file_key,
        &policy.file_name,
        kind,
        lifetime,
    )
    .await?;
    Ok(Json(grant))
}
