use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*, PgConnection};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::CurrentActor;
use crate::authz::{authorize, document_grant_duration, Action, GrantKind};
use crate::domain::{Department, Designation};
use crate::error::{AppError, AppResult};
use crate::models::{NewProfile, Profile};
use crate::schema::{documents, profiles, users};
use crate::state::AppState;
use crate::uploads::{read_form, PICTURE_MIME_TYPES};
use crate::utils::json::{classify_nullable, NullableValue};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: String,
    pub profile_completed: bool,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_branch: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProfileResponse {
    pub fn from_profile(profile: Profile, picture_url: Option<String>) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            department: profile.department,
            designation: profile.designation,
            role: profile.role,
            profile_completed: profile.profile_completed,
            phone: profile.phone,
            address: profile.address,
            city: profile.city,
            postal_code: profile.postal_code,
            emergency_contact: profile.emergency_contact,
            bank_name: profile.bank_name,
            bank_account_number: profile.bank_account_number,
            bank_branch: profile.bank_branch,
            picture_url,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: String,
    pub profile_completed: bool,
    pub document_count: i64,
}

#[derive(Serialize)]
pub struct DeleteEmployeeResponse {
    pub id: Uuid,
    pub deleted_documents: usize,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = profiles)]
struct ProfileChangeset {
    first_name: Option<Option<String>>,
    last_name: Option<Option<String>>,
    department: Option<Option<String>>,
    designation: Option<Option<String>>,
    profile_completed: Option<bool>,
    phone: Option<Option<String>>,
    address: Option<Option<String>>,
    city: Option<Option<String>>,
    postal_code: Option<Option<String>>,
    emergency_contact: Option<Option<String>>,
    bank_name: Option<Option<String>>,
    bank_account_number: Option<Option<String>>,
    bank_branch: Option<Option<String>>,
    updated_at: Option<NaiveDateTime>,
}

impl ProfileChangeset {
    fn completing(profile: &NewProfile) -> Self {
        Self {
            first_name: Some(profile.first_name.clone()),
            last_name: Some(profile.last_name.clone()),
            department: Some(profile.department.clone()),
            designation: Some(profile.designation.clone()),
            profile_completed: Some(true),
            phone: Some(profile.phone.clone()),
            address: Some(profile.address.clone()),
            city: Some(profile.city.clone()),
            postal_code: Some(profile.postal_code.clone()),
            emergency_contact: Some(profile.emergency_contact.clone()),
            bank_name: Some(profile.bank_name.clone()),
            bank_account_number: Some(profile.bank_account_number.clone()),
            bank_branch: Some(profile.bank_branch.clone()),
            updated_at: Some(Utc::now().naive_utc()),
        }
    }
}

/// Inserts a profile unless one already exists for the id, then returns the
/// stored row. Safe to repeat after an attempt whose outcome is unknown.
///
/// A complete profile arriving after login already created the incomplete
/// stub fills that stub in. Role and email on the stub are left alone, and a
/// row that is already complete is never overwritten.
pub fn insert_profile(conn: &mut PgConnection, profile: &NewProfile) -> AppResult<Profile> {
    diesel::insert_into(profiles::table)
        .values(profile)
        .on_conflict(profiles::id)
        .do_nothing()
        .execute(conn)?;

    if profile.profile_completed {
        let completed = diesel::update(
            profiles::table
                .find(profile.id)
                .filter(profiles::profile_completed.eq(false)),
        )
        .set(ProfileChangeset::completing(profile))
        .get_result::<Profile>(conn)
        .optional()?;
        if let Some(completed) = completed {
            info!(user_id = %profile.id, "completed stub profile during registration");
            return Ok(completed);
        }
    }

    Ok(profiles::table.find(profile.id).first(conn)?)
}

pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentActor,
) -> AppResult<Json<ProfileResponse>> {
    let picture_url = picture_url(&state, &current.profile).await;
    Ok(Json(ProfileResponse::from_profile(current.profile, picture_url)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentActor,
    Json(body): Json<Value>,
) -> AppResult<Json<ProfileResponse>> {
    let existing = &current.profile;
    if body.get("role").is_some() || body.get("email").is_some() {
        return Err(AppError::forbidden("role and email cannot be changed here"));
    }

    let mut changes = ProfileChangeset::default();

    for (field, slot) in [
        ("phone", &mut changes.phone),
        ("address", &mut changes.address),
        ("city", &mut changes.city),
        ("postal_code", &mut changes.postal_code),
        ("emergency_contact", &mut changes.emergency_contact),
        ("bank_name", &mut changes.bank_name),
        ("bank_account_number", &mut changes.bank_account_number),
        ("bank_branch", &mut changes.bank_branch),
    ] {
        match classify_nullable(body.get(field)).map_err(|err| field_error(field, err))? {
            NullableValue::Omitted => {}
            NullableValue::Null => *slot = Some(None),
            NullableValue::String(value) => {
                let value = value.trim().to_string();
                *slot = Some((!value.is_empty()).then_some(value));
            }
        }
    }

    for (field, slot) in [
        ("first_name", &mut changes.first_name),
        ("last_name", &mut changes.last_name),
    ] {
        match classify_nullable(body.get(field)).map_err(|err| field_error(field, err))? {
            NullableValue::Omitted => {}
            NullableValue::String(value) if !value.trim().is_empty() => {
                *slot = Some(Some(value.trim().to_string()));
            }
            _ => return Err(AppError::bad_request(format!("{field} must not be empty"))),
        }
    }

    let department = parse_assignment::<Department>(&body, "department")?;
    let designation = parse_assignment::<Designation>(&body, "designation")?;
    if department.is_some() || designation.is_some() {
        if existing.profile_completed {
            return Err(AppError::forbidden(
                "department and designation are fixed once the profile is complete",
            ));
        }
        changes.department = department.map(|d| Some(d.as_str().to_string()));
        changes.designation = designation.map(|d| Some(d.as_str().to_string()));
    }

    if !existing.profile_completed {
        let has = |change: &Option<Option<String>>, current: &Option<String>| match change {
            Some(value) => value.is_some(),
            None => current.is_some(),
        };
        let complete = has(&changes.first_name, &existing.first_name)
            && has(&changes.last_name, &existing.last_name)
            && has(&changes.department, &existing.department)
            && has(&changes.designation, &existing.designation);
        if complete {
            changes.profile_completed = Some(true);
        }
    }

    changes.updated_at = Some(Utc::now().naive_utc());

    let updated: Profile = {
        let mut conn = state.db()?;
        diesel::update(profiles::table.find(existing.id))
            .set(&changes)
            .get_result(&mut conn)?
    };

    if changes.profile_completed == Some(true) {
        info!(user_id = %updated.id, "profile completed");
    }

    let picture_url = picture_url(&state, &updated).await;
    Ok(Json(ProfileResponse::from_profile(updated, picture_url)))
}

pub async fn upload_picture(
    State(state): State<AppState>,
    current: CurrentActor,
    multipart: Multipart,
) -> AppResult<Json<ProfileResponse>> {
    let mut form = read_form(multipart).await?;
    let file = form.take_file(state.config.max_upload_bytes, PICTURE_MIME_TYPES)?;

    let user_id = current.profile.id;
    let key = format!("profile-pictures/{user_id}/{}-{}", Uuid::new_v4(), file.file_name);
    state
        .buckets
        .documents
        .put_object(&key, file.bytes, Some(file.mime_type))
        .await
        .map_err(|err| {
            error!(error = %err, key = %key, "failed to store profile picture");
            AppError::internal(format!("failed to store profile picture: {err}"))
        })?;

    let updated: Profile = {
        let mut conn = state.db()?;
        diesel::update(profiles::table.find(user_id))
            .set((
                profiles::picture_key.eq(Some(key.as_str())),
                profiles::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(&mut conn)?
    };

    if let Some(previous) = current.profile.picture_key.as_deref() {
        if let Err(err) = state.buckets.documents.delete_object(previous).await {
            warn!(error = %err, key = %previous, "failed to remove replaced profile picture");
        }
    }

    let picture_url = picture_url(&state, &updated).await;
    Ok(Json(ProfileResponse::from_profile(updated, picture_url)))
}

pub async fn list_employees(
    State(state): State<AppState>,
    current: CurrentActor,
) -> AppResult<Json<Vec<EmployeeSummary>>> {
    authorize(&current.actor, Action::ListEmployees)?;

    let mut conn = state.db()?;
    let rows: Vec<Profile> = profiles::table
        .order((profiles::last_name.asc(), profiles::first_name.asc()))
        .load(&mut conn)?;

    let counts: HashMap<Uuid, i64> = documents::table
        .group_by(documents::uploaded_by)
        .select((documents::uploaded_by, count_star()))
        .load::<(Uuid, i64)>(&mut conn)?
        .into_iter()
        .collect();

    let response = rows
        .into_iter()
        .map(|profile| EmployeeSummary {
            name: profile.full_name(),
            document_count: counts.get(&profile.id).copied().unwrap_or(0),
            id: profile.id,
            email: profile.email,
            department: profile.department,
            designation: profile.designation,
            role: profile.role,
            profile_completed: profile.profile_completed,
        })
        .collect();

    Ok(Json(response))
}

/// Removes an employee's documents (blobs, then rows), then the profile, then
/// the identity. A failure after the documents are gone leaves the profile in
/// place without documents; that window is not reconciled.
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    current: CurrentActor,
) -> AppResult<Json<DeleteEmployeeResponse>> {
    authorize(
        &current.actor,
        Action::DeleteEmployee {
            target_id: employee_id,
        },
    )?;

    let (target, file_keys) = {
        let mut conn = state.db()?;
        let target: Profile = profiles::table.find(employee_id).first(&mut conn)?;
        let file_keys: Vec<String> = documents::table
            .filter(documents::uploaded_by.eq(employee_id))
            .select(documents::file_key)
            .load(&mut conn)?;
        (target, file_keys)
    };

    if let Err(err) = state.buckets.documents.delete_objects(&file_keys).await {
        warn!(
            employee_id = %employee_id,
            error = %err,
            objects = file_keys.len(),
            "failed to remove employee document blobs"
        );
    }

    let mut conn = state.db()?;
    let deleted_documents = diesel::delete(
        documents::table.filter(documents::uploaded_by.eq(employee_id)),
    )
    .execute(&mut conn)?;

    if let Err(err) = diesel::delete(profiles::table.find(employee_id)).execute(&mut conn) {
        error!(
            employee_id = %employee_id,
            deleted_documents,
            error = %err,
            "documents removed but profile deletion failed"
        );
        return Err(AppError::from(err));
    }

    diesel::delete(users::table.find(employee_id)).execute(&mut conn)?;
    drop(conn);

    if let Some(key) = target.picture_key.as_deref() {
        if let Err(err) = state.buckets.documents.delete_object(key).await {
            warn!(error = %err, key = %key, "failed to remove profile picture");
        }
    }

    info!(
        employee_id = %employee_id,
        deleted_by = %current.actor.id,
        deleted_documents,
        "employee deleted"
    );

    Ok(Json(DeleteEmployeeResponse {
        id: employee_id,
        deleted_documents,
    }))
}

async fn picture_url(state: &AppState, profile: &Profile) -> Option<String> {
    let key = profile.picture_key.as_deref()?;
    match state
        .buckets
        .documents
        .presign_get_object(key, document_grant_duration(GrantKind::View), None)
        .await
    {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(error = %err, key = %key, "failed to sign profile picture URL");
            None
        }
    }
}

fn parse_assignment<T>(body: &Value, field: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr<Err = crate::domain::UnknownVariant>,
{
    match classify_nullable(body.get(field)).map_err(|err| field_error(field, err))? {
        NullableValue::Omitted => Ok(None),
        NullableValue::Null => Err(AppError::bad_request(format!("{field} cannot be cleared"))),
        NullableValue::String(raw) => Ok(Some(raw.parse::<T>()?)),
    }
}

fn field_error(field: &str, err: String) -> AppError {
    AppError::bad_request(format!("{field}: {err}"))
}
