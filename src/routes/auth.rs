use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind, PgConnection};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::profiles::{insert_profile, ProfileResponse};
use crate::{
    auth::{password, AuthenticatedUser, CurrentActor},
    authz::ActorClass,
    domain::{Department, Designation, FunctionalRole},
    error::{AppError, AppResult},
    models::{NewProfile, NewRefreshToken, NewUser, RefreshToken, User},
    retry::retry_fixed,
    schema::{refresh_tokens, users},
    state::AppState,
};

use crate::schema::refresh_tokens::dsl as refresh_dsl;

const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub department: Department,
    pub designation: Designation,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub emergency_contact: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_branch: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub session: LoginResponse,
    pub profile: ProfileResponse,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub class: ActorClass,
    pub profile_completed: bool,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<RegisterResponse>)> {
    let email = normalize_email(&payload.email)?;
    if payload.password.chars().count() < password::MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }
    let first_name = non_empty(&payload.first_name, "first_name")?;
    let last_name = non_empty(&payload.last_name, "last_name")?;

    let password_hash = password::hash_password(&payload.password)?;
    let user_id = Uuid::new_v4();
    {
        let mut conn = state.db()?;
        let new_user = NewUser {
            id: user_id,
            email: email.clone(),
            password_hash,
        };
        match diesel::insert_into(users::table)
            .values(&new_user)
            .execute(&mut conn)
        {
            Ok(_) => {}
            Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                return Err(AppError::conflict("an account with this email already exists"));
            }
            Err(err) => return Err(AppError::from(err)),
        }
    }

    let new_profile = NewProfile {
        id: user_id,
        email: email.clone(),
        first_name: Some(first_name),
        last_name: Some(last_name),
        department: Some(payload.department.as_str().to_string()),
        designation: Some(payload.designation.as_str().to_string()),
        role: FunctionalRole::Employee.as_str().to_string(),
        profile_completed: true,
        phone: trimmed(payload.phone),
        address: trimmed(payload.address),
        city: trimmed(payload.city),
        postal_code: trimmed(payload.postal_code),
        emergency_contact: trimmed(payload.emergency_contact),
        bank_name: trimmed(payload.bank_name),
        bank_account_number: trimmed(payload.bank_account_number),
        bank_branch: trimmed(payload.bank_branch),
    };

    let profile = retry_fixed(
        "insert registration profile",
        state.config.profile_insert_attempts,
        state.config.profile_insert_backoff(),
        |_| {
            let state = &state;
            let new_profile = &new_profile;
            async move {
                let mut conn = state.db()?;
                insert_profile(&mut conn, new_profile)
            }
        },
    )
    .await
    .map_err(|err| {
        error!(user_id = %user_id, error = %err, "profile creation failed after retries");
        err
    })?;

    let mut conn = state.db()?;
    let (headers, session) = issue_session(&state, &mut conn, user_id, &email)?;
    drop(conn);

    info!(user_id = %user_id, department = %payload.department, "registered new account");

    Ok((
        StatusCode::CREATED,
        headers,
        Json(RegisterResponse {
            session,
            profile: ProfileResponse::from_profile(profile, None),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let email = normalize_email(&payload.email).map_err(|_| AppError::unauthorized())?;
    let mut conn = state.db()?;

    let user: User = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        warn!(user_id = %user.id, "rejected login with wrong password");
        return Err(AppError::unauthorized());
    }

    let stub = NewProfile::stub(user.id, user.email.clone());
    let created = diesel::insert_into(crate::schema::profiles::table)
        .values(&stub)
        .on_conflict(crate::schema::profiles::id)
        .do_nothing()
        .execute(&mut conn)?;
    if created > 0 {
        info!(user_id = %user.id, "created stub profile on first sign-in");
    }

    let (headers, session) = issue_session(&state, &mut conn, user.id, &user.email)?;
    Ok((headers, Json(session)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let cookies = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = cookies
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let hashed = hash_refresh_token(refresh_value);
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let token: RefreshToken = refresh_dsl::refresh_tokens
        .filter(refresh_dsl::token_hash.eq(&hashed))
        .filter(refresh_dsl::revoked_at.is_null())
        .filter(refresh_dsl::expires_at.gt(now))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    diesel::update(refresh_dsl::refresh_tokens.filter(refresh_dsl::id.eq(token.id)))
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let user: User = users::table.find(token.user_id).first(&mut conn)?;
    let (headers, session) = issue_session(&state, &mut conn, user.id, &user.email)?;
    Ok((headers, Json(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let mut rows_affected = 0;

    if let Some(value) = jar
        .as_ref()
        .and_then(|cookies| cookies.get(REFRESH_COOKIE_NAME))
    {
        rows_affected = diesel::update(
            refresh_dsl::refresh_tokens
                .filter(refresh_dsl::token_hash.eq(hash_refresh_token(value)))
                .filter(refresh_dsl::user_id.eq(user.user_id))
                .filter(refresh_dsl::revoked_at.is_null()),
        )
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
    }

    if rows_affected == 0 {
        diesel::update(
            refresh_dsl::refresh_tokens
                .filter(refresh_dsl::user_id.eq(user.user_id))
                .filter(refresh_dsl::revoked_at.is_null()),
        )
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn session(current: CurrentActor) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: current.session.user_id,
        email: current.session.email,
        expires_at: current.session.expires_at,
        class: current.actor.class(),
        profile_completed: current.profile.profile_completed,
    })
}

fn issue_session(
    state: &AppState,
    conn: &mut PgConnection,
    user_id: Uuid,
    email: &str,
) -> AppResult<(HeaderMap, LoginResponse)> {
    let issued = state.jwt.generate_token(user_id, email)?;

    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    let new_refresh = NewRefreshToken {
        id: Uuid::new_v4(),
        user_id,
        token_hash: hash_refresh_token(&refresh_value),
        issued_at: now.naive_utc(),
        expires_at: refresh_expires_at.naive_utc(),
    };

    diesel::insert_into(refresh_tokens::table)
        .values(&new_refresh)
        .execute(conn)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        build_refresh_cookie(state, &refresh_value, refresh_expires_at)?,
    );

    Ok((
        headers,
        LoginResponse {
            access_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
            expires_at: issued.expires_at,
        },
    ))
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::bad_request("email must be a valid address"));
    }
    Ok(email)
}

fn non_empty(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn build_refresh_cookie(
    state: &AppState,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<HeaderValue> {
    let max_age = ChronoDuration::days(state.config.refresh_token_expiry_days).num_seconds();

    let mut parts = vec![format!("{REFRESH_COOKIE_NAME}={token}")];
    parts.push("Path=/api/auth".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push(format!("Max-Age={max_age}"));
    parts.push(format!("Expires={}", expires_at.to_rfc2822()));
    push_cookie_scope(state, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn build_clear_refresh_cookie(state: &AppState) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{REFRESH_COOKIE_NAME}=")];
    parts.push("Path=/api/auth".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    push_cookie_scope(state, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn push_cookie_scope(state: &AppState, parts: &mut Vec<String>) {
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={domain}"));
    }
}
