pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    authz::Actor, error::AppError, models::Profile, schema::profiles, state::AppState,
};

/// A verified, unexpired session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0)
            .ok_or_else(AppError::unauthorized)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            expires_at,
        })
    }
}

/// The session together with the caller's profile, resolved once per request
/// and handed to handlers explicitly.
#[derive(Debug, Clone)]
pub struct CurrentActor {
    pub session: AuthenticatedUser,
    pub profile: Profile,
    pub actor: Actor,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = AuthenticatedUser::from_request_parts(parts, state).await?;

        let mut conn = state.db()?;
        // A valid token whose profile is gone belongs to a deleted employee.
        let profile: Profile = profiles::table
            .find(session.user_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::unauthorized)?;

        let actor = profile.to_actor();
        Ok(CurrentActor {
            session,
            profile,
            actor,
        })
    }
}
