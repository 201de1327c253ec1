use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{connection::SimpleConnection, PgConnection};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database = state
        .db()
        .map_err(|err| err.to_string())
        .and_then(|mut conn| ping(&mut conn));

    match database {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}

fn ping(conn: &mut PgConnection) -> Result<(), String> {
    conn.batch_execute("SELECT 1").map_err(|err| err.to_string())
}
