use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use madrasa_db::UserRecord;
use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::SuperUserAccess;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::SharedState;

/// Roster entry returned by `/users/teachers`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub sms_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for TeacherSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            name: user.full_name(),
            id: user.id,
            phone_number: user.phone_number,
            email: user.email,
            sms_count: user.sms_count,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// `GET /users`
pub async fn list_users() -> ApiResponse<Vec<Value>> {
    ApiResponse::with_message("Users endpoint placeholder", Vec::new())
}

/// `GET /users/teachers`
pub async fn teachers(
    State(state): State<SharedState>,
    SuperUserAccess(_): SuperUserAccess,
) -> ApiResult<ApiResponse<Vec<TeacherSummary>>> {
    let teachers = state
        .db
        .active_teachers()
        .map_err(|e| ApiError::Internal(format!("Failed to load teachers: {e}")))?;

    Ok(ApiResponse::with_message(
        "Teachers retrieved successfully",
        teachers.into_iter().map(TeacherSummary::from).collect(),
    ))
}

/// `GET /users/health`
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "component": "users"}))
}
