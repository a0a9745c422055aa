use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use madrasa_db::UserRecord;
use madrasa_security::{InputValidator, verify_password};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{Authenticated, bearer_token};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserRecord,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid phone number or password".into())
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<SharedState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<LoginResponse>> {
    let Json(req) = body.map_err(|r| ApiError::BadRequest(r.body_text()))?;

    let phone = InputValidator::normalize_phone_number(&req.phone_number)?;
    let Some((user, password_hash)) = state.db.find_login(&phone)? else {
        warn!("login attempt for unknown phone number");
        return Err(invalid_credentials());
    };
    if !verify_password(&req.password, &password_hash) {
        warn!(user_id = user.id, "login attempt with wrong password");
        return Err(invalid_credentials());
    }

    let token = state.db.create_session(user.id)?;
    state.db.record_login(user.id)?;
    let user = state.db.get_user(user.id)?.unwrap_or(user);
    info!(user_id = user.id, role = %user.role, "user logged in");

    Ok(ApiResponse::with_message(
        "Login successful",
        LoginResponse { token, user },
    ))
}

/// `POST /auth/logout`
pub async fn logout(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
    headers: HeaderMap,
) -> ApiResult<ApiResponse<()>> {
    if let Some(token) = bearer_token(&headers) {
        state.db.delete_session(token)?;
    }
    info!(user_id = caller.user_id, "user logged out");
    Ok(ApiResponse::message("Logged out"))
}
