//! Session resolution and role checks.
//!
//! [`session_layer`] turns a bearer token into a [`Caller`] stored in the
//! request extensions. Handlers state what they need through extractors:
//! [`Authenticated`], [`TeacherAccess`], [`SuperUserAccess`] or the
//! optional [`MaybeCaller`].

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use madrasa_common::Role;
use tracing::debug;

use crate::error::ApiError;
use crate::state::SharedState;

/// The logged-in account making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    /// Authors may manage their own posts; super users manage all posts.
    pub fn can_manage(&self, author_id: i64) -> bool {
        self.user_id == author_id || self.role.is_super_user()
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Attach the session's [`Caller`] to the request, if the token resolves.
/// Unknown tokens are treated as anonymous requests.
pub async fn session_layer(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).map(str::to_owned);
    if let Some(token) = token {
        match state.db.resolve_session(&token)? {
            Some(principal) => {
                req.extensions_mut().insert(Caller {
                    user_id: principal.user_id,
                    role: principal.role,
                });
            }
            None => debug!("ignoring unknown session token"),
        }
    }
    Ok(next.run(req).await)
}

fn caller(parts: &Parts) -> Option<Caller> {
    parts.extensions.get::<Caller>().copied()
}

/// Any logged-in user.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller(parts)
            .map(Authenticated)
            .ok_or_else(|| ApiError::Unauthorized("Login required".into()))
    }
}

/// A teacher or super user.
#[derive(Debug, Clone, Copy)]
pub struct TeacherAccess(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for TeacherAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(caller) = Authenticated::from_request_parts(parts, state).await?;
        if !caller.role.can_author() {
            return Err(ApiError::Forbidden("Teacher access required".into()));
        }
        Ok(TeacherAccess(caller))
    }
}

/// A super user.
#[derive(Debug, Clone, Copy)]
pub struct SuperUserAccess(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for SuperUserAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(caller) = Authenticated::from_request_parts(parts, state).await?;
        if !caller.role.is_super_user() {
            return Err(ApiError::Forbidden("Insufficient permissions".into()));
        }
        Ok(SuperUserAccess(caller))
    }
}

/// The caller when logged in, `None` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct MaybeCaller(pub Option<Caller>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(caller(parts)))
    }
}
