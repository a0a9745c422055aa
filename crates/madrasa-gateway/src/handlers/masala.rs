use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use madrasa_db::{MasalaChanges, MasalaFilter, MasalaRecord, NewMasala};
use madrasa_security::InputValidator;
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::auth::{Authenticated, MaybeCaller, TeacherAccess};
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, Pagination};
use crate::state::SharedState;

pub const EXCERPT_CHARS: usize = 200;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// First 200 characters plus `...` for long content, the content itself
/// otherwise.
pub fn derive_excerpt(content: &str) -> String {
    match content.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Query string for the public list. Values that do not parse fall back to
/// their defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    category: Option<String>,
    author_id: Option<String>,
}

impl ListParams {
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .map(|p| p.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(1)
    }

    fn per_page(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|l| l.parse::<i64>().ok())
            .map(|l| l.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn filter(&self) -> MasalaFilter {
        MasalaFilter {
            category: self.category.clone().filter(|c| !c.is_empty()),
            author_id: self
                .author_id
                .as_deref()
                .and_then(|a| a.parse().ok())
                .filter(|id| *id != 0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMasalaRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_published: Option<bool>,
}

/// Partial update. Nullable fields distinguish "absent" from `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMasalaRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub excerpt: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    pub is_published: Option<bool>,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn clean_category(category: Option<String>) -> ApiResult<Option<String>> {
    let Some(category) = category else {
        return Ok(None);
    };
    let category = InputValidator::sanitize_line(&category);
    if category.is_empty() {
        return Ok(None);
    }
    InputValidator::validate_category(&category)?;
    Ok(Some(category))
}

fn clean_title(title: &str) -> ApiResult<String> {
    let title = InputValidator::sanitize_line(title);
    InputValidator::validate_title(&title)?;
    Ok(title)
}

impl UpdateMasalaRequest {
    fn into_changes(self) -> ApiResult<MasalaChanges> {
        let title = match self.title {
            Some(title) => {
                let title = clean_title(&title)?;
                if title.is_empty() {
                    return Err(ApiError::BadRequest("Title cannot be empty".into()));
                }
                Some(title)
            }
            None => None,
        };

        let content = match self.content {
            Some(content) => {
                let content = InputValidator::sanitize(&content);
                if content.trim().is_empty() {
                    return Err(ApiError::BadRequest("Content cannot be empty".into()));
                }
                Some(content)
            }
            None => None,
        };

        // An explicit excerpt wins; otherwise new content re-derives it.
        let excerpt = match self.excerpt {
            Some(excerpt) => Some(excerpt),
            None => content.as_deref().map(|c| Some(derive_excerpt(c))),
        };

        let category = match self.category {
            Some(category) => Some(clean_category(category)?),
            None => None,
        };

        Ok(MasalaChanges {
            title,
            content,
            excerpt,
            category,
            image_url: self.image_url,
            is_published: self.is_published,
        })
    }
}

fn masala_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Masala not found".into()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Masala not found".into())
}

/// `GET /masala`
pub async fn list_masala(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> ApiResult<ApiResponse<Vec<MasalaRecord>>> {
    let page = params.page();
    let per_page = params.per_page();

    let result = state.db.list_published(&params.filter(), page, per_page)?;
    Ok(ApiResponse::paginated(
        result.items,
        Pagination::new(page, per_page, result.total),
    ))
}

/// `GET /masala/{id}`. Drafts are visible to their author and super users.
pub async fn get_masala(
    State(state): State<SharedState>,
    MaybeCaller(caller): MaybeCaller,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<MasalaRecord>> {
    let id = masala_id(path)?;
    let masala = state.db.get_masala(id)?.ok_or_else(not_found)?;

    if !masala.is_published && !caller.is_some_and(|c| c.can_manage(masala.author_id)) {
        return Err(ApiError::Forbidden("Masala not published".into()));
    }

    let masala = state.db.increment_views(id)?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(masala))
}

/// `GET /masala/my-posts`
pub async fn my_masala(
    State(state): State<SharedState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<ApiResponse<Vec<MasalaRecord>>> {
    let posts = state.db.masala_by_author(caller.user_id)?;
    Ok(ApiResponse::ok(posts))
}

/// `POST /masala`
pub async fn create_masala(
    State(state): State<SharedState>,
    TeacherAccess(caller): TeacherAccess,
    body: Result<Json<CreateMasalaRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, ApiResponse<MasalaRecord>)> {
    let req = json_body(body)?;

    let title = clean_title(req.title.as_deref().unwrap_or_default())?;
    let content = InputValidator::sanitize(req.content.as_deref().unwrap_or_default());
    if title.is_empty() || content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required".into()));
    }

    let excerpt = req
        .excerpt
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| derive_excerpt(&content));

    let masala = state.db.insert_masala(&NewMasala {
        title,
        content,
        excerpt: Some(excerpt),
        author_id: caller.user_id,
        category: clean_category(req.category)?,
        image_url: req.image_url,
        is_published: req.is_published.unwrap_or(true),
    })?;
    info!(masala_id = masala.id, author_id = caller.user_id, "masala created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Masala created successfully", masala),
    ))
}

/// `PUT /masala/{id}`
pub async fn update_masala(
    State(state): State<SharedState>,
    TeacherAccess(caller): TeacherAccess,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateMasalaRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<MasalaRecord>> {
    let id = masala_id(path)?;
    let existing = state.db.get_masala(id)?.ok_or_else(not_found)?;
    if !caller.can_manage(existing.author_id) {
        return Err(ApiError::Forbidden("Permission denied".into()));
    }

    let changes = json_body(body)?.into_changes()?;
    let masala = state.db.update_masala(id, &changes)?.ok_or_else(not_found)?;
    info!(masala_id = id, user_id = caller.user_id, "masala updated");

    Ok(ApiResponse::with_message(
        "Masala updated successfully",
        masala,
    ))
}

/// `DELETE /masala/{id}`
pub async fn delete_masala(
    State(state): State<SharedState>,
    TeacherAccess(caller): TeacherAccess,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<ApiResponse<()>> {
    let id = masala_id(path)?;
    let existing = state.db.get_masala(id)?.ok_or_else(not_found)?;
    if !caller.can_manage(existing.author_id) {
        return Err(ApiError::Forbidden("Permission denied".into()));
    }

    if !state.db.delete_masala(id)? {
        return Err(not_found());
    }
    info!(masala_id = id, user_id = caller.user_id, "masala deleted");

    Ok(ApiResponse::message("Masala deleted successfully"))
}

/// `GET /masala/categories`
pub async fn categories(State(state): State<SharedState>) -> ApiResult<ApiResponse<Vec<String>>> {
    Ok(ApiResponse::ok(state.db.published_categories()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_its_own_excerpt() {
        assert_eq!(derive_excerpt("A short lesson."), "A short lesson.");
        let exact = "x".repeat(EXCERPT_CHARS);
        assert_eq!(derive_excerpt(&exact), exact);
    }

    #[test]
    fn long_content_is_cut_at_200_chars_with_ellipsis() {
        let content = "y".repeat(250);
        let excerpt = derive_excerpt(&content);
        assert_eq!(excerpt, format!("{}...", "y".repeat(200)));
    }

    #[test]
    fn excerpt_cuts_on_character_boundaries() {
        let content = "صبر".repeat(100);
        let excerpt = derive_excerpt(&content);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn list_params_fall_back_on_garbage() {
        let params = ListParams {
            page: Some("abc".into()),
            limit: Some("-5".into()),
            category: Some(String::new()),
            author_id: Some("0".into()),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 1);
        let filter = params.filter();
        assert!(filter.category.is_none());
        assert!(filter.author_id.is_none());

        let defaults = ListParams::default();
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.per_page(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn limit_is_capped() {
        let params = ListParams {
            limit: Some("5000".into()),
            ..Default::default()
        };
        assert_eq!(params.per_page(), MAX_PAGE_SIZE);
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let req: UpdateMasalaRequest =
            serde_json::from_str(r#"{"category": null, "title": "New"}"#).unwrap();
        assert_eq!(req.category, Some(None));
        assert_eq!(req.image_url, None);

        let changes = req.into_changes().unwrap();
        assert_eq!(changes.category, Some(None));
        assert_eq!(changes.title.as_deref(), Some("New"));
        assert!(changes.excerpt.is_none());
    }

    #[test]
    fn new_content_rederives_excerpt_unless_given() {
        let long = "z".repeat(300);
        let req = UpdateMasalaRequest {
            content: Some(long.clone()),
            ..Default::default()
        };
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.excerpt, Some(Some(derive_excerpt(&long))));

        let req = UpdateMasalaRequest {
            content: Some(long),
            excerpt: Some(Some("custom".into())),
            ..Default::default()
        };
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.excerpt, Some(Some("custom".into())));
    }

    #[test]
    fn crlf_content_is_stored_and_excerpted_as_sent() {
        let content = "Bismillah\r\nFirst lesson\r\n";
        let req = UpdateMasalaRequest {
            content: Some(content.into()),
            ..Default::default()
        };
        let changes = req.into_changes().unwrap();
        assert_eq!(changes.content.as_deref(), Some(content));
        assert_eq!(changes.excerpt, Some(Some(content.to_string())));
    }

    #[test]
    fn empty_title_update_is_rejected() {
        let req = UpdateMasalaRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(req.into_changes(), Err(ApiError::BadRequest(_))));
    }
}
