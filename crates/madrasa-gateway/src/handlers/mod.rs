pub mod auth;
pub mod masala;
pub mod users;

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
