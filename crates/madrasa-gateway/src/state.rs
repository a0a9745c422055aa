use std::sync::Arc;

use madrasa_db::Database;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

pub type SharedState = Arc<AppState>;
