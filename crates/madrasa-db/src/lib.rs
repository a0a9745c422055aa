pub mod database;
pub mod masala_store;
pub mod migrations;
pub mod schema;
pub mod session_store;
pub mod user_store;

pub use database::{Database, open_for_migration};
pub use masala_store::{MasalaChanges, MasalaFilter, MasalaPage, MasalaRecord, NewMasala};
pub use session_store::SessionPrincipal;
pub use user_store::{NewUser, UserRecord};
