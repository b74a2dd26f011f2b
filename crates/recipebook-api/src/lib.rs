pub mod catalog;
pub mod error;
pub mod middleware;
pub mod recipes;
pub mod routes;
pub mod state;
pub mod users;

pub use routes::build_router;
pub use state::{AppState, AppStateInner};
