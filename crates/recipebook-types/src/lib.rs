pub mod api;
pub mod models;
pub mod shopping;
pub mod validation;
