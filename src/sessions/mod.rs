//! HTTP surface of the editing pipeline: templates, sessions, previews,
//! exports and saved documents.

pub mod delivery;
pub mod handlers;
pub mod models;
pub mod registry;

pub use handlers::config;
pub use registry::SessionRegistry;
